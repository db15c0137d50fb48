//! Per-request routing orchestration.
//!
//! # Responsibilities
//! - Resolve the environment owning the request's hostname
//! - Run the environment's rules against the request
//! - Pick the serving deployment for anything not diverted
//!
//! # Design Decisions
//! - Redirect and proxy outcomes end routing; rewrites only change the path
//! - Deployment selection is environment-wide, not path-specific
//! - Unknown hosts and empty rollouts are `NotFound` decisions, not errors

use url::{Position, Url};

use crate::config::SharedSettings;
use crate::error::RouteError;
use crate::observability::metrics;
use crate::rollout::{ActiveDeployment, RandomSource, ThreadRandom, TrafficSplitter};
use crate::routing::cache::SnapshotCache;
use crate::routing::resolver::normalize_hostname;
use crate::rules::matcher::with_request_query;
use crate::rules::{match_request, MatchArgs, Outcome};
use crate::store::{HostResolver, SnapshotSource};

/// The routing-relevant view of an inbound request.
#[derive(Debug, Clone)]
pub struct EdgeRequest {
    /// Absolute request URL.
    pub url: Url,
    /// Effective hostname as received (normalized by the router).
    pub hostname: String,
    /// Client key for sticky rollout selection.
    pub sticky_key: Option<String>,
}

impl EdgeRequest {
    pub fn new(url: Url) -> Self {
        let hostname = url.host_str().unwrap_or_default().to_string();
        Self {
            url,
            hostname,
            sticky_key: None,
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn with_sticky_key(mut self, key: impl Into<String>) -> Self {
        self.sticky_key = Some(key.into());
        self
    }
}

/// Why a request has nothing to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    /// Hostname isn't bound to any environment.
    UnknownHost,
    /// No deployment covers the request (none published, or dark remainder).
    NoDeployment,
}

/// What the edge does with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeDecision {
    Redirect {
        location: String,
        status: u16,
    },
    Proxy {
        target: String,
    },
    Serve {
        env_id: String,
        deployment: ActiveDeployment,
        /// Path (and query) to serve from the deployment, possibly rewritten.
        path: String,
        /// Status override from a rewrite rule (e.g. a custom 404 page).
        status: Option<u16>,
    },
    NotFound(NotFoundReason),
}

impl EdgeDecision {
    pub fn kind(&self) -> &'static str {
        match self {
            EdgeDecision::Redirect { .. } => "redirect",
            EdgeDecision::Proxy { .. } => "proxy",
            EdgeDecision::Serve { .. } => "serve",
            EdgeDecision::NotFound(_) => "not_found",
        }
    }
}

/// Orchestrates resolution, rule matching and deployment selection.
pub struct EdgeRouter<R, S, G = ThreadRandom> {
    resolver: R,
    cache: SnapshotCache<S>,
    splitter: TrafficSplitter<G>,
    settings: SharedSettings,
}

impl<R, S> EdgeRouter<R, S, ThreadRandom>
where
    R: HostResolver,
    S: SnapshotSource,
{
    pub fn new(resolver: R, source: S, settings: SharedSettings) -> Self {
        Self::with_splitter(resolver, source, settings, TrafficSplitter::new())
    }
}

impl<R, S, G> EdgeRouter<R, S, G>
where
    R: HostResolver,
    S: SnapshotSource,
    G: RandomSource,
{
    pub fn with_splitter(
        resolver: R,
        source: S,
        settings: SharedSettings,
        splitter: TrafficSplitter<G>,
    ) -> Self {
        Self {
            resolver,
            cache: SnapshotCache::new(source),
            splitter,
            settings,
        }
    }

    /// Snapshot cache, for push invalidation.
    pub fn cache(&self) -> &SnapshotCache<S> {
        &self.cache
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    /// Decide what to do with one request.
    pub async fn route(&self, req: &EdgeRequest) -> Result<EdgeDecision, RouteError> {
        let decision = self.decide(req).await;
        match &decision {
            Ok(d) => metrics::record_decision(d.kind()),
            Err(_) => metrics::record_decision("error"),
        }
        decision
    }

    async fn decide(&self, req: &EdgeRequest) -> Result<EdgeDecision, RouteError> {
        let Some(hostname) = normalize_hostname(&req.hostname) else {
            return Ok(EdgeDecision::NotFound(NotFoundReason::UnknownHost));
        };

        let env = self
            .resolver
            .resolve(&hostname)
            .await
            .map_err(|source| RouteError::Resolve {
                host: hostname.clone(),
                source,
            })?;
        let Some(env) = env else {
            tracing::debug!(host = %hostname, "Hostname not bound to any environment");
            return Ok(EdgeDecision::NotFound(NotFoundReason::UnknownHost));
        };

        let snapshot = self
            .cache
            .get(&env.env_id)
            .await
            .map_err(|source| RouteError::Snapshot {
                env_id: env.env_id.clone(),
                source,
            })?;
        let Some(snapshot) = snapshot else {
            tracing::warn!(host = %hostname, env_id = %env.env_id, "Resolved environment is unknown to the store");
            return Ok(EdgeDecision::NotFound(NotFoundReason::UnknownHost));
        };

        let settings = self.settings.load();
        let args = MatchArgs {
            url: &req.url,
            hostname: &hostname,
            api_prefix: snapshot
                .api_prefix
                .as_deref()
                .or(Some(settings.default_api_prefix.as_str())),
            api_location: snapshot.api_location.as_ref(),
            rules: &snapshot.rules,
        };
        let outcome = match_request(&args)
            .map(|m| m.outcome)
            .unwrap_or(Outcome::None);

        let (path, status) = match outcome {
            Outcome::Redirect { location, status } => {
                return Ok(EdgeDecision::Redirect { location, status });
            }
            Outcome::Proxy { target } => return Ok(EdgeDecision::Proxy { target }),
            Outcome::Rewrite { path, status } => (with_request_query(path, &req.url), status),
            Outcome::None => (
                req.url[Position::BeforePath..Position::AfterQuery].to_string(),
                None,
            ),
        };

        match self
            .splitter
            .select(&snapshot.deployments, req.sticky_key.as_deref())
        {
            Some(deployment) => {
                tracing::debug!(
                    env_id = %snapshot.env_id,
                    deployment = %deployment.id,
                    path = %path,
                    "Serving from deployment"
                );
                Ok(EdgeDecision::Serve {
                    env_id: snapshot.env_id.clone(),
                    deployment: deployment.clone(),
                    path,
                    status,
                })
            }
            None => Ok(EdgeDecision::NotFound(NotFoundReason::NoDeployment)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::rollout::{Deployment, PublishedInfo};
    use crate::rules::RedirectRule;
    use crate::store::{EnvironmentRecord, EnvironmentRef};

    struct FixedStore {
        record: EnvironmentRecord,
        fail_resolve: bool,
    }

    impl HostResolver for FixedStore {
        async fn resolve(&self, hostname: &str) -> Result<Option<EnvironmentRef>, StoreError> {
            if self.fail_resolve {
                return Err(StoreError::Unavailable("resolver down".into()));
            }
            Ok((hostname == "www.example.org").then(|| EnvironmentRef {
                app: "site".into(),
                env_id: self.record.env_id.clone(),
            }))
        }
    }

    impl SnapshotSource for FixedStore {
        async fn fetch(&self, env_id: &str) -> Result<Option<EnvironmentRecord>, StoreError> {
            Ok((env_id == self.record.env_id).then(|| self.record.clone()))
        }
    }

    fn store(redirects: Vec<RedirectRule>, published: &[(&str, u32)]) -> std::sync::Arc<FixedStore> {
        std::sync::Arc::new(FixedStore {
            record: EnvironmentRecord {
                env_id: "prod".into(),
                api_prefix: None,
                api_location: None,
                redirects,
                deployments: published
                    .iter()
                    .map(|(id, pct)| Deployment {
                        id: id.to_string(),
                        origin: None,
                        published: vec![PublishedInfo { env_id: "prod".into(), percentage: *pct }],
                    })
                    .collect(),
            },
            fail_resolve: false,
        })
    }

    fn request(address: &str) -> EdgeRequest {
        EdgeRequest::new(Url::parse(address).unwrap())
    }

    #[tokio::test]
    async fn test_no_rule_serves_default_deployment() {
        let s = store(vec![RedirectRule::new("/old", "/new", 301)], &[("d1", 100)]);
        let router = EdgeRouter::new(s.clone(), s, SharedSettings::default());

        let decision = router.route(&request("https://www.example.org/about?x=1")).await.unwrap();
        match decision {
            EdgeDecision::Serve { deployment, path, status, env_id } => {
                assert_eq!(deployment.id, "d1");
                assert_eq!(path, "/about?x=1");
                assert_eq!(status, None);
                assert_eq!(env_id, "prod");
            }
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_redirect_terminates() {
        let s = store(vec![RedirectRule::new("/old-docs", "/docs", 301)], &[("d1", 100)]);
        let router = EdgeRouter::new(s.clone(), s, SharedSettings::default());

        let decision = router.route(&request("https://www.example.org/old-docs")).await.unwrap();
        assert_eq!(
            decision,
            EdgeDecision::Redirect {
                location: "https://www.example.org/docs".into(),
                status: 301
            }
        );
    }

    #[tokio::test]
    async fn test_rewrite_continues_to_selection() {
        let s = store(vec![RedirectRule::new("/blog/:slug", "/posts/:slug", 200)], &[("d1", 100)]);
        let router = EdgeRouter::new(s.clone(), s, SharedSettings::default());

        let decision = router.route(&request("https://www.example.org/blog/hello")).await.unwrap();
        assert!(matches!(
            decision,
            EdgeDecision::Serve { ref path, .. } if path == "/posts/hello"
        ));
    }

    #[tokio::test]
    async fn test_rewrite_keeps_request_query() {
        let s = store(
            vec![
                RedirectRule::new("/blog/:slug", "/posts/:slug", 200),
                RedirectRule::new("/latest", "/posts/?sort=new", 200),
            ],
            &[("d1", 100)],
        );
        let router = EdgeRouter::new(s.clone(), s, SharedSettings::default());

        let decision = router.route(&request("https://www.example.org/blog/hello?page=2")).await.unwrap();
        assert!(matches!(
            decision,
            EdgeDecision::Serve { ref path, .. } if path == "/posts/hello?page=2"
        ));

        let decision = router.route(&request("https://www.example.org/latest?page=2")).await.unwrap();
        assert!(matches!(
            decision,
            EdgeDecision::Serve { ref path, .. } if path == "/posts/?sort=new"
        ));
    }

    #[tokio::test]
    async fn test_unknown_host_and_empty_rollout_are_not_found() {
        let s = store(Vec::new(), &[]);
        let router = EdgeRouter::new(s.clone(), s, SharedSettings::default());

        let unknown = router.route(&request("https://nobody.example.com/")).await.unwrap();
        assert_eq!(unknown, EdgeDecision::NotFound(NotFoundReason::UnknownHost));

        let empty = router.route(&request("https://www.example.org/")).await.unwrap();
        assert_eq!(empty, EdgeDecision::NotFound(NotFoundReason::NoDeployment));
    }

    #[tokio::test]
    async fn test_obfuscated_effective_hostname_resolves() {
        let s = store(Vec::new(), &[("d1", 100)]);
        let router = EdgeRouter::new(s.clone(), s, SharedSettings::default());

        let req = request("https://www.example.org/").with_hostname("WWW.example[.]org:443");
        assert!(matches!(router.route(&req).await.unwrap(), EdgeDecision::Serve { .. }));
    }

    #[tokio::test]
    async fn test_resolver_failure_is_error() {
        let s = std::sync::Arc::new(FixedStore {
            record: EnvironmentRecord::default(),
            fail_resolve: true,
        });
        let router = EdgeRouter::new(s.clone(), s, SharedSettings::default());
        let err = router.route(&request("https://www.example.org/")).await.unwrap_err();
        assert!(matches!(err, RouteError::Resolve { .. }));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_default_api_prefix_protects_api_paths() {
        let s = store(vec![RedirectRule::new("/*", "/index.html", 200)], &[("d1", 100)]);
        let router = EdgeRouter::new(s.clone(), s, SharedSettings::default());

        let spa = router.route(&request("https://www.example.org/app/page")).await.unwrap();
        assert!(matches!(spa, EdgeDecision::Serve { ref path, .. } if path == "/index.html"));

        let api = router.route(&request("https://www.example.org/api/users")).await.unwrap();
        assert!(matches!(api, EdgeDecision::Serve { ref path, .. } if path == "/api/users"));
    }
}
