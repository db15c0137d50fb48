//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the edge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::rollout::Deployment;
use crate::rules::RedirectRule;

/// Root configuration for the edge router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EdgeConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin surface (playground, cache invalidation).
    pub admin: AdminConfig,

    /// Canary rollout behaviour.
    pub rollout: RolloutConfig,

    /// Platform-wide hostnames and defaults.
    pub platform: PlatformConfig,

    /// Hosted sites and their environments.
    pub sites: Vec<SiteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Time allowed for an upstream (proxy or deployment origin) response.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upstream_secs: 20,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin listener.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Canary rollout configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RolloutConfig {
    /// Cookie carrying the visitor's sticky key.
    pub sticky_cookie: String,

    /// Mint a sticky key for visitors that don't have one yet.
    pub issue_cookie: bool,

    /// Lifetime of an issued sticky cookie in seconds.
    pub cookie_max_age_secs: u64,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            sticky_cookie: "edge_rollout".to_string(),
            issue_cookie: true,
            cookie_max_age_secs: 60 * 60 * 24 * 30,
        }
    }
}

/// Platform-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Domain under which preview subdomains are issued (e.g., "edgeapp.dev").
    pub preview_domain: Option<String>,

    /// API prefix for environments that don't declare one.
    pub default_api_prefix: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            preview_domain: None,
            default_api_prefix: "/api".to_string(),
        }
    }
}

/// A hosted app.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    /// App slug, also used for preview subdomains.
    pub name: String,

    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,

    /// Built deployments and where they are published.
    #[serde(default)]
    pub deployments: Vec<Deployment>,
}

/// A deployment target of an app.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnvironmentConfig {
    /// Globally unique environment identifier.
    pub id: String,

    /// Name within the app (e.g., "production", "staging").
    pub name: String,

    /// Custom domains bound to this environment.
    #[serde(default)]
    pub domains: Vec<String>,

    /// Path prefix reserved for backend functions.
    #[serde(default)]
    pub api_prefix: Option<String>,

    /// Origin serving backend functions.
    #[serde(default)]
    pub api_location: Option<String>,

    /// Ordered redirect/rewrite/proxy rules.
    #[serde(default)]
    pub redirects: Vec<RedirectRule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: EdgeConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.rollout.sticky_cookie, "edge_rollout");
        assert_eq!(config.platform.default_api_prefix, "/api");
        assert!(config.sites.is_empty());
    }

    #[test]
    fn test_site_config_parses() {
        let config: EdgeConfig = toml::from_str(
            r#"
            [platform]
            preview_domain = "edgeapp.dev"

            [[sites]]
            name = "docs"

            [[sites.environments]]
            id = "docs-prod"
            name = "production"
            domains = ["www.example.org"]
            api_location = "http://127.0.0.1:7000"
            redirects = [
                { from = "/old-docs", to = "/docs", status = 301 },
                { from = "/shop/*", to = "https://shop.example.net/:splat", proxy = true },
            ]

            [[sites.deployments]]
            id = "dep-1"
            origin = "http://127.0.0.1:9001"
            published = [{ envId = "docs-prod", percentage = 100 }]
            "#,
        )
        .unwrap();

        let site = &config.sites[0];
        assert_eq!(site.environments[0].redirects.len(), 2);
        assert!(site.environments[0].redirects[1].proxy);
        assert_eq!(site.environments[0].redirects[1].status, 0);
        assert_eq!(site.deployments[0].published[0].env_id, "docs-prod");
        assert_eq!(config.platform.preview_domain.as_deref(), Some("edgeapp.dev"));
    }
}
