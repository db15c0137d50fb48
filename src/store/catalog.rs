//! File-backed store built from the `sites` section of the configuration.
//!
//! # Responsibilities
//! - Index custom domains and preview subdomains to environments
//! - Serve environment records to the snapshot cache
//! - Swap in a whole new catalog on configuration reload
//!
//! # Design Decisions
//! - The catalog is immutable; reloads replace it through `ArcSwap`
//! - Duplicate domains are rejected by validation before a catalog is built

use std::collections::HashMap;

use arc_swap::ArcSwap;

use crate::config::EdgeConfig;
use crate::error::StoreError;
use crate::routing::resolver::{normalize_hostname, parse_preview_host};
use crate::store::{EnvironmentRecord, EnvironmentRef, HostResolver, SnapshotSource};

const PRODUCTION: &str = "production";

#[derive(Debug, Default)]
struct AppEntry {
    /// Environment name → environment id.
    environments: HashMap<String, String>,
    production: Option<String>,
}

/// Immutable index of apps, environments and domains.
#[derive(Debug, Default)]
pub struct Catalog {
    domains: HashMap<String, EnvironmentRef>,
    apps: HashMap<String, AppEntry>,
    environments: HashMap<String, EnvironmentRecord>,
    preview_domain: Option<String>,
}

impl Catalog {
    pub fn from_config(config: &EdgeConfig) -> Self {
        let mut catalog = Catalog {
            preview_domain: config
                .platform
                .preview_domain
                .as_deref()
                .and_then(normalize_hostname),
            ..Default::default()
        };

        for site in &config.sites {
            let app = catalog.apps.entry(site.name.clone()).or_default();
            for env in &site.environments {
                app.environments.insert(env.name.clone(), env.id.clone());
                if env.name == PRODUCTION || app.production.is_none() {
                    app.production = Some(env.id.clone());
                }

                for domain in &env.domains {
                    let Some(domain) = normalize_hostname(domain) else {
                        continue;
                    };
                    catalog.domains.insert(
                        domain,
                        EnvironmentRef {
                            app: site.name.clone(),
                            env_id: env.id.clone(),
                        },
                    );
                }

                catalog.environments.insert(
                    env.id.clone(),
                    EnvironmentRecord {
                        env_id: env.id.clone(),
                        api_prefix: env.api_prefix.clone(),
                        api_location: env.api_location.clone(),
                        redirects: env.redirects.clone(),
                        deployments: site.deployments.clone(),
                    },
                );
            }
        }

        tracing::debug!(
            apps = catalog.apps.len(),
            environments = catalog.environments.len(),
            domains = catalog.domains.len(),
            "Catalog built"
        );
        catalog
    }

    /// Resolve a normalized hostname: custom domains first, then previews.
    pub fn resolve(&self, hostname: &str) -> Option<EnvironmentRef> {
        if let Some(found) = self.domains.get(hostname) {
            return Some(found.clone());
        }

        let preview = parse_preview_host(hostname, self.preview_domain.as_deref()?)?;
        let app = self.apps.get(preview.app)?;
        let env_id = match preview.environment {
            Some(name) => app.environments.get(name)?,
            None => app.production.as_ref()?,
        };
        Some(EnvironmentRef {
            app: preview.app.to_string(),
            env_id: env_id.clone(),
        })
    }

    pub fn environment(&self, env_id: &str) -> Option<&EnvironmentRecord> {
        self.environments.get(env_id)
    }

    pub fn environment_count(&self) -> usize {
        self.environments.len()
    }
}

/// Store collaborator over an atomically replaceable `Catalog`.
#[derive(Debug, Default)]
pub struct CatalogStore {
    catalog: ArcSwap<Catalog>,
}

impl CatalogStore {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: ArcSwap::from_pointee(catalog),
        }
    }

    /// Replace the whole catalog. Callers invalidate cached snapshots after.
    pub fn replace(&self, catalog: Catalog) {
        self.catalog.store(std::sync::Arc::new(catalog));
    }

    /// Current catalog.
    pub fn current(&self) -> std::sync::Arc<Catalog> {
        self.catalog.load_full()
    }
}

impl HostResolver for CatalogStore {
    async fn resolve(&self, hostname: &str) -> Result<Option<EnvironmentRef>, StoreError> {
        Ok(self.catalog.load().resolve(hostname))
    }
}

impl SnapshotSource for CatalogStore {
    async fn fetch(&self, env_id: &str) -> Result<Option<EnvironmentRecord>, StoreError> {
        Ok(self.catalog.load().environment(env_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{EnvironmentConfig, SiteConfig};

    fn env(id: &str, name: &str, domains: &[&str]) -> EnvironmentConfig {
        EnvironmentConfig {
            id: id.into(),
            name: name.into(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
            api_prefix: None,
            api_location: None,
            redirects: Vec::new(),
        }
    }

    fn config() -> EdgeConfig {
        let mut config = EdgeConfig::default();
        config.platform.preview_domain = Some("EdgeApp.dev".into());
        config.sites.push(SiteConfig {
            name: "docs".into(),
            environments: vec![
                env("docs-staging", "staging", &["staging.example.org"]),
                env("docs-prod", "production", &["WWW.example.org", "example.org"]),
            ],
            deployments: Vec::new(),
        });
        config
    }

    #[test]
    fn test_resolve_custom_domains() {
        let catalog = Catalog::from_config(&config());
        assert_eq!(catalog.resolve("www.example.org").unwrap().env_id, "docs-prod");
        assert_eq!(catalog.resolve("staging.example.org").unwrap().env_id, "docs-staging");
        assert!(catalog.resolve("unknown.example.org").is_none());
    }

    #[test]
    fn test_resolve_preview_subdomains() {
        let catalog = Catalog::from_config(&config());
        let prod = catalog.resolve("docs.edgeapp.dev").unwrap();
        assert_eq!(prod.env_id, "docs-prod");
        assert_eq!(prod.app, "docs");
        assert_eq!(catalog.resolve("staging--docs.edgeapp.dev").unwrap().env_id, "docs-staging");
        assert!(catalog.resolve("qa--docs.edgeapp.dev").is_none());
        assert!(catalog.resolve("blog.edgeapp.dev").is_none());
    }

    #[tokio::test]
    async fn test_store_replace_swaps_catalog() {
        let store = CatalogStore::new(Catalog::from_config(&config()));
        assert!(store.resolve("www.example.org").await.unwrap().is_some());
        assert!(store.fetch("docs-prod").await.unwrap().is_some());

        store.replace(Catalog::default());
        assert!(store.resolve("www.example.org").await.unwrap().is_none());
        assert!(store.fetch("docs-prod").await.unwrap().is_none());
    }
}
