//! Read contract for the configuration store.
//!
//! # Data Flow
//! ```text
//! hostname → HostResolver::resolve → EnvironmentRef (app, env id)
//! env id   → SnapshotSource::fetch → EnvironmentRecord (rules, deployments, API)
//! ```
//!
//! # Design Decisions
//! - Both collaborators are read-only; persistence and write-time validation
//!   live outside the routing core
//! - `catalog.rs` provides the file-backed implementation used by the binary

pub mod catalog;

use std::future::Future;
use std::sync::Arc;

use crate::error::StoreError;
use crate::rollout::Deployment;
use crate::rules::RedirectRule;

pub use catalog::{Catalog, CatalogStore};

/// The environment a hostname belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentRef {
    pub app: String,
    pub env_id: String,
}

/// Raw, uncompiled routing configuration of one environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentRecord {
    pub env_id: String,
    pub api_prefix: Option<String>,
    pub api_location: Option<String>,
    pub redirects: Vec<RedirectRule>,
    /// Every deployment of the app; filtering by publication happens later.
    pub deployments: Vec<Deployment>,
}

/// Maps a normalized hostname to its environment.
pub trait HostResolver: Send + Sync {
    fn resolve(
        &self,
        hostname: &str,
    ) -> impl Future<Output = Result<Option<EnvironmentRef>, StoreError>> + Send;
}

/// Supplies the routing configuration of an environment.
pub trait SnapshotSource: Send + Sync {
    fn fetch(
        &self,
        env_id: &str,
    ) -> impl Future<Output = Result<Option<EnvironmentRecord>, StoreError>> + Send;
}

impl<T: HostResolver> HostResolver for Arc<T> {
    fn resolve(
        &self,
        hostname: &str,
    ) -> impl Future<Output = Result<Option<EnvironmentRef>, StoreError>> + Send {
        (**self).resolve(hostname)
    }
}

impl<T: SnapshotSource> SnapshotSource for Arc<T> {
    fn fetch(
        &self,
        env_id: &str,
    ) -> impl Future<Output = Result<Option<EnvironmentRecord>, StoreError>> + Send {
        (**self).fetch(env_id)
    }
}
