//! Error types shared across the routing core.

use thiserror::Error;

/// Failure of an external collaborator (resolver or snapshot store).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that abort routing for a request.
///
/// Unknown hosts and empty rollouts are decisions, not errors; only
/// upstream failures end up here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("resolving host '{host}' failed: {source}")]
    Resolve {
        host: String,
        #[source]
        source: StoreError,
    },

    #[error("loading snapshot for environment '{env_id}' failed: {source}")]
    Snapshot {
        env_id: String,
        #[source]
        source: StoreError,
    },
}

impl RouteError {
    /// HTTP status the edge answers with.
    pub fn status_code(&self) -> u16 {
        500
    }
}
