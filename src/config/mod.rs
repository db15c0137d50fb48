//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, rule compilation)
//!     → EdgeConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps catalog + SharedSettings, invalidates snapshots
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Runtime-tunable settings are an owned, injected `SharedSettings`,
//!   not process-global state

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

use std::sync::Arc;

use arc_swap::ArcSwap;

pub use schema::{
    AdminConfig, EdgeConfig, EnvironmentConfig, ListenerConfig, ObservabilityConfig,
    PlatformConfig, RolloutConfig, SiteConfig, TimeoutConfig,
};

/// Settings read on every request that may change on reload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EdgeSettings {
    pub rollout: RolloutConfig,
    /// API prefix for environments that don't declare their own.
    pub default_api_prefix: String,
}

impl From<&EdgeConfig> for EdgeSettings {
    fn from(config: &EdgeConfig) -> Self {
        Self {
            rollout: config.rollout.clone(),
            default_api_prefix: config.platform.default_api_prefix.clone(),
        }
    }
}

/// Atomically swappable handle to the current `EdgeSettings`.
///
/// Clones share the same underlying slot.
#[derive(Debug, Clone)]
pub struct SharedSettings {
    inner: Arc<ArcSwap<EdgeSettings>>,
}

impl SharedSettings {
    pub fn new(settings: EdgeSettings) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(settings)),
        }
    }

    /// Current settings. Readers keep the version they loaded.
    pub fn load(&self) -> Arc<EdgeSettings> {
        self.inner.load_full()
    }

    /// Replace the settings for all subsequent readers.
    pub fn update(&self, settings: EdgeSettings) {
        self.inner.store(Arc::new(settings));
    }
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self::new(EdgeSettings::from(&EdgeConfig::default()))
    }
}
