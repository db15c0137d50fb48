//! Deployment rollout subsystem.
//!
//! # Data Flow
//! ```text
//! Deployment[] (each with published: [{envId, percentage}])
//!     → active_for(env) (deployments published to the environment, stored order)
//!     → splitter.rs (sticky or random point → cumulative ranges)
//!     → Return: serving deployment, or none (dark remainder)
//! ```
//!
//! # Design Decisions
//! - A percentage sum below 100 is an intentional partial rollout
//! - Selection is pure; the active list is part of the immutable snapshot

pub mod splitter;

use serde::{Deserialize, Serialize};

pub use splitter::{sticky_point, RandomSource, ThreadRandom, TrafficSplitter};

/// Publication of a deployment to one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedInfo {
    pub env_id: String,
    /// Share of the environment's traffic, 0..=100.
    pub percentage: u32,
}

/// A built deployment as supplied by the deployment store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,

    /// Origin serving the deployment's built artifact.
    #[serde(default)]
    pub origin: Option<String>,

    #[serde(default)]
    pub published: Vec<PublishedInfo>,
}

/// A deployment as seen by one environment's splitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDeployment {
    pub id: String,
    pub percentage: u32,
    pub origin: Option<String>,
}

impl ActiveDeployment {
    pub fn new(id: impl Into<String>, percentage: u32) -> Self {
        Self {
            id: id.into(),
            percentage,
            origin: None,
        }
    }
}

/// Deployments published to `env_id`, in stored order.
pub fn active_for(env_id: &str, deployments: &[Deployment]) -> Vec<ActiveDeployment> {
    deployments
        .iter()
        .filter_map(|d| {
            d.published
                .iter()
                .find(|p| p.env_id == env_id)
                .map(|p| ActiveDeployment {
                    id: d.id.clone(),
                    percentage: p.percentage,
                    origin: d.origin.clone(),
                })
        })
        .collect()
}

/// Sum of percentages across an environment's active deployments.
pub fn published_total(active: &[ActiveDeployment]) -> u32 {
    active.iter().map(|d| d.percentage).sum()
}
