//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, url, sticky key)
//!     → resolver.rs (normalize host) → HostResolver (environment)
//!     → cache.rs (compiled EnvironmentSnapshot, fetched on miss)
//!     → rules (first matching rule → Outcome)
//!     → rollout (serving deployment)
//!     → Return: EdgeDecision
//!
//! Snapshot Compilation (on cache miss):
//!     EnvironmentRecord
//!     → compile rules (invalid ones skipped and logged)
//!     → filter deployments published to the environment
//!     → Freeze as immutable Arc<EnvironmentSnapshot>
//! ```
//!
//! # Design Decisions
//! - Snapshots compiled once per configuration version, immutable at runtime
//! - Invalidation is pushed explicitly, never time-based
//! - Deterministic: same input and sticky key always give the same decision

pub mod cache;
pub mod resolver;
pub mod router;
pub mod snapshot;

pub use cache::SnapshotCache;
pub use router::{EdgeDecision, EdgeRequest, EdgeRouter, NotFoundReason};
pub use snapshot::EnvironmentSnapshot;
