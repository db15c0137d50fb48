//! Edge Router Library
//!
//! Per-request routing for hosted sites: hostname resolution, redirect and
//! rewrite rules, and sticky percentage rollouts across deployments.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod playground;
pub mod rollout;
pub mod routing;
pub mod rules;
pub mod store;

pub use config::schema::EdgeConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{EdgeDecision, EdgeRequest, EdgeRouter};
