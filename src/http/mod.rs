//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout)
//!     → request.rs (effective host/scheme, URL, sticky cookie)
//!     → routing::EdgeRouter (decision)
//!     → upstream.rs (redirect response, or forward to proxy target / deployment origin)
//!     → Send to client
//! ```

pub mod request;
pub mod server;
pub mod upstream;

pub use request::X_REQUEST_ID;
pub use server::{apply_config, AppState, CatalogRouter, HttpServer, X_EDGE_DEPLOYMENT};
