//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build catalog + router → Start listeners
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → Shutdown::trigger → listeners stop accepting → drain → exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then routing core, then listeners
//! - Every long-running task subscribes to the same shutdown signal

pub mod shutdown;

pub use shutdown::Shutdown;
