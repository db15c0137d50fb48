//! Redirect, rewrite and proxy rules.
//!
//! # Data Flow
//! ```text
//! RedirectRule[] (stored configuration)
//!     → pattern.rs (compile `from` into an anchored matcher)
//!     → matcher.rs (RuleSet, frozen per configuration version)
//!
//! Per request:
//!     MatchArgs (url, hostname, API reservation, RuleSet)
//!     → matcher.rs (first matching rule, substitution, classification)
//!     → Return: MatchResult carrying an Outcome, or no match
//! ```

pub mod matcher;
pub mod pattern;
pub mod types;

pub use matcher::{match_request, CompiledRule, MatchArgs, RuleError, RuleSet};
pub use pattern::{CompiledPattern, PatternError};
pub use types::{MatchResult, Outcome, RedirectRule};
