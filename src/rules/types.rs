//! Stored rule shape and match outcomes.

use serde::{Deserialize, Serialize};

/// A redirect/rewrite/proxy rule as stored in project configuration.
///
/// Wire shape: `{"from": "/old", "to": "/new", "status": 301}` with optional
/// `proxy` and `host` fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectRule {
    /// Source path pattern (`/blog/:slug`, `/assets/*`).
    pub from: String,

    /// Target template; may reference `:name` captures and the splat.
    #[serde(default)]
    pub to: String,

    /// HTTP status. 3xx redirects, 0/200 rewrites.
    #[serde(default)]
    pub status: u16,

    /// Forward to `to` instead of serving or redirecting.
    #[serde(default, skip_serializing_if = "is_false")]
    pub proxy: bool,

    /// Only apply the rule when the request hostname matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl RedirectRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>, status: u16) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            status,
            proxy: false,
            host: None,
        }
    }

    /// Builder-style proxy flag.
    pub fn proxied(mut self) -> Self {
        self.proxy = true;
        self
    }

    /// Builder-style host constraint.
    pub fn for_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn is_redirect_status(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

/// What a matched rule does to the request.
///
/// Produced once by the rule matcher; downstream code switches on it
/// instead of re-deriving intent from rule fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Send the client elsewhere with a 3xx.
    Redirect { location: String, status: u16 },
    /// Serve a different same-origin path, invisible to the client.
    Rewrite { path: String, status: Option<u16> },
    /// Forward transparently to another origin.
    Proxy { target: String },
    /// No rule fired.
    None,
}

impl Outcome {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Redirect { .. } => "redirect",
            Outcome::Rewrite { .. } => "rewrite",
            Outcome::Proxy { .. } => "proxy",
            Outcome::None => "none",
        }
    }

    pub fn is_match(&self) -> bool {
        !matches!(self, Outcome::None)
    }
}

/// The first rule that fired for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Compiled pattern of the rule that fired.
    pub pattern: String,
    /// Definition index of that rule.
    pub rule_index: usize,
    pub outcome: Outcome,
}
