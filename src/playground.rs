//! "Try your rules" evaluator.
//!
//! Runs the production matcher (`rules::match_request`) over rules and an
//! address supplied by the caller, reporting which rule fired. There is no
//! separate code path to drift from what the edge actually does.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::rules::{match_request, MatchArgs, MatchResult, Outcome, RedirectRule, RuleError, RuleSet};

/// Debug request: an address and the rules to try against it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaygroundRequest {
    pub address: String,
    #[serde(default)]
    pub redirects: Vec<RedirectRule>,
    /// Reserved API prefix to evaluate with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_prefix: Option<String>,
    /// API origin to evaluate with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_location: Option<String>,
}

/// Debug response.
///
/// `redirect` holds the redirect location, or the upstream target when
/// `proxy` is set. `status` is 0 when no status applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PlaygroundReport {
    pub against: String,
    pub pattern: String,
    #[serde(rename = "match")]
    pub matched: bool,
    pub redirect: String,
    pub rewrite: String,
    pub proxy: bool,
    pub status: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaygroundError {
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("invalid rule: {0}")]
    InvalidRule(#[from] RuleError),

    #[error("invalid API location '{0}'")]
    InvalidApiLocation(String),
}

/// Evaluate the request's rules against its address.
pub fn evaluate(request: &PlaygroundRequest) -> Result<PlaygroundReport, PlaygroundError> {
    let url = parse_address(&request.address)?;
    let rules = RuleSet::compile(&request.redirects)?;
    let api_location = request
        .api_location
        .as_deref()
        .map(|raw| Url::parse(raw).map_err(|_| PlaygroundError::InvalidApiLocation(raw.to_string())))
        .transpose()?;

    let hostname = url.host_str().unwrap_or_default().to_string();
    let result = match_request(&MatchArgs {
        url: &url,
        hostname: &hostname,
        api_prefix: request.api_prefix.as_deref(),
        api_location: api_location.as_ref(),
        rules: &rules,
    });

    tracing::debug!(
        address = %url,
        rules = rules.len(),
        matched = result.is_some(),
        "Playground evaluation"
    );
    Ok(report(&url, result))
}

/// Flatten a match into the debug wire shape.
pub fn report(against: &Url, result: Option<MatchResult>) -> PlaygroundReport {
    let mut report = PlaygroundReport {
        against: against.to_string(),
        ..Default::default()
    };
    let Some(result) = result else {
        return report;
    };

    report.pattern = result.pattern;
    report.matched = result.outcome.is_match();
    match result.outcome {
        Outcome::Redirect { location, status } => {
            report.redirect = location;
            report.status = status;
        }
        Outcome::Rewrite { path, status } => {
            report.rewrite = path;
            report.status = status.unwrap_or(200);
        }
        Outcome::Proxy { target } => {
            report.redirect = target;
            report.proxy = true;
        }
        Outcome::None => {}
    }
    report
}

/// Accept bare hosts ("example.org/path") as well as absolute URLs.
fn parse_address(address: &str) -> Result<Url, PlaygroundError> {
    let address = address.trim();
    let parsed = match Url::parse(address) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{address}")),
        Err(e) => Err(e),
    };
    match parsed {
        Ok(url) if url.host_str().is_some() => Ok(url),
        Ok(_) => Err(PlaygroundError::InvalidAddress {
            address: address.to_string(),
            reason: "address has no host".into(),
        }),
        Err(e) => Err(PlaygroundError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(address: &str, redirects: Vec<RedirectRule>) -> PlaygroundRequest {
        PlaygroundRequest {
            address: address.into(),
            redirects,
            api_prefix: None,
            api_location: None,
        }
    }

    #[test]
    fn test_redirect_report() {
        let report = evaluate(&request(
            "https://www.example.org/old-docs",
            vec![RedirectRule::new("/old-docs", "/docs", 301)],
        ))
        .unwrap();

        assert_eq!(
            report,
            PlaygroundReport {
                against: "https://www.example.org/old-docs".into(),
                pattern: "^/old-docs$".into(),
                matched: true,
                redirect: "https://www.example.org/docs".into(),
                rewrite: String::new(),
                proxy: false,
                status: 301,
            }
        );
    }

    #[test]
    fn test_rewrite_report() {
        let report = evaluate(&request(
            "https://www.example.org/blog/hello",
            vec![RedirectRule::new("/blog/:slug", "/posts/:slug", 200)],
        ))
        .unwrap();
        assert!(report.matched);
        assert_eq!(report.rewrite, "/posts/hello");
        assert_eq!(report.redirect, "");
        assert_eq!(report.status, 200);
    }

    #[test]
    fn test_proxy_report() {
        let report = evaluate(&request(
            "https://www.example.org/shop/cart",
            vec![RedirectRule::new("/shop/*", "https://shop.example.net/:splat", 200)],
        ))
        .unwrap();
        assert!(report.matched);
        assert!(report.proxy);
        assert_eq!(report.redirect, "https://shop.example.net/cart");
        assert_eq!(report.status, 0);
    }

    #[test]
    fn test_no_match_report() {
        let report = evaluate(&request(
            "www.example.org/elsewhere",
            vec![RedirectRule::new("/old-docs", "/docs", 301)],
        ))
        .unwrap();
        assert_eq!(report.against, "https://www.example.org/elsewhere");
        assert!(!report.matched);
        assert_eq!(report.pattern, "");
        assert_eq!(report.status, 0);
    }

    #[test]
    fn test_wire_shape() {
        let report = PlaygroundReport {
            against: "https://a.example/x".into(),
            matched: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["match"], true);
        for key in ["against", "pattern", "redirect", "rewrite", "proxy", "status"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_errors() {
        let bad_rule = evaluate(&request("https://a.example/", vec![RedirectRule::new("/a/*/b", "/c", 301)]));
        assert!(matches!(bad_rule, Err(PlaygroundError::InvalidRule(_))));

        let bad_address = evaluate(&request("http://", Vec::new()));
        assert!(matches!(bad_address, Err(PlaygroundError::InvalidAddress { .. })));
    }
}
