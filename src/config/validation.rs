//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Compile every rule so bad patterns are rejected at write time
//! - Check referential integrity (domains, environment ids, publications)
//! - Validate value ranges (statuses, percentages, URLs)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EdgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use url::Url;

use crate::config::schema::EdgeConfig;
use crate::routing::resolver::normalize_hostname;
use crate::rules::{pattern, RedirectRule};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("environment '{env}' rule #{index}: {reason}")]
    InvalidRule {
        env: String,
        index: usize,
        reason: String,
    },

    #[error("environment id '{0}' is declared more than once")]
    DuplicateEnvironment(String),

    #[error("domain '{domain}' is bound to both '{first}' and '{second}'")]
    DuplicateDomain {
        domain: String,
        first: String,
        second: String,
    },

    #[error("environment '{env}': {reason}")]
    InvalidEnvironment { env: String, reason: String },

    #[error("deployment '{deployment}': {reason}")]
    InvalidDeployment { deployment: String, reason: String },

    #[error("environment '{env}' publishes {total}% of traffic (max 100)")]
    OverPublished { env: String, total: u32 },

    #[error("{field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &EdgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidSetting {
            field: "listener.bind_address",
            reason: format!("'{}' is not a socket address", config.listener.bind_address),
        });
    }
    if config.timeouts.request_secs == 0 || config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::InvalidSetting {
            field: "timeouts",
            reason: "timeouts must be greater than zero".into(),
        });
    }
    if config.rollout.sticky_cookie.is_empty()
        || !config.rollout.sticky_cookie.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        errors.push(ValidationError::InvalidSetting {
            field: "rollout.sticky_cookie",
            reason: format!("'{}' is not a valid cookie name", config.rollout.sticky_cookie),
        });
    }
    if let Some(reason) = api_prefix_problem(&config.platform.default_api_prefix) {
        errors.push(ValidationError::InvalidSetting {
            field: "platform.default_api_prefix",
            reason,
        });
    }

    let mut env_ids = HashSet::new();
    let mut domains: HashMap<String, String> = HashMap::new();

    for site in &config.sites {
        for env in &site.environments {
            if !env_ids.insert(env.id.clone()) {
                errors.push(ValidationError::DuplicateEnvironment(env.id.clone()));
            }

            for raw in &env.domains {
                let Some(domain) = normalize_hostname(raw) else {
                    errors.push(ValidationError::InvalidEnvironment {
                        env: env.id.clone(),
                        reason: format!("domain '{raw}' is empty"),
                    });
                    continue;
                };
                if let Some(first) = domains.insert(domain.clone(), env.id.clone()) {
                    errors.push(ValidationError::DuplicateDomain {
                        domain,
                        first,
                        second: env.id.clone(),
                    });
                }
            }

            if let Some(reason) = env.api_prefix.as_deref().and_then(api_prefix_problem) {
                errors.push(ValidationError::InvalidEnvironment {
                    env: env.id.clone(),
                    reason,
                });
            }
            if let Some(location) = &env.api_location {
                if !is_http_url(location) {
                    errors.push(ValidationError::InvalidEnvironment {
                        env: env.id.clone(),
                        reason: format!("api_location '{location}' is not an http(s) URL"),
                    });
                }
            }

            for (index, rule) in env.redirects.iter().enumerate() {
                if let Err(reason) = validate_rule(rule) {
                    errors.push(ValidationError::InvalidRule {
                        env: env.id.clone(),
                        index,
                        reason,
                    });
                }
            }
        }

        let mut totals: HashMap<&str, u32> = HashMap::new();
        for deployment in &site.deployments {
            if let Some(origin) = &deployment.origin {
                if !is_http_url(origin) {
                    errors.push(ValidationError::InvalidDeployment {
                        deployment: deployment.id.clone(),
                        reason: format!("origin '{origin}' is not an http(s) URL"),
                    });
                }
            }
            for published in &deployment.published {
                if published.percentage > 100 {
                    errors.push(ValidationError::InvalidDeployment {
                        deployment: deployment.id.clone(),
                        reason: format!("percentage {} exceeds 100", published.percentage),
                    });
                }
                if !site.environments.iter().any(|e| e.id == published.env_id) {
                    errors.push(ValidationError::InvalidDeployment {
                        deployment: deployment.id.clone(),
                        reason: format!("published to unknown environment '{}'", published.env_id),
                    });
                }
                *totals.entry(published.env_id.as_str()).or_default() += published.percentage;
            }
        }
        let mut over: Vec<_> = totals.into_iter().filter(|(_, total)| *total > 100).collect();
        over.sort();
        for (env, total) in over {
            errors.push(ValidationError::OverPublished {
                env: env.to_string(),
                total,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Write-time checks for a single rule.
pub fn validate_rule(rule: &RedirectRule) -> Result<(), String> {
    pattern::compile(&rule.from).map_err(|e| e.to_string())?;

    if rule.to.trim().is_empty() && !rule.proxy {
        return Err("'to' is empty and the rule is not a proxy".into());
    }
    if rule.status != 0 && !(200..600).contains(&rule.status) {
        return Err(format!("status {} is not a valid HTTP status", rule.status));
    }
    if let Ok(target) = Url::parse(&rule.to) {
        let web = matches!(target.scheme(), "http" | "https");
        if !web && !rule.is_redirect_status() {
            return Err(format!(
                "'{}' can only be used with a redirect status",
                target.scheme()
            ));
        }
    }
    if rule.proxy && rule.is_redirect_status() {
        return Err("a proxy rule cannot use a redirect status".into());
    }
    Ok(())
}

fn api_prefix_problem(prefix: &str) -> Option<String> {
    if !prefix.starts_with('/') {
        return Some(format!("api prefix '{prefix}' must start with '/'"));
    }
    if prefix.trim_end_matches('/').is_empty() {
        return Some("api prefix cannot reserve the whole site".into());
    }
    None
}

fn is_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}
