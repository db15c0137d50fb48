//! Hostname normalization and preview-domain parsing.
//!
//! # Responsibilities
//! - Turn whatever arrived in the Host header into a canonical hostname
//! - Undo obfuscated-domain notation (`example[.]org`) pasted from reports
//! - Split platform-issued preview subdomains into app and environment
//!
//! # Design Decisions
//! - Hostnames are compared lowercase, without port or trailing dot
//! - `<app>.<platform>` targets production, `<env>--<app>.<platform>` a named env

/// Obfuscation spellings of a dot, matched case-insensitively.
const DOT_SPELLINGS: [&str; 5] = ["[.]", "(.)", "{.}", "[dot]", "(dot)"];

/// Canonicalize a raw host value. Returns `None` for an empty host.
pub fn normalize_hostname(raw: &str) -> Option<String> {
    let mut host = raw.trim().to_ascii_lowercase();
    for spelling in DOT_SPELLINGS {
        if host.contains(spelling) {
            host = host.replace(spelling, ".");
        }
    }

    let host = strip_port(&host);
    let host = host.trim_end_matches('.');
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literal, with or without port.
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

/// A hostname under the platform's preview domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewHost<'a> {
    pub app: &'a str,
    /// Environment name, `None` for the app's production environment.
    pub environment: Option<&'a str>,
}

/// Split `<env>--<app>.<preview_domain>` or `<app>.<preview_domain>`.
pub fn parse_preview_host<'a>(host: &'a str, preview_domain: &str) -> Option<PreviewHost<'a>> {
    let preview_domain = preview_domain.trim_start_matches('.');
    let label = host.strip_suffix(preview_domain)?.strip_suffix('.')?;
    if label.is_empty() || label.contains('.') {
        return None;
    }
    match label.split_once("--") {
        Some((env, app)) if !env.is_empty() && !app.is_empty() => Some(PreviewHost {
            app,
            environment: Some(env),
        }),
        Some(_) => None,
        None => Some(PreviewHost {
            app: label,
            environment: None,
        }),
    }
}
