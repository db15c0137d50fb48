//! Request inspection.
//!
//! # Responsibilities
//! - Determine the effective host and scheme (honouring X-Forwarded-*)
//! - Rebuild the absolute request URL the rule matcher works on
//! - Read the visitor's sticky rollout key from cookies
//!
//! # Design Decisions
//! - The first X-Forwarded-* value wins (closest to the client)
//! - The URL keeps the port so same-origin redirects stay on it

use axum::http::{header, HeaderMap, Uri};
use url::Url;

use crate::routing::resolver::normalize_hostname;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

fn first_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Host the client addressed, before normalization.
pub fn effective_host(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    first_value(headers, X_FORWARDED_HOST)
        .or_else(|| first_value(headers, header::HOST.as_str()))
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .map(str::to_string)
}

/// Scheme the client used.
pub fn effective_scheme(headers: &HeaderMap, uri: &Uri) -> &'static str {
    let proto = first_value(headers, X_FORWARDED_PROTO).or_else(|| uri.scheme_str());
    match proto {
        Some(p) if p.eq_ignore_ascii_case("https") => "https",
        _ => "http",
    }
}

/// Absolute URL for the request.
///
/// Falls back to the normalized hostname when the raw one doesn't parse
/// (obfuscated notation, stray whitespace).
pub fn request_url(scheme: &str, host: &str, uri: &Uri) -> Result<Url, url::ParseError> {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    match Url::parse(&format!("{scheme}://{host}{path_and_query}")) {
        Ok(url) => Ok(url),
        Err(e) => match normalize_hostname(host) {
            Some(normalized) => Url::parse(&format!("{scheme}://{normalized}{path_and_query}")),
            None => Err(e),
        },
    }
}

/// Value of the named cookie, across all Cookie headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}
