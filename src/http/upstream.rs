//! Upstream forwarding for proxy and serve decisions.
//!
//! # Responsibilities
//! - Retarget the inbound request at an absolute upstream URL
//! - Strip hop-by-hop headers, keep the client's host as X-Forwarded-Host
//! - Bound the exchange with the upstream timeout (502 on failure, 504 on timeout)

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Request, StatusCode, Uri, Version},
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::http::request::X_FORWARDED_HOST;
use crate::rules::matcher::rooted;

pub type HttpClient = Client<HttpConnector, Body>;

const HOP_BY_HOP: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn build_client() -> HttpClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

/// Forward `request` to `target`, returning the upstream response or a
/// gateway error.
pub async fn forward(
    client: &HttpClient,
    timeout: Duration,
    request: Request<Body>,
    target: &str,
) -> Response {
    let uri: Uri = match target.parse() {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(target = %target, error = %e, "Upstream target is not a valid URI");
            return (StatusCode::BAD_GATEWAY, "Invalid upstream target").into_response();
        }
    };

    let (mut parts, body) = request.into_parts();
    let client_host = parts.headers.remove(header::HOST);
    for name in HOP_BY_HOP {
        parts.headers.remove(name);
    }
    if let Some(host) = client_host {
        if !parts.headers.contains_key(X_FORWARDED_HOST) {
            parts
                .headers
                .insert(HeaderName::from_static(X_FORWARDED_HOST), host);
        }
    }
    parts.uri = uri;
    parts.version = Version::HTTP_11;

    let upstream = Request::from_parts(parts, body);
    match tokio::time::timeout(timeout, client.request(upstream)).await {
        Ok(Ok(response)) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Ok(Err(e)) => {
            tracing::error!(target = %target, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
        Err(_) => {
            tracing::error!(target = %target, timeout = ?timeout, "Upstream timed out");
            (StatusCode::GATEWAY_TIMEOUT, "Upstream timed out").into_response()
        }
    }
}

/// Absolute URL for `path` on a deployment origin.
pub fn origin_target(origin: &str, path: &str) -> String {
    format!("{}{}", origin.trim_end_matches('/'), rooted(path))
}

/// `Location` response for a redirect decision.
pub fn redirect(location: &str, status: u16) -> Response {
    let status = StatusCode::from_u16(status)
        .ok()
        .filter(StatusCode::is_redirection)
        .unwrap_or(StatusCode::FOUND);
    match HeaderValue::from_str(location) {
        Ok(value) => (status, [(header::LOCATION, value)]).into_response(),
        Err(_) => {
            tracing::error!(location = %location, "Redirect location is not a valid header value");
            (StatusCode::INTERNAL_SERVER_ERROR, "Invalid redirect location").into_response()
        }
    }
}
