//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use edge_router::config::{EdgeConfig, EnvironmentConfig, SiteConfig};
use edge_router::rollout::{Deployment, PublishedInfo};
use edge_router::rules::RedirectRule;

/// Start a mock origin on an ephemeral port.
///
/// Every response body is `"<name> <request-target>"`, so tests can see
/// which origin served a request and for which path.
pub async fn start_mock_origin(name: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 8192];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let head = String::from_utf8_lossy(&buf[..n]);
                        let target = head
                            .lines()
                            .next()
                            .and_then(|line| line.split_whitespace().nth(1))
                            .unwrap_or("?")
                            .to_string();
                        let body = format!("{name} {target}");
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start an origin that accepts connections but answers only after `delay`.
pub async fn start_slow_origin(delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\nConnection: close\r\n\r\nslow")
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn environment(id: &str, name: &str, domains: &[&str], redirects: Vec<RedirectRule>) -> EnvironmentConfig {
    EnvironmentConfig {
        id: id.into(),
        name: name.into(),
        domains: domains.iter().map(|d| d.to_string()).collect(),
        api_prefix: None,
        api_location: None,
        redirects,
    }
}

pub fn deployment(id: &str, origin: Option<SocketAddr>, published: &[(&str, u32)]) -> Deployment {
    Deployment {
        id: id.into(),
        origin: origin.map(|addr| format!("http://{addr}")),
        published: published
            .iter()
            .map(|(env_id, percentage)| PublishedInfo {
                env_id: env_id.to_string(),
                percentage: *percentage,
            })
            .collect(),
    }
}

/// A single-site config with metrics disabled.
pub fn site_config(environments: Vec<EnvironmentConfig>, deployments: Vec<Deployment>) -> EdgeConfig {
    let mut config = EdgeConfig::default();
    config.observability.metrics_enabled = false;
    config.platform.preview_domain = Some("edge.test".into());
    config.sites.push(SiteConfig {
        name: "docs".into(),
        environments,
        deployments,
    });
    config
}
