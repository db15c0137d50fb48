//! End-to-end edge traffic over real sockets.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use edge_router::config::EdgeConfig;
use edge_router::http::{HttpServer, X_EDGE_DEPLOYMENT};
use edge_router::lifecycle::Shutdown;
use edge_router::rules::RedirectRule;

mod common;

struct Running {
    addr: SocketAddr,
    shutdown: Shutdown,
    updates: mpsc::UnboundedSender<EdgeConfig>,
}

async fn start(config: EdgeConfig) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(config);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    Running {
        addr,
        shutdown,
        updates,
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

async fn docs_config() -> EdgeConfig {
    let origin = common::start_mock_origin("d1").await;
    common::site_config(
        vec![common::environment(
            "env-prod",
            "production",
            &["www.example.org"],
            vec![
                RedirectRule::new("/old-docs", "/docs", 301),
                RedirectRule::new("/blog/:slug", "/posts/:slug", 200),
                RedirectRule::new("/missing", "/404.html", 404),
            ],
        )],
        vec![common::deployment("d1", Some(origin), &[("env-prod", 100)])],
    )
}

#[tokio::test]
async fn test_redirects_keep_the_client_host() {
    let edge = start(docs_config().await).await;

    let res = client()
        .get(format!("http://{}/old-docs", edge.addr))
        .header("x-forwarded-host", "www.example.org")
        .header("x-forwarded-proto", "https")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 301);
    assert_eq!(res.headers()["location"], "https://www.example.org/docs");
    assert!(res.headers().contains_key("x-request-id"));

    edge.shutdown.trigger();
}

#[tokio::test]
async fn test_serves_rewritten_paths_from_deployment() {
    let edge = start(docs_config().await).await;
    let client = client();

    let res = client
        .get(format!("http://{}/blog/hello?ref=feed", edge.addr))
        .header("x-forwarded-host", "www.example.org")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()[X_EDGE_DEPLOYMENT], "d1");
    assert!(res.headers().contains_key("set-cookie"));
    assert_eq!(res.text().await.unwrap(), "d1 /posts/hello?ref=feed");

    let res = client
        .get(format!("http://{}/about?x=1", edge.addr))
        .header("x-forwarded-host", "www.example.org")
        .header("cookie", "edge_rollout=returning-visitor")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(!res.headers().contains_key("set-cookie"));
    assert_eq!(res.text().await.unwrap(), "d1 /about?x=1");

    let res = client
        .get(format!("http://{}/missing", edge.addr))
        .header("x-forwarded-host", "www.example.org")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "d1 /404.html");

    edge.shutdown.trigger();
}

#[tokio::test]
async fn test_unknown_host_is_not_found() {
    let edge = start(docs_config().await).await;

    let res = client()
        .get(format!("http://{}/", edge.addr))
        .header("x-forwarded-host", "unknown.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    edge.shutdown.trigger();
}

#[tokio::test]
async fn test_deployment_without_origin_is_bad_gateway() {
    let config = common::site_config(
        vec![common::environment("env-prod", "production", &["www.example.org"], Vec::new())],
        vec![common::deployment("d1", None, &[("env-prod", 100)])],
    );
    let edge = start(config).await;

    let res = client()
        .get(format!("http://{}/", edge.addr))
        .header("x-forwarded-host", "www.example.org")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 502);

    edge.shutdown.trigger();
}

#[tokio::test]
async fn test_config_update_applies_without_restart() {
    let config = docs_config().await;
    let edge = start(config.clone()).await;
    let client = client();

    let res = client
        .get(format!("http://{}/old-docs", edge.addr))
        .header("x-forwarded-host", "www.example.org")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 301);

    let mut updated = config;
    updated.sites[0].environments[0].redirects = vec![RedirectRule::new("/old-docs", "/manual", 302)];
    edge.updates.send(updated).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let res = client
        .get(format!("http://{}/old-docs", edge.addr))
        .header("x-forwarded-host", "www.example.org")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 302);
    assert_eq!(res.headers()["location"], "http://www.example.org/manual");

    edge.shutdown.trigger();
}
