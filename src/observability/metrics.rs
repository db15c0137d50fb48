//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_requests_total` (counter): requests by method, status, decision
//! - `edge_request_duration_seconds` (histogram): latency distribution
//! - `edge_decisions_total` (counter): routing decisions by kind
//! - `edge_snapshot_cache_total` (counter): snapshot cache hits and misses
//! - `edge_rules_skipped_total` (counter): rules dropped while compiling snapshots
//! - `edge_rollout_selections_total` (counter): splitter path (fast, sticky, random)

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, decision: &'static str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("decision", decision.to_string()),
    ];
    counter!("edge_requests_total", &labels).increment(1);
    histogram!("edge_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_decision(kind: &'static str) {
    counter!("edge_decisions_total", "kind" => kind).increment(1);
}

pub fn record_cache(result: &'static str) {
    counter!("edge_snapshot_cache_total", "result" => result).increment(1);
}

pub fn record_rules_skipped(count: usize) {
    if count > 0 {
        counter!("edge_rules_skipped_total").increment(count as u64);
    }
}
