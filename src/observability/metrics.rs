//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_requests_total` (counter): requests by backend, status
//! - `lb_request_duration_seconds` (histogram): latency by backend
//! - `lb_selections_total` (counter): picks by algorithm, backend

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;
use url::Url;

use crate::load_balancer::Algorithm;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_selection(algorithm: Algorithm, backend: &Url) {
    counter!(
        "lb_selections_total",
        "algorithm" => algorithm.as_str(),
        "backend" => backend.to_string()
    )
    .increment(1);
}

pub fn record_request(status: u16, backend: &Url, start: Instant) {
    counter!(
        "lb_requests_total",
        "backend" => backend.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("lb_request_duration_seconds", "backend" => backend.to_string())
        .record(start.elapsed().as_secs_f64());
}
