//! Metrics collection and exposition.
//!
//! # Metrics
//! - `live_config_writes_total` (counter): Reconciler pushes by outcome
//! - `live_config_broadcasts_total` (counter): broadcasts received/sent by kind
//! - `live_config_store_updates_total` (counter): updates accepted by the Store
//! - `live_config_subscribers` (gauge): open WebSocket subscriptions
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Outcome of one Reconciler write: `sent`, `failed`, `coalesced`, `parked`.
pub fn record_write(outcome: &'static str) {
    metrics::counter!("live_config_writes_total", "outcome" => outcome).increment(1);
}

/// A broadcast frame `sent` by the Store or `received` by a Reconciler.
pub fn record_broadcast(direction: &'static str, kind: &'static str) {
    metrics::counter!("live_config_broadcasts_total", "direction" => direction, "kind" => kind)
        .increment(1);
}

pub fn record_store_update() {
    metrics::counter!("live_config_store_updates_total").increment(1);
}

pub fn record_subscribers(count: usize) {
    metrics::gauge!("live_config_subscribers").set(count as f64);
}
