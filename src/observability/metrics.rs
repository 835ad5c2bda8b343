//! Metrics collection and exposition.
//!
//! # Metrics
//! - `unbound_fetch_dispatch_total` (counter): calls by route (`local`/`remote`)
//! - `unbound_fetch_channels_opened_total` (counter): shard channels established
//! - `unbound_fetch_executor_requests_total` (counter): executor calls by outcome
//! - `unbound_fetch_executor_aborts_total` (counter): abort messages honoured
//! - `unbound_fetch_executor_in_flight` (gauge): calls currently executing
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels stay low-cardinality (no executor names, no ids)

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_dispatch(route: &'static str) {
    metrics::counter!("unbound_fetch_dispatch_total", "route" => route).increment(1);
}

pub fn record_channel_opened() {
    metrics::counter!("unbound_fetch_channels_opened_total").increment(1);
}

pub fn record_executor_request(outcome: &'static str) {
    metrics::counter!("unbound_fetch_executor_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_executor_abort() {
    metrics::counter!("unbound_fetch_executor_aborts_total").increment(1);
}

pub fn executor_request_started() {
    metrics::gauge!("unbound_fetch_executor_in_flight").increment(1.0);
}

pub fn executor_request_finished() {
    metrics::gauge!("unbound_fetch_executor_in_flight").decrement(1.0);
}
