//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fanin_connections_accepted_total` (counter)
//! - `fanin_active_connections` (gauge): live connection readers
//! - `fanin_accept_errors_total` (counter)
//! - `fanin_read_errors_total` (counter): by `kind` (transient, fatal)
//! - `fanin_messages_total` (counter): by `mode` (queued, inline)
//! - `fanin_received_bytes_total` (counter)
//! - `fanin_ack_errors_total` (counter)
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection_accepted() {
    counter!("fanin_connections_accepted_total").increment(1);
}

pub fn record_connection_opened() {
    gauge!("fanin_active_connections").increment(1.0);
}

pub fn record_connection_closed() {
    gauge!("fanin_active_connections").decrement(1.0);
}

pub fn record_accept_error() {
    counter!("fanin_accept_errors_total").increment(1);
}

pub fn record_read_error(kind: &'static str) {
    counter!("fanin_read_errors_total", "kind" => kind).increment(1);
}

pub fn record_message(mode: &'static str, bytes: usize) {
    counter!("fanin_messages_total", "mode" => mode).increment(1);
    counter!("fanin_received_bytes_total").increment(bytes as u64);
}

pub fn record_ack_error() {
    counter!("fanin_ack_errors_total").increment(1);
}
