//! Metrics collection and exposition.
//!
//! # Metrics
//! - `decoy_connections_total` (counter): accepted connections
//! - `decoy_accept_errors_total` (counter): failed accept calls
//! - `decoy_session_write_failures_total` (counter): replies that could not be sent
//! - `decoy_alerts_dispatched_total` (counter): handler batches fired
//! - `decoy_alerts_suppressed_total` (counter): reports swallowed by the cooldown
//! - `decoy_handler_failures_total` (counter, `handler` label): failed handler runs
//!
//! Recording is a no-op until an exporter is installed.

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Serve Prometheus metrics on `addr`. Must run inside the tokio runtime.
pub fn init_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_connection() {
    counter!("decoy_connections_total").increment(1);
}

pub fn record_accept_error() {
    counter!("decoy_accept_errors_total").increment(1);
}

pub fn record_write_failure() {
    counter!("decoy_session_write_failures_total").increment(1);
}

pub fn record_dispatch(dispatched: bool) {
    if dispatched {
        counter!("decoy_alerts_dispatched_total").increment(1);
    } else {
        counter!("decoy_alerts_suppressed_total").increment(1);
    }
}

pub fn record_handler_failure(handler: &str) {
    counter!("decoy_handler_failures_total", "handler" => handler.to_string()).increment(1);
}
