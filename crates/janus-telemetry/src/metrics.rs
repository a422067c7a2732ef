//! Prometheus metrics.
//!
//! Metrics go through the `metrics` facade. [`init_metrics`] installs the
//! Prometheus recorder without its own listener; the rendered text is
//! served by the HTTP sub-server at `/metrics` via [`render_metrics`].
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `janus_mux_connections_total` | Counter | `listener` |
//! | `janus_mux_unmatched_total` | Counter | - |
//! | `janus_mux_accept_errors_total` | Counter | - |
//! | `janus_rpc_calls_total` | Counter | `method`, `code` |
//! | `janus_rpc_call_duration_seconds` | Histogram | `method` |
//! | `janus_rpc_panics_total` | Counter | `method` |
//! | `janus_client_retries_total` | Counter | `method` |
//!
//! Recording before [`init_metrics`] is a no-op.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Connections routed to a sub-listener.
pub const MUX_CONNECTIONS_TOTAL: &str = "janus_mux_connections_total";
/// Connections closed because no rule matched.
pub const MUX_UNMATCHED_TOTAL: &str = "janus_mux_unmatched_total";
/// Listener accept failures.
pub const MUX_ACCEPT_ERRORS_TOTAL: &str = "janus_mux_accept_errors_total";
/// Completed RPC calls.
pub const RPC_CALLS_TOTAL: &str = "janus_rpc_calls_total";
/// RPC call latency.
pub const RPC_CALL_DURATION_SECONDS: &str = "janus_rpc_call_duration_seconds";
/// Panics contained by the recovery stage.
pub const RPC_PANICS_TOTAL: &str = "janus_rpc_panics_total";
/// Client-side retry attempts.
pub const CLIENT_RETRIES_TOTAL: &str = "janus_client_retries_total";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether to install the recorder.
    pub enabled: bool,
    /// Histogram buckets for `*_duration_seconds` metrics.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Installs the global Prometheus recorder.
///
/// Calling it again after a successful install is a no-op.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled || METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();
    Ok(())
}

/// Renders the Prometheus exposition text, if the recorder is installed.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        MUX_CONNECTIONS_TOTAL,
        "Connections routed to a sub-listener by the multiplexer"
    );
    describe_counter!(
        MUX_UNMATCHED_TOTAL,
        "Connections closed because no matcher rule accepted them"
    );
    describe_counter!(MUX_ACCEPT_ERRORS_TOTAL, "Listener accept failures");
    describe_counter!(RPC_CALLS_TOTAL, "Completed RPC calls by method and code");
    describe_histogram!(RPC_CALL_DURATION_SECONDS, "RPC call duration in seconds");
    describe_counter!(RPC_PANICS_TOTAL, "Handler panics contained by the recovery stage");
    describe_counter!(CLIENT_RETRIES_TOTAL, "Client retry attempts by method");
}

/// Records a connection routed to `listener`.
pub fn record_mux_connection(listener: &'static str) {
    counter!(MUX_CONNECTIONS_TOTAL, "listener" => listener).increment(1);
}

/// Records a connection that matched no rule.
pub fn record_mux_unmatched() {
    counter!(MUX_UNMATCHED_TOTAL).increment(1);
}

/// Records a listener accept failure.
pub fn record_accept_error() {
    counter!(MUX_ACCEPT_ERRORS_TOTAL).increment(1);
}

/// Records a completed call.
pub fn record_rpc_call(method: &str, code: &str, duration: Duration) {
    counter!(
        RPC_CALLS_TOTAL,
        "method" => method.to_string(),
        "code" => code.to_string()
    )
    .increment(1);
    histogram!(RPC_CALL_DURATION_SECONDS, "method" => method.to_string())
        .record(duration.as_secs_f64());
}

/// Records a contained panic.
pub fn record_panic(method: &str) {
    counter!(RPC_PANICS_TOTAL, "method" => method.to_string()).increment(1);
}

/// Records a client retry.
pub fn record_client_retry(method: &str) {
    counter!(CLIENT_RETRIES_TOTAL, "method" => method.to_string()).increment(1);
}
