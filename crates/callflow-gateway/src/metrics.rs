//! Prometheus metrics recording and endpoint.

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus metrics recorder and return the handle for rendering.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")
}

/// Record a finished call. `failed_stage` is `None` on success.
pub fn record_call(failed_stage: Option<&str>, duration_secs: f64) {
    let outcome = if failed_stage.is_some() { "error" } else { "ok" };
    let labels = [("outcome", outcome.to_string())];
    metrics::counter!("calls_total", &labels).increment(1);
    metrics::histogram!("call_duration_seconds", &labels).record(duration_secs);

    if let Some(stage) = failed_stage {
        let labels = [("stage", stage.to_string())];
        metrics::counter!("call_stage_failures_total", &labels).increment(1);
    }
}

/// Record an aggregate health check result.
pub fn record_health(healthy: bool) {
    metrics::gauge!("providers_healthy").set(if healthy { 1.0 } else { 0.0 });
}
