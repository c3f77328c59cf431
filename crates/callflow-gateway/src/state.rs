//! Gateway shared state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use callflow_core::config::Config;
use callflow_pipeline::CallPipeline;

/// Shared state accessible from all request handlers.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub pipeline: CallPipeline,
    /// Cancelled when the server begins shutting down. In-flight calls
    /// observe it and stop.
    pub shutdown: CancellationToken,
    #[cfg(feature = "metrics")]
    pub metrics: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl GatewayState {
    pub fn new(config: Arc<Config>, pipeline: CallPipeline) -> Self {
        Self {
            config,
            pipeline,
            shutdown: CancellationToken::new(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, handle: metrics_exporter_prometheus::PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.config.max_upload_bytes()
    }
}
