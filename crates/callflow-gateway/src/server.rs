//! Axum-based HTTP server.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api;
use crate::state::GatewayState;

/// Build the gateway router over `state`.
pub fn build_router(state: Arc<GatewayState>) -> Router {
    let limit = state.max_upload_bytes();

    let app = Router::new()
        .route("/call", post(api::call_handler))
        .route("/health", get(api::health_handler));

    #[cfg(feature = "metrics")]
    let app = app.route("/metrics", get(api::metrics_handler));

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(limit)),
    )
    .with_state(state)
}

/// Start the gateway on the configured bind address and `port`, running
/// until Ctrl-C.
pub async fn start_gateway(state: Arc<GatewayState>, port: u16) -> anyhow::Result<()> {
    let addr = format!("{}:{port}", state.config.bind_addr());
    let listener = TcpListener::bind(&addr).await?;
    serve(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// When `shutdown` resolves the state's cancellation token fires, so
/// in-flight calls end with an error response instead of holding the
/// server open.
pub async fn serve<F>(listener: TcpListener, state: Arc<GatewayState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Gateway listening on {}", listener.local_addr()?);

    let token = state.shutdown.clone();
    let app = build_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            token.cancel();
        })
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl-C handler: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
