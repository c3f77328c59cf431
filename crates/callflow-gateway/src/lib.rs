//! HTTP gateway for the call pipeline.
//!
//! Accepts an audio upload on `POST /call`, runs it through the
//! [`CallPipeline`](callflow_pipeline::CallPipeline) and answers with the
//! synthesized reply. `GET /health` reports the aggregate provider health.

pub mod api;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod server;
pub mod state;

pub use server::{build_router, serve, start_gateway};
pub use state::GatewayState;
