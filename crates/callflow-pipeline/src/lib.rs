//! Call pipeline: speech-to-text, reply generation, text-to-speech.

pub mod error;
pub mod health;
pub mod pipeline;

pub use error::{PipelineError, Result};
pub use health::{HealthState, ProviderHealth};
pub use pipeline::CallPipeline;
