//! Provider abstraction for the call pipeline.
//!
//! Each stage of a call is a capability trait: [`Transcriber`] (audio to
//! text), [`Responder`] (text to text) and [`Synthesizer`] (text to audio).
//! All three extend [`HealthProbe`]. A concrete provider implements every
//! capability its backend offers, so one value can serve several stages
//! (see [`deepgram::DeepgramProvider`]).

use async_trait::async_trait;
use bytes::Bytes;

pub mod deepgram;
pub mod elevenlabs;
pub mod error;
pub mod factory;
pub mod http;
pub mod openai;

pub use error::{ProviderError, Result};
pub use factory::ProviderSet;
pub use http::{HttpClient, RequestBody, RetryPolicy};

/// Liveness probe shared by every capability.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Provider identifier (e.g., "deepgram", "openai").
    fn id(&self) -> &str;

    /// Returns `true` when the backend answers its probe endpoint with 200.
    /// Never fails: any error is reported as `false`.
    async fn health_check(&self) -> bool;
}

/// Speech-to-text.
#[async_trait]
pub trait Transcriber: HealthProbe {
    async fn transcribe(&self, audio: Bytes) -> Result<String>;
}

/// Conversational reply generation.
#[async_trait]
pub trait Responder: HealthProbe {
    async fn generate_response(&self, prompt: &str) -> Result<String>;
}

/// Text-to-speech.
#[async_trait]
pub trait Synthesizer: HealthProbe {
    async fn synthesize(&self, text: &str) -> Result<Bytes>;

    /// Content type of the audio returned by [`Synthesizer::synthesize`].
    fn media_type(&self) -> &str {
        "audio/mpeg"
    }
}
