use callflow_providers::ProviderError;
use thiserror::Error;

/// Failure of one call, tagged with the stage that produced it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transcription failed: {0}")]
    Transcription(#[source] ProviderError),

    #[error("response generation failed: {0}")]
    Response(#[source] ProviderError),

    #[error("speech synthesis failed: {0}")]
    Synthesis(#[source] ProviderError),

    #[error("call cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Short stage label ("stt", "llm", "tts" or "cancelled").
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Transcription(_) => "stt",
            Self::Response(_) => "llm",
            Self::Synthesis(_) => "tts",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Transcription(e) | Self::Response(e) | Self::Synthesis(e) => Some(e),
            Self::Cancelled => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
