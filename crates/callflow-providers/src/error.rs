use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {url} failed after {attempts} attempt(s): {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status} after {attempts} attempt(s): {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
        attempts: u32,
    },

    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed response from {provider}: {reason}")]
    MalformedResponse { provider: String, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("provider config error: {0}")]
    Config(String),
}

impl ProviderError {
    pub(crate) fn malformed(provider: &str, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    /// Number of attempts made before giving up, for errors raised by the
    /// retry loop.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Transport { attempts, .. } | Self::Status { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// Whether the retry loop treated this failure as transient.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Status { .. })
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
