//! Deepgram provider.
//!
//! Deepgram serves both pre-recorded transcription (`/listen`) and speech
//! synthesis (`/speak`), so [`DeepgramProvider`] implements both
//! [`Transcriber`] and [`Synthesizer`].

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{ProviderError, Result};
use crate::http::{HttpClient, RequestBody, RetryPolicy, read_bytes, read_json};
use crate::{HealthProbe, Synthesizer, Transcriber};

const DEEPGRAM_BASE_URL: &str = "https://api.deepgram.com/v1";
const DEFAULT_SPEAK_MODEL: &str = "aura-asteria-en";

pub struct DeepgramProvider {
    http: HttpClient,
    listen_model: Option<String>,
    speak_model: String,
}

impl DeepgramProvider {
    pub fn new(api_key: &str, base_url: Option<&str>, policy: RetryPolicy) -> Result<Self> {
        let http = HttpClient::new(
            base_url.unwrap_or(DEEPGRAM_BASE_URL),
            &[("Authorization", format!("Token {api_key}"))],
            policy,
        )?;
        Ok(Self {
            http,
            listen_model: None,
            speak_model: DEFAULT_SPEAK_MODEL.to_string(),
        })
    }

    /// Transcription model (e.g. "nova-2"); Deepgram's default when unset.
    pub fn with_listen_model(mut self, model: impl Into<String>) -> Self {
        self.listen_model = Some(model.into());
        self
    }

    pub fn with_speak_model(mut self, model: impl Into<String>) -> Self {
        self.speak_model = model.into();
        self
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    pub fn speak_model(&self) -> &str {
        &self.speak_model
    }
}

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    transcript: String,
}

/// Take the first alternative of the first channel.
fn first_transcript(response: ListenResponse) -> Result<String> {
    response
        .results
        .channels
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::malformed("deepgram", "no channels in transcription result"))?
        .alternatives
        .into_iter()
        .next()
        .map(|alt| alt.transcript)
        .ok_or_else(|| {
            ProviderError::malformed("deepgram", "no alternatives in transcription result")
        })
}

#[async_trait]
impl HealthProbe for DeepgramProvider {
    fn id(&self) -> &str {
        "deepgram"
    }

    async fn health_check(&self) -> bool {
        self.http.probe("/projects").await
    }
}

#[async_trait]
impl Transcriber for DeepgramProvider {
    async fn transcribe(&self, audio: Bytes) -> Result<String> {
        let query: Vec<(&str, &str)> = self
            .listen_model
            .as_deref()
            .map(|model| ("model", model))
            .into_iter()
            .collect();

        debug!(audio_bytes = audio.len(), "Sending audio for transcription");

        let resp = self
            .http
            .post_with_query("/listen", &query, RequestBody::Bytes(audio))
            .await?;
        let body: ListenResponse = read_json("deepgram", resp).await?;
        first_transcript(body)
    }
}

#[async_trait]
impl Synthesizer for DeepgramProvider {
    async fn synthesize(&self, text: &str) -> Result<Bytes> {
        debug!(model = %self.speak_model, chars = text.len(), "Synthesizing speech");

        let resp = self
            .http
            .post_with_query(
                "/speak",
                &[("model", self.speak_model.as_str())],
                RequestBody::Json(json!({ "text": text })),
            )
            .await?;
        read_bytes(resp).await
    }

    fn media_type(&self) -> &str {
        "audio/mpeg"
    }
}
