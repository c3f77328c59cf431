//! ElevenLabs text-to-speech.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::error::Result;
use crate::http::{HttpClient, RequestBody, RetryPolicy, read_bytes};
use crate::{HealthProbe, Synthesizer};

const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io/v1";
const DEFAULT_VOICE_ID: &str = "9BWtsMINqrJLrRacOk9x";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub stability: f64,
    pub similarity_boost: f64,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.75,
            similarity_boost: 0.75,
        }
    }
}

pub struct ElevenLabsSynthesizer {
    http: HttpClient,
    voice_id: String,
    voice_settings: VoiceSettings,
}

impl ElevenLabsSynthesizer {
    pub fn new(api_key: &str, base_url: Option<&str>, policy: RetryPolicy) -> Result<Self> {
        let http = HttpClient::new(
            base_url.unwrap_or(ELEVENLABS_BASE_URL),
            &[("xi-api-key", api_key.to_string())],
            policy,
        )?;
        Ok(Self {
            http,
            voice_id: DEFAULT_VOICE_ID.to_string(),
            voice_settings: VoiceSettings::default(),
        })
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    pub fn with_voice_settings(mut self, settings: VoiceSettings) -> Self {
        self.voice_settings = settings;
        self
    }

    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    pub fn voice_settings(&self) -> VoiceSettings {
        self.voice_settings
    }
}

#[async_trait]
impl HealthProbe for ElevenLabsSynthesizer {
    fn id(&self) -> &str {
        "elevenlabs"
    }

    async fn health_check(&self) -> bool {
        self.http.probe("/voices").await
    }
}

#[async_trait]
impl Synthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Bytes> {
        debug!(voice = %self.voice_id, chars = text.len(), "Synthesizing speech");

        let resp = self
            .http
            .post(
                &format!("/text-to-speech/{}", urlencoding::encode(&self.voice_id)),
                RequestBody::Json(json!({
                    "text": text,
                    "voice_settings": self.voice_settings,
                })),
            )
            .await?;
        read_bytes(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let tts = ElevenLabsSynthesizer::new("xi-key", None, RetryPolicy::default()).unwrap();
        assert_eq!(tts.id(), "elevenlabs");
        assert_eq!(tts.voice_id(), DEFAULT_VOICE_ID);
        assert_eq!(tts.voice_settings(), VoiceSettings::default());
        assert_eq!(tts.media_type(), "audio/mpeg");
    }

    #[test]
    fn test_voice_settings_serialization() {
        let value = serde_json::to_value(VoiceSettings {
            stability: 0.5,
            similarity_boost: 0.9,
        })
        .unwrap();
        assert_eq!(value["stability"], 0.5);
        assert_eq!(value["similarity_boost"], 0.9);
    }
}
