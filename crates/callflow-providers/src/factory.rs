//! Build the three stage providers from configuration.

use std::sync::Arc;

use tracing::info;

use callflow_core::config::{self, Config, LlmConfig, SttConfig, TtsConfig};

use crate::deepgram::DeepgramProvider;
use crate::elevenlabs::{ElevenLabsSynthesizer, VoiceSettings};
use crate::error::{ProviderError, Result};
use crate::http::RetryPolicy;
use crate::openai::OpenAiResponder;
use crate::{Responder, Synthesizer, Transcriber};

/// One provider per pipeline stage, constructed once at startup.
#[derive(Clone)]
pub struct ProviderSet {
    pub stt: Arc<dyn Transcriber>,
    pub llm: Arc<dyn Responder>,
    pub tts: Arc<dyn Synthesizer>,
}

impl ProviderSet {
    /// Build every stage from `config`.
    ///
    /// When STT and TTS both use Deepgram with the same key and base URL a
    /// single [`DeepgramProvider`] serves both stages.
    pub fn from_config(config: &Config) -> Result<Self> {
        let policy = RetryPolicy::from(&config.http());
        let stt_config = config.stt();
        let llm_config = config.llm();
        let tts_config = config.tts();

        let llm = build_responder(&llm_config, policy)?;

        let stt: Arc<dyn Transcriber>;
        let tts: Arc<dyn Synthesizer>;
        if shares_deepgram(&stt_config, &tts_config) {
            let mut deepgram = deepgram_for_stt(&stt_config, policy)?;
            if let Some(model) = &tts_config.model {
                deepgram = deepgram.with_speak_model(model.clone());
            }
            let deepgram = Arc::new(deepgram);
            info!("Deepgram serves both transcription and synthesis");
            stt = deepgram.clone();
            tts = deepgram;
        } else {
            stt = build_transcriber(&stt_config, policy)?;
            tts = build_synthesizer(&tts_config, policy)?;
        }

        info!(
            stt = stt.id(),
            llm = llm.id(),
            tts = tts.id(),
            max_attempts = policy.max_attempts,
            "Providers configured"
        );

        Ok(Self { stt, llm, tts })
    }
}

fn shares_deepgram(stt: &SttConfig, tts: &TtsConfig) -> bool {
    stt.provider == config::DEEPGRAM
        && tts.provider == config::DEEPGRAM
        && stt.base_url == tts.base_url
        && stt.resolve_api_key().is_some()
        && stt.resolve_api_key() == tts.resolve_api_key()
}

fn require_key(stage: &str, provider: &str, key: Option<String>) -> Result<String> {
    key.ok_or_else(|| {
        ProviderError::Config(format!(
            "No API key for {stage} provider '{provider}'. Set {stage}.api_key or the provider's API key environment variable."
        ))
    })
}

fn unknown(stage: &str, provider: &str) -> ProviderError {
    ProviderError::Config(format!("Unknown {stage} provider '{provider}'"))
}

fn deepgram_for_stt(stt: &SttConfig, policy: RetryPolicy) -> Result<DeepgramProvider> {
    let key = require_key("stt", &stt.provider, stt.resolve_api_key())?;
    let mut provider = DeepgramProvider::new(&key, stt.base_url.as_deref(), policy)?;
    if let Some(model) = &stt.model {
        provider = provider.with_listen_model(model.clone());
    }
    Ok(provider)
}

pub fn build_transcriber(stt: &SttConfig, policy: RetryPolicy) -> Result<Arc<dyn Transcriber>> {
    match stt.provider.as_str() {
        config::DEEPGRAM => Ok(Arc::new(deepgram_for_stt(stt, policy)?)),
        other => Err(unknown("stt", other)),
    }
}

pub fn build_responder(llm: &LlmConfig, policy: RetryPolicy) -> Result<Arc<dyn Responder>> {
    match llm.provider.as_str() {
        config::OPENAI => {
            let key = require_key("llm", &llm.provider, llm.resolve_api_key())?;
            let mut responder = OpenAiResponder::new(&key, llm.base_url.as_deref(), policy)?;
            if let Some(model) = &llm.model {
                responder = responder.with_model(model.clone());
            }
            if let Some(prompt) = &llm.system_prompt {
                responder = responder.with_system_prompt(prompt.clone());
            }
            Ok(Arc::new(responder))
        }
        other => Err(unknown("llm", other)),
    }
}

pub fn build_synthesizer(tts: &TtsConfig, policy: RetryPolicy) -> Result<Arc<dyn Synthesizer>> {
    match tts.provider.as_str() {
        config::ELEVENLABS => {
            let key = require_key("tts", &tts.provider, tts.resolve_api_key())?;
            let mut synth = ElevenLabsSynthesizer::new(&key, tts.base_url.as_deref(), policy)?;
            if let Some(voice) = &tts.voice_id {
                synth = synth.with_voice(voice.clone());
            }
            let defaults = VoiceSettings::default();
            synth = synth.with_voice_settings(VoiceSettings {
                stability: tts.stability.unwrap_or(defaults.stability),
                similarity_boost: tts.similarity_boost.unwrap_or(defaults.similarity_boost),
            });
            Ok(Arc::new(synth))
        }
        config::DEEPGRAM => {
            let key = require_key("tts", &tts.provider, tts.resolve_api_key())?;
            let mut provider = DeepgramProvider::new(&key, tts.base_url.as_deref(), policy)?;
            if let Some(model) = &tts.model {
                provider = provider.with_speak_model(model.clone());
            }
            Ok(Arc::new(provider))
        }
        other => Err(unknown("tts", other)),
    }
}
