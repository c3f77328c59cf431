//! Call orchestrator.
//!
//! A call is one strictly sequential pass: the Transcriber turns the
//! uploaded audio into a transcript, the Responder answers it, and the
//! Synthesizer voices the answer. The first failing stage ends the call and
//! nothing produced before it is returned. Retries happen inside the
//! providers' HTTP clients, never here.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use callflow_providers::{HealthProbe, ProviderSet, Responder, Synthesizer, Transcriber};

use crate::error::{PipelineError, Result};
use crate::health::ProviderHealth;

/// Owns one provider per stage. Cheap to clone; clones share the providers.
#[derive(Clone)]
pub struct CallPipeline {
    stt: Arc<dyn Transcriber>,
    llm: Arc<dyn Responder>,
    tts: Arc<dyn Synthesizer>,
}

impl CallPipeline {
    pub fn new(
        stt: Arc<dyn Transcriber>,
        llm: Arc<dyn Responder>,
        tts: Arc<dyn Synthesizer>,
    ) -> Self {
        Self { stt, llm, tts }
    }

    pub fn from_providers(providers: ProviderSet) -> Self {
        Self::new(providers.stt, providers.llm, providers.tts)
    }

    /// Content type of the audio returned by [`CallPipeline::handle_call`].
    pub fn media_type(&self) -> &str {
        self.tts.media_type()
    }

    /// Run one call: transcribe, respond, synthesize.
    pub async fn handle_call(&self, audio: Bytes) -> Result<Bytes> {
        let call_id = Uuid::new_v4();
        let span = info_span!("call", %call_id, audio_bytes = audio.len());
        self.run(audio).instrument(span).await
    }

    /// Like [`CallPipeline::handle_call`], but gives up with
    /// [`PipelineError::Cancelled`] as soon as `cancel` fires. The in-flight
    /// provider request and any pending retry are dropped.
    pub async fn handle_call_cancellable(
        &self,
        audio: Bytes,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Call cancelled");
                Err(PipelineError::Cancelled)
            }
            result = self.handle_call(audio) => result,
        }
    }

    async fn run(&self, audio: Bytes) -> Result<Bytes> {
        let started = Instant::now();

        let transcript = self
            .stt
            .transcribe(audio)
            .await
            .map_err(PipelineError::Transcription)?;
        debug!(provider = self.stt.id(), chars = transcript.len(), "Transcribed");

        let reply = self
            .llm
            .generate_response(&transcript)
            .await
            .map_err(PipelineError::Response)?;
        debug!(provider = self.llm.id(), chars = reply.len(), "Reply generated");

        let speech = self
            .tts
            .synthesize(&reply)
            .await
            .map_err(PipelineError::Synthesis)?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            audio_out = speech.len(),
            "Call complete"
        );
        Ok(speech)
    }

    /// Probe all three providers concurrently. Every probe runs regardless
    /// of the others; a probe that panics counts as unhealthy.
    pub async fn health_check(&self) -> ProviderHealth {
        let (stt, llm, tts) = tokio::join!(
            probe("stt", self.stt.as_ref()),
            probe("llm", self.llm.as_ref()),
            probe("tts", self.tts.as_ref()),
        );
        ProviderHealth { stt, llm, tts }
    }
}

async fn probe<P: HealthProbe + ?Sized>(role: &'static str, provider: &P) -> bool {
    match AssertUnwindSafe(provider.health_check()).catch_unwind().await {
        Ok(healthy) => {
            debug!(role, provider = provider.id(), healthy, "Health probe finished");
            healthy
        }
        Err(_) => {
            warn!(role, provider = provider.id(), "Health probe panicked");
            false
        }
    }
}
