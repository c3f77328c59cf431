//! OpenAI Chat Completions responder.
//!
//! Sends the transcript as the user turn behind a fixed system prompt to
//! `/chat/completions` and returns the first choice's message content.
//! Works against any OpenAI-compatible base URL.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{ProviderError, Result};
use crate::http::{HttpClient, RequestBody, RetryPolicy, read_json};
use crate::{HealthProbe, Responder};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant on a phone call.";

pub struct OpenAiResponder {
    http: HttpClient,
    model: String,
    system_prompt: String,
}

impl OpenAiResponder {
    pub fn new(api_key: &str, base_url: Option<&str>, policy: RetryPolicy) -> Result<Self> {
        let http = HttpClient::new(
            base_url.unwrap_or(OPENAI_BASE_URL),
            &[("Authorization", format!("Bearer {api_key}"))],
            policy,
        )?;
        Ok(Self {
            http,
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": self.system_prompt },
                { "role": "user", "content": prompt },
            ],
        })
    }
}

// --- OpenAI response types ---

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn first_choice_content(completion: ChatCompletion) -> Result<String> {
    completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::malformed("openai", "completion has no choices"))?
        .message
        .content
        .ok_or_else(|| ProviderError::malformed("openai", "first choice has no message content"))
}

#[async_trait]
impl HealthProbe for OpenAiResponder {
    fn id(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> bool {
        self.http.probe("/models").await
    }
}

#[async_trait]
impl Responder for OpenAiResponder {
    async fn generate_response(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "Requesting chat completion");

        let resp = self
            .http
            .post("/chat/completions", RequestBody::Json(self.request_body(prompt)))
            .await?;
        let completion: ChatCompletion = read_json("openai", resp).await?;
        first_choice_content(completion)
    }
}
