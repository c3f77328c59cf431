//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEEPGRAM: &str = "deepgram";
pub const OPENAI: &str = "openai";
pub const ELEVENLABS: &str = "elevenlabs";

const STT_PROVIDERS: &[&str] = &[DEEPGRAM];
const LLM_PROVIDERS: &[&str] = &[OPENAI];
const TTS_PROVIDERS: &[&str] = &[ELEVENLABS, DEEPGRAM];

/// Top-level Callflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stt: Option<SttConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts: Option<TtsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    /// Largest accepted upload in bytes (default: 25 MiB).
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_port() -> u16 {
    8000
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

/// Outbound HTTP retry policy shared by every provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Total attempts per request, including the first (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds (default: 2000).
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-attempt timeout in seconds (default: 30).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl HttpConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Speech-to-text stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    /// Provider: "deepgram" (default).
    #[serde(default = "default_stt_provider")]
    pub provider: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            provider: default_stt_provider(),
            api_key: None,
            api_key_env: None,
            base_url: None,
            model: None,
        }
    }
}

fn default_stt_provider() -> String {
    DEEPGRAM.into()
}

impl SttConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(
            &self.api_key,
            &Some(default_key_env(&self.api_key_env, &self.provider)),
        )
    }
}

/// Language-model stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider: "openai" (default).
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Chat model (e.g. "gpt-4o-mini").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// System message sent ahead of every transcript.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: None,
            api_key_env: None,
            base_url: None,
            model: None,
            system_prompt: None,
        }
    }
}

fn default_llm_provider() -> String {
    OPENAI.into()
}

impl LlmConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(
            &self.api_key,
            &Some(default_key_env(&self.api_key_env, &self.provider)),
        )
    }
}

/// Text-to-speech stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Provider: "elevenlabs" (default) or "deepgram".
    #[serde(default = "default_tts_provider")]
    pub provider: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// ElevenLabs voice ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,

    /// Deepgram speak model (e.g. "aura-asteria-en").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_boost: Option<f64>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: default_tts_provider(),
            api_key: None,
            api_key_env: None,
            base_url: None,
            voice_id: None,
            model: None,
            stability: None,
            similarity_boost: None,
        }
    }
}

fn default_tts_provider() -> String {
    ELEVENLABS.into()
}

impl TtsConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(
            &self.api_key,
            &Some(default_key_env(&self.api_key_env, &self.provider)),
        )
    }
}

/// Name of the environment variable a provider's key is read from when
/// no `api_key_env` is configured.
fn default_key_env(configured: &Option<String>, provider: &str) -> String {
    if let Some(env) = configured {
        return env.clone();
    }
    match provider {
        DEEPGRAM => "DEEPGRAM_API_KEY".into(),
        OPENAI => "OPENAI_API_KEY".into(),
        ELEVENLABS => "ELEVENLABS_API_KEY".into(),
        other => format!("{}_API_KEY", other.to_uppercase()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "callflow_providers=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: None,
            filters: Vec::new(),
            output: default_log_output(),
        }
    }
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> crate::error::Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| crate::error::CallflowError::Config(e.to_string()))?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .into_owned())
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw)?;

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::CallflowError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Default config file location.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Expand `~` in a user-supplied config path.
    pub fn expand_path(raw: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(raw).as_ref())
    }

    pub fn server_port(&self) -> u16 {
        self.server.as_ref().map(|s| s.port).unwrap_or(8000)
    }

    pub fn bind_addr(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.server
            .as_ref()
            .map(|s| s.max_upload_bytes)
            .unwrap_or_else(default_max_upload_bytes)
    }

    pub fn http(&self) -> HttpConfig {
        self.http.clone().unwrap_or_default()
    }

    pub fn stt(&self) -> SttConfig {
        self.stt.clone().unwrap_or_default()
    }

    pub fn llm(&self) -> LlmConfig {
        self.llm.clone().unwrap_or_default()
    }

    pub fn tts(&self) -> TtsConfig {
        self.tts.clone().unwrap_or_default()
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Get a config value by dotted path (e.g. "server.port", "llm.model").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let stt = self.stt();
        let llm = self.llm();
        let tts = self.tts();

        for (stage, provider, known) in [
            ("stt", stt.provider.as_str(), STT_PROVIDERS),
            ("llm", llm.provider.as_str(), LLM_PROVIDERS),
            ("tts", tts.provider.as_str(), TTS_PROVIDERS),
        ] {
            if !known.contains(&provider) {
                errors.push(format!(
                    "Unknown {stage} provider '{provider}' (expected one of: {})",
                    known.join(", ")
                ));
            }
        }

        for (stage, provider, key) in [
            ("stt", &stt.provider, stt.resolve_api_key()),
            ("llm", &llm.provider, llm.resolve_api_key()),
            ("tts", &tts.provider, tts.resolve_api_key()),
        ] {
            if key.is_none() {
                warnings.push(format!(
                    "Provider '{provider}' for stage {stage} has no API key configured"
                ));
            }
        }

        if let Some(server) = &self.server {
            if server.port == 0 {
                errors.push("Server port cannot be 0".to_string());
            }
        }

        if self.http().max_attempts == 0 {
            errors.push("http.max_attempts must be at least 1".to_string());
        }

        (warnings, errors)
    }
}

/// Base directory for Callflow data: `~/.callflow/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".callflow")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("TEST_CF_KEY", "dg-test-123") };
        let input = r#"{"key": "${TEST_CF_KEY}", "other": "plain"}"#;
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("dg-test-123"));
        assert!(result.contains("plain"));
        unsafe { std::env::remove_var("TEST_CF_KEY") };
    }

    #[test]
    fn test_env_var_missing() {
        let input = r#"{"key": "${NONEXISTENT_VAR_CF_TEST}"}"#;
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains(r#""""#));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server_port(), 8000);
        assert_eq!(config.bind_addr(), "0.0.0.0");

        let http = config.http();
        assert_eq!(http.max_attempts, 3);
        assert_eq!(http.retry_delay(), Duration::from_secs(2));
        assert_eq!(http.request_timeout(), Duration::from_secs(30));

        assert_eq!(config.stt().provider, "deepgram");
        assert_eq!(config.llm().provider, "openai");
        assert_eq!(config.tts().provider, "elevenlabs");
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let config = Config::load(Path::new("/nonexistent/callflow/config.json")).unwrap();
        assert!(config.server.is_none());
    }

    #[test]
    fn test_load_json5_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                // comments are fine in JSON5
                server: { port: 9100 },
                http: { max_attempts: 5, retry_delay_ms: 10 },
                tts: { provider: "deepgram", model: "aura-luna-en" },
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server_port(), 9100);
        assert_eq!(config.http().max_attempts, 5);
        assert_eq!(config.http().retry_delay(), Duration::from_millis(10));
        assert_eq!(config.http().request_timeout_secs, 30);
        assert_eq!(config.tts().provider, "deepgram");
        assert_eq!(config.tts().model.as_deref(), Some("aura-luna-en"));
    }

    #[test]
    fn test_load_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ server: ").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, crate::error::CallflowError::Config(_)));
    }

    #[test]
    fn test_resolve_api_key_priority() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("TEST_CF_LLM_KEY", "from-env") };
        let llm = LlmConfig {
            api_key_env: Some("TEST_CF_LLM_KEY".into()),
            ..LlmConfig::default()
        };
        assert_eq!(llm.resolve_api_key(), Some("from-env".into()));

        let direct = LlmConfig {
            api_key: Some("direct-key".into()),
            api_key_env: Some("TEST_CF_LLM_KEY".into()),
            ..LlmConfig::default()
        };
        assert_eq!(direct.resolve_api_key(), Some("direct-key".into()));
        unsafe { std::env::remove_var("TEST_CF_LLM_KEY") };
    }

    #[test]
    fn test_default_key_env_follows_provider() {
        assert_eq!(default_key_env(&None, ELEVENLABS), "ELEVENLABS_API_KEY");
        assert_eq!(default_key_env(&None, DEEPGRAM), "DEEPGRAM_API_KEY");
        assert_eq!(default_key_env(&None, OPENAI), "OPENAI_API_KEY");
        assert_eq!(
            default_key_env(&Some("MY_KEY".into()), ELEVENLABS),
            "MY_KEY"
        );
    }

    #[test]
    fn test_get_path() {
        let config = Config {
            llm: Some(LlmConfig {
                model: Some("gpt-4o".into()),
                ..LlmConfig::default()
            }),
            ..Config::default()
        };
        assert_eq!(
            config.get_path("llm.model"),
            Some(serde_json::json!("gpt-4o"))
        );
        assert!(config.get_path("llm.nope").is_none());
    }

    #[test]
    fn test_logging_config_defaults() {
        let config: Config = json5::from_str(r#"{ "logging": {} }"#).unwrap();
        let logging = config.logging.expect("logging should be present");
        assert_eq!(logging.format, "plain");
        assert!(logging.level.is_none());
        assert_eq!(logging.output, "stderr");
        assert!(logging.filters.is_empty());
    }

    #[test]
    fn test_validate_unknown_provider_errors() {
        let config = Config {
            tts: Some(TtsConfig {
                provider: "festival".into(),
                api_key: Some("k".into()),
                ..TtsConfig::default()
            }),
            ..Config::default()
        };
        let (_warnings, errors) = config.validate();
        assert!(
            errors.iter().any(|e| e.contains("festival")),
            "Expected an error about the unknown provider, got: {errors:?}"
        );
    }

    #[test]
    fn test_validate_missing_api_key_warns() {
        let config = Config {
            stt: Some(SttConfig {
                api_key_env: Some("NONEXISTENT_CF_STT_KEY".into()),
                ..SttConfig::default()
            }),
            ..Config::default()
        };
        let (warnings, _errors) = config.validate();
        assert!(
            warnings
                .iter()
                .any(|w| w.contains("deepgram") && w.contains("stt")),
            "Expected a warning about the missing stt key, got: {warnings:?}"
        );
    }

    #[test]
    fn test_validate_zero_attempts_and_port() {
        let config = Config {
            server: Some(ServerConfig {
                port: 0,
                ..ServerConfig::default()
            }),
            http: Some(HttpConfig {
                max_attempts: 0,
                ..HttpConfig::default()
            }),
            ..Config::default()
        };
        let (_warnings, errors) = config.validate();
        assert!(errors.iter().any(|e| e.contains("port")));
        assert!(errors.iter().any(|e| e.contains("max_attempts")));
    }
}
