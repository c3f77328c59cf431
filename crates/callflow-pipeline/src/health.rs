//! Aggregate provider health.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => f.write_str("healthy"),
            Self::Degraded => f.write_str("degraded"),
        }
    }
}

/// Probe result per pipeline role. Built fresh for every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderHealth {
    pub stt: bool,
    pub llm: bool,
    pub tts: bool,
}

impl ProviderHealth {
    pub fn is_healthy(&self) -> bool {
        self.stt && self.llm && self.tts
    }

    pub fn status(&self) -> HealthState {
        if self.is_healthy() {
            HealthState::Healthy
        } else {
            HealthState::Degraded
        }
    }
}
