//! Request and response types.

use serde::{Deserialize, Serialize};

/// Token cap for a roleplay reply.
pub const DIALOGUE_MAX_TOKENS: u32 = 500;
/// Sampling temperature for a roleplay reply.
pub const DIALOGUE_TEMPERATURE: f32 = 0.7;
/// Token cap for a single nonverbal cue.
pub const CUE_MAX_TOKENS: u32 = 50;
/// Sampling temperature for a single nonverbal cue.
pub const CUE_TEMPERATURE: f32 = 0.9;

/// A request to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmRequest {
    /// System prompt.
    pub system: String,
    /// User prompt.
    pub user: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
}

impl LlmRequest {
    /// A roleplay reply request.
    #[must_use]
    pub fn dialogue(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens: DIALOGUE_MAX_TOKENS,
            temperature: DIALOGUE_TEMPERATURE,
            timeout_ms: 30_000,
        }
    }

    /// A request for one fresh nonverbal cue. No system prompt.
    #[must_use]
    pub fn cue(user: impl Into<String>) -> Self {
        Self {
            system: String::new(),
            user: user.into(),
            max_tokens: CUE_MAX_TOKENS,
            temperature: CUE_TEMPERATURE,
            timeout_ms: 10_000,
        }
    }

    /// Override the token cap.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Override the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// A response from the model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LlmResponse {
    /// Generated text, trimmed.
    pub text: String,
    /// How many tokens were generated, if reported.
    pub tokens_generated: u32,
    /// Latency in milliseconds.
    pub latency_ms: u64,
    /// Which model answered.
    pub model: String,
}
