//! Language-model error types.

use thiserror::Error;

/// Errors from a language-model call. Every variant is recoverable: the
/// caller substitutes a local fallback reply.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed or returned a non-success status.
    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    /// Response body was not valid JSON.
    #[error("Failed to parse LLM response as JSON: {0}")]
    ParseError(String),

    /// JSON was valid but carried no usable completion.
    #[error("LLM response had no usable completion: {0}")]
    MalformedResponse(String),

    /// Request timed out.
    #[error("LLM request timed out after {0}ms")]
    Timeout(u64),

    /// No provider is configured or it could not be reached.
    #[error("LLM provider unavailable: {0}")]
    Unavailable(String),

    /// All retry attempts exhausted.
    #[error("All LLM retry attempts exhausted after {attempts} tries: {last_error}")]
    RetriesExhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// Description of the final failure.
        last_error: String,
    },

    /// Configuration error.
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(0)
        } else if err.is_connect() {
            LlmError::Unavailable(err.to_string())
        } else {
            LlmError::RequestFailed(err.to_string())
        }
    }
}
