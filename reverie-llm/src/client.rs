//! HTTP client for OpenAI-compatible endpoints (OpenRouter by default) and
//! Ollama.

use std::time::{Duration, Instant};

use reqwest::Client;
use reverie_core::config::LlmConfig;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::backend::LlmBackend;
use crate::error::LlmError;
use crate::types::{LlmRequest, LlmResponse};

/// `HTTP-Referer` sent for OpenRouter attribution.
pub const ATTRIBUTION_REFERER: &str = "http://localhost";
/// `X-Title` sent for OpenRouter attribution.
pub const ATTRIBUTION_TITLE: &str = "RoleplayBot";

/// Provider backend for inference.
#[derive(Clone)]
pub enum LlmProvider {
    /// OpenAI-compatible chat completions API.
    OpenAiCompatible {
        /// Base URL without the `/v1/...` suffix.
        base_url: String,
        /// Bearer token.
        api_key: String,
    },
    /// Ollama running locally.
    Ollama {
        /// Base URL without the `/api/...` suffix.
        base_url: String,
    },
    /// No model available. Every call fails with [`LlmError::Unavailable`].
    None,
}

impl std::fmt::Debug for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAiCompatible { base_url, .. } => f
                .debug_struct("OpenAiCompatible")
                .field("base_url", base_url)
                .field("api_key", &"<redacted>")
                .finish(),
            Self::Ollama { base_url } => {
                f.debug_struct("Ollama").field("base_url", base_url).finish()
            }
            Self::None => f.write_str("None"),
        }
    }
}

/// Routes requests to the configured provider with bounded retries.
#[derive(Debug, Clone)]
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    model: String,
    max_retries: u32,
}

impl LlmClient {
    /// Create a client.
    #[must_use]
    pub fn new(provider: LlmProvider, model: impl Into<String>, max_retries: u32) -> Self {
        Self {
            provider,
            http: Client::new(),
            model: model.into(),
            max_retries,
        }
    }

    /// A client with no backend; every call fails fast.
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None, String::new(), 0)
    }

    /// Build from configuration. The API key is read from the environment
    /// variable named by `api_key_env`; if it is missing the client degrades
    /// to [`LlmProvider::None`].
    ///
    /// # Errors
    /// Returns [`LlmError::ConfigError`] for an unknown provider name.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let base_url = config.base_url.trim_end_matches('/').to_owned();
        let provider = match config.provider.as_str() {
            "none" => LlmProvider::None,
            "ollama" => LlmProvider::Ollama { base_url },
            "openai_compatible" => match std::env::var(&config.api_key_env) {
                Ok(api_key) if !api_key.trim().is_empty() => {
                    LlmProvider::OpenAiCompatible { base_url, api_key }
                }
                _ => {
                    warn!(
                        env = %config.api_key_env,
                        "API key not set, replies will use the local fallback"
                    );
                    LlmProvider::None
                }
            },
            other => {
                return Err(LlmError::ConfigError(format!(
                    "unknown LLM provider '{other}'"
                )));
            }
        };
        info!(provider = %config.provider, model = %config.model, "LLM client configured");
        Ok(Self::new(provider, config.model.clone(), config.max_retries))
    }

    /// Model name sent with each request.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The configured provider.
    #[must_use]
    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    async fn complete_openai(
        &self,
        base_url: &str,
        api_key: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse, LlmError> {
        let url = format!("{base_url}/v1/chat/completions");
        let mut messages = Vec::with_capacity(2);
        if !request.system.is_empty() {
            messages.push(json!({ "role": "system", "content": request.system }));
        }
        messages.push(json!({ "role": "user", "content": request.user }));
        let body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(
                    attempt = attempt + 1,
                    of = self.max_retries + 1,
                    "Retrying chat completion"
                );
            }

            let start = Instant::now();
            let result = self
                .http
                .post(&url)
                .bearer_auth(api_key)
                .header("HTTP-Referer", ATTRIBUTION_REFERER)
                .header("X-Title", ATTRIBUTION_TITLE)
                .json(&body)
                .timeout(Duration::from_millis(request.timeout_ms))
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let json: Value = resp
                        .json()
                        .await
                        .map_err(|e| LlmError::ParseError(e.to_string()))?;
                    let (text, tokens_generated) = extract_chat_completion(&json)?;
                    let latency_ms = elapsed_ms(start);
                    debug!(latency_ms, tokens_generated, "Chat completion received");
                    return Ok(LlmResponse {
                        text,
                        tokens_generated,
                        latency_ms,
                        model: self.model.clone(),
                    });
                }
                Ok(resp) => {
                    let status = resp.status();
                    let detail = resp.text().await.unwrap_or_default();
                    last_error = format!("HTTP {status}: {detail}");
                    warn!(%status, "Chat completion returned an error status");
                }
                Err(e) => {
                    if e.is_timeout() {
                        warn!(timeout_ms = request.timeout_ms, "Chat completion timed out");
                    } else {
                        warn!(error = %e, "Chat completion request failed");
                    }
                    last_error = e.to_string();
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }

    async fn complete_ollama(
        &self,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse, LlmError> {
        let url = format!("{base_url}/api/generate");
        let prompt = if request.system.is_empty() {
            request.user.clone()
        } else {
            format!("{}\n\n{}", request.system, request.user)
        };
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            }
        });

        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(attempt = attempt + 1, of = self.max_retries + 1, "Retrying Ollama call");
            }

            let start = Instant::now();
            let result = self
                .http
                .post(&url)
                .json(&body)
                .timeout(Duration::from_millis(request.timeout_ms))
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let json: Value = resp
                        .json()
                        .await
                        .map_err(|e| LlmError::ParseError(e.to_string()))?;
                    let text = json["response"]
                        .as_str()
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .ok_or_else(|| LlmError::MalformedResponse(json.to_string()))?
                        .to_owned();
                    return Ok(LlmResponse {
                        text,
                        tokens_generated: token_count(&json["eval_count"]),
                        latency_ms: elapsed_ms(start),
                        model: self.model.clone(),
                    });
                }
                Ok(resp) => {
                    last_error = format!("HTTP {}", resp.status());
                    warn!(error = %last_error, "Ollama returned an error status");
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(error = %last_error, "Ollama request failed");
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }
}

impl LlmBackend for LlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        match &self.provider {
            LlmProvider::None => Err(LlmError::Unavailable("no LLM provider configured".into())),
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                self.complete_openai(base_url, api_key, request).await
            }
            LlmProvider::Ollama { base_url } => self.complete_ollama(base_url, request).await,
        }
    }

    fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }
}

/// Pull `choices[0].message.content` (trimmed) and the completion token
/// count out of a chat-completions body.
///
/// # Errors
/// Returns [`LlmError::MalformedResponse`] when there is no non-empty
/// completion.
pub fn extract_chat_completion(json: &Value) -> Result<(String, u32), LlmError> {
    let text = json["choices"][0]["message"]["content"]
        .as_str()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| LlmError::MalformedResponse(json.to_string()))?;
    Ok((text.to_owned(), token_count(&json["usage"]["completion_tokens"])))
}

fn token_count(value: &Value) -> u32 {
    value
        .as_u64()
        .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX))
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
