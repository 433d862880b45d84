//! # reverie-llm
//!
//! Language-model layer for Reverie.
//!
//! - [`LlmBackend`] is the seam the dialogue generator talks to.
//! - [`LlmClient`] speaks to OpenAI-compatible endpoints (OpenRouter by
//!   default) or a local Ollama, with per-request timeouts and bounded
//!   retries.
//! - [`ScriptedBackend`] replays canned results for tests.
//! - [`prompt`] holds the reply and cue templates.
//!
//! Every error is recoverable. Callers are expected to fall back to a local
//! reply rather than surface a model failure to the user.

pub mod backend;
pub mod client;
pub mod error;
pub mod mock;
pub mod prompt;
pub mod types;

pub use backend::LlmBackend;
pub use client::{LlmClient, LlmProvider};
pub use error::LlmError;
pub use mock::ScriptedBackend;
pub use types::{LlmRequest, LlmResponse};
