//! Scripted backend: deterministic replies for tests without an endpoint.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

use crate::backend::LlmBackend;
use crate::error::LlmError;
use crate::types::{LlmRequest, LlmResponse};

/// Model name reported in scripted responses.
pub const SCRIPTED_MODEL: &str = "scripted";

/// Replays queued results in order and records every request it sees.
///
/// An exhausted script answers with [`LlmError::Unavailable`].
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<LlmRequest>>,
    delay: Option<Duration>,
    unavailable: bool,
}

impl ScriptedBackend {
    /// Empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that reports itself unavailable.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Queue a successful reply.
    #[must_use]
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push_reply(text);
        self
    }

    /// Queue a failure.
    #[must_use]
    pub fn with_error(self, error: LlmError) -> Self {
        self.push_error(error);
        self
    }

    /// Wait this long before answering each request.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful reply.
    pub fn push_reply(&self, text: impl Into<String>) {
        self.script.lock().push_back(Ok(text.into()));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: LlmError) {
        self.script.lock().push_back(Err(error));
    }

    /// Every request received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().clone()
    }

    /// Queued results not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

impl LlmBackend for ScriptedBackend {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().pop_front();
        let text = next.unwrap_or_else(|| Err(LlmError::Unavailable("script exhausted".into())))?;
        Ok(LlmResponse {
            text,
            tokens_generated: 0,
            latency_ms: self.delay.map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            model: SCRIPTED_MODEL.to_owned(),
        })
    }

    fn is_available(&self) -> bool {
        !self.unavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_script_in_order() {
        let backend = ScriptedBackend::new()
            .with_reply("first")
            .with_error(LlmError::Timeout(10))
            .with_reply("third");
        let req = LlmRequest::dialogue("s", "u");

        assert_eq!(backend.complete(&req).await.expect("first").text, "first");
        assert!(matches!(backend.complete(&req).await, Err(LlmError::Timeout(10))));
        assert_eq!(backend.complete(&req).await.expect("third").text, "third");
        assert!(matches!(
            backend.complete(&req).await,
            Err(LlmError::Unavailable(_))
        ));
        assert_eq!(backend.requests().len(), 4);
        assert_eq!(backend.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_uses_tokio_time() {
        let backend = ScriptedBackend::new()
            .with_reply("late")
            .with_delay(Duration::from_secs(60));
        let start = tokio::time::Instant::now();
        let resp = backend
            .complete(&LlmRequest::cue("cue"))
            .await
            .expect("reply");
        assert_eq!(resp.text, "late");
        assert_eq!(resp.latency_ms, 60_000);
        assert!(start.elapsed() >= Duration::from_secs(60));
    }
}
