//! The seam between reply generation and whatever produces text.

use std::future::Future;

use crate::error::LlmError;
use crate::types::{LlmRequest, LlmResponse};

/// Anything that can complete a prompt.
///
/// Implemented by [`crate::LlmClient`] for real endpoints and by
/// [`crate::ScriptedBackend`] for tests.
pub trait LlmBackend: Send + Sync {
    /// Complete `request`. Errors are recoverable; callers fall back to a
    /// local reply.
    fn complete(
        &self,
        request: &LlmRequest,
    ) -> impl Future<Output = Result<LlmResponse, LlmError>> + Send;

    /// Whether calls can possibly succeed. A `false` backend lets callers
    /// skip straight to their fallback.
    fn is_available(&self) -> bool {
        true
    }
}
