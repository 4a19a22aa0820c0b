//! Synthesis client trait and its error type.

use async_trait::async_trait;

use crate::config::ConversionConfig;

/// Failure of a single synthesis request.
///
/// `retryable` marks transient failures (rate limiting, server errors,
/// dropped connections) that are worth another attempt.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct SynthesisError {
    pub message: String,
    pub status: Option<u16>,
    pub retryable: bool,
}

impl SynthesisError {
    /// A failure that another attempt will not fix.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self { message: message.into(), status: None, retryable: false }
    }

    /// A failure that may succeed on a later attempt.
    pub fn transient(message: impl Into<String>) -> Self {
        Self { message: message.into(), status: None, retryable: true }
    }

    /// Classify an HTTP error response: 429 and 5xx are transient.
    pub fn from_status(status: u16, reason: &str, body: &str) -> Self {
        let retryable = status == 429 || status >= 500;
        let message = if body.is_empty() { format!("{} {}", status, reason) } else { format!("{} {}: {}", status, reason, body) };
        Self { message, status: Some(status), retryable }
    }
}

/// Converts one chunk of text into audio bytes.
#[async_trait]
pub trait SynthesisClient: Send + Sync {
    /// Synthesize `text` with the voice and format in `config`.
    ///
    /// # Errors
    /// Returns a [`SynthesisError`] whose `retryable` flag tells callers
    /// whether the failure was transient.
    async fn synthesize(&self, config: &ConversionConfig, text: &str) -> Result<Vec<u8>, SynthesisError>;
}
