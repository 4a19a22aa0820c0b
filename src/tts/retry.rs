//! Bounded retry with quadratic backoff for transient synthesis failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::SynthesisError;

/// How many times to try a request and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(300) }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (1-based): none for the first, then `attempt² × base`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 { Duration::ZERO } else { self.base_delay * (attempt * attempt) }
    }
}

/// Run `op` until it succeeds, fails permanently, or the attempt budget runs out.
///
/// `op` receives the 1-based attempt number. The last error is returned when
/// every attempt failed.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, SynthesisError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, SynthesisError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.retryable && attempt < max_attempts => {
                warn!(attempt, max_attempts, status = ?e.status, "Transient synthesis failure, retrying: {}", e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
