// Retry with exponential backoff

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Backoff never grows beyond `initial_delay * 2^MAX_BACKOFF_EXPONENT`
const MAX_BACKOFF_EXPONENT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
        }
    }

    /// Delay before attempt `attempt + 1`, after `attempt` failures
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        self.initial_delay * 2u32.pow(exponent)
    }
}

/// The operation failed for good
#[derive(Debug)]
pub struct RetryFailure<E> {
    pub attempts: u32,
    pub error: E,
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempts are used up. The closure receives the 1-based attempt.
pub async fn with_retry<F, Fut, T, E>(
    policy: RetryPolicy,
    mut operation: F,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if attempt >= policy.max_attempts || !is_retryable(&error) {
                    return Err(RetryFailure {
                        attempts: attempt,
                        error,
                    });
                }

                let delay = policy.delay_after(attempt);
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Attempt failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}
