//! Retry with exponential backoff

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Bounded retry of a fallible async operation.
///
/// Attempt `n` (zero-based) that fails is followed by a sleep of
/// `base_delay * 2^n` when attempts remain, so the default policy waits 1s
/// then 2s and gives up after the third failure. Every error on the
/// operation's failure channel is retried; callers keep programmer errors
/// (e.g. undecodable payloads) out of the retried closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one invocation
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            base_delay,
        }
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sleep inserted after the failed zero-based `attempt`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
    }

    /// Run `operation` until it succeeds or the attempts are used up,
    /// returning the last error in the latter case
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        tracing::debug!(attempts = attempt, %error, "Giving up after final attempt");
                        return Err(error);
                    }
                    let delay = self.delay_for_attempt(attempt - 1);
                    tracing::debug!(attempt, ?delay, %error, "Attempt failed; backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Retry `operation` up to `max_attempts` times with the default 1s base delay
pub async fn retry<T, E, F, Fut>(max_attempts: u32, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    RetryPolicy::new(max_attempts, DEFAULT_BASE_DELAY)
        .run(operation)
        .await
}
