//! Exponential backoff retry logic for remote directory calls.
//!
//! Every remote call site goes through [`RetryPolicy::execute`], so
//! rate-limit handling is visible at the call site rather than hidden in
//! the clients.

use crate::error::{DirectoryError, DirectoryResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_retries: u32,
    /// Base delay in seconds for exponential backoff.
    pub base_delay_secs: u64,
    /// Maximum delay cap in seconds.
    pub max_delay_secs: u64,
    /// Deadline covering every attempt and backoff sleep of one call.
    pub total_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_secs: 1,
            max_delay_secs: 60,
            total_timeout: None,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with the given max retries and base delay.
    /// The maximum delay cap defaults to 60 seconds and there is no deadline.
    #[must_use]
    pub fn new(max_retries: u32, base_delay_secs: u64) -> Self {
        Self {
            max_retries,
            base_delay_secs,
            max_delay_secs: 60,
            total_timeout: None,
        }
    }

    /// Set the overall deadline for each executed call.
    #[must_use]
    pub fn with_total_timeout(mut self, total_timeout: Duration) -> Self {
        self.total_timeout = Some(total_timeout);
        self
    }

    /// Whether the error should be retried at the given attempt number.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &DirectoryError) -> bool {
        attempt < self.max_retries && error.is_retryable()
    }

    /// Calculate delay for the given attempt using exponential backoff.
    ///
    /// A [`DirectoryError::RateLimited`] carrying `retry_after_secs` waits
    /// exactly that long (capped at `max_delay_secs`). Otherwise the delay
    /// is `min(base_delay_secs * 2^attempt, max_delay_secs)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, error: &DirectoryError) -> Duration {
        let secs = if let DirectoryError::RateLimited {
            retry_after_secs: Some(retry_after),
        } = error
        {
            (*retry_after).min(self.max_delay_secs)
        } else {
            let exponential = self
                .base_delay_secs
                .saturating_mul(2u64.saturating_pow(attempt));
            exponential.min(self.max_delay_secs)
        };
        Duration::from_secs(secs)
    }

    /// Execute an async operation with retry.
    ///
    /// The closure `f` is called until it succeeds, a terminal error is
    /// returned, the retry budget is spent or the deadline expires. Since
    /// `f` may run more than once, non-idempotent calls (creates) can land
    /// twice on the remote side.
    ///
    /// # Errors
    ///
    /// Returns the first terminal error unchanged,
    /// [`DirectoryError::RetriesExhausted`] wrapping the last transient
    /// error, or [`DirectoryError::DeadlineExceeded`].
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut f: F) -> DirectoryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DirectoryResult<T>>,
    {
        let deadline = self.total_timeout.map(|t| (Instant::now() + t, t));
        let mut attempt: u32 = 0;

        loop {
            let outcome = match deadline {
                Some((at, timeout)) => {
                    let remaining = at.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(DirectoryError::DeadlineExceeded(timeout));
                    }
                    tokio::time::timeout(remaining, f())
                        .await
                        .map_err(|_| DirectoryError::DeadlineExceeded(timeout))?
                }
                None => f().await,
            };

            let error = match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Err(error);
            }

            if !self.should_retry(attempt, &error) {
                warn!(
                    operation = operation_name,
                    attempts = attempt + 1,
                    error = %error,
                    "Max retries exceeded"
                );
                return Err(DirectoryError::RetriesExhausted {
                    attempts: attempt + 1,
                    source: Box::new(error),
                });
            }

            let delay = self.delay_for(attempt, &error);
            if let Some((at, timeout)) = deadline {
                if Instant::now() + delay >= at {
                    warn!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        delay_secs = delay.as_secs(),
                        "Backoff would pass the deadline"
                    );
                    return Err(DirectoryError::DeadlineExceeded(timeout));
                }
            }

            debug!(
                operation = operation_name,
                attempt = attempt + 1,
                max_retries = self.max_retries,
                delay_secs = delay.as_secs(),
                error = %error,
                "Retrying after transient error"
            );

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
