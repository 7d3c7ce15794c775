//! Bounded retry loop with exponential backoff and jitter.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::config::ClientOptions;

/// Classification of one attempt.
#[derive(Debug)]
pub enum AttemptOutcome<T, E> {
    Success(T),
    /// May succeed when repeated.
    Transient(E),
    /// Ends the loop immediately.
    Fatal(E),
}

/// Why the loop gave up.
#[derive(Debug)]
pub enum RetryFailure<E> {
    Exhausted { attempts: u32, last: E },
    Fatal(E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// `attempts` below 1 are raised to 1.
    #[must_use]
    pub fn new(attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    #[must_use]
    pub fn from_options(options: &ClientOptions) -> Self {
        Self::new(options.retries, options.retry_delay(), options.retry_max_delay())
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay after failed attempt number `attempt` (1-based): the base delay
    /// doubled per attempt, capped, plus up to 10% jitter.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);

        let factor = 2u64.saturating_pow(attempt - 1);
        let capped = base_ms.saturating_mul(factor).min(max_ms);

        let jitter_range = capped / 10;
        let jitter = if jitter_range > 0 {
            rand::rng().random_range(0..jitter_range)
        } else {
            0
        };
        Duration::from_millis(capped + jitter)
    }

    /// Runs `attempt_fn` until it succeeds, fails fatally or the attempt
    /// budget is spent. `attempt_fn` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns the fatal error, or the last transient error once exhausted.
    pub async fn run<T, E, F, Fut>(&self, mut attempt_fn: F) -> Result<T, RetryFailure<E>>
    where
        E: fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AttemptOutcome<T, E>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match attempt_fn(attempt).await {
                AttemptOutcome::Success(value) => return Ok(value),
                AttemptOutcome::Fatal(err) => return Err(RetryFailure::Fatal(err)),
                AttemptOutcome::Transient(err) => {
                    if attempt >= self.attempts {
                        return Err(RetryFailure::Exhausted { attempts: attempt, last: err });
                    }
                    let delay = self.backoff(attempt);
                    debug!("Attempt {attempt} of {} failed: {err}; retrying in {delay:?}", self.attempts);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
