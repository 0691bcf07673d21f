//! Bounded retry with backoff

use std::future::Future;
use std::time::Duration;

use careflow_common::{BackoffConfig, RetryConfig};
use tokio::time::sleep;
use tracing::warn;

/// Delay schedule between attempts
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed(Duration),
    /// `initial * multiplier^(retry - 1)`, capped at `max`
    Exponential {
        initial: Duration,
        multiplier: f64,
        max: Duration,
    },
}

impl Backoff {
    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(d) => *d,
            Backoff::Exponential { initial, multiplier, max } => {
                let exponent = attempt.saturating_sub(1) as i32;
                let millis = initial.as_millis() as f64 * multiplier.powi(exponent);
                let capped = millis.min(max.as_millis() as f64).max(0.0);
                Duration::from_millis(capped as u64)
            }
        }
    }
}

impl From<&BackoffConfig> for Backoff {
    fn from(config: &BackoffConfig) -> Self {
        match config {
            BackoffConfig::Fixed { delay_ms } => Backoff::Fixed(Duration::from_millis(*delay_ms)),
            BackoffConfig::Exponential { initial_ms, multiplier, max_ms } => Backoff::Exponential {
                initial: Duration::from_millis(*initial_ms),
                multiplier: *multiplier,
                max: Duration::from_millis(*max_ms),
            },
        }
    }
}

/// Value returned by a retried operation plus the number of invocations
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Retry policy for transport-level failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// `max_attempts` counts every invocation; zero is treated as one
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Backoff::from(&config.backoff))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Re-invoke `op` while it fails, up to `max_attempts` times.
    pub async fn retry<T, E, F, Fut>(&self, op: F) -> Result<Retried<T>, Retried<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.retry_if(op, |_| true).await
    }

    /// Like [`retry`](Self::retry), but only errors accepted by `should_retry`
    /// trigger another attempt. Any other error is returned immediately.
    ///
    /// The operation receives the 1-based attempt number.
    pub async fn retry_if<T, E, F, Fut, P>(
        &self,
        mut op: F,
        should_retry: P,
    ) -> Result<Retried<T>, Retried<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(Retried { value, attempts: attempt }),
                Err(error) => {
                    if attempt >= self.max_attempts || !should_retry(&error) {
                        return Err(Retried { value: error, attempts: attempt });
                    }
                    let delay = self.backoff.delay(attempt);
                    warn!(
                        "Attempt {}/{} failed: {} (retrying in {:?})",
                        attempt, self.max_attempts, error, delay
                    );
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
