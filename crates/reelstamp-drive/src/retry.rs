//! Retry policy with exponential backoff and jitter.
//!
//! - Exponential backoff (`base * 2^attempt`, capped at `max_delay`)
//! - Optional additive jitter in `[0, base)`
//! - Honors Retry-After hints on rate limiting
//! - Generic over any error that can classify itself via [`Retryable`]

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{info_span, warn, Instrument};

use crate::metrics::record_retry;

// =============================================================================
// Error classification
// =============================================================================

/// Errors that know whether retrying could help.
pub trait Retryable {
    /// Whether the failure is expected to resolve itself on retry.
    fn is_transient(&self) -> bool;

    /// Server-provided minimum wait before the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Outcome of a retried operation that did not succeed.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The operation failed in a way retrying cannot fix.
    #[error("{0}")]
    Permanent(E),

    /// Every attempt failed transiently.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    /// The underlying error, whichever way the retries ended.
    pub fn inner(&self) -> &E {
        match self {
            RetryError::Permanent(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Backoff policy shared by every remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Cap on the exponential part of the delay.
    pub max_delay: Duration,
    /// Total number of calls, including the first.
    pub max_attempts: u32,
    /// Add a random extra in `[0, base_delay)` to every delay.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Create policy from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_attempts: u32 = std::env::var("RETRY_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_attempts);

        let base_delay_ms: u64 = std::env::var("RETRY_BASE_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.base_delay.as_millis() as u64);

        let max_delay_ms: u64 = std::env::var("RETRY_MAX_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_delay.as_millis() as u64);

        let jitter = std::env::var("RETRY_JITTER")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(defaults.jitter);

        Self {
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
            max_attempts: max_attempts.max(1),
            jitter,
        }
    }

    /// Policy that never waits and tries once.
    pub fn no_retry() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_attempts: 1,
            jitter: false,
        }
    }

    /// Deterministic part of the delay after failed attempt `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Full delay after failed attempt `attempt`, jitter included.
    fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let mut delay = self.backoff(attempt);

        if self.jitter && !self.base_delay.is_zero() {
            let base_ms = self.base_delay.as_millis() as u64;
            let extra = rand::rng().random_range(0..base_ms.max(1));
            delay += Duration::from_millis(extra);
        }

        match retry_after {
            Some(after) => delay.max(after),
            None => delay,
        }
    }
}

// =============================================================================
// Retry loop
// =============================================================================

/// Execute an async operation with retry.
///
/// Transient failures are retried until `max_attempts` calls have been made;
/// a permanent failure returns after the call that produced it.
pub async fn with_retry<T, E, F, Fut>(
    policy: &BackoffPolicy,
    operation: &str,
    op: F,
) -> Result<T, RetryError<E>>
where
    E: Retryable + fmt::Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        let span = info_span!("drive_retry", operation = %operation, attempt = attempt + 1);

        match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(RetryError::Permanent(e)),
            Err(e) if attempt + 1 >= max_attempts => {
                return Err(RetryError::Exhausted {
                    attempts: attempt + 1,
                    last: e,
                });
            }
            Err(e) => {
                let delay = policy.delay_for(attempt, e.retry_after());

                warn!(
                    operation = %operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Drive operation failed, retrying: {}",
                    e
                );

                record_retry(operation);

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
