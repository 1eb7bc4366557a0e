//! Automatic retry with exponential backoff and jitter.
//!
//! Only transient failures are retried (429, 5xx, timeouts, connection
//! errors; see [`ApiError::is_transient`]). Client errors and decode failures
//! surface on the first attempt. When every attempt fails transiently the
//! last failure is wrapped in [`ApiError::Exhausted`].

use crate::error::ApiError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first (1 = no retries).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay, including server-requested ones.
    pub max_delay: Duration,
    /// Backoff multiplier (typically 2.0 for exponential backoff).
    pub multiplier: f64,
    /// Whether to add jitter to prevent thundering herd.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Defaults with the given attempt ceiling (clamped to at least one).
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts.max(1),
            ..Default::default()
        }
    }

    /// A single attempt, never retried.
    pub fn disabled() -> Self {
        Self::with_attempts(1)
    }

    /// Delay before retry number `retry` (0-indexed).
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(retry as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.jitter {
            // Deterministic spread; pulling in rand for this isn't worth it.
            let jitter_factor = match retry % 4 {
                0 => 0.75,
                1 => 0.90,
                2 => 0.60,
                _ => 0.85,
            };
            Duration::from_secs_f64(capped * jitter_factor)
        } else {
            Duration::from_secs_f64(capped)
        }
    }

    /// Delay after `error` on retry number `retry`. A server-supplied
    /// `Retry-After` replaces the computed backoff, bounded by `max_delay`.
    pub fn delay_after(&self, error: &ApiError, retry: u32) -> Duration {
        match error.retry_after() {
            Some(requested) => requested.min(self.max_delay),
            None => self.delay_for_attempt(retry),
        }
    }
}

/// Run `call` until it succeeds, fails fatally, or runs out of attempts.
///
/// `label` names the operation in log output.
pub async fn retry_call<T, F, Fut>(config: &RetryConfig, label: &str, mut call: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(v) => return Ok(v),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) if attempt >= max_attempts => {
                warn!("{label}: giving up after {attempt} attempt(s): {e}");
                return Err(ApiError::Exhausted {
                    attempts: attempt,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                let delay = config.delay_after(&e, attempt - 1);
                warn!(
                    "{label}: transient error (attempt {attempt}/{max_attempts}): {e}. Retrying in {delay:?}..."
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn server_error() -> ApiError {
        ApiError::Server {
            status: 503,
            detail: "unavailable".into(),
        }
    }

    #[test]
    fn delay_increases_exponentially() {
        let config = RetryConfig {
            jitter: false,
            ..RetryConfig::with_attempts(5)
        };
        let d0 = config.delay_for_attempt(0);
        let d1 = config.delay_for_attempt(1);
        let d2 = config.delay_for_attempt(2);
        assert!(d1 > d0, "d1={d1:?} should be > d0={d0:?}");
        assert!(d2 > d1, "d2={d2:?} should be > d1={d1:?}");
    }

    #[test]
    fn delay_capped_at_max() {
        let config = RetryConfig {
            jitter: false,
            max_delay: Duration::from_secs(2),
            ..RetryConfig::with_attempts(10)
        };
        assert!(config.delay_for_attempt(10) <= Duration::from_secs(2));
    }

    #[test]
    fn jitter_reduces_delay() {
        let jittered = RetryConfig::with_attempts(3);
        let plain = RetryConfig {
            jitter: false,
            ..RetryConfig::with_attempts(3)
        };
        assert!(jittered.delay_for_attempt(2) <= plain.delay_for_attempt(2));
    }

    #[test]
    fn retry_after_overrides_backoff_but_respects_cap() {
        let config = RetryConfig::default();
        let short = ApiError::RateLimited {
            retry_after: Some(Duration::from_secs(1)),
        };
        let long = ApiError::RateLimited {
            retry_after: Some(Duration::from_secs(120)),
        };
        assert_eq!(config.delay_after(&short, 0), Duration::from_secs(1));
        assert_eq!(config.delay_after(&long, 0), config.max_delay);
    }

    #[test]
    fn with_attempts_never_zero() {
        assert_eq!(RetryConfig::with_attempts(0).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let result = retry_call(&RetryConfig::with_attempts(3), "test", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 { Err(server_error()) } else { Ok(n) }
        })
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_after_ceiling() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_call(&RetryConfig::with_attempts(3), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::Timeout("slow".into()))
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(ApiError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(*last, ApiError::Timeout("slow".into()));
            }
            other => panic!("expected exhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_call(&RetryConfig::with_attempts(5), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::Rejected {
                status: 400,
                detail: "bad filter".into(),
            })
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(ApiError::Rejected { status: 400, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn decode_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_call(&RetryConfig::with_attempts(5), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::Decode("garbage".into()))
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_waits_requested_delay() {
        let start = tokio::time::Instant::now();
        let calls = AtomicU32::new(0);
        let result = retry_call(&RetryConfig::with_attempts(2), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ApiError::RateLimited {
                    retry_after: Some(Duration::from_secs(3)),
                })
            } else {
                Ok("ok")
            }
        })
        .await;
        assert_eq!(result, Ok("ok"));
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
