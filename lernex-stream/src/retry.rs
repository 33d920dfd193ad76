//! Bounded retries with exponential backoff and jitter

use anyhow::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
        }
    }
}

/// Deterministic exponential delay for a 0-based attempt, capped.
pub fn base_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    config.base_delay.saturating_mul(factor).min(config.max_delay)
}

/// Backoff with multiplicative jitter in `[0.5, 1.5)`, still capped.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let base = base_backoff(config, attempt);
    let jitter: f64 = rand::rng().random_range(0.5..1.5);
    Duration::from_secs_f64(base.as_secs_f64() * jitter).min(config.max_delay)
}

/// Run `op` until it succeeds or the attempt budget is exhausted,
/// sleeping a jittered backoff between attempts.
pub async fn retry<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.max_attempts.max(1);
    let mut last_err: Option<anyhow::Error> = None;
    for attempt in 0..attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                log::warn!("attempt {} of {} failed: {e:#}", attempt + 1, attempts);
                last_err = Some(e);
            }
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(backoff_delay(config, attempt)).await;
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("retry budget exhausted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config() -> RetryConfig {
        RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }

    #[test]
    fn base_backoff_is_monotone_then_capped() {
        let config = config();
        let mut previous = Duration::ZERO;
        for attempt in 0..12 {
            let delay = base_backoff(&config, attempt);
            assert!(delay >= previous);
            assert!(delay <= config.max_delay);
            previous = delay;
        }
        assert_eq!(base_backoff(&config, 11), config.max_delay);
    }

    #[test]
    fn jittered_delay_stays_in_bounds() {
        let config = config();
        for attempt in 0..8 {
            let base = base_backoff(&config, attempt);
            for _ in 0..20 {
                let delay = backoff_delay(&config, attempt);
                // Loose lower bound to absorb float rounding
                assert!(delay >= base.mul_f64(0.49));
                assert!(delay <= config.max_delay);
            }
        }
    }

    #[tokio::test]
    async fn retry_recovers_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let result = retry(&config, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(anyhow::anyhow!("transient"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_exhausts_budget() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let result: Result<()> = retry(&config, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::anyhow!("always fails")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
