use std::time::Duration;

use rand::Rng;

// Cap the exponent so extreme retry counts cannot overflow the Duration.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Retry tunables for one fetch call.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Total number of attempts, not retries after the first.
    pub max_retries: u32,
    /// Per-request timeout covering connect and body read.
    pub timeout: Duration,
    /// Floor applied to every computed wait, including `Retry-After`.
    pub min_wait: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            timeout: Duration::from_secs(20),
            min_wait: Duration::from_secs_f64(1.5),
        }
    }
}

impl FetchPolicy {
    /// Default policy with a different attempt budget.
    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }
}

/// Backoff before the next attempt: `max(min_wait, 2^attempt + jitter)`
/// with `attempt` zero-based and jitter uniform in `[0.2, 1.0)`, so the
/// first retry waits roughly 1-2s and later ones grow exponentially.
pub fn backoff_delay(attempt: u32, min_wait: Duration) -> Duration {
    let base = 2f64.powi(attempt.min(MAX_BACKOFF_EXPONENT) as i32);
    let jitter = rand::thread_rng().gen_range(0.2..1.0);
    Duration::from_secs_f64((base + jitter).max(min_wait.as_secs_f64()))
}
