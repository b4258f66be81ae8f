//! Retry logic with exponential backoff and jitter.
//!
//! Used at the network seams (draft creation) where a transient failure is
//! worth one more attempt. Every attempt runs under its own timeout.

use std::future::Future;
use std::time::{Duration, Instant};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_attempts: u32,

    /// Initial delay before first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retries.
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (e.g., 2.0 = double each time).
    pub backoff_multiplier: f64,

    /// Whether to add jitter to delays.
    pub jitter: bool,

    /// Timeout for each individual attempt.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
            attempt_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl RetryConfig {
    /// Create a config with no retries (fail fast).
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }

    /// Create a config for network operations.
    pub fn network(retries: u32, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: retries,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
            attempt_timeout: Some(attempt_timeout),
        }
    }

    /// Upper bound on wall time for all attempts and the backoff between them.
    pub fn total_attempt_budget(&self) -> Option<Duration> {
        let max_jitter = if self.jitter { 1.0 + MAX_JITTER } else { 1.0 };
        let backoff_ms: f64 = (1..=self.max_attempts)
            .map(|attempt| self.capped_delay_ms(attempt) * max_jitter)
            .sum();
        let backoff = Duration::from_millis(backoff_ms as u64);
        self.attempt_timeout.map(|t| t * (self.max_attempts + 1) + backoff)
    }

    /// Calculate delay for the given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let capped_delay = self.capped_delay_ms(attempt);
        let final_delay = if self.jitter {
            let jitter_factor = 1.0 + (rand_jitter() * MAX_JITTER);
            capped_delay * jitter_factor
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }

    fn capped_delay_ms(&self, attempt: u32) -> f64 {
        let base_delay = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32 - 1);
        base_delay.min(self.max_delay.as_millis() as f64)
    }
}

/// Largest jitter added to a backoff delay, as a fraction of it.
const MAX_JITTER: f64 = 0.25;

/// Simple pseudo-random jitter (0.0 to 1.0) without external deps.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    f64::from(nanos % 1000) / 1000.0
}

/// Result of a retry operation.
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// The final result (success or last error).
    pub result: Result<T, E>,

    /// Number of attempts made.
    pub attempts: u32,

    /// Total time spent (including delays).
    pub total_time: Duration,
}

impl<T, E> RetryResult<T, E> {
    /// Whether more than one attempt was made.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Get the result.
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Retry an async operation while `should_retry` accepts the error.
///
/// Each attempt is bounded by `attempt_timeout`; an elapsed attempt becomes
/// an `E` through `From<Elapsed>` and is offered to `should_retry` like any
/// other error.
pub async fn retry_async<T, E, F, Fut, P>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: P,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: From<tokio::time::error::Elapsed>,
{
    let start = Instant::now();
    let mut attempts = 0;
    let max_attempts = config.max_attempts + 1; // +1 for initial attempt

    loop {
        attempts += 1;
        let result = match config.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, operation()).await {
                Ok(result) => result,
                Err(elapsed) => Err(E::from(elapsed)),
            },
            None => operation().await,
        };

        let retryable = matches!(&result, Err(e) if should_retry(e));
        if !retryable || attempts >= max_attempts {
            return RetryResult {
                result,
                attempts,
                total_time: start.elapsed(),
            };
        }

        let delay = config.delay_for_attempt(attempts);
        tracing::debug!(attempt = attempts, delay_ms = delay.as_millis() as u64, "Retrying");
        tokio::time::sleep(delay).await;
    }
}
