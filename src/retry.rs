//! Retry and backoff configuration for the idempotent upsert gateway (§4.2).

use rand::Rng;
use std::time::Duration;

/// Default value for `max_retries` when `ImportFileSettings` doesn't override
/// it, mirroring `TImportFileSettings::MaxRetries` in the original
/// implementation this core is modeled on.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Retry/backoff configuration for `BulkUpsert` calls.
///
/// **Important**: every retry issued through [`crate::gateway::UpsertGateway`]
/// sets the idempotent flag on the underlying RPC (§4.2, §6) — retries are
/// only safe because the server de-duplicates by primary key.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub max_retries: u32,
    /// Jitter mode for backoff delays (prevents thundering herd).
    pub jitter: JitterMode,
    /// Tie retry-attempt logging to the run's `verbose` setting (§9).
    pub verbose: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            max_retries: DEFAULT_MAX_RETRIES,
            jitter: JitterMode::Full,
            verbose: false,
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set initial backoff delay.
    pub fn with_initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff = delay;
        self
    }

    /// Set maximum backoff delay.
    pub fn with_max_backoff(mut self, delay: Duration) -> Self {
        self.max_backoff = delay;
        self
    }

    /// Set backoff multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set maximum retry attempts.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set jitter mode.
    pub fn with_jitter(mut self, jitter: JitterMode) -> Self {
        self.jitter = jitter;
        self
    }

    /// Tie retry-attempt logging to verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Calculate the next backoff delay with jitter.
    pub fn next_backoff(&self, attempt: u32, current_delay: Duration) -> Duration {
        let base_delay = if attempt == 0 {
            self.initial_backoff
        } else {
            let multiplied = current_delay.as_secs_f64() * self.multiplier;
            Duration::from_secs_f64(multiplied.min(self.max_backoff.as_secs_f64()))
        };

        apply_jitter(base_delay, &self.jitter)
    }

    /// Check if we should retry based on attempt count.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// Jitter mode for retry backoff (following AWS SDK patterns).
#[derive(Clone, Debug, Default)]
pub enum JitterMode {
    /// No jitter - use exact backoff delay.
    None,
    /// Full jitter: random delay between 0 and calculated backoff.
    #[default]
    Full,
    /// Equal jitter: half fixed + half random.
    Equal,
    /// Decorrelated jitter (AWS recommended).
    Decorrelated,
}

/// Apply jitter to a backoff delay.
pub fn apply_jitter(delay: Duration, mode: &JitterMode) -> Duration {
    let mut rng = rand::thread_rng();

    match mode {
        JitterMode::None => delay,
        JitterMode::Full => Duration::from_secs_f64(rng.gen::<f64>() * delay.as_secs_f64()),
        JitterMode::Equal => {
            let half = delay.as_secs_f64() / 2.0;
            Duration::from_secs_f64(half + rng.gen::<f64>() * half)
        }
        JitterMode::Decorrelated => {
            let base = delay.as_secs_f64() / 3.0;
            let upper = delay.as_secs_f64() * 3.0;
            Duration::from_secs_f64(base + rng.gen::<f64>() * (upper - base))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_retry_respects_max_retries() {
        let cfg = RetryConfig::new().with_max_retries(3);
        assert!(cfg.should_retry(0));
        assert!(cfg.should_retry(2));
        assert!(!cfg.should_retry(3));
    }

    #[test]
    fn next_backoff_grows_and_caps() {
        let cfg = RetryConfig::new()
            .with_initial_backoff(Duration::from_millis(100))
            .with_max_backoff(Duration::from_millis(500))
            .with_multiplier(2.0)
            .with_jitter(JitterMode::None);
        assert_eq!(cfg.next_backoff(0, Duration::ZERO), Duration::from_millis(100));
        assert_eq!(cfg.next_backoff(1, Duration::from_millis(100)), Duration::from_millis(200));
        assert_eq!(cfg.next_backoff(5, Duration::from_millis(400)), Duration::from_millis(500));
    }
}
