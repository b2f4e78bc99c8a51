use std::time::Duration;

use goalrun_core::api::{RetryConfig, RetryStrategy, TaskExecutionError};

/// Doubling delay per attempt, capped at `max_delay_ms`.
pub struct ExponentialBackoff {
    config: RetryConfig,
}

/// Delay growing by `base_delay_ms` per attempt, capped at `max_delay_ms`.
pub struct LinearRetry {
    config: RetryConfig,
}

impl ExponentialBackoff {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl LinearRetry {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

// `attempt` counts attempts already made, so the first retry sees 1.
impl RetryStrategy for ExponentialBackoff {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    fn next_delay(&self, attempt: u32, error: &TaskExecutionError) -> Option<Duration> {
        if !self.should_retry(attempt, error) {
            return None;
        }
        let exp = 1u64 << attempt.saturating_sub(1).min(30);
        let delay = self.config.base_delay_ms.saturating_mul(exp);
        let delay = delay.min(self.config.max_delay_ms);
        Some(Duration::from_millis(delay))
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }
}

impl RetryStrategy for LinearRetry {
    fn name(&self) -> &str {
        "linear"
    }

    fn next_delay(&self, attempt: u32, error: &TaskExecutionError) -> Option<Duration> {
        if !self.should_retry(attempt, error) {
            return None;
        }
        let multiplier = attempt.max(1) as u64;
        let delay = self.config.base_delay_ms.saturating_mul(multiplier);
        let delay = delay.min(self.config.max_delay_ms);
        Some(Duration::from_millis(delay))
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err() -> TaskExecutionError {
        TaskExecutionError::failed("err")
    }

    #[test]
    fn test_exponential_backoff() {
        let cfg = RetryConfig {
            base_delay_ms: 100,
            max_delay_ms: 1000,
            max_attempts: 4,
            strategy: "exponential-backoff".to_string(),
        };
        let plugin = ExponentialBackoff::new(cfg);
        assert_eq!(plugin.next_delay(1, &err()).unwrap().as_millis(), 100);
        assert_eq!(plugin.next_delay(2, &err()).unwrap().as_millis(), 200);
        assert_eq!(plugin.next_delay(3, &err()).unwrap().as_millis(), 400);
        assert_eq!(plugin.next_delay(4, &err()), None);
    }

    #[test]
    fn test_exponential_backoff_caps_delay() {
        let cfg = RetryConfig {
            base_delay_ms: 400,
            max_delay_ms: 1000,
            max_attempts: 10,
            strategy: "exponential-backoff".to_string(),
        };
        let plugin = ExponentialBackoff::new(cfg);
        assert_eq!(plugin.next_delay(5, &err()).unwrap().as_millis(), 1000);
    }

    #[test]
    fn test_linear_backoff() {
        let cfg = RetryConfig {
            base_delay_ms: 50,
            max_delay_ms: 200,
            max_attempts: 4,
            strategy: "linear".to_string(),
        };
        let plugin = LinearRetry::new(cfg);
        assert_eq!(plugin.next_delay(1, &err()).unwrap().as_millis(), 50);
        assert_eq!(plugin.next_delay(3, &err()).unwrap().as_millis(), 150);
    }

    #[test]
    fn test_cancelled_is_never_retried() {
        let plugin = LinearRetry::new(RetryConfig {
            max_attempts: 5,
            ..RetryConfig::default()
        });
        assert_eq!(plugin.next_delay(1, &TaskExecutionError::Cancelled), None);
    }
}
