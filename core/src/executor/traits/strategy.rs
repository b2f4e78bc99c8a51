use std::time::Duration;

use crate::error::TaskExecutionError;

/// Retry policy for a task executor.
pub trait RetryStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Delay before attempt `attempt + 1`, or `None` to give up.
    fn next_delay(&self, attempt: u32, error: &TaskExecutionError) -> Option<Duration>;

    fn max_attempts(&self) -> u32;

    fn should_retry(&self, attempt: u32, error: &TaskExecutionError) -> bool {
        attempt < self.max_attempts() && error.is_retryable()
    }
}
