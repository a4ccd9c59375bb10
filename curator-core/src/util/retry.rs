//! Fixed-attempt retry policy for flaky external calls.

use std::thread;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};

/// Retries an operation a fixed number of times with a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Runs `op` until it succeeds or the attempts are used up.
    ///
    /// `retryable` decides whether an error is worth another attempt; the
    /// first non-retryable error is returned immediately.
    pub fn run<T, F, P>(&self, what: &str, mut op: F, retryable: P) -> CoreResult<T>
    where
        F: FnMut() -> CoreResult<T>,
        P: Fn(&CoreError) -> bool,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.attempts && retryable(&e) => {
                    log::warn!(
                        "{what} failed (attempt {attempt}/{}): {e}; retrying in {:?}",
                        self.attempts,
                        self.delay
                    );
                    if !self.delay.is_zero() {
                        thread::sleep(self.delay);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use std::cell::Cell;

    fn failure() -> CoreError {
        CoreError::SubprocessFailed {
            stage: "ffmpeg (loudness)".to_string(),
            code: Some(1),
        }
    }

    #[test]
    fn test_succeeds_after_retries() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let result = policy.run(
            "measure",
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 { Err(failure()) } else { Ok(42) }
            },
            |_| true,
        );
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_gives_up_after_attempts() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let result: CoreResult<()> = policy.run(
            "measure",
            || {
                calls.set(calls.get() + 1);
                Err(failure())
            },
            |_| true,
        );
        assert!(result.is_err());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_non_retryable_error_is_immediate() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(5, Duration::ZERO);
        let result: CoreResult<()> = policy.run(
            "measure",
            || {
                calls.set(calls.get() + 1);
                Err(CoreError::MeasurementCountMismatch {
                    expected: 2,
                    actual: 1,
                })
            },
            |e| matches!(e, CoreError::SubprocessFailed { .. }),
        );
        assert!(matches!(result, Err(CoreError::MeasurementCountMismatch { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
    }
}
