//! Bounded retry with linear backoff
//!
//! Every wait in the engine is a blocking sleep routed through a [`Sleeper`],
//! so tests can drive the loops with a [`RecordingSleeper`] and no real time
//! passes.

use crate::error::Result;
use apim_access_core::BackendError;
use parking_lot::Mutex;
use std::time::Duration;

/// Blocking delay provider
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested delays without sleeping
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delay requested so far, in order
    pub fn durations(&self) -> Vec<Duration> {
        self.slept.lock().clone()
    }

    pub fn total(&self) -> Duration {
        self.slept.lock().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.lock().push(duration);
    }
}

/// What a single attempt produced
#[derive(Debug)]
pub enum Step<T> {
    /// Stop retrying with this value
    Done(T),
    /// Worth another attempt after the backoff wait
    Retry(BackendError),
}

/// Final result of a retry loop that did not hit a fatal error
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Completed(T),
    Exhausted { attempts: u32, last_error: BackendError },
}

/// How the wait grows between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base_wait * attempt`
    Linear,
    /// `base_wait` every time
    Fixed,
}

/// Attempt bound and base wait for a backoff loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    pub base_wait: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Linear backoff: the wait after attempt `n` is `base_wait * n`
    pub fn new(max_attempts: u32, base_wait: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_wait,
            backoff: Backoff::Linear,
        }
    }

    /// The same wait after every attempt
    pub fn fixed(max_attempts: u32, wait: Duration) -> Self {
        Self {
            backoff: Backoff::Fixed,
            ..Self::new(max_attempts, wait)
        }
    }

    /// Wait applied after the given (1-based) attempt
    pub fn wait_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Linear => self.base_wait.checked_mul(attempt).unwrap_or(Duration::MAX),
            Backoff::Fixed => self.base_wait,
        }
    }

    /// Run `op` until it is done, fails fatally, or the bound is reached.
    ///
    /// `op` receives the 1-based attempt number. No wait follows the last
    /// attempt.
    pub fn run<T, F>(&self, sleeper: &dyn Sleeper, mut op: F) -> Result<RetryOutcome<T>>
    where
        F: FnMut(u32) -> Result<Step<T>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt)? {
                Step::Done(value) => return Ok(RetryOutcome::Completed(value)),
                Step::Retry(err) if attempt >= self.max_attempts => {
                    return Ok(RetryOutcome::Exhausted {
                        attempts: attempt,
                        last_error: err,
                    });
                }
                Step::Retry(err) => {
                    let wait = self.wait_after(attempt);
                    tracing::debug!(attempt, wait_secs = wait.as_secs_f64(), error = %err, "retrying after backoff");
                    sleeper.sleep(wait);
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;

    #[test]
    fn test_linear_waits_between_attempts() {
        let policy = RetryPolicy::new(4, Duration::from_secs(2));
        let sleeper = RecordingSleeper::new();
        let mut calls = 0;

        let outcome = policy
            .run(&sleeper, |_| {
                calls += 1;
                Ok(Step::<()>::Retry(BackendError::transient("lag")))
            })
            .unwrap();

        assert_eq!(calls, 4);
        assert!(matches!(outcome, RetryOutcome::Exhausted { attempts: 4, .. }));
        assert_eq!(
            sleeper.durations(),
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(6)
            ]
        );
    }

    #[test]
    fn test_linear_wait_saturates() {
        let policy = RetryPolicy::new(3, Duration::from_secs(u64::MAX / 2));
        assert_eq!(policy.wait_after(1), Duration::from_secs(u64::MAX / 2));
        assert_eq!(policy.wait_after(3), Duration::MAX);
    }

    #[test]
    fn test_stops_at_first_success() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let sleeper = RecordingSleeper::new();

        let outcome = policy
            .run(&sleeper, |attempt| {
                if attempt < 2 {
                    Ok(Step::Retry(BackendError::transient("lag")))
                } else {
                    Ok(Step::Done(attempt))
                }
            })
            .unwrap();

        assert!(matches!(outcome, RetryOutcome::Completed(2)));
        assert_eq!(sleeper.durations(), vec![Duration::from_secs(1)]);
    }

    #[test]
    fn test_fatal_error_aborts_without_waiting() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let sleeper = RecordingSleeper::new();

        let result = policy.run::<(), _>(&sleeper, |_| Err(ReconcileError::Authorization("no".into())));

        assert!(matches!(result, Err(ReconcileError::Authorization(_))));
        assert!(sleeper.durations().is_empty());
    }

    #[test]
    fn test_fixed_backoff_repeats_the_wait() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(30));
        let sleeper = RecordingSleeper::new();

        let _ = policy
            .run(&sleeper, |_| Ok(Step::<()>::Retry(BackendError::HasAssignments("rd".into()))))
            .unwrap();

        assert_eq!(sleeper.durations(), vec![Duration::from_secs(30); 2]);
    }

    #[test]
    fn test_zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
