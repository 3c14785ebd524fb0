use super::schedule::RetrySchedule;
use crate::errors::{BrowserError, ErrorKind, Result};
use std::thread;
use std::time::Instant;
use tracing::{debug, warn};

/// Re-runs an operation while it fails with one of the listed transient
/// error kinds, within the bounds of a [`RetrySchedule`].
///
/// When the budget is spent one last attempt is made and its outcome is
/// returned as is, so the caller always sees the operation's own error.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    schedule: RetrySchedule,
    retry_on: Vec<ErrorKind>,
}

impl RetryPolicy {
    /// Only transient kinds may be retried; configuration mistakes always
    /// propagate on first sight.
    pub fn new(schedule: RetrySchedule, retry_on: &[ErrorKind]) -> Result<Self> {
        if let Some(kind) = retry_on.iter().find(|kind| !kind.is_transient()) {
            return Err(BrowserError::InvalidRetrySchedule(format!(
                "{:?} is not a transient error and cannot be retried",
                kind
            )));
        }

        Ok(Self {
            schedule,
            retry_on: retry_on.to_vec(),
        })
    }

    pub fn schedule(&self) -> &RetrySchedule {
        &self.schedule
    }

    pub fn retries(&self, kind: ErrorKind) -> bool {
        self.retry_on.contains(&kind)
    }

    pub fn run<T, F>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let deadline = self
            .schedule
            .timeout()
            .and_then(|timeout| Instant::now().checked_add(timeout));
        let mut failures: u32 = 0;

        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(err) if self.retries(err.kind()) => {
                    failures = failures.saturating_add(1);

                    let pause = self.schedule.pacing().delay_for(failures);
                    if !pause.is_zero() {
                        thread::sleep(pause);
                    }

                    let expired = deadline.map_or(false, |deadline| Instant::now() > deadline);
                    if expired && failures.saturating_add(1) >= self.schedule.min_tries() {
                        warn!(
                            failures,
                            error = %err,
                            "Retry budget spent, making final attempt"
                        );
                        break;
                    }

                    debug!(failures, error = %err, "Transient failure, retrying");
                }
                Err(err) => return Err(err),
            }
        }

        operation()
    }

    /// Wraps `operation` so every call to the returned closure is a guarded run.
    pub fn guarded<T, F>(self, mut operation: F) -> impl FnMut() -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        move || self.run(&mut operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    // Keeps a zero timeout strictly in the past after each failure.
    const TICK: Duration = Duration::from_millis(1);

    fn policy(schedule: RetrySchedule) -> RetryPolicy {
        RetryPolicy::new(schedule, &[ErrorKind::NoSuchElement]).unwrap()
    }

    #[test]
    fn test_returns_first_success() {
        let calls = Cell::new(0);
        let result = policy(RetrySchedule::default()).run(|| {
            calls.set(calls.get() + 1);
            Ok::<_, BrowserError>("done")
        });

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_recovers_after_transient_failures() {
        let calls = Cell::new(0);
        let result = policy(RetrySchedule::default()).run(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(BrowserError::NoSuchElement("not yet".into()))
            } else {
                Ok(calls.get())
            }
        });

        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_min_tries_honoured_with_zero_timeout() {
        for min_tries in [2, 5, 8] {
            let calls = Cell::new(0);
            let schedule = RetrySchedule::new(Duration::ZERO)
                .with_min_tries(min_tries)
                .with_delay(TICK);
            let result: Result<()> = policy(schedule).run(|| {
                calls.set(calls.get() + 1);
                Err(BrowserError::NoSuchElement("missing".into()))
            });

            assert!(result.is_err());
            assert_eq!(calls.get(), min_tries);
        }
    }

    #[test]
    fn test_always_at_least_one_retry() {
        let calls = Cell::new(0);
        let schedule = RetrySchedule::new(Duration::ZERO)
            .with_min_tries(0)
            .with_delay(TICK);
        let _ = policy(schedule).run(|| {
            calls.set(calls.get() + 1);
            Err::<(), _>(BrowserError::NoSuchElement("missing".into()))
        });

        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_non_retryable_error_runs_once() {
        let calls = Cell::new(0);
        let result: Result<()> = policy(RetrySchedule::indefinite()).run(|| {
            calls.set(calls.get() + 1);
            Err(BrowserError::Driver("connection reset".into()))
        });

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Driver);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_last_real_error_surfaces() {
        let calls = Cell::new(0);
        let schedule = RetrySchedule::new(Duration::ZERO)
            .with_min_tries(3)
            .with_delay(TICK);
        let err = policy(schedule)
            .run(|| -> Result<()> {
                calls.set(calls.get() + 1);
                Err(BrowserError::NoSuchElement(format!("attempt {}", calls.get())))
            })
            .unwrap_err();

        assert_eq!(err.to_string(), "attempt 3");
    }

    #[test]
    fn test_delay_between_attempts() {
        let delay = Duration::from_millis(20);
        let starts = std::cell::RefCell::new(Vec::new());
        let schedule = RetrySchedule::new(Duration::ZERO)
            .with_min_tries(4)
            .with_delay(delay);

        let _ = policy(schedule).run(|| -> Result<()> {
            starts.borrow_mut().push(Instant::now());
            Err(BrowserError::NoSuchElement("missing".into()))
        });

        let starts = starts.into_inner();
        assert_eq!(starts.len(), 4);
        for pair in starts.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= delay);
        }
    }

    #[test]
    fn test_exponential_pacing_between_attempts() {
        let starts = std::cell::RefCell::new(Vec::new());
        let schedule = RetrySchedule::new(Duration::ZERO)
            .with_min_tries(4)
            .with_backoff(Duration::from_millis(10), 2.0, Duration::from_millis(25))
            .unwrap();

        let _ = policy(schedule).run(|| -> Result<()> {
            starts.borrow_mut().push(Instant::now());
            Err(BrowserError::NoSuchElement("missing".into()))
        });

        let starts = starts.into_inner();
        assert_eq!(starts.len(), 4);
        let expected = [10, 20, 25].map(Duration::from_millis);
        for (pair, gap) in starts.windows(2).zip(expected) {
            assert!(pair[1].duration_since(pair[0]) >= gap);
        }
    }

    #[test]
    fn test_timeout_bounds_the_loop() {
        let timeout = Duration::from_millis(60);
        let started = Instant::now();
        let calls = Cell::new(0);
        let schedule = RetrySchedule::new(timeout)
            .with_min_tries(1)
            .with_delay(Duration::from_millis(5));

        let _ = policy(schedule).run(|| -> Result<()> {
            calls.set(calls.get() + 1);
            Err(BrowserError::NoSuchElement("missing".into()))
        });

        let elapsed = started.elapsed();
        assert!(elapsed >= timeout);
        assert!(elapsed < Duration::from_secs(5));
        assert!(calls.get() > 2);
    }

    #[test]
    fn test_indefinite_schedule_keeps_going() {
        let calls = Cell::new(0);
        let schedule = RetrySchedule::indefinite().with_min_tries(1);
        let result = policy(schedule).run(|| {
            calls.set(calls.get() + 1);
            if calls.get() <= 50 {
                Err(BrowserError::NoSuchElement("flaky".into()))
            } else {
                Ok(())
            }
        });

        assert!(result.is_ok());
        assert_eq!(calls.get(), 51);
    }

    #[test]
    fn test_rejects_configuration_kinds() {
        let err = RetryPolicy::new(
            RetrySchedule::default(),
            &[ErrorKind::NoSuchElement, ErrorKind::UnsupportedSelectorKind],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRetrySchedule);
    }

    #[test]
    fn test_guarded_is_reusable() {
        let mut calls = 0;
        let schedule = RetrySchedule::new(Duration::ZERO)
            .with_min_tries(2)
            .with_delay(TICK);
        let mut guarded = policy(schedule).guarded(|| {
            calls += 1;
            if calls % 2 == 1 {
                Err(BrowserError::NoSuchElement("odd".into()))
            } else {
                Ok(calls)
            }
        });

        assert_eq!(guarded().unwrap(), 2);
        assert_eq!(guarded().unwrap(), 4);
    }
}
