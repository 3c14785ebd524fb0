use crate::core::ScheduleConfig;
use crate::errors::{BrowserError, Result};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MIN_TRIES: u32 = 10;

/// Pause inserted after a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Pacing {
    Fixed(Duration),
    Exponential {
        initial: Duration,
        factor: f64,
        max: Duration,
    },
}

impl Pacing {
    /// Delay to apply after the `failures`-th consecutive failure (1-based).
    pub fn delay_for(&self, failures: u32) -> Duration {
        match self {
            Pacing::Fixed(delay) => *delay,
            Pacing::Exponential {
                initial,
                factor,
                max,
            } => {
                let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
                let secs = initial.as_secs_f64() * factor.powi(exponent);
                Duration::try_from_secs_f64(secs)
                    .map(|delay| delay.min(*max))
                    .unwrap_or(*max)
            }
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing::Fixed(Duration::ZERO)
    }
}

/// Time and attempt budget for one guarded call.
///
/// Stateless: every run measures its own deadline from the moment it starts.
/// A schedule without a timeout retries until the operation succeeds or fails
/// with an error it is not allowed to retry.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySchedule {
    timeout: Option<Duration>,
    min_tries: u32,
    pacing: Pacing,
}

impl RetrySchedule {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            min_tries: DEFAULT_MIN_TRIES,
            pacing: Pacing::default(),
        }
    }

    pub fn indefinite() -> Self {
        Self {
            timeout: None,
            min_tries: DEFAULT_MIN_TRIES,
            pacing: Pacing::default(),
        }
    }

    /// Numeric form: a negative `timeout` means indefinite, a negative `delay`
    /// is rejected.
    pub fn from_secs(timeout: f64, min_tries: u32, delay: f64) -> Result<Self> {
        if !(delay >= 0.0) || !delay.is_finite() {
            return Err(BrowserError::InvalidRetrySchedule(format!(
                "delay must be 0 or greater (got {})",
                delay
            )));
        }
        let timeout = if timeout < 0.0 {
            None
        } else if timeout.is_finite() {
            Some(Duration::from_secs_f64(timeout))
        } else {
            return Err(BrowserError::InvalidRetrySchedule(format!(
                "timeout must be finite (got {})",
                timeout
            )));
        };

        Ok(Self {
            timeout,
            min_tries,
            pacing: Pacing::Fixed(Duration::from_secs_f64(delay)),
        })
    }

    pub fn with_min_tries(mut self, min_tries: u32) -> Self {
        self.min_tries = min_tries;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.pacing = Pacing::Fixed(delay);
        self
    }

    pub fn with_backoff(mut self, initial: Duration, factor: f64, max: Duration) -> Result<Self> {
        if !factor.is_finite() || factor < 1.0 {
            return Err(BrowserError::InvalidRetrySchedule(format!(
                "backoff factor must be a finite number >= 1 (got {})",
                factor
            )));
        }
        self.pacing = Pacing::Exponential {
            initial,
            factor,
            max,
        };
        Ok(self)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_indefinite(&self) -> bool {
        self.timeout.is_none()
    }

    pub fn min_tries(&self) -> u32 {
        self.min_tries
    }

    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl TryFrom<&ScheduleConfig> for RetrySchedule {
    type Error = BrowserError;

    fn try_from(config: &ScheduleConfig) -> Result<Self> {
        if config.delay_ms < 0 {
            return Err(BrowserError::InvalidRetrySchedule(format!(
                "delay must be 0 or greater (got {}ms)",
                config.delay_ms
            )));
        }
        let delay = Duration::from_millis(config.delay_ms as u64);

        let schedule = if config.timeout_ms < 0 {
            RetrySchedule::indefinite()
        } else {
            RetrySchedule::new(Duration::from_millis(config.timeout_ms as u64))
        }
        .with_min_tries(config.min_tries);

        match config.backoff_factor {
            Some(factor) => {
                let max = config
                    .max_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(Duration::MAX);
                schedule.with_backoff(delay, factor, max)
            }
            None => Ok(schedule.with_delay(delay)),
        }
    }
}
