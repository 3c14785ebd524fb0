//! Poll-until-success wrapper for flaky browser calls.
//!
//! A [`RetryPolicy`] pairs a [`RetrySchedule`] (timeout, minimum tries, pacing)
//! with the set of [`ErrorKind`](crate::errors::ErrorKind)s that count as
//! transient. Sessions build one per kind of operation from [`RetryConfig`].

pub mod policy;
pub mod schedule;

pub use policy::RetryPolicy;
pub use schedule::{Pacing, RetrySchedule, DEFAULT_MIN_TRIES, DEFAULT_TIMEOUT};

use crate::core::RetryConfig;
use crate::errors::{ErrorKind, Result};

/// Families of session operations that share a retry schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Value access, selection controls and checkboxes.
    Element,
    Click,
    Window,
    Frame,
    Assertion,
}

impl OperationKind {
    /// Error kinds an operation of this family retries when no narrower set is given.
    pub fn default_retry_on(self) -> &'static [ErrorKind] {
        match self {
            OperationKind::Element => &[ErrorKind::NoSuchElement],
            OperationKind::Click => &[ErrorKind::NoSuchElement, ErrorKind::Driver],
            OperationKind::Window => &[ErrorKind::NoSuchWindow],
            OperationKind::Frame => &[ErrorKind::NoSuchFrame],
            OperationKind::Assertion => &[ErrorKind::AssertionFailed],
        }
    }
}

impl RetryConfig {
    pub fn schedule_for(&self, kind: OperationKind) -> Result<RetrySchedule> {
        let config = match kind {
            OperationKind::Element => &self.element,
            OperationKind::Click => &self.click,
            OperationKind::Window => &self.window,
            OperationKind::Frame => &self.frame,
            OperationKind::Assertion => &self.assertion,
        };
        RetrySchedule::try_from(config)
    }

    pub fn policy_for(&self, kind: OperationKind, retry_on: &[ErrorKind]) -> Result<RetryPolicy> {
        RetryPolicy::new(self.schedule_for(kind)?, retry_on)
    }
}
