//! Fluent, retrying browser automation.
//!
//! A [`BrowserSession`] wraps one [`BrowserDriver`] and re-runs element,
//! window, frame and assertion operations while the page is still settling.
//!
//! ```no_run
//! use locomotive::{Result, SessionBuilder};
//!
//! fn login() -> Result<()> {
//!     let mut session = SessionBuilder::new("chrome")
//!         .url("https://example.com/login")
//!         .start()?;
//!
//!     session
//!         .set_text("#username", "admin")?
//!         .set_text(("name", "password"), "hunter2")?
//!         .check("#remember")?
//!         .click("button[type=submit]")?
//!         .validate_source_contains("Welcome")?;
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod core;
pub mod dom;
pub mod errors;
pub mod retry;
pub mod testing;

pub use crate::browser::{AlertAction, BrowserSession, SessionBuilder, SessionState};
#[cfg(feature = "chrome")]
pub use crate::browser::ChromeDriver;
pub use crate::core::{BrowserDriver, BrowserKind, Config, FrameRef};
pub use crate::dom::{IntoSelector, Selector, SelectorKind};
pub use crate::errors::{BrowserError, ErrorKind, Result};
pub use crate::retry::{OperationKind, Pacing, RetryPolicy, RetrySchedule};
