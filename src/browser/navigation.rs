use super::session::BrowserSession;
use crate::core::{BrowserDriver, FrameRef};
use crate::errors::{BrowserError, Result};
use crate::retry::OperationKind;
use regex::Regex;
use std::str::FromStr;
use tracing::debug;

/// What to do with an open alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    Accept,
    Dismiss,
    Authenticate,
}

impl FromStr for AlertAction {
    type Err = BrowserError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ok" | "y" | "ye" | "yes" | "accept" => Ok(AlertAction::Accept),
            "cancel" | "n" | "no" | "dismiss" => Ok(AlertAction::Dismiss),
            "auth" | "a" | "user" | "password" | "pass" => Ok(AlertAction::Authenticate),
            _ => Err(BrowserError::UnsupportedAlertAction(s.to_string())),
        }
    }
}

/// Compile a window pattern that must match from the start of the title or URL.
fn window_matcher(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{})", pattern))?)
}

fn containing(text: &str) -> String {
    format!(".*{}.*", regex::escape(text))
}

impl<D: BrowserDriver> BrowserSession<D> {
    /// Switch to the first window whose title, or failing that URL, matches `pattern`.
    pub fn switch_to_window_regex(&mut self, pattern: &str) -> Result<&mut Self> {
        let matcher = window_matcher(pattern)?;
        let policy = self.default_policy(OperationKind::Window)?;
        policy.run(|| self.find_window(pattern, &matcher))?;
        Ok(self)
    }

    /// Switch to the first window whose title or URL contains `text`.
    pub fn switch_to_window(&mut self, text: &str) -> Result<&mut Self> {
        self.switch_to_window_regex(&containing(text))
    }

    pub fn close_window_regex(&mut self, pattern: &str) -> Result<&mut Self> {
        let matcher = window_matcher(pattern)?;
        let policy = self.default_policy(OperationKind::Window)?;
        policy.run(|| {
            self.find_window(pattern, &matcher)?;
            self.close_current()
        })?;
        Ok(self)
    }

    pub fn close_window(&mut self, text: &str) -> Result<&mut Self> {
        self.close_window_regex(&containing(text))
    }

    pub fn close_current_window(&mut self) -> Result<&mut Self> {
        self.close_current()?;
        Ok(self)
    }

    fn find_window(&mut self, pattern: &str, matcher: &Regex) -> Result<()> {
        let driver = self.driver()?;
        for handle in driver.window_handles()? {
            driver.switch_to_window(&handle)?;
            if matcher.is_match(&driver.title()?) || matcher.is_match(&driver.current_url()?) {
                debug!(handle = %handle, pattern, "Switched to window");
                return Ok(());
            }
        }
        Err(BrowserError::NoSuchWindow(format!(
            "No window found matching '{}'",
            pattern
        )))
    }

    // Leaves the session on the last window standing so it is never without context.
    fn close_current(&mut self) -> Result<()> {
        let driver = self.driver()?;
        let closed = driver.current_window()?;
        driver.close_window()?;
        debug!(handle = %closed, "Closed window");
        let remaining = driver.window_handles()?;
        if let [only] = remaining.as_slice() {
            driver.switch_to_window(only)?;
        }
        Ok(())
    }

    /// Enter a frame of the current document, or go back to the top document with `None`.
    pub fn switch_to_frame(&mut self, frame: Option<FrameRef>) -> Result<&mut Self> {
        let Some(frame) = frame else {
            return self.switch_to_default_content();
        };
        let policy = self.default_policy(OperationKind::Frame)?;
        policy.run(|| self.driver()?.switch_to_frame(&frame))?;
        debug!(frame = %frame, "Switched to frame");
        Ok(self)
    }

    pub fn switch_to_default_content(&mut self) -> Result<&mut Self> {
        self.driver()?.switch_to_default_content()?;
        Ok(self)
    }

    /// Answer an open alert. `option` is one of the accept, dismiss or
    /// authenticate synonyms; credentials are only used to authenticate.
    pub fn alert(&mut self, option: &str, username: &str, password: &str) -> Result<&mut Self> {
        let action: AlertAction = option.parse()?;
        let driver = self.driver()?;
        match action {
            AlertAction::Accept => driver.accept_alert()?,
            AlertAction::Dismiss => driver.dismiss_alert()?,
            AlertAction::Authenticate => driver.authenticate_alert(username, password)?,
        }
        Ok(self)
    }

    pub fn accept_alert(&mut self) -> Result<&mut Self> {
        self.driver()?.accept_alert()?;
        Ok(self)
    }

    pub fn dismiss_alert(&mut self) -> Result<&mut Self> {
        self.driver()?.dismiss_alert()?;
        Ok(self)
    }

    pub fn authenticate_alert(&mut self, username: &str, password: &str) -> Result<&mut Self> {
        self.driver()?.authenticate_alert(username, password)?;
        Ok(self)
    }
}
