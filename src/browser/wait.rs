use super::session::BrowserSession;
use crate::core::BrowserDriver;
use crate::dom::{IntoSelector, Selector};
use crate::errors::Result;
use std::thread;
use std::time::Duration;
use tracing::debug;

// Polling waits have no deadline: they block until the condition holds or the
// driver reports an error.
impl<D: BrowserDriver> BrowserSession<D> {
    pub fn pause(&mut self, duration: Duration) -> &mut Self {
        thread::sleep(duration);
        self
    }

    pub fn wait_present(&mut self, selector: impl IntoSelector) -> Result<&mut Self> {
        let selector = selector.into_selector()?;
        debug!(selector = %selector, "Waiting for element");
        self.poll_until(|session| session.present_now(&selector))?;
        Ok(self)
    }

    pub fn wait_not_present(&mut self, selector: impl IntoSelector) -> Result<&mut Self> {
        let selector = selector.into_selector()?;
        debug!(selector = %selector, "Waiting for element to go away");
        self.poll_until(|session| Ok(!session.present_now(&selector)?))?;
        Ok(self)
    }

    pub fn wait_source(&mut self, text: &str) -> Result<&mut Self> {
        debug!(text, "Waiting for page source");
        self.poll_until(|session| Ok(session.page_source()?.contains(text)))?;
        Ok(self)
    }

    pub fn wait_not_source(&mut self, text: &str) -> Result<&mut Self> {
        debug!(text, "Waiting for page source to drop text");
        self.poll_until(|session| Ok(!session.page_source()?.contains(text)))?;
        Ok(self)
    }

    pub(crate) fn present_now(&mut self, selector: &Selector) -> Result<bool> {
        Ok(!self.resolve(selector, true)?.is_empty())
    }

    fn poll_until(&mut self, mut condition: impl FnMut(&mut Self) -> Result<bool>) -> Result<()> {
        let interval = Duration::from_millis(self.config().wait.poll_interval_ms);
        while !condition(self)? {
            thread::sleep(interval);
        }
        Ok(())
    }
}
