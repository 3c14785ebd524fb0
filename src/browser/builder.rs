use super::session::BrowserSession;
use crate::core::{BrowserDriver, BrowserKind, Config};
use crate::errors::Result;
use tracing::warn;

#[cfg(feature = "chrome")]
use super::chrome::ChromeDriver;
#[cfg(feature = "chrome")]
use crate::errors::BrowserError;
#[cfg(feature = "chrome")]
use tracing::info;

/// A session that has not launched its browser yet.
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    name: String,
    url: Option<String>,
    config: Config,
}

impl SessionBuilder {
    /// `name` is the browser family, matched case-insensitively.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            config: Config::default(),
        }
    }

    /// Page to open right after launch.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Launch the named browser. Only the Chromium family has a backend.
    #[cfg(feature = "chrome")]
    pub fn start(self) -> Result<BrowserSession<ChromeDriver>> {
        let kind: BrowserKind = self.name.parse()?;
        if !matches!(kind, BrowserKind::Chrome | BrowserKind::Chromium) {
            return Err(BrowserError::UnsupportedBrowser(kind.to_string()));
        }

        info!(browser = %kind, headless = self.config.browser.headless, "Launching browser");
        let driver = ChromeDriver::launch(&self.config.browser)?;
        self.start_with(driver)
    }

    /// Wrap an already running driver in a session. The name still has to
    /// be a known browser family.
    pub fn start_with<D: BrowserDriver>(self, driver: D) -> Result<BrowserSession<D>> {
        self.name.parse::<BrowserKind>()?;
        let mut session = BrowserSession::new(driver, self.config, self.url.clone());

        if let Some(url) = self.url {
            if let Err(err) = session.get(&url) {
                if let Err(quit_err) = session.close() {
                    warn!(error = %quit_err, "Failed to quit driver after navigation error");
                }
                return Err(err);
            }
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::testing::MockDriver;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_initial_navigation() {
        let driver = MockDriver::blank().with_route(
            "https://shop.test/",
            "<html><head><title>Shop</title></head><body></body></html>",
        );
        let mut session = SessionBuilder::new("Chrome")
            .url("https://shop.test/")
            .start_with(driver)
            .unwrap();

        assert_eq!(session.initial_url(), Some("https://shop.test/"));
        assert_eq!(session.title().unwrap(), "Shop");
        assert_eq!(session.current_url().unwrap(), "https://shop.test/");
    }

    #[test]
    fn test_failed_navigation_quits_driver() {
        let driver = MockDriver::blank().fail_next(1);
        let quits = driver.quit_counter();

        let err = SessionBuilder::new("chrome")
            .url("https://shop.test/")
            .start_with(driver)
            .err()
            .unwrap();

        assert_eq!(err.kind(), ErrorKind::Driver);
        assert_eq!(quits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_adopted_driver_needs_known_browser_name() {
        let driver = MockDriver::blank();
        let quits = driver.quit_counter();

        let err = SessionBuilder::new("netscape")
            .start_with(driver)
            .err()
            .unwrap();

        assert_eq!(err.kind(), ErrorKind::UnsupportedBrowser);
        assert_eq!(quits.load(Ordering::SeqCst), 0);

        assert!(SessionBuilder::new("Firefox")
            .start_with(MockDriver::blank())
            .is_ok());
    }

    #[cfg(feature = "chrome")]
    #[test]
    fn test_unsupported_browsers_fail_before_launch() {
        for name in ["firefox", "Safari", "netscape"] {
            let err = SessionBuilder::new(name).start().err().unwrap();
            assert_eq!(err.kind(), ErrorKind::UnsupportedBrowser);
        }
    }
}
