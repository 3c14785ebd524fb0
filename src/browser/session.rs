use crate::core::{BrowserDriver, Config};
use crate::dom::{IntoSelector, Selector};
use crate::errors::{BrowserError, ErrorKind, Result};
use crate::retry::{OperationKind, RetryPolicy};
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Terminated,
}

/// Read or write half of a value access.
#[derive(Debug, Clone, Copy)]
pub(crate) enum TextAccess<'a> {
    Get,
    Set(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionField {
    Text,
    Value,
}

impl fmt::Display for OptionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionField::Text => f.write_str("text"),
            OptionField::Value => f.write_str("value"),
        }
    }
}

/// A live browser owned by exactly one caller.
///
/// Every operation re-resolves its selector, and most run under the retry
/// policy configured for their [`OperationKind`]. The driver is quit exactly
/// once, either by [`close`](Self::close) or when the session is dropped.
pub struct BrowserSession<D: BrowserDriver> {
    driver: Option<D>,
    id: String,
    config: Config,
    initial_url: Option<String>,
}

pub(crate) fn no_element(selector: &Selector) -> BrowserError {
    BrowserError::NoSuchElement(format!("No element found matching {}", selector))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl<D: BrowserDriver> BrowserSession<D> {
    pub(crate) fn new(driver: D, config: Config, initial_url: Option<String>) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        info!(session = %id, "Browser session started");
        Self {
            driver: Some(driver),
            id,
            config,
            initial_url,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn initial_url(&self) -> Option<&str> {
        self.initial_url.as_deref()
    }

    pub fn state(&self) -> SessionState {
        if self.driver.is_some() {
            SessionState::Active
        } else {
            SessionState::Terminated
        }
    }

    /// Direct access to the backend, for anything the session does not wrap.
    pub fn driver(&mut self) -> Result<&mut D> {
        self.driver.as_mut().ok_or(BrowserError::SessionClosed)
    }

    /// Quit the browser. Closing an already closed session is a no-op.
    pub fn close(&mut self) -> Result<()> {
        match self.driver.take() {
            Some(mut driver) => {
                info!(session = %self.id, "Closing browser session");
                driver.quit()
            }
            None => Ok(()),
        }
    }

    pub(crate) fn policy(&self, kind: OperationKind, retry_on: &[ErrorKind]) -> Result<RetryPolicy> {
        self.config.retry.policy_for(kind, retry_on)
    }

    pub(crate) fn default_policy(&self, kind: OperationKind) -> Result<RetryPolicy> {
        self.policy(kind, kind.default_retry_on())
    }

    /// Look up `selector`. With `multiple` every match is returned, possibly
    /// none; otherwise only the first match, and no match is an error.
    pub fn resolve(&mut self, selector: &Selector, multiple: bool) -> Result<Vec<D::Element>> {
        let found = self
            .driver()?
            .find_all(selector.kind(), selector.query())?;
        if multiple {
            return Ok(found);
        }
        match found.into_iter().next() {
            Some(first) => Ok(vec![first]),
            None => Err(no_element(selector)),
        }
    }

    pub(crate) fn first(&mut self, selector: &Selector) -> Result<D::Element> {
        self.resolve(selector, false)?
            .into_iter()
            .next()
            .ok_or_else(|| no_element(selector))
    }

    pub fn get(&mut self, url: &str) -> Result<&mut Self> {
        debug!(session = %self.id, url, "Navigating");
        self.driver()?.navigate(url)?;
        Ok(self)
    }

    pub fn current_url(&mut self) -> Result<String> {
        self.driver()?.current_url()
    }

    pub fn title(&mut self) -> Result<String> {
        self.driver()?.title()
    }

    pub fn page_source(&mut self) -> Result<String> {
        self.driver()?.page_source()
    }

    /// Value of the element: the `value` of form fields, the selected
    /// option's text for selects, rendered text otherwise.
    pub fn text(&mut self, selector: impl IntoSelector) -> Result<String> {
        let selector = selector.into_selector()?;
        let value = self.access_text(&selector, TextAccess::Get)?;
        Ok(value.unwrap_or_default())
    }

    /// Replace the element's value. Selects pick the option with this text.
    pub fn set_text(&mut self, selector: impl IntoSelector, text: &str) -> Result<&mut Self> {
        let selector = selector.into_selector()?;
        self.access_text(&selector, TextAccess::Set(text))?;
        Ok(self)
    }

    fn access_text(&mut self, selector: &Selector, access: TextAccess<'_>) -> Result<Option<String>> {
        let policy = self.default_policy(OperationKind::Element)?;
        policy.run(|| self.text_once(selector, access))
    }

    pub(crate) fn text_once(
        &mut self,
        selector: &Selector,
        access: TextAccess<'_>,
    ) -> Result<Option<String>> {
        let element = self.first(selector)?;
        let tag = self.driver()?.tag_name(&element)?;

        match (tag.as_str(), access) {
            ("select", _) => self.select_once(selector, &element, OptionField::Text, access),
            ("input" | "textarea", TextAccess::Get) => Ok(Some(
                self.driver()?
                    .attribute(&element, "value")?
                    .unwrap_or_default(),
            )),
            (_, TextAccess::Get) => Ok(Some(self.driver()?.text(&element)?)),
            (_, TextAccess::Set(text)) => {
                debug!(session = %self.id, selector = %selector, "Setting text");
                let driver = self.driver()?;
                driver.clear(&element)?;
                driver.send_text(&element, text)?;
                Ok(None)
            }
        }
    }

    /// Visible text of the selected option.
    pub fn select_text(&mut self, selector: impl IntoSelector) -> Result<String> {
        let selector = selector.into_selector()?;
        let text = self.access_select(&selector, OptionField::Text, TextAccess::Get)?;
        Ok(text.unwrap_or_default())
    }

    pub fn set_select_text(&mut self, selector: impl IntoSelector, text: &str) -> Result<&mut Self> {
        let selector = selector.into_selector()?;
        self.access_select(&selector, OptionField::Text, TextAccess::Set(text))?;
        Ok(self)
    }

    /// `value` attribute of the selected option.
    pub fn select_value(&mut self, selector: impl IntoSelector) -> Result<String> {
        let selector = selector.into_selector()?;
        let value = self.access_select(&selector, OptionField::Value, TextAccess::Get)?;
        Ok(value.unwrap_or_default())
    }

    pub fn set_select_value(&mut self, selector: impl IntoSelector, value: &str) -> Result<&mut Self> {
        let selector = selector.into_selector()?;
        self.access_select(&selector, OptionField::Value, TextAccess::Set(value))?;
        Ok(self)
    }

    fn access_select(
        &mut self,
        selector: &Selector,
        field: OptionField,
        access: TextAccess<'_>,
    ) -> Result<Option<String>> {
        let policy = self.default_policy(OperationKind::Element)?;
        policy.run(|| {
            let select = self.first(selector)?;
            self.select_once(selector, &select, field, access)
        })
    }

    fn select_once(
        &mut self,
        selector: &Selector,
        select: &D::Element,
        field: OptionField,
        access: TextAccess<'_>,
    ) -> Result<Option<String>> {
        let options = self.driver()?.options(select)?;

        match access {
            TextAccess::Get => {
                for option in &options {
                    if self.driver()?.is_selected(option)? {
                        return self.option_field(option, field).map(Some);
                    }
                }
                Err(BrowserError::NoSuchElement(format!(
                    "{} has no selected option",
                    selector
                )))
            }
            TextAccess::Set(wanted) => {
                for option in &options {
                    if self.option_field(option, field)? != wanted {
                        continue;
                    }
                    debug!(session = %self.id, selector = %selector, %field, wanted, "Selecting option");
                    let driver = self.driver()?;
                    if !driver.is_selected(option)? {
                        driver.click(option)?;
                    }
                    return Ok(None);
                }
                Err(BrowserError::NoSuchElement(format!(
                    "{} has no option with {} '{}'",
                    selector, field, wanted
                )))
            }
        }
    }

    fn option_field(&mut self, option: &D::Element, field: OptionField) -> Result<String> {
        let driver = self.driver()?;
        match field {
            OptionField::Text => Ok(collapse_whitespace(&driver.text(option)?)),
            OptionField::Value => Ok(driver.attribute(option, "value")?.unwrap_or_default()),
        }
    }

    pub fn click(&mut self, selector: impl IntoSelector) -> Result<&mut Self> {
        let selector = selector.into_selector()?;
        let policy = self.default_policy(OperationKind::Click)?;
        policy.run(|| {
            let element = self.first(&selector)?;
            debug!(session = %self.id, selector = %selector, "Clicking");
            self.driver()?.click(&element)
        })?;
        Ok(self)
    }

    pub fn check(&mut self, selector: impl IntoSelector) -> Result<&mut Self> {
        self.set_checked(selector, true)
    }

    pub fn uncheck(&mut self, selector: impl IntoSelector) -> Result<&mut Self> {
        self.set_checked(selector, false)
    }

    /// Click the checkbox or radio only if its state differs from `mark`.
    pub fn set_checked(&mut self, selector: impl IntoSelector, mark: bool) -> Result<&mut Self> {
        let selector = selector.into_selector()?;
        let policy = self.policy(
            OperationKind::Element,
            &[ErrorKind::NoSuchElement, ErrorKind::Driver],
        )?;
        policy.run(|| {
            let element = self.first(&selector)?;
            let driver = self.driver()?;
            if driver.is_selected(&element)? != mark {
                driver.click(&element)?;
            }
            Ok(())
        })?;
        Ok(self)
    }

    pub fn is_checked(&mut self, selector: impl IntoSelector) -> Result<bool> {
        let selector = selector.into_selector()?;
        let policy = self.default_policy(OperationKind::Element)?;
        policy.run(|| self.checked_once(&selector))
    }

    pub(crate) fn checked_once(&mut self, selector: &Selector) -> Result<bool> {
        let element = self.first(selector)?;
        self.driver()?.is_selected(&element)
    }

    /// Whether anything matches right now. Never retried.
    pub fn is_present(&mut self, selector: impl IntoSelector) -> Result<bool> {
        Ok(self.count_present(selector)? > 0)
    }

    pub fn count_present(&mut self, selector: impl IntoSelector) -> Result<usize> {
        let selector = selector.into_selector()?;
        Ok(self.resolve(&selector, true)?.len())
    }
}

impl<D: BrowserDriver> fmt::Debug for BrowserSession<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("initial_url", &self.initial_url)
            .finish()
    }
}

impl<D: BrowserDriver> Drop for BrowserSession<D> {
    fn drop(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            info!(session = %self.id, "Browser session dropped, quitting driver");
            if let Err(e) = driver.quit() {
                warn!(session = %self.id, error = %e, "Failed to quit driver");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::SessionBuilder;
    use crate::dom::SelectorKind;
    use crate::testing::{quick_config, MockDriver};
    use std::sync::atomic::Ordering;

    const PAGE: &str = r#"
        <html><head><title>Checkout</title></head><body>
          <h1 id="heading">  Your   order </h1>
          <input id="field" name="email" value="expected">
          <textarea id="notes">gift wrap</textarea>
          <input type="checkbox" id="cb">
          <select id="sel">
            <option value="1">First</option>
            <option value="2" selected>Second</option>
            <option value="3">  Third
            </option>
          </select>
          <button class="buy primary">Buy</button>
        </body></html>
    "#;

    fn session(driver: MockDriver) -> BrowserSession<MockDriver> {
        SessionBuilder::new("chrome")
            .config(quick_config())
            .start_with(driver)
            .unwrap()
    }

    #[test]
    fn test_checkbox_scenario() {
        let mut s = session(MockDriver::new(PAGE));
        assert!(!s.is_checked("#cb").unwrap());

        s.check("#cb").unwrap();
        assert!(s.is_checked("#cb").unwrap());

        s.uncheck("#cb").unwrap();
        assert!(!s.is_checked("#cb").unwrap());
    }

    #[test]
    fn test_check_is_idempotent() {
        let mut s = session(MockDriver::new(PAGE));
        s.check("#cb").unwrap().check("#cb").unwrap();
        assert_eq!(s.driver().unwrap().clicks_on("#cb").unwrap(), 1);

        s.set_checked("#cb", true).unwrap();
        assert_eq!(s.driver().unwrap().clicks_on("#cb").unwrap(), 1);
    }

    #[test]
    fn test_select_scenario() {
        let mut s = session(MockDriver::new(PAGE));
        assert_eq!(s.select_text("#sel").unwrap(), "Second");
        assert_eq!(s.select_value("#sel").unwrap(), "2");

        s.set_select_value("#sel", "3").unwrap();
        assert_eq!(s.select_text("#sel").unwrap(), "Third");

        s.set_select_text("#sel", "First").unwrap();
        assert_eq!(s.select_value("#sel").unwrap(), "1");
        assert_eq!(s.text("#sel").unwrap(), "First");
    }

    #[test]
    fn test_selecting_missing_option_fails() {
        let mut s = session(MockDriver::new(PAGE));
        let err = s.set_select_value("#sel", "9").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuchElement);
        assert_eq!(err.to_string(), "css(#sel) has no option with value '9'");
    }

    #[test]
    fn test_presence_of_nothing() {
        let mut s = session(MockDriver::new(PAGE));
        assert!(!s.is_present("table.results").unwrap());
        assert_eq!(s.count_present("table.results").unwrap(), 0);
        assert_eq!(s.count_present("input").unwrap(), 2);
        assert!(s.is_present(("class", "buy")).unwrap());
    }

    #[test]
    fn test_text_reads_value_by_element_type() {
        let mut s = session(MockDriver::new(PAGE));
        assert_eq!(s.text("#field").unwrap(), "expected");
        assert_eq!(s.text(("id", "notes")).unwrap(), "gift wrap");
        assert_eq!(s.text("#heading").unwrap(), "Your order");
    }

    #[test]
    fn test_set_text_replaces_value() {
        let mut s = session(MockDriver::new(PAGE));
        s.set_text(("name", "email"), "someone@example.com").unwrap();
        assert_eq!(s.text("#field").unwrap(), "someone@example.com");

        s.set_text("#field", "").unwrap();
        assert_eq!(s.text("#field").unwrap(), "");
    }

    #[test]
    fn test_resolve_first_or_error() {
        let mut s = session(MockDriver::new(PAGE));
        let all = s
            .resolve(&Selector::new(SelectorKind::Css, "option"), true)
            .unwrap();
        assert_eq!(all.len(), 3);

        let first = s.resolve(&Selector::css("option"), false).unwrap();
        assert_eq!(first, vec![all[0]]);

        let err = s.resolve(&Selector::css("#missing"), false).unwrap_err();
        assert_eq!(err.to_string(), "No element found matching css(#missing)");
    }

    #[test]
    fn test_click_waits_for_late_element() {
        let mut s = session(MockDriver::new(PAGE).hide_for("button", 3));
        let mut config = quick_config();
        config.retry.click.timeout_ms = 2000;
        s.config = config;

        s.click("button.buy").unwrap();
        assert_eq!(s.driver().unwrap().clicks_on("button").unwrap(), 1);
    }

    #[test]
    fn test_click_retries_driver_faults() {
        let mut s = session(MockDriver::new(PAGE));
        s.driver().unwrap().fail_next_calls(1);
        s.click("button").unwrap();
        assert_eq!(s.driver().unwrap().clicks_on("button").unwrap(), 1);
    }

    #[test]
    fn test_missing_element_surfaces_after_retries() {
        let mut s = session(MockDriver::new(PAGE));
        let err = s.click("#nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuchElement);
    }

    #[test]
    fn test_bad_selector_is_not_retried() {
        let mut s = session(MockDriver::new(PAGE));
        let before = s.driver().unwrap().calls();
        let err = s.click(("tag", "button")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedSelectorKind);
        assert_eq!(s.driver().unwrap().calls(), before);
    }

    #[test]
    fn test_xpath_reaches_driver_and_is_not_retried() {
        let mut s = session(MockDriver::new(PAGE));
        let err = s.click(("xpath", "//button")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedSelectorKind);
        assert_eq!(
            s.driver().unwrap().lookups(),
            &[(SelectorKind::XPath, "//button".to_string())]
        );
    }

    #[test]
    fn test_id_lookup_sends_bare_id() {
        let mut s = session(MockDriver::new(PAGE));
        assert_eq!(s.count_present(("id", "#cb")).unwrap(), 1);
        assert_eq!(
            s.driver().unwrap().lookups(),
            &[(SelectorKind::Id, "cb".to_string())]
        );
    }

    #[test]
    fn test_set_checked_retries_driver_faults() {
        let mut s = session(MockDriver::new(PAGE));
        s.driver().unwrap().fail_next_calls(1);
        s.set_checked("#cb", true).unwrap();
        assert!(s.is_checked("#cb").unwrap());
        assert_eq!(s.driver().unwrap().clicks_on("#cb").unwrap(), 1);
    }

    #[test]
    fn test_debug_output() {
        let mut s = session(MockDriver::new(PAGE));
        let shown = format!("{:?}", s);
        assert!(shown.contains(s.session_id()));
        assert!(shown.contains("Active"));

        s.close().unwrap();
        assert!(format!("{:?}", s).contains("Terminated"));

        // Chained calls can be unwrapped in tests.
        let mut s = session(MockDriver::new(PAGE));
        let err = s.get("mock://nowhere").unwrap().check("#nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuchElement);
    }

    #[test]
    fn test_close_quits_once() {
        let driver = MockDriver::new(PAGE);
        let quits = driver.quit_counter();
        let mut s = session(driver);

        assert_eq!(s.state(), SessionState::Active);
        s.close().unwrap();
        s.close().unwrap();
        assert_eq!(s.state(), SessionState::Terminated);
        assert_eq!(
            s.text("#field").unwrap_err().kind(),
            ErrorKind::SessionClosed
        );

        drop(s);
        assert_eq!(quits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_quits_driver() {
        let driver = MockDriver::new(PAGE);
        let quits = driver.quit_counter();
        {
            let mut s = session(driver);
            let _ = s.click("#nope");
        }
        assert_eq!(quits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_session_metadata() {
        let s = session(MockDriver::new(PAGE));
        assert_eq!(s.session_id().len(), 36);
        assert!(s.initial_url().is_none());
        assert_eq!(s.config().wait.poll_interval_ms, quick_config().wait.poll_interval_ms);
    }
}
