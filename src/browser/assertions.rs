use super::session::{BrowserSession, TextAccess};
use crate::core::BrowserDriver;
use crate::dom::IntoSelector;
use crate::errors::{BrowserError, ErrorKind, Result};
use crate::retry::OperationKind;

const CHECKED_RETRY_ON: &[ErrorKind] = &[ErrorKind::AssertionFailed, ErrorKind::NoSuchElement];

fn failed(message: String) -> BrowserError {
    BrowserError::AssertionFailed(message)
}

/// Assertions re-check the page under the `assertion` schedule before
/// failing, so a page that is still settling does not fail them.
impl<D: BrowserDriver> BrowserSession<D> {
    fn assert_with(
        &mut self,
        retry_on: &[ErrorKind],
        mut check: impl FnMut(&mut Self) -> Result<()>,
    ) -> Result<&mut Self> {
        let policy = self.policy(OperationKind::Assertion, retry_on)?;
        policy.run(|| check(self))?;
        Ok(self)
    }

    pub fn validate_present(&mut self, selector: impl IntoSelector) -> Result<&mut Self> {
        let selector = selector.into_selector()?;
        self.assert_with(OperationKind::Assertion.default_retry_on(), |s| {
            if s.present_now(&selector)? {
                Ok(())
            } else {
                Err(failed(format!(
                    "{} is not present on page, when it should be",
                    selector
                )))
            }
        })
    }

    pub fn validate_not_present(&mut self, selector: impl IntoSelector) -> Result<&mut Self> {
        let selector = selector.into_selector()?;
        self.assert_with(OperationKind::Assertion.default_retry_on(), |s| {
            if s.present_now(&selector)? {
                Err(failed(format!(
                    "{} is present on page, when it should not be",
                    selector
                )))
            } else {
                Ok(())
            }
        })
    }

    pub fn validate_text(&mut self, selector: impl IntoSelector, expected: &str) -> Result<&mut Self> {
        let selector = selector.into_selector()?;
        self.assert_with(CHECKED_RETRY_ON, |s| {
            let actual = s
                .text_once(&selector, TextAccess::Get)?
                .unwrap_or_default();
            if actual == expected {
                Ok(())
            } else {
                Err(failed(format!(
                    "{} text does not equal '{}' (actual: '{}')",
                    selector, expected, actual
                )))
            }
        })
    }

    pub fn validate_text_not(&mut self, selector: impl IntoSelector, unexpected: &str) -> Result<&mut Self> {
        let selector = selector.into_selector()?;
        self.assert_with(CHECKED_RETRY_ON, |s| {
            let actual = s
                .text_once(&selector, TextAccess::Get)?
                .unwrap_or_default();
            if actual == unexpected {
                Err(failed(format!(
                    "{} text does equal '{}', when it should not",
                    selector, unexpected
                )))
            } else {
                Ok(())
            }
        })
    }

    pub fn validate_source_contains(&mut self, text: &str) -> Result<&mut Self> {
        self.assert_with(OperationKind::Assertion.default_retry_on(), |s| {
            if s.page_source()?.contains(text) {
                Ok(())
            } else {
                Err(failed(format!(
                    "{} is not in page source, when it should be",
                    text
                )))
            }
        })
    }

    pub fn validate_source_not_contains(&mut self, text: &str) -> Result<&mut Self> {
        self.assert_with(OperationKind::Assertion.default_retry_on(), |s| {
            if s.page_source()?.contains(text) {
                Err(failed(format!(
                    "{} is in page source, when it should not be",
                    text
                )))
            } else {
                Ok(())
            }
        })
    }

    pub fn validate_checked(&mut self, selector: impl IntoSelector) -> Result<&mut Self> {
        let selector = selector.into_selector()?;
        self.assert_with(CHECKED_RETRY_ON, |s| {
            if s.checked_once(&selector)? {
                Ok(())
            } else {
                Err(failed(format!("{} is not checked, when it should be", selector)))
            }
        })
    }

    pub fn validate_unchecked(&mut self, selector: impl IntoSelector) -> Result<&mut Self> {
        let selector = selector.into_selector()?;
        self.assert_with(CHECKED_RETRY_ON, |s| {
            if s.checked_once(&selector)? {
                Err(failed(format!(
                    "{} is checked, when it should not be",
                    selector
                )))
            } else {
                Ok(())
            }
        })
    }
}
