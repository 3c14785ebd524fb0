use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Browser '{0}' not supported! (Yet?)")]
    UnsupportedBrowser(String),

    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("select_by '{0}' not supported! (Yet?)")]
    UnsupportedSelectorKind(String),

    #[error("Invalid selector: {0}")]
    InvalidSelectorShape(String),

    #[error("{0}")]
    NoSuchElement(String),

    #[error("{0}")]
    NoSuchWindow(String),

    #[error("{0}")]
    NoSuchFrame(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("{0}")]
    AssertionFailed(String),

    #[error("Alert option '{0}' not supported! (Yet?)")]
    UnsupportedAlertAction(String),

    #[error("Invalid retry schedule: {0}")]
    InvalidRetrySchedule(String),

    #[error("Invalid window pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Session has already been closed")]
    SessionClosed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BrowserError>;

/// Coarse classification of a [`BrowserError`], used to decide what a
/// [`RetryPolicy`](crate::retry::RetryPolicy) may re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedBrowser,
    LaunchFailed,
    UnsupportedSelectorKind,
    InvalidSelectorShape,
    NoSuchElement,
    NoSuchWindow,
    NoSuchFrame,
    Driver,
    AssertionFailed,
    UnsupportedAlertAction,
    InvalidRetrySchedule,
    InvalidPattern,
    SessionClosed,
    Config,
}

impl ErrorKind {
    /// Transient kinds describe page state that may change on its own.
    /// Everything else is a programming or configuration mistake.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::NoSuchElement
                | ErrorKind::NoSuchWindow
                | ErrorKind::NoSuchFrame
                | ErrorKind::Driver
                | ErrorKind::AssertionFailed
        )
    }
}

impl BrowserError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrowserError::UnsupportedBrowser(_) => ErrorKind::UnsupportedBrowser,
            BrowserError::LaunchFailed(_) => ErrorKind::LaunchFailed,
            BrowserError::UnsupportedSelectorKind(_) => ErrorKind::UnsupportedSelectorKind,
            BrowserError::InvalidSelectorShape(_) => ErrorKind::InvalidSelectorShape,
            BrowserError::NoSuchElement(_) => ErrorKind::NoSuchElement,
            BrowserError::NoSuchWindow(_) => ErrorKind::NoSuchWindow,
            BrowserError::NoSuchFrame(_) => ErrorKind::NoSuchFrame,
            BrowserError::Driver(_) => ErrorKind::Driver,
            BrowserError::AssertionFailed(_) => ErrorKind::AssertionFailed,
            BrowserError::UnsupportedAlertAction(_) => ErrorKind::UnsupportedAlertAction,
            BrowserError::InvalidRetrySchedule(_) => ErrorKind::InvalidRetrySchedule,
            BrowserError::InvalidPattern(_) => ErrorKind::InvalidPattern,
            BrowserError::SessionClosed => ErrorKind::SessionClosed,
            BrowserError::Config(_)
            | BrowserError::SerializationError(_)
            | BrowserError::IoError(_) => ErrorKind::Config,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }
}

// Backend errors arrive as anyhow::Error from headless_chrome
impl From<anyhow::Error> for BrowserError {
    fn from(err: anyhow::Error) -> Self {
        BrowserError::Driver(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BrowserError::NoSuchElement("x".into()).is_transient());
        assert!(BrowserError::NoSuchWindow("x".into()).is_transient());
        assert!(BrowserError::NoSuchFrame("x".into()).is_transient());
        assert!(BrowserError::Driver("x".into()).is_transient());
        assert!(BrowserError::AssertionFailed("x".into()).is_transient());

        assert!(!BrowserError::UnsupportedBrowser("x".into()).is_transient());
        assert!(!BrowserError::UnsupportedSelectorKind("x".into()).is_transient());
        assert!(!BrowserError::InvalidSelectorShape("x".into()).is_transient());
        assert!(!BrowserError::UnsupportedAlertAction("x".into()).is_transient());
        assert!(!BrowserError::SessionClosed.is_transient());
    }

    #[test]
    fn test_anyhow_maps_to_driver() {
        let err: BrowserError = anyhow::anyhow!("websocket closed").into();
        assert_eq!(err.kind(), ErrorKind::Driver);
        assert_eq!(err.to_string(), "Driver error: websocket closed");
    }

    #[test]
    fn test_messages_are_passed_through() {
        let err = BrowserError::AssertionFailed("css(#a) is not checked".into());
        assert_eq!(err.to_string(), "css(#a) is not checked");

        let err = BrowserError::UnsupportedBrowser("netscape".into());
        assert_eq!(err.to_string(), "Browser 'netscape' not supported! (Yet?)");
    }
}
