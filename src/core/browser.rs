use crate::dom::SelectorKind;
use crate::errors::{BrowserError, Result};
use std::fmt;
use std::str::FromStr;

/// Capabilities a browser backend has to provide to drive a session.
///
/// Element handles are only valid for the duration of one session
/// operation; sessions never hold on to them.
pub trait BrowserDriver {
    type Element: Clone + fmt::Debug;

    /// Load a URL in the current window.
    fn navigate(&mut self, url: &str) -> Result<()>;

    /// All elements matching the query in document order. An empty result is not an error.
    fn find_all(&mut self, kind: SelectorKind, query: &str) -> Result<Vec<Self::Element>>;

    /// Lowercase tag name of the element.
    fn tag_name(&mut self, element: &Self::Element) -> Result<String>;

    fn click(&mut self, element: &Self::Element) -> Result<()>;

    fn clear(&mut self, element: &Self::Element) -> Result<()>;

    fn send_text(&mut self, element: &Self::Element, text: &str) -> Result<()>;

    /// Property or attribute value, `None` when the element has neither.
    fn attribute(&mut self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    /// Rendered text content.
    fn text(&mut self, element: &Self::Element) -> Result<String>;

    /// Checked state for checkboxes and radios, selected state for options.
    fn is_selected(&mut self, element: &Self::Element) -> Result<bool>;

    /// `<option>` elements of a select control, in document order.
    fn options(&mut self, select: &Self::Element) -> Result<Vec<Self::Element>>;

    fn window_handles(&mut self) -> Result<Vec<String>>;

    fn current_window(&mut self) -> Result<String>;

    fn switch_to_window(&mut self, handle: &str) -> Result<()>;

    fn title(&mut self) -> Result<String>;

    fn current_url(&mut self) -> Result<String>;

    /// Close the current window. The driver is left without a current window
    /// until the caller switches to another one.
    fn close_window(&mut self) -> Result<()>;

    fn switch_to_frame(&mut self, frame: &FrameRef) -> Result<()>;

    fn switch_to_default_content(&mut self) -> Result<()>;

    fn accept_alert(&mut self) -> Result<()>;

    fn dismiss_alert(&mut self) -> Result<()>;

    fn authenticate_alert(&mut self, username: &str, password: &str) -> Result<()>;

    fn page_source(&mut self) -> Result<String>;

    /// Terminate the browser process. Called exactly once per session.
    fn quit(&mut self) -> Result<()>;
}

/// A frame addressed by its position among the current document's frames, or
/// by the frame element's `id`/`name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameRef {
    Index(usize),
    Name(String),
}

impl From<usize> for FrameRef {
    fn from(index: usize) -> Self {
        FrameRef::Index(index)
    }
}

impl From<&str> for FrameRef {
    fn from(name: &str) -> Self {
        FrameRef::Name(name.to_string())
    }
}

impl From<String> for FrameRef {
    fn from(name: String) -> Self {
        FrameRef::Name(name)
    }
}

impl fmt::Display for FrameRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameRef::Index(index) => write!(f, "#{}", index),
            FrameRef::Name(name) => f.write_str(name),
        }
    }
}

/// Browser families a session can be asked for by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserKind {
    Chrome,
    Chromium,
    Firefox,
    Android,
    Edge,
    Ie,
    Opera,
    PhantomJs,
    Safari,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "chrome",
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Android => "android",
            BrowserKind::Edge => "edge",
            BrowserKind::Ie => "ie",
            BrowserKind::Opera => "opera",
            BrowserKind::PhantomJs => "phantomjs",
            BrowserKind::Safari => "safari",
        }
    }
}

impl FromStr for BrowserKind {
    type Err = BrowserError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "chrome" => Ok(BrowserKind::Chrome),
            "chromium" => Ok(BrowserKind::Chromium),
            "firefox" => Ok(BrowserKind::Firefox),
            "android" => Ok(BrowserKind::Android),
            "edge" => Ok(BrowserKind::Edge),
            "ie" => Ok(BrowserKind::Ie),
            "opera" => Ok(BrowserKind::Opera),
            "phantomjs" => Ok(BrowserKind::PhantomJs),
            "safari" => Ok(BrowserKind::Safari),
            other => Err(BrowserError::UnsupportedBrowser(other.to_string())),
        }
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_browser_kind_parsing() {
        assert_eq!("Chrome".parse::<BrowserKind>().unwrap(), BrowserKind::Chrome);
        assert_eq!(" firefox ".parse::<BrowserKind>().unwrap(), BrowserKind::Firefox);
        assert_eq!(
            "netscape".parse::<BrowserKind>().unwrap_err().kind(),
            ErrorKind::UnsupportedBrowser
        );
    }

    #[test]
    fn test_frame_ref_conversions() {
        assert_eq!(FrameRef::from(2), FrameRef::Index(2));
        assert_eq!(FrameRef::from("login"), FrameRef::Name("login".into()));
        assert_eq!(FrameRef::Index(0).to_string(), "#0");
    }
}
