use crate::errors::{BrowserError, Result};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Strategy used to locate elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorKind {
    Css,
    Id,
    Name,
    Class,
    Link,
    XPath,
}

impl SelectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorKind::Css => "css",
            SelectorKind::Id => "id",
            SelectorKind::Name => "name",
            SelectorKind::Class => "class",
            SelectorKind::Link => "link",
            SelectorKind::XPath => "xpath",
        }
    }
}

impl FromStr for SelectorKind {
    type Err = BrowserError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "css" => Ok(SelectorKind::Css),
            "id" => Ok(SelectorKind::Id),
            "name" => Ok(SelectorKind::Name),
            "class" => Ok(SelectorKind::Class),
            "link" => Ok(SelectorKind::Link),
            "xpath" => Ok(SelectorKind::XPath),
            other => Err(BrowserError::UnsupportedSelectorKind(other.to_string())),
        }
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized `(kind, value)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    kind: SelectorKind,
    value: String,
}

impl Selector {
    pub fn new(kind: SelectorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self::new(SelectorKind::Css, value)
    }

    /// Builds a selector from a kind name, case-insensitively.
    pub fn parse(kind: &str, value: impl Into<String>) -> Result<Self> {
        let kind = kind.to_lowercase().parse()?;
        Ok(Self::new(kind, value))
    }

    pub fn kind(&self) -> SelectorKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// The value handed to the driver. Id lookups accept `#main` as well as `main`.
    pub fn query(&self) -> &str {
        match self.kind {
            SelectorKind::Id => self.value.trim_matches('#'),
            _ => &self.value,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.value)
    }
}

/// Anything a session accepts where an element has to be located.
///
/// Bare strings are CSS; pairs are `(kind, value)` with the kind matched
/// case-insensitively.
pub trait IntoSelector {
    fn into_selector(self) -> Result<Selector>;
}

impl IntoSelector for Selector {
    fn into_selector(self) -> Result<Selector> {
        Ok(self)
    }
}

impl IntoSelector for &Selector {
    fn into_selector(self) -> Result<Selector> {
        Ok(self.clone())
    }
}

impl IntoSelector for &str {
    fn into_selector(self) -> Result<Selector> {
        Ok(Selector::css(self))
    }
}

impl IntoSelector for String {
    fn into_selector(self) -> Result<Selector> {
        Ok(Selector::css(self))
    }
}

impl IntoSelector for &String {
    fn into_selector(self) -> Result<Selector> {
        Ok(Selector::css(self.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> IntoSelector for (K, V) {
    fn into_selector(self) -> Result<Selector> {
        Selector::parse(self.0.as_ref(), self.1)
    }
}

impl<S: AsRef<str>> IntoSelector for &[S] {
    fn into_selector(self) -> Result<Selector> {
        match self {
            [kind, value] => Selector::parse(kind.as_ref(), value.as_ref()),
            other => Err(BrowserError::InvalidSelectorShape(format!(
                "expected a (select_by, select_value) pair, got {} parts",
                other.len()
            ))),
        }
    }
}

impl<S: AsRef<str>> IntoSelector for Vec<S> {
    fn into_selector(self) -> Result<Selector> {
        self.as_slice().into_selector()
    }
}

/// Selectors read from JSON scripts or configuration.
impl IntoSelector for &Value {
    fn into_selector(self) -> Result<Selector> {
        match self {
            Value::String(css) => Ok(Selector::css(css.as_str())),
            Value::Array(parts) => match parts.as_slice() {
                [Value::String(kind), Value::String(value)] => {
                    Selector::parse(kind, value.as_str())
                }
                _ => Err(shape_error(self)),
            },
            _ => Err(shape_error(self)),
        }
    }
}

impl IntoSelector for Value {
    fn into_selector(self) -> Result<Selector> {
        (&self).into_selector()
    }
}

fn shape_error(value: &Value) -> BrowserError {
    BrowserError::InvalidSelectorShape(format!(
        "selector must be a string or [select_by, select_value], got {}",
        value
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_bare_string_is_css() {
        let selector = "div.foo".into_selector().unwrap();
        assert_eq!(selector.kind(), SelectorKind::Css);
        assert_eq!(selector.value(), "div.foo");
        assert_eq!(selector.to_string(), "css(div.foo)");
    }

    #[test]
    fn test_pair_kind_is_lowercased() {
        let selector = ("ID", "main").into_selector().unwrap();
        assert_eq!(selector, Selector::new(SelectorKind::Id, "main"));

        let selector = ("XPath".to_string(), "//a".to_string())
            .into_selector()
            .unwrap();
        assert_eq!(selector.kind(), SelectorKind::XPath);
    }

    #[test]
    fn test_id_query_strips_hash() {
        let selector = ("id", "#main").into_selector().unwrap();
        assert_eq!(selector.query(), "main");
        assert_eq!(selector.to_string(), "id(#main)");

        let css = "#main".into_selector().unwrap();
        assert_eq!(css.query(), "#main");
    }

    #[test]
    fn test_unknown_kind() {
        let err = ("tag", "div").into_selector().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedSelectorKind);
    }

    #[test]
    fn test_bad_shapes() {
        let three: &[&str] = &["css", "div", "extra"];
        assert_eq!(
            three.into_selector().unwrap_err().kind(),
            ErrorKind::InvalidSelectorShape
        );
        assert_eq!(
            json!(42).into_selector().unwrap_err().kind(),
            ErrorKind::InvalidSelectorShape
        );
        assert_eq!(
            json!({"css": "div"}).into_selector().unwrap_err().kind(),
            ErrorKind::InvalidSelectorShape
        );
        assert_eq!(
            json!(["css"]).into_selector().unwrap_err().kind(),
            ErrorKind::InvalidSelectorShape
        );
    }

    #[test]
    fn test_json_shapes() {
        assert_eq!(
            json!("p.intro").into_selector().unwrap(),
            Selector::css("p.intro")
        );
        assert_eq!(
            json!(["NAME", "q"]).into_selector().unwrap(),
            Selector::new(SelectorKind::Name, "q")
        );
        assert_eq!(
            vec!["link", "Home"].into_selector().unwrap(),
            Selector::new(SelectorKind::Link, "Home")
        );
    }
}
