//! Selector value type for element lookup.
//!
//! Locator string *building* belongs to the surrounding framework; the core
//! only needs an equality-comparable, printable selector value it can hand
//! to the browser facade, plus the generic dialog-role fallback used by the
//! acquisition workaround.

use serde::{Deserialize, Serialize};

/// Selector for locating elements through the browser facade.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    /// CSS selector (e.g., `div.modal`)
    Css(String),
    /// XPath selector
    XPath(String),
    /// Test ID selector (`data-testid` attribute)
    TestId(String),
    /// ARIA role selector (e.g., `dialog`)
    Role(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an XPath selector
    #[must_use]
    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::XPath(selector.into())
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Create an ARIA role selector
    #[must_use]
    pub fn role(role: impl Into<String>) -> Self {
        Self::Role(role.into())
    }

    /// The generic selector matching any ARIA dialog.
    ///
    /// Last-resort fallback when a configured dialog locator finds nothing
    /// after two click attempts.
    #[must_use]
    pub fn dialog_role() -> Self {
        Self::Role("dialog".into())
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={s}"),
            Self::XPath(s) => write!(f, "xpath={s}"),
            Self::TestId(s) => write!(f, "testid={s}"),
            Self::Role(s) => write!(f, "role={s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_constructors() {
        assert_eq!(Selector::css("div.modal"), Selector::Css("div.modal".into()));
        assert_eq!(Selector::xpath("//div"), Selector::XPath("//div".into()));
        assert_eq!(Selector::test_id("save"), Selector::TestId("save".into()));
        assert_eq!(Selector::role("dialog"), Selector::Role("dialog".into()));
    }

    #[test]
    fn test_dialog_role_fallback() {
        assert_eq!(Selector::dialog_role(), Selector::Role("dialog".into()));
    }

    #[test]
    fn test_selector_display() {
        assert_eq!(format!("{}", Selector::css("div.modal")), "css=div.modal");
        assert_eq!(format!("{}", Selector::xpath("//div")), "xpath=//div");
        assert_eq!(format!("{}", Selector::test_id("ok")), "testid=ok");
        assert_eq!(format!("{}", Selector::dialog_role()), "role=dialog");
    }

    #[test]
    fn test_selector_equality() {
        assert_eq!(Selector::css("a"), Selector::css("a"));
        assert_ne!(Selector::css("a"), Selector::xpath("a"));
    }
}
