//! Condition specializations over facade elements.
//!
//! Each specialization only supplies the evaluation and its label; the
//! wait loop itself lives in [`crate::timeout`] and is never duplicated
//! here. A facade error during evaluation counts as "condition not met",
//! except for [`Stale`] and [`Gone`], for which the stale signal *is* the
//! condition.

use crate::facade::{ElementRef, FacadeError};
use crate::result::EsperarResult;
use crate::timeout::Condition;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

/// Element is displayed
pub struct Displayed {
    element: ElementRef,
    recheck: bool,
}

impl Displayed {
    /// Condition on the given element, rechecking the node on every poll
    #[must_use]
    pub fn new(element: ElementRef) -> Self {
        Self {
            element,
            recheck: true,
        }
    }

    /// Set whether the node is re-resolved on every poll
    #[must_use]
    pub fn with_recheck(mut self, recheck: bool) -> Self {
        self.recheck = recheck;
        self
    }
}

impl Condition for Displayed {
    fn check(&self) -> bool {
        self.element.is_displayed(self.recheck).unwrap_or(false)
    }

    fn describe(&self) -> String {
        format!("{} is displayed", self.element.describe())
    }
}

/// Element is enabled for interaction
pub struct Enabled {
    element: ElementRef,
}

impl Enabled {
    /// Condition on the given element
    #[must_use]
    pub fn new(element: ElementRef) -> Self {
        Self { element }
    }
}

impl Condition for Enabled {
    fn check(&self) -> bool {
        self.element.is_enabled().unwrap_or(false)
    }

    fn describe(&self) -> String {
        format!("{} is enabled", self.element.describe())
    }
}

/// Element reference no longer maps to a live DOM node
pub struct Stale {
    element: ElementRef,
}

impl Stale {
    /// Condition on the given element
    #[must_use]
    pub fn new(element: ElementRef) -> Self {
        Self { element }
    }
}

impl Condition for Stale {
    fn check(&self) -> bool {
        matches!(self.element.is_displayed(true), Err(FacadeError::Stale))
    }

    fn describe(&self) -> String {
        format!("{} is stale", self.element.describe())
    }
}

/// Element is stale or no longer displayed.
///
/// The close path waits on this: a dialog counts as closed whether its
/// node was removed or merely hidden.
pub struct Gone {
    element: ElementRef,
}

impl Gone {
    /// Condition on the given element
    #[must_use]
    pub fn new(element: ElementRef) -> Self {
        Self { element }
    }
}

impl Condition for Gone {
    fn check(&self) -> bool {
        match self.element.is_displayed(true) {
            Ok(displayed) => !displayed,
            Err(FacadeError::Stale) => true,
            Err(_) => false,
        }
    }

    fn describe(&self) -> String {
        format!("{} is gone", self.element.describe())
    }
}

/// How element text is compared against the expected value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextMatch {
    /// Exact equality
    Equals,
    /// Text starts with the expected value
    StartsWith,
    /// Text ends with the expected value
    EndsWith,
    /// Text contains the expected value
    Contains,
    /// Text matches the expected value as a regular expression
    Regex,
    /// Both sides parse as JSON and compare structurally equal
    Structural,
}

impl TextMatch {
    /// Verb used in condition descriptions
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::StartsWith => "starts with",
            Self::EndsWith => "ends with",
            Self::Contains => "contains",
            Self::Regex => "matches regex",
            Self::Structural => "structurally equals",
        }
    }
}

/// Element text matches an expected value under a [`TextMatch`] mode.
///
/// Records the last observed text and dumps it in the failure message, so
/// an expired wait can be diagnosed from the log alone.
pub struct Text {
    element: ElementRef,
    mode: TextMatch,
    expected: String,
    pattern: Option<Regex>,
    recovery: bool,
    last_seen: Mutex<Option<String>>,
}

impl Text {
    /// Condition comparing the element's text under the given mode.
    ///
    /// Fails only for [`TextMatch::Regex`] with an invalid pattern.
    pub fn new(
        element: ElementRef,
        mode: TextMatch,
        expected: impl Into<String>,
    ) -> EsperarResult<Self> {
        let expected = expected.into();
        let pattern = match mode {
            TextMatch::Regex => Some(Regex::new(&expected)?),
            _ => None,
        };
        Ok(Self {
            element,
            mode,
            expected,
            pattern,
            recovery: true,
            last_seen: Mutex::new(None),
        })
    }

    /// Exact-equality text condition
    #[must_use]
    pub fn equals(element: ElementRef, expected: impl Into<String>) -> Self {
        Self::infallible(element, TextMatch::Equals, expected)
    }

    /// Substring text condition
    #[must_use]
    pub fn contains(element: ElementRef, expected: impl Into<String>) -> Self {
        Self::infallible(element, TextMatch::Contains, expected)
    }

    /// Set whether text reads use the facade's internal retry
    #[must_use]
    pub fn with_recovery(mut self, recovery: bool) -> Self {
        self.recovery = recovery;
        self
    }

    fn infallible(element: ElementRef, mode: TextMatch, expected: impl Into<String>) -> Self {
        Self {
            element,
            mode,
            expected: expected.into(),
            pattern: None,
            recovery: true,
            last_seen: Mutex::new(None),
        }
    }

    fn matches(&self, actual: &str) -> bool {
        match self.mode {
            TextMatch::Equals => actual == self.expected,
            TextMatch::StartsWith => actual.starts_with(&self.expected),
            TextMatch::EndsWith => actual.ends_with(&self.expected),
            TextMatch::Contains => actual.contains(&self.expected),
            TextMatch::Regex => self
                .pattern
                .as_ref()
                .is_some_and(|pattern| pattern.is_match(actual)),
            TextMatch::Structural => {
                let actual = serde_json::from_str::<serde_json::Value>(actual);
                let expected = serde_json::from_str::<serde_json::Value>(&self.expected);
                matches!((actual, expected), (Ok(a), Ok(e)) if a == e)
            }
        }
    }
}

impl Condition for Text {
    fn check(&self) -> bool {
        match self.element.text(self.recovery) {
            Ok(actual) => {
                let hit = self.matches(&actual);
                if let Ok(mut last_seen) = self.last_seen.lock() {
                    *last_seen = Some(actual);
                }
                hit
            }
            Err(_) => false,
        }
    }

    fn describe(&self) -> String {
        format!(
            "{} text {} '{}'",
            self.element.describe(),
            self.mode.label(),
            self.expected
        )
    }

    fn failure_message(&self, still: bool, elapsed: Duration) -> String {
        let base = format!(
            "Condition '{}' was still {still} after {:.1} seconds, give up",
            self.describe(),
            elapsed.as_secs_f64()
        );
        let last_seen = self
            .last_seen
            .lock()
            .map(|last| last.clone())
            .unwrap_or(None);
        match last_seen {
            Some(text) => format!("{base}; last observed text was '{text}'"),
            None => format!("{base}; the text could never be read"),
        }
    }
}

/// Named attribute contains a needle
pub struct AttributeContains {
    element: ElementRef,
    name: String,
    needle: String,
}

impl AttributeContains {
    /// Condition on the given element's attribute
    #[must_use]
    pub fn new(
        element: ElementRef,
        name: impl Into<String>,
        needle: impl Into<String>,
    ) -> Self {
        Self {
            element,
            name: name.into(),
            needle: needle.into(),
        }
    }
}

impl Condition for AttributeContains {
    fn check(&self) -> bool {
        matches!(
            self.element.attribute(&self.name),
            Ok(Some(value)) if value.contains(&self.needle)
        )
    }

    fn describe(&self) -> String {
        format!(
            "{} attribute '{}' contains '{}'",
            self.element.describe(),
            self.name,
            self.needle
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockElement;
    use crate::result::EsperarError;

    mod displayed_tests {
        use super::*;

        #[test]
        fn test_displayed() {
            let element = MockElement::new("save button");
            let condition = Displayed::new(element.clone());
            assert!(condition.check());

            element.set_displayed(false);
            assert!(!condition.check());
        }

        #[test]
        fn test_stale_element_counts_as_not_displayed() {
            let element = MockElement::new("save button");
            element.set_stale(true);
            assert!(!Displayed::new(element).check());
        }

        #[test]
        fn test_describe_names_the_element() {
            let element = MockElement::new("save button");
            assert_eq!(
                Displayed::new(element).describe(),
                "save button is displayed"
            );
        }
    }

    mod enabled_tests {
        use super::*;

        #[test]
        fn test_enabled() {
            let element = MockElement::new("ok");
            let condition = Enabled::new(element.clone());
            assert!(condition.check());

            element.set_enabled(false);
            assert!(!condition.check());
        }
    }

    mod staleness_tests {
        use super::*;

        #[test]
        fn test_stale_condition() {
            let element = MockElement::new("dialog");
            let condition = Stale::new(element.clone());
            assert!(!condition.check());

            element.set_stale(true);
            assert!(condition.check());
        }

        #[test]
        fn test_gone_via_hidden() {
            let element = MockElement::new("dialog");
            let condition = Gone::new(element.clone());
            assert!(!condition.check());

            element.set_displayed(false);
            assert!(condition.check());
        }

        #[test]
        fn test_gone_via_stale() {
            let element = MockElement::new("dialog");
            element.set_stale(true);
            assert!(Gone::new(element).check());
        }
    }

    mod text_tests {
        use super::*;

        #[test]
        fn test_equals() {
            let element = MockElement::new("title");
            element.set_text("Save changes?");
            assert!(Text::equals(element.clone(), "Save changes?").check());
            assert!(!Text::equals(element, "Discard changes?").check());
        }

        #[test]
        fn test_starts_ends_contains() {
            let element = MockElement::new("title");
            element.set_text("Save changes?");
            let starts = Text::new(element.clone(), TextMatch::StartsWith, "Save").unwrap();
            let ends = Text::new(element.clone(), TextMatch::EndsWith, "changes?").unwrap();
            let contains = Text::contains(element, "change");
            assert!(starts.check());
            assert!(ends.check());
            assert!(contains.check());
        }

        #[test]
        fn test_regex() {
            let element = MockElement::new("counter");
            element.set_text("3 items selected");
            let condition =
                Text::new(element, TextMatch::Regex, r"^\d+ items? selected$").unwrap();
            assert!(condition.check());
        }

        #[test]
        fn test_invalid_regex_raises_pattern_error() {
            let element = MockElement::new("counter");
            let err = Text::new(element, TextMatch::Regex, "(unclosed").err().unwrap();
            assert!(matches!(err, EsperarError::Pattern(_)));
        }

        #[test]
        fn test_structural_ignores_json_formatting() {
            let element = MockElement::new("payload");
            element.set_text(r#"{ "a": 1, "b": [2, 3] }"#);
            let condition =
                Text::new(element, TextMatch::Structural, r#"{"b":[2,3],"a":1}"#).unwrap();
            assert!(condition.check());
        }

        #[test]
        fn test_structural_rejects_non_json() {
            let element = MockElement::new("payload");
            element.set_text("not json");
            let condition = Text::new(element, TextMatch::Structural, "not json").unwrap();
            assert!(!condition.check());
        }

        #[test]
        fn test_failure_message_dumps_last_observed_text() {
            let element = MockElement::new("title");
            element.set_text("Loading...");
            let condition = Text::equals(element, "Ready");
            assert!(!condition.check());
            let message = condition.failure_message(false, Duration::from_secs(5));
            assert!(message.contains("give up"));
            assert!(message.contains("last observed text was 'Loading...'"));
        }

        #[test]
        fn test_failure_message_when_text_never_readable() {
            let element = MockElement::new("title");
            element.set_stale(true);
            let condition = Text::equals(element, "Ready");
            assert!(!condition.check());
            let message = condition.failure_message(false, Duration::from_secs(5));
            assert!(message.contains("the text could never be read"));
        }
    }

    mod attribute_tests {
        use super::*;

        #[test]
        fn test_attribute_contains() {
            let element = MockElement::new("panel");
            element.set_attribute("class", "modal visible fade-in");
            let condition = AttributeContains::new(element.clone(), "class", "visible");
            assert!(condition.check());

            let missing = AttributeContains::new(element, "role", "dialog");
            assert!(!missing.check());
        }
    }
}
