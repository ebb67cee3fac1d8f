//! Element and browser capability facades.
//!
//! These traits are the narrow seam between the polling core and the
//! browser driver. The core consumes them and never implements them; the
//! surrounding framework supplies real implementations backed by a driver
//! session, and [`crate::mock`] supplies scripted ones for tests.
//!
//! Staleness is a first-class signal: a facade call on an element whose DOM
//! node is gone returns [`FacadeError::Stale`] instead of panicking, so the
//! core can detect it and re-acquire.

use crate::locator::Selector;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Shared handle to an element supplied by the facade.
pub type ElementRef = Arc<dyn Element>;

/// Shared handle to the browser session facade.
pub type BrowserRef = Arc<dyn Browser>;

/// Result type for facade operations
pub type FacadeResult<T> = Result<T, FacadeError>;

/// Identifier of an iframe context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId(String);

impl FrameId {
    /// Create a frame identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a click delivered through the facade.
///
/// `NotInteractable` is a value, not an error: the acquisition workaround
/// treats it as expected transient noise, and modeling it as data keeps that
/// branch testable without simulating driver exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The click was delivered to the element
    Clicked,
    /// The driver reported the element as not interactable
    NotInteractable,
}

/// Errors surfaced by the element/browser facade
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FacadeError {
    /// The element reference no longer maps to a live DOM node
    #[error("stale element reference")]
    Stale,
    /// Any other driver-level failure
    #[error("driver error: {0}")]
    Driver(String),
}

/// Capabilities of a located element.
///
/// Implementations are expected to be cheap handles onto driver state; the
/// core calls these methods repeatedly inside polling loops.
pub trait Element {
    /// Whether the element is currently displayed.
    ///
    /// With `recheck` set, the implementation should re-resolve the element
    /// before answering rather than trust a cached node.
    fn is_displayed(&self, recheck: bool) -> FacadeResult<bool>;

    /// Whether the element is enabled for interaction
    fn is_enabled(&self) -> FacadeResult<bool>;

    /// Visible text content.
    ///
    /// With `recovery` set, the implementation may retry internally on
    /// transient read failures.
    fn text(&self, recovery: bool) -> FacadeResult<String>;

    /// Value of the named attribute, `None` when absent
    fn attribute(&self, name: &str) -> FacadeResult<Option<String>>;

    /// Click the element
    fn click(&self) -> FacadeResult<ClickOutcome>;

    /// Find a descendant of this element
    fn find(&self, selector: &Selector) -> Option<ElementRef>;

    /// The iframe this element lives in, `None` for top-level content
    fn frame(&self) -> Option<FrameId>;

    /// Short human-readable description for logs and error messages
    fn describe(&self) -> String {
        "element".to_string()
    }
}

/// Capabilities of the browser session.
pub trait Browser {
    /// Find the first element matching the selector, if any
    fn find_element(&self, selector: &Selector) -> Option<ElementRef>;

    /// Find all elements matching the selector, in DOM order.
    ///
    /// `timeout_secs` bounds how long the driver may spend resolving the
    /// query; `0.0` asks for a single immediate scan.
    fn find_elements(&self, selector: &Selector, timeout_secs: f64) -> Vec<ElementRef>;

    /// Switch the session context into the given iframe
    fn select_frame(&self, frame: &FrameId);

    /// Reset the session context to top-level content
    fn reset_frame(&self);

    /// Dismiss any pending browser alerts, returning how many were purged.
    ///
    /// `context` is a free-form label for diagnostics.
    fn purge_alerts(&self, context: &str) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id() {
        let frame = FrameId::new("editor");
        assert_eq!(frame.as_str(), "editor");
        assert_eq!(format!("{frame}"), "editor");
        assert_eq!(frame, FrameId::new("editor"));
        assert_ne!(frame, FrameId::new("other"));
    }

    #[test]
    fn test_click_outcome_is_value_not_error() {
        let outcome: FacadeResult<ClickOutcome> = Ok(ClickOutcome::NotInteractable);
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_facade_error_display() {
        assert_eq!(FacadeError::Stale.to_string(), "stale element reference");
        assert_eq!(
            FacadeError::Driver("session lost".into()).to_string(),
            "driver error: session lost"
        );
    }
}
