//! Result and error types for Esperar.
//!
//! The taxonomy splits into retryable conditions (a wait expired, a control
//! was not enabled yet) and fatal ones (an impossible dialog count, a
//! missing hook). An enclosing retry layer is expected to re-attempt the
//! whole operation on the retryable categories and let the fatal ones
//! propagate; [`EsperarError::is_retryable`] encodes that classification.

use crate::facade::{FacadeError, FrameId};
use crate::locator::Selector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for Esperar operations
pub type EsperarResult<T> = Result<T, EsperarError>;

/// Back-reference to the dialog an error originated from.
///
/// Enough for a caller to correlate the failure with its page object, log
/// it, or rebuild a handle for cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogRef {
    /// Locator the dialog is acquired with
    pub locator: Selector,
    /// Frame the dialog lives in, `None` for top-level content
    pub frame: Option<FrameId>,
}

impl std::fmt::Display for DialogRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.frame {
            Some(frame) => write!(f, "dialog '{}' in frame '{frame}'", self.locator),
            None => write!(f, "dialog '{}'", self.locator),
        }
    }
}

/// Errors that can occur in Esperar
#[derive(Debug, Error)]
pub enum EsperarError {
    /// A condition never reached the wanted value within the allotted time
    #[error("{message}")]
    WaitTimeout {
        /// Description of the condition that was waited on
        condition: String,
        /// Wall-clock time spent waiting, in milliseconds
        elapsed_ms: u64,
        /// Dialog the wait belonged to, when there was one
        dialog: Option<DialogRef>,
        /// Full failure message, built by the condition's message hook
        message: String,
    },

    /// An action was attempted on a control that is not enabled
    #[error("control '{control}' is not enabled")]
    NotEnabled {
        /// Description of the disabled control
        control: String,
        /// Dialog the control belongs to, for caller-side cancellation
        dialog: Option<DialogRef>,
    },

    /// The number of simultaneously visible dialogs cannot be reconciled.
    ///
    /// Signals a product or page defect, not transient flakiness.
    #[error("expected exactly {expected} open dialog(s) matching '{locator}', found {found}")]
    AmbiguousDialogCount {
        /// How many dialogs were expected at the decision point
        expected: usize,
        /// How many were actually visible
        found: usize,
        /// Locator the count was taken against
        locator: String,
    },

    /// A required hook was never supplied (programmer error)
    #[error("missing implementation: {what}")]
    MissingImplementation {
        /// What should have been supplied
        what: String,
    },

    /// Error surfaced by the element/browser facade
    #[error("facade error: {0}")]
    Facade(#[from] FacadeError),

    /// Invalid pattern supplied for a regex text match
    #[error("invalid text pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl EsperarError {
    /// Whether an enclosing retry layer may re-attempt the whole operation.
    ///
    /// Expired waits and not-yet-enabled controls are transient; impossible
    /// dialog counts and missing hooks are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::WaitTimeout { .. } | Self::NotEnabled { .. }
        )
    }

    /// The dialog back-reference carried by this error, if any
    #[must_use]
    pub fn dialog(&self) -> Option<&DialogRef> {
        match self {
            Self::WaitTimeout { dialog, .. } | Self::NotEnabled { dialog, .. } => dialog.as_ref(),
            _ => None,
        }
    }

    /// Attach a dialog back-reference to a timeout or not-enabled error.
    ///
    /// Other variants pass through unchanged.
    #[must_use]
    pub fn with_dialog(self, dialog_ref: DialogRef) -> Self {
        match self {
            Self::WaitTimeout {
                condition,
                elapsed_ms,
                message,
                ..
            } => Self::WaitTimeout {
                condition,
                elapsed_ms,
                dialog: Some(dialog_ref),
                message,
            },
            Self::NotEnabled { control, .. } => Self::NotEnabled {
                control,
                dialog: Some(dialog_ref),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ref() -> DialogRef {
        DialogRef {
            locator: Selector::css("div.modal"),
            frame: Some(FrameId::new("editor")),
        }
    }

    #[test]
    fn test_retryable_classification() {
        let timeout = EsperarError::WaitTimeout {
            condition: "c".into(),
            elapsed_ms: 10,
            dialog: None,
            message: "m".into(),
        };
        let not_enabled = EsperarError::NotEnabled {
            control: "ok button".into(),
            dialog: None,
        };
        let ambiguous = EsperarError::AmbiguousDialogCount {
            expected: 1,
            found: 3,
            locator: "css=div.modal".into(),
        };
        let missing = EsperarError::MissingImplementation {
            what: "cancel control".into(),
        };

        assert!(timeout.is_retryable());
        assert!(not_enabled.is_retryable());
        assert!(!ambiguous.is_retryable());
        assert!(!missing.is_retryable());
        assert!(!EsperarError::Facade(FacadeError::Stale).is_retryable());
    }

    #[test]
    fn test_dialog_ref_display() {
        assert_eq!(
            sample_ref().to_string(),
            "dialog 'css=div.modal' in frame 'editor'"
        );
        let top = DialogRef {
            locator: Selector::css("div.modal"),
            frame: None,
        };
        assert_eq!(top.to_string(), "dialog 'css=div.modal'");
    }

    #[test]
    fn test_with_dialog_attaches_backref() {
        let err = EsperarError::WaitTimeout {
            condition: "c".into(),
            elapsed_ms: 10,
            dialog: None,
            message: "m".into(),
        }
        .with_dialog(sample_ref());
        assert_eq!(err.dialog(), Some(&sample_ref()));

        let err = EsperarError::NotEnabled {
            control: "ok".into(),
            dialog: None,
        }
        .with_dialog(sample_ref());
        assert_eq!(err.dialog(), Some(&sample_ref()));
    }

    #[test]
    fn test_with_dialog_leaves_fatal_variants_alone() {
        let err = EsperarError::MissingImplementation {
            what: "hook".into(),
        }
        .with_dialog(sample_ref());
        assert!(err.dialog().is_none());
        assert!(matches!(err, EsperarError::MissingImplementation { .. }));
    }

    #[test]
    fn test_ambiguous_count_display() {
        let err = EsperarError::AmbiguousDialogCount {
            expected: 0,
            found: 2,
            locator: "css=div.modal".into(),
        };
        assert_eq!(
            err.to_string(),
            "expected exactly 0 open dialog(s) matching 'css=div.modal', found 2"
        );
    }
}
