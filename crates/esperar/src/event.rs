//! Dialog protocol events and observers.
//!
//! The protocol never writes diagnostics directly; it emits structured
//! events through an injected [`DialogObserver`]. The default observer
//! forwards to `tracing`, so a consumer gets sensible logs without wiring
//! anything; tests and tooling can inject a [`RecordingObserver`] and
//! assert on the exact sequence instead.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Observable moments of the dialog acquisition protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogEvent {
    /// An `open` call started for the locator
    OpenAttempt {
        /// Dialog locator
        locator: String,
    },
    /// The opening trigger was clicked
    TriggerClicked {
        /// Whether this was the workaround re-click
        workaround: bool,
    },
    /// The workaround re-click reported not-interactable; tolerated because
    /// the first click may have opened the dialog anyway
    NotInteractableTolerated {
        /// Description of the trigger control
        control: String,
    },
    /// First acquisition found nothing; the workaround re-click is engaged
    WorkaroundEngaged {
        /// Dialog locator that found nothing
        locator: String,
    },
    /// The dialog was only found through the generic role fallback; the
    /// configured locator is likely wrong
    FallbackMatch {
        /// Configured locator that found nothing
        configured: String,
        /// Fallback locator that matched
        fallback: String,
    },
    /// Visible dialogs were recounted during ambiguity resolution
    AmbiguityDetected {
        /// Number of simultaneously visible dialogs
        visible: usize,
    },
    /// The first match went stale and was replaced by a re-acquisition
    StaleFirstMatch {
        /// Dialog locator
        locator: String,
    },
    /// A spurious duplicate dialog was closed, keeping the second in DOM
    /// order
    DuplicateClosed {
        /// Dialog locator
        locator: String,
    },
    /// The dialog was bound and is open
    Opened {
        /// Dialog locator
        locator: String,
        /// Wall-clock time the open took, in milliseconds
        elapsed_ms: u64,
    },
    /// Pending browser alerts were purged after opening
    AlertsPurged {
        /// How many alerts were dismissed
        count: usize,
        /// Whether the purge took the dialog with it and a reopen follows
        reopening: bool,
    },
    /// A close was requested
    Closing {
        /// Whether the validate control is used (cancel otherwise)
        validate: bool,
    },
    /// The dialog is closed and unbound
    Closed {
        /// Dialog locator
        locator: String,
    },
}

/// Observer of dialog protocol events
pub trait DialogObserver {
    /// Receive one event
    fn notify(&self, event: &DialogEvent);
}

/// Default observer: forwards events to `tracing`.
///
/// Routine progress goes to debug, tolerated noise to warn, and the
/// likely-wrong-locator fallback to error so it is loud in any log setup.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DialogObserver for TracingObserver {
    fn notify(&self, event: &DialogEvent) {
        match event {
            DialogEvent::FallbackMatch {
                configured,
                fallback,
            } => {
                tracing::error!(
                    %configured,
                    %fallback,
                    "dialog only found via generic role fallback; configured locator is likely wrong"
                );
            }
            DialogEvent::NotInteractableTolerated { control } => {
                tracing::warn!(
                    %control,
                    "workaround click reported not-interactable; continuing, dialog may have opened from the first click"
                );
            }
            DialogEvent::WorkaroundEngaged { locator } => {
                tracing::warn!(%locator, "dialog not found after first click, re-clicking trigger");
            }
            DialogEvent::StaleFirstMatch { locator } => {
                tracing::warn!(%locator, "first dialog match went stale, re-acquiring");
            }
            DialogEvent::DuplicateClosed { locator } => {
                tracing::warn!(%locator, "closed spurious duplicate dialog, keeping the second");
            }
            DialogEvent::AlertsPurged { count, reopening } => {
                tracing::warn!(count, reopening, "purged pending alerts after dialog open");
            }
            other => {
                tracing::debug!(event = ?other, "dialog protocol event");
            }
        }
    }
}

/// Observer that records every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<DialogEvent>>,
}

impl RecordingObserver {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events, in order
    #[must_use]
    pub fn events(&self) -> Vec<DialogEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Whether any recorded event satisfies the predicate
    pub fn saw(&self, predicate: impl Fn(&DialogEvent) -> bool) -> bool {
        self.events().iter().any(|event| predicate(event))
    }

    /// Drop all recorded events
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl DialogObserver for RecordingObserver {
    fn notify(&self, event: &DialogEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
