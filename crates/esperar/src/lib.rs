//! Esperar: condition polling and dialog acquisition for resilient
//! browser UI tests.
//!
//! Browser automation is inherently flaky: elements appear
//! asynchronously, clicks can silently miss, and a single gesture can
//! leave zero, one, or two modal dialogs on screen. Esperar is the
//! resilience core a UI test framework builds its page objects on: a
//! reusable polling/timeout engine plus the state machine that opens,
//! disambiguates, and closes modal dialogs.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    ESPERAR Architecture                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌─────────────┐   ┌────────────────────┐   │
//! │  │ Page       │   │ Dialog      │   │ Element/Browser    │   │
//! │  │ Objects    │──►│ Protocol    │──►│ Facade (driver)    │   │
//! │  │ (caller)   │   │ + Timeout   │   │                    │   │
//! │  └────────────┘   └─────────────┘   └────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The facade traits in [`facade`] are the only seam to the driver; the
//! core never talks to a browser directly, which is also what makes the
//! whole protocol testable against the scripted facade in [`mock`].
//!
//! # Execution model
//!
//! Strictly single-threaded cooperative polling: every wait is a
//! blocking loop with a fixed sleep interval, and cancellation is purely
//! time-based. A [`dialog::Dialog`] assumes a single caller thread at a
//! time; sharing one instance across concurrent callers is undefined
//! behavior.
//!
//! # Example
//!
//! ```rust
//! use esperar::prelude::*;
//! use esperar::mock::{MockBrowser, MockElement};
//!
//! let browser = MockBrowser::new();
//! let modal = MockElement::new("settings dialog");
//! browser.attach(Selector::css("div.settings"), modal);
//!
//! let mut dialog = Dialog::builder(browser, Selector::css("div.settings"))
//!     .validate_control(Selector::css("button.ok"))
//!     .cancel_control(Selector::css("button.cancel"))
//!     .build();
//!
//! // Already open: acquire without clicking.
//! let element = dialog.opened().unwrap();
//! assert_eq!(element.describe(), "settings dialog");
//! ```

#![warn(missing_docs)]

// Condition types wrap `Arc<dyn Element>` handles, which have no Debug.
#[allow(missing_debug_implementations)]
pub mod conditions;
pub mod dialog;
pub mod event;
pub mod facade;
pub mod locator;
pub mod mock;
pub mod result;
pub mod timeout;

pub use crate::dialog::Dialog;
pub use crate::result::{EsperarError, EsperarResult};
pub use crate::timeout::{Condition, Timeout};

/// Convenience re-exports for consumers
pub mod prelude {
    pub use crate::conditions::{
        AttributeContains, Displayed, Enabled, Gone, Stale, Text, TextMatch,
    };
    pub use crate::dialog::{Dialog, DialogBuilder, DialogOptions, DialogState};
    pub use crate::event::{DialogEvent, DialogObserver, RecordingObserver, TracingObserver};
    pub use crate::facade::{
        Browser, BrowserRef, ClickOutcome, Element, ElementRef, FacadeError, FacadeResult,
        FrameId,
    };
    pub use crate::locator::Selector;
    pub use crate::result::{DialogRef, EsperarError, EsperarResult};
    pub use crate::timeout::{Condition, FnCondition, Not, Timeout, WaitDirection};
}
