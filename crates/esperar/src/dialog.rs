//! Dialog acquisition protocol.
//!
//! Opening modal UI by clicking a trigger is the flakiest gesture in
//! browser automation: the click can silently miss, and the same gesture
//! can end up with zero, one, or two dialogs on screen. [`Dialog`] owns
//! the state machine that absorbs this:
//!
//! ```text
//! Closed -> Opening -> AmbiguousResolution -> Open -> Closing -> Closed
//! ```
//!
//! The protocol clicks once, waits for the dialog, re-clicks as a
//! workaround when nothing appeared, resolves duplicate/stale matches,
//! and restores the iframe context on every exit path.
//!
//! A `Dialog` assumes a single caller thread at a time; sharing one
//! instance across concurrent callers is undefined behavior. The only
//! cross-call state is the bound element slot, reassigned at defined
//! transition points and nowhere else.

use crate::conditions::{Enabled, Gone, Stale};
use crate::event::{DialogEvent, DialogObserver, TracingObserver};
use crate::facade::{BrowserRef, ClickOutcome, ElementRef, FrameId};
use crate::locator::Selector;
use crate::result::{DialogRef, EsperarError, EsperarResult};
use crate::timeout::{Condition, FnCondition, Timeout, DEFAULT_PAUSE_MS};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default bounded wait for a dialog to appear after a click (10 seconds)
pub const DEFAULT_OPEN_TIMEOUT_SECS: f64 = 10.0;

/// Default bounded wait for the trigger to become enabled (5 seconds)
pub const DEFAULT_ENABLEMENT_TIMEOUT_SECS: f64 = 5.0;

/// Default bounded wait for close controls and dialog teardown (5 seconds)
pub const DEFAULT_CLOSE_TIMEOUT_SECS: f64 = 5.0;

/// Default settle pause after closing a duplicate dialog (300ms)
pub const DEFAULT_SETTLE_PAUSE_MS: u64 = 300;

/// Staleness window of ambiguity resolution, as a multiple of how long the
/// first open took
const STALE_WINDOW_FACTOR: f64 = 1.5;

/// Floor for the staleness window, in seconds
const MIN_STALE_WINDOW_SECS: f64 = 0.5;

/// Options for dialog acquisition
#[derive(Debug, Clone)]
pub struct DialogOptions {
    /// Bounded wait for the dialog to appear after a click
    pub open_timeout_secs: f64,
    /// Bounded wait for the trigger to become enabled before clicking
    pub enablement_timeout_secs: f64,
    /// Bounded wait for close controls and for the dialog to go away
    pub close_timeout_secs: f64,
    /// Pause between condition evaluations
    pub pause: Duration,
    /// Settle pause after closing a duplicate dialog
    pub settle_pause: Duration,
    /// Purge transient browser alerts after opening
    pub purge_alerts: bool,
}

impl Default for DialogOptions {
    fn default() -> Self {
        Self {
            open_timeout_secs: DEFAULT_OPEN_TIMEOUT_SECS,
            enablement_timeout_secs: DEFAULT_ENABLEMENT_TIMEOUT_SECS,
            close_timeout_secs: DEFAULT_CLOSE_TIMEOUT_SECS,
            pause: Duration::from_millis(DEFAULT_PAUSE_MS),
            settle_pause: Duration::from_millis(DEFAULT_SETTLE_PAUSE_MS),
            purge_alerts: false,
        }
    }
}

impl DialogOptions {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the open timeout in seconds
    #[must_use]
    pub const fn with_open_timeout_secs(mut self, secs: f64) -> Self {
        self.open_timeout_secs = secs;
        self
    }

    /// Set the enablement timeout in seconds
    #[must_use]
    pub const fn with_enablement_timeout_secs(mut self, secs: f64) -> Self {
        self.enablement_timeout_secs = secs;
        self
    }

    /// Set the close timeout in seconds
    #[must_use]
    pub const fn with_close_timeout_secs(mut self, secs: f64) -> Self {
        self.close_timeout_secs = secs;
        self
    }

    /// Set the pause between condition evaluations
    #[must_use]
    pub const fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Set the settle pause after closing a duplicate dialog
    #[must_use]
    pub const fn with_settle_pause(mut self, pause: Duration) -> Self {
        self.settle_pause = pause;
        self
    }

    /// Set whether transient alerts are purged after opening
    #[must_use]
    pub const fn with_purge_alerts(mut self, purge: bool) -> Self {
        self.purge_alerts = purge;
        self
    }
}

/// State of the acquisition state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    /// No dialog bound
    Closed,
    /// A trigger click went out, waiting for the dialog
    Opening,
    /// A second click was issued; deciding which match is real
    AmbiguousResolution,
    /// A dialog element is bound
    Open,
    /// A close control was clicked, waiting for teardown
    Closing,
}

impl std::fmt::Display for DialogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::AmbiguousResolution => "ambiguous-resolution",
            Self::Open => "open",
            Self::Closing => "closing",
        };
        write!(f, "{name}")
    }
}

/// A modal UI surface acquired via a locator.
///
/// Built with [`Dialog::builder`]; opened by handing [`Dialog::open`] the
/// element whose click spawns it, or acquired without clicking through
/// [`Dialog::opened`] when something else already opened it.
pub struct Dialog {
    browser: BrowserRef,
    locator: Selector,
    frame: Option<FrameId>,
    validate_control: Option<Selector>,
    cancel_control: Option<Selector>,
    extra_loading: Option<Box<dyn Condition>>,
    observer: Arc<dyn DialogObserver>,
    options: DialogOptions,
    slot: Option<ElementRef>,
    trigger: Option<ElementRef>,
    state: DialogState,
}

impl std::fmt::Debug for Dialog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dialog")
            .field("locator", &self.locator)
            .field("frame", &self.frame)
            .field("state", &self.state)
            .field("bound", &self.slot.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Dialog`]
pub struct DialogBuilder {
    browser: BrowserRef,
    locator: Selector,
    frame: Option<FrameId>,
    validate_control: Option<Selector>,
    cancel_control: Option<Selector>,
    extra_loading: Option<Box<dyn Condition>>,
    observer: Arc<dyn DialogObserver>,
    options: DialogOptions,
}

impl std::fmt::Debug for DialogBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogBuilder")
            .field("locator", &self.locator)
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}

impl DialogBuilder {
    /// Set the frame the dialog lives in
    #[must_use]
    pub fn frame(mut self, frame: FrameId) -> Self {
        self.frame = Some(frame);
        self
    }

    /// Set the locator of the validate-labeled close control, resolved
    /// within the dialog element
    #[must_use]
    pub fn validate_control(mut self, selector: Selector) -> Self {
        self.validate_control = Some(selector);
        self
    }

    /// Set the locator of the cancel-labeled close control, resolved
    /// within the dialog element
    #[must_use]
    pub fn cancel_control(mut self, selector: Selector) -> Self {
        self.cancel_control = Some(selector);
        self
    }

    /// Set a condition to wait on after the dialog is bound (extra
    /// loading inside the dialog)
    #[must_use]
    pub fn extra_loading(mut self, condition: impl Condition + 'static) -> Self {
        self.extra_loading = Some(Box::new(condition));
        self
    }

    /// Set the observer receiving protocol events
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn DialogObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Set the acquisition options
    #[must_use]
    pub fn options(mut self, options: DialogOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the dialog, unbound and closed
    #[must_use]
    pub fn build(self) -> Dialog {
        Dialog {
            browser: self.browser,
            locator: self.locator,
            frame: self.frame,
            validate_control: self.validate_control,
            cancel_control: self.cancel_control,
            extra_loading: self.extra_loading,
            observer: self.observer,
            options: self.options,
            slot: None,
            trigger: None,
            state: DialogState::Closed,
        }
    }
}

impl Dialog {
    /// Dialog with default options, no frame, no close controls
    #[must_use]
    pub fn new(browser: BrowserRef, locator: Selector) -> Self {
        Self::builder(browser, locator).build()
    }

    /// Start building a dialog
    #[must_use]
    pub fn builder(browser: BrowserRef, locator: Selector) -> DialogBuilder {
        DialogBuilder {
            browser,
            locator,
            frame: None,
            validate_control: None,
            cancel_control: None,
            extra_loading: None,
            observer: Arc::new(TracingObserver),
            options: DialogOptions::default(),
        }
    }

    /// Current state of the acquisition state machine
    #[must_use]
    pub fn state(&self) -> DialogState {
        self.state
    }

    /// The bound dialog element, if any
    #[must_use]
    pub fn element(&self) -> Option<ElementRef> {
        self.slot.clone()
    }

    /// The dialog's locator
    #[must_use]
    pub fn locator(&self) -> &Selector {
        &self.locator
    }

    /// The frame the dialog lives in, `None` for top-level content
    #[must_use]
    pub fn frame(&self) -> Option<&FrameId> {
        self.frame.as_ref()
    }

    /// The element whose click opened the dialog, once a click went out
    #[must_use]
    pub fn opening_trigger(&self) -> Option<ElementRef> {
        self.trigger.clone()
    }

    /// Back-reference carried by errors raised for this dialog
    #[must_use]
    pub fn dialog_ref(&self) -> DialogRef {
        DialogRef {
            locator: self.locator.clone(),
            frame: self.frame.clone(),
        }
    }

    /// Open the dialog.
    ///
    /// With a trigger element, runs the full protocol: pre-check, click in
    /// the trigger's frame, bounded acquisition, workaround re-click,
    /// ambiguity resolution, settle, optional alert purge. With `None`,
    /// the dialog is assumed already open and only acquisition happens.
    pub fn open(&mut self, trigger: Option<ElementRef>) -> EsperarResult<ElementRef> {
        match trigger {
            None => self.opened(),
            Some(trigger) => self.open_with_trigger(trigger, false),
        }
    }

    /// Acquire the dialog without clicking anything.
    ///
    /// Idempotent: while the bound element stays live, repeated calls
    /// return the same binding without touching the page. A stale or
    /// hidden binding is dropped and re-acquired. Raises
    /// [`EsperarError::WaitTimeout`] when nothing is found within the
    /// open timeout.
    pub fn opened(&mut self) -> EsperarResult<ElementRef> {
        if let Some(element) = &self.slot {
            if element.is_displayed(true).unwrap_or(false) {
                return Ok(element.clone());
            }
            // Binding went stale or hidden; re-acquire below.
            self.slot = None;
        }
        let started = Instant::now();
        match self.acquire(self.options.open_timeout_secs)? {
            Some(element) => {
                self.slot = Some(element.clone());
                self.state = DialogState::Open;
                Ok(element)
            }
            None => {
                self.state = DialogState::Closed;
                Err(self.open_timeout_error(started.elapsed()))
            }
        }
    }

    /// Close the dialog through its validate- or cancel-labeled control.
    ///
    /// Lazily acquires the dialog if this is the first interaction with an
    /// already-open one. A disabled control raises
    /// [`EsperarError::NotEnabled`] with the dialog back-reference and
    /// performs no further DOM mutation.
    pub fn close(&mut self, validate: bool) -> EsperarResult<()> {
        let element = self.opened()?;
        self.state = DialogState::Closing;
        self.notify(DialogEvent::Closing { validate });
        match self.close_bound(&element, validate) {
            Ok(()) => {
                self.slot = None;
                self.state = DialogState::Closed;
                self.notify(DialogEvent::Closed {
                    locator: self.locator.to_string(),
                });
                Ok(())
            }
            Err(error) => {
                // The dialog is still up; keep the binding.
                self.state = DialogState::Open;
                Err(error)
            }
        }
    }

    fn open_with_trigger(
        &mut self,
        trigger: ElementRef,
        reopened_after_purge: bool,
    ) -> EsperarResult<ElementRef> {
        let started = Instant::now();
        self.state = DialogState::Opening;
        self.notify(DialogEvent::OpenAttempt {
            locator: self.locator.to_string(),
        });

        // Opening a second dialog while one is already visible is a caller
        // error, not a retryable condition.
        let pre_existing = self.visible_dialogs();
        if !pre_existing.is_empty() {
            self.state = DialogState::Closed;
            return Err(EsperarError::AmbiguousDialogCount {
                expected: 0,
                found: pre_existing.len(),
                locator: self.locator.to_string(),
            });
        }

        // Clicking a disabled control is a distinct failure from the
        // dialog simply not opening.
        let enabled = self.soft_timeout().wait_until(
            &Enabled::new(trigger.clone()),
            self.options.enablement_timeout_secs,
        )?;
        if !enabled {
            self.state = DialogState::Closed;
            return Err(EsperarError::NotEnabled {
                control: trigger.describe(),
                dialog: Some(self.dialog_ref()),
            });
        }

        match self.click_in_trigger_frame(&trigger)? {
            ClickOutcome::Clicked => {
                self.notify(DialogEvent::TriggerClicked { workaround: false });
            }
            ClickOutcome::NotInteractable => {
                self.state = DialogState::Closed;
                return Err(EsperarError::NotEnabled {
                    control: trigger.describe(),
                    dialog: Some(self.dialog_ref()),
                });
            }
        }
        self.trigger = Some(trigger.clone());

        let clicked_at = Instant::now();
        let element = match self.acquire(self.options.open_timeout_secs)? {
            Some(element) => element,
            None => self.workaround(&trigger, clicked_at)?,
        };

        self.slot = Some(element.clone());
        self.state = DialogState::Open;

        if let Some(condition) = self.extra_loading.as_deref() {
            Timeout::new()
                .with_pause(self.options.pause)
                .wait_until(condition, self.options.open_timeout_secs)
                .map_err(|error| error.with_dialog(self.dialog_ref()))?;
        }

        if self.options.purge_alerts {
            let purged = self.browser.purge_alerts("dialog open");
            if purged > 0 {
                let vanished = !element.is_displayed(true).unwrap_or(false);
                self.notify(DialogEvent::AlertsPurged {
                    count: purged,
                    reopening: vanished && !reopened_after_purge,
                });
                if vanished {
                    self.slot = None;
                    self.state = DialogState::Closed;
                    if reopened_after_purge {
                        return Err(self.vanished_after_purge_error(started.elapsed()));
                    }
                    return self.open_with_trigger(trigger, true);
                }
            }
        }

        self.notify(DialogEvent::Opened {
            locator: self.locator.to_string(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        });
        Ok(element)
    }

    /// Second click after an empty first acquisition.
    fn workaround(
        &mut self,
        trigger: &ElementRef,
        clicked_at: Instant,
    ) -> EsperarResult<ElementRef> {
        self.notify(DialogEvent::WorkaroundEngaged {
            locator: self.locator.to_string(),
        });
        match self.click_in_trigger_frame(trigger)? {
            ClickOutcome::Clicked => {
                self.notify(DialogEvent::TriggerClicked { workaround: true });
            }
            ClickOutcome::NotInteractable => {
                // The dialog may have opened from the first click despite
                // the signal; log and continue.
                self.notify(DialogEvent::NotInteractableTolerated {
                    control: trigger.describe(),
                });
            }
        }
        match self.acquire(self.options.open_timeout_secs)? {
            Some(found) => {
                // Two clicks went out; the match may be a leftover of the
                // first, or one of two dialogs.
                self.state = DialogState::AmbiguousResolution;
                self.resolve_ambiguity(found, clicked_at.elapsed())
            }
            None => self.fallback_acquire(clicked_at),
        }
    }

    /// Last resort: any displayed element with the generic dialog role.
    fn fallback_acquire(&mut self, clicked_at: Instant) -> EsperarResult<ElementRef> {
        let fallback = Selector::dialog_role();
        if let Some(element) = self.browser.find_element(&fallback) {
            if element.is_displayed(true).unwrap_or(false) {
                self.notify(DialogEvent::FallbackMatch {
                    configured: self.locator.to_string(),
                    fallback: fallback.to_string(),
                });
                return Ok(element);
            }
        }
        self.state = DialogState::Closed;
        Err(self.open_timeout_error(clicked_at.elapsed()))
    }

    /// Decide which match is real after a second click went out.
    fn resolve_ambiguity(
        &mut self,
        first_match: ElementRef,
        first_open: Duration,
    ) -> EsperarResult<ElementRef> {
        // Staleness window proportional to how long the first open took.
        let stale_window_secs =
            (first_open.as_secs_f64() * STALE_WINDOW_FACTOR).max(MIN_STALE_WINDOW_SECS);
        let went_stale = self
            .soft_timeout()
            .wait_until(&Stale::new(first_match.clone()), stale_window_secs)?;
        if went_stale {
            // False first match, replaced by a newer dialog.
            self.notify(DialogEvent::StaleFirstMatch {
                locator: self.locator.to_string(),
            });
            return match self.acquire(self.options.open_timeout_secs)? {
                Some(element) => Ok(element),
                None => {
                    self.state = DialogState::Closed;
                    Err(self.open_timeout_error(first_open))
                }
            };
        }

        let visible = self.visible_dialogs();
        self.notify(DialogEvent::AmbiguityDetected {
            visible: visible.len(),
        });
        match visible.as_slice() {
            [only] => Ok(only.clone()),
            [duplicate, kept] => {
                // DOM order is assumed to reflect open order: the first
                // entry is treated as the spurious duplicate.
                self.close_duplicate(duplicate)?;
                thread::sleep(self.options.settle_pause);
                self.notify(DialogEvent::DuplicateClosed {
                    locator: self.locator.to_string(),
                });
                Ok(kept.clone())
            }
            other => {
                self.state = DialogState::Closed;
                Err(EsperarError::AmbiguousDialogCount {
                    expected: 1,
                    found: other.len(),
                    locator: self.locator.to_string(),
                })
            }
        }
    }

    fn close_duplicate(&self, duplicate: &ElementRef) -> EsperarResult<()> {
        let selector = self
            .cancel_control
            .as_ref()
            .or(self.validate_control.as_ref())
            .ok_or_else(|| EsperarError::MissingImplementation {
                what: format!(
                    "close control locator for duplicate of dialog '{}'",
                    self.locator
                ),
            })?;
        let button =
            duplicate
                .find(selector)
                .ok_or_else(|| EsperarError::WaitTimeout {
                    condition: format!("close control '{selector}' is present"),
                    elapsed_ms: 0,
                    dialog: Some(self.dialog_ref()),
                    message: format!(
                        "close control '{selector}' not found in duplicate dialog '{}'",
                        self.locator
                    ),
                })?;
        match button.click()? {
            ClickOutcome::Clicked => Ok(()),
            ClickOutcome::NotInteractable => Err(EsperarError::NotEnabled {
                control: selector.to_string(),
                dialog: Some(self.dialog_ref()),
            }),
        }
    }

    fn close_bound(&self, element: &ElementRef, validate: bool) -> EsperarResult<()> {
        let kind = if validate { "validate" } else { "cancel" };
        let selector = if validate {
            self.validate_control.as_ref()
        } else {
            self.cancel_control.as_ref()
        }
        .ok_or_else(|| EsperarError::MissingImplementation {
            what: format!("{kind} control locator for dialog '{}'", self.locator),
        })?
        .clone();

        let present = FnCondition::new(
            || element.find(&selector).is_some(),
            format!("{kind} control '{selector}' is present"),
        );
        let started = Instant::now();
        let button_present = self
            .soft_timeout()
            .wait_until(&present, self.options.close_timeout_secs)?;
        let button = if button_present {
            element.find(&selector)
        } else {
            None
        };
        let Some(button) = button else {
            let elapsed = started.elapsed();
            return Err(EsperarError::WaitTimeout {
                condition: present.describe(),
                elapsed_ms: elapsed.as_millis() as u64,
                dialog: Some(self.dialog_ref()),
                message: present.failure_message(false, elapsed),
            });
        };

        if !button.is_enabled().unwrap_or(false) {
            return Err(EsperarError::NotEnabled {
                control: selector.to_string(),
                dialog: Some(self.dialog_ref()),
            });
        }
        match button.click()? {
            ClickOutcome::Clicked => {}
            ClickOutcome::NotInteractable => {
                return Err(EsperarError::NotEnabled {
                    control: selector.to_string(),
                    dialog: Some(self.dialog_ref()),
                });
            }
        }

        let gone = Gone::new(element.clone());
        let teardown_started = Instant::now();
        if !self
            .soft_timeout()
            .wait_until(&gone, self.options.close_timeout_secs)?
        {
            let elapsed = teardown_started.elapsed();
            return Err(EsperarError::WaitTimeout {
                condition: gone.describe(),
                elapsed_ms: elapsed.as_millis() as u64,
                dialog: Some(self.dialog_ref()),
                message: gone.failure_message(false, elapsed),
            });
        }
        Ok(())
    }

    /// Click the trigger from within its own frame, restoring the
    /// dialog's frame context on every exit path.
    fn click_in_trigger_frame(&self, trigger: &ElementRef) -> EsperarResult<ClickOutcome> {
        let trigger_frame = trigger.frame();
        let _restore = if trigger_frame != self.frame {
            self.browser.reset_frame();
            if let Some(frame) = &trigger_frame {
                self.browser.select_frame(frame);
            }
            Some(FrameRestore {
                browser: self.browser.clone(),
                frame: self.frame.clone(),
            })
        } else {
            None
        };
        Ok(trigger.click()?)
    }

    /// Bounded wait for a displayed element matching the locator.
    fn acquire(&self, timeout_secs: f64) -> EsperarResult<Option<ElementRef>> {
        let present = FnCondition::new(
            || {
                matches!(
                    self.browser.find_element(&self.locator),
                    Some(element) if element.is_displayed(true).unwrap_or(false)
                )
            },
            format!("dialog '{}' is displayed", self.locator),
        );
        if !self.soft_timeout().wait_until(&present, timeout_secs)? {
            return Ok(None);
        }
        Ok(self.browser.find_element(&self.locator))
    }

    /// Visible dialog count at a decision point; recomputed every time,
    /// never cached.
    fn visible_dialogs(&self) -> Vec<ElementRef> {
        self.browser
            .find_elements(&self.locator, 0.0)
            .into_iter()
            .filter(|element| element.is_displayed(true).unwrap_or(false))
            .collect()
    }

    fn soft_timeout(&self) -> Timeout {
        Timeout::new().with_pause(self.options.pause).soft()
    }

    fn open_timeout_error(&self, elapsed: Duration) -> EsperarError {
        let condition = format!("dialog '{}' is displayed", self.locator);
        let message = format!(
            "Condition '{condition}' was still false after {:.1} seconds, give up",
            elapsed.as_secs_f64()
        );
        EsperarError::WaitTimeout {
            condition,
            elapsed_ms: elapsed.as_millis() as u64,
            dialog: Some(self.dialog_ref()),
            message,
        }
    }

    fn vanished_after_purge_error(&self, elapsed: Duration) -> EsperarError {
        let condition = format!("dialog '{}' survives alert purge", self.locator);
        let message = format!(
            "Condition '{condition}' was still false after {:.1} seconds, give up",
            elapsed.as_secs_f64()
        );
        EsperarError::WaitTimeout {
            condition,
            elapsed_ms: elapsed.as_millis() as u64,
            dialog: Some(self.dialog_ref()),
            message,
        }
    }

    fn notify(&self, event: DialogEvent) {
        self.observer.notify(&event);
    }
}

/// Restores the dialog's frame context when dropped, so the restoration
/// runs on success, failure, and unwinding alike.
struct FrameRestore {
    browser: BrowserRef,
    frame: Option<FrameId>,
}

impl Drop for FrameRestore {
    fn drop(&mut self) {
        self.browser.reset_frame();
        if let Some(frame) = &self.frame {
            self.browser.select_frame(frame);
        }
    }
}
