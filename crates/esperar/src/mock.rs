//! Scripted in-memory facade for protocol tests.
//!
//! [`MockBrowser`] is a tiny scriptable DOM: elements are attached under
//! selectors in insertion order (which stands in for DOM order), click
//! hooks let a test model the page's reaction to a click (a dialog
//! appearing, a duplicate spawning), and frame operations are recorded so
//! tests can assert the save/restore discipline. No browser involved.
//!
//! The module is public so page-object authors can unit-test their own
//! code against the dialog protocol the same way this crate does.

use crate::facade::{
    Browser, ClickOutcome, Element, ElementRef, FacadeError, FacadeResult, FrameId,
};
use crate::locator::Selector;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// The whole core is single-caller-thread; hooks never cross threads.
type Hook = Box<dyn Fn()>;

/// Scripted element.
///
/// All state is interior-mutable so tests can reconfigure an element after
/// handing clones of the `Arc` to the code under test.
pub struct MockElement {
    name: String,
    displayed: AtomicBool,
    enabled: AtomicBool,
    stale: AtomicBool,
    displays_before_stale: Mutex<Option<usize>>,
    text: Mutex<String>,
    attributes: Mutex<HashMap<String, String>>,
    frame: Option<FrameId>,
    children: Mutex<Vec<(Selector, ElementRef)>>,
    click_script: Mutex<VecDeque<FacadeResult<ClickOutcome>>>,
    click_hooks: Mutex<Vec<Hook>>,
    clicks: AtomicUsize,
}

impl MockElement {
    /// New displayed, enabled, top-level element
    #[must_use]
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::bare(name.into(), None))
    }

    /// New element living in the given iframe
    #[must_use]
    pub fn in_frame(name: impl Into<String>, frame: FrameId) -> Arc<Self> {
        Arc::new(Self::bare(name.into(), Some(frame)))
    }

    fn bare(name: String, frame: Option<FrameId>) -> Self {
        Self {
            name,
            displayed: AtomicBool::new(true),
            enabled: AtomicBool::new(true),
            stale: AtomicBool::new(false),
            displays_before_stale: Mutex::new(None),
            text: Mutex::new(String::new()),
            attributes: Mutex::new(HashMap::new()),
            frame,
            children: Mutex::new(Vec::new()),
            click_script: Mutex::new(VecDeque::new()),
            click_hooks: Mutex::new(Vec::new()),
            clicks: AtomicUsize::new(0),
        }
    }

    /// Set whether the element reports as displayed
    pub fn set_displayed(&self, displayed: bool) {
        self.displayed.store(displayed, Ordering::SeqCst);
    }

    /// Set whether the element reports as enabled
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Mark the element stale: every facade call now fails with
    /// [`FacadeError::Stale`]
    pub fn set_stale(&self, stale: bool) {
        self.stale.store(stale, Ordering::SeqCst);
    }

    /// Report as displayed for the next `n` checks, then turn stale.
    ///
    /// Models a node that gets replaced mid-protocol.
    pub fn stale_after_displays(&self, n: usize) {
        if let Ok(mut remaining) = self.displays_before_stale.lock() {
            *remaining = Some(n);
        }
    }

    /// Set the element's visible text
    pub fn set_text(&self, text: impl Into<String>) {
        if let Ok(mut current) = self.text.lock() {
            *current = text.into();
        }
    }

    /// Set an attribute value
    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut attributes) = self.attributes.lock() {
            attributes.insert(name.into(), value.into());
        }
    }

    /// Attach a descendant reachable through [`Element::find`]
    pub fn add_child(&self, selector: Selector, child: ElementRef) {
        if let Ok(mut children) = self.children.lock() {
            children.push((selector, child));
        }
    }

    /// Queue a click outcome; unqueued clicks report `Clicked`
    pub fn script_click(&self, outcome: FacadeResult<ClickOutcome>) {
        if let Ok(mut script) = self.click_script.lock() {
            script.push_back(outcome);
        }
    }

    /// Run a hook on every delivered click (models the page's reaction).
    ///
    /// Hooks run for `Clicked` and `NotInteractable` outcomes alike, so a
    /// test can model a dialog that opens despite the not-interactable
    /// signal. They do not run for scripted driver errors or stale clicks.
    pub fn on_click(&self, hook: impl Fn() + 'static) {
        if let Ok(mut hooks) = self.click_hooks.lock() {
            hooks.push(Box::new(hook));
        }
    }

    /// How many clicks reached the element
    #[must_use]
    pub fn click_count(&self) -> usize {
        self.clicks.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MockElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockElement")
            .field("name", &self.name)
            .field("displayed", &self.displayed.load(Ordering::SeqCst))
            .field("enabled", &self.enabled.load(Ordering::SeqCst))
            .field("stale", &self.stale.load(Ordering::SeqCst))
            .field("clicks", &self.click_count())
            .finish_non_exhaustive()
    }
}

impl Element for MockElement {
    fn is_displayed(&self, _recheck: bool) -> FacadeResult<bool> {
        if self.stale.load(Ordering::SeqCst) {
            return Err(FacadeError::Stale);
        }
        if let Ok(mut remaining) = self.displays_before_stale.lock() {
            match *remaining {
                Some(0) => {
                    self.stale.store(true, Ordering::SeqCst);
                    return Err(FacadeError::Stale);
                }
                Some(n) => *remaining = Some(n - 1),
                None => {}
            }
        }
        Ok(self.displayed.load(Ordering::SeqCst))
    }

    fn is_enabled(&self) -> FacadeResult<bool> {
        if self.stale.load(Ordering::SeqCst) {
            return Err(FacadeError::Stale);
        }
        Ok(self.enabled.load(Ordering::SeqCst))
    }

    fn text(&self, _recovery: bool) -> FacadeResult<String> {
        if self.stale.load(Ordering::SeqCst) {
            return Err(FacadeError::Stale);
        }
        Ok(self.text.lock().map(|text| text.clone()).unwrap_or_default())
    }

    fn attribute(&self, name: &str) -> FacadeResult<Option<String>> {
        if self.stale.load(Ordering::SeqCst) {
            return Err(FacadeError::Stale);
        }
        Ok(self
            .attributes
            .lock()
            .ok()
            .and_then(|attributes| attributes.get(name).cloned()))
    }

    fn click(&self) -> FacadeResult<ClickOutcome> {
        if self.stale.load(Ordering::SeqCst) {
            return Err(FacadeError::Stale);
        }
        self.clicks.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .click_script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or(Ok(ClickOutcome::Clicked));
        if outcome.is_ok() {
            if let Ok(hooks) = self.click_hooks.lock() {
                for hook in hooks.iter() {
                    hook();
                }
            }
        }
        outcome
    }

    fn find(&self, selector: &Selector) -> Option<ElementRef> {
        self.children.lock().ok().and_then(|children| {
            children
                .iter()
                .find(|(child_selector, _)| child_selector == selector)
                .map(|(_, child)| child.clone())
        })
    }

    fn frame(&self) -> Option<FrameId> {
        self.frame.clone()
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Frame operation recorded by [`MockBrowser`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOp {
    /// Context reset to top-level content
    Reset,
    /// Context switched into a frame
    Select(FrameId),
}

/// Scripted browser session.
///
/// Elements that turned stale disappear from lookups, the way a removed
/// node disappears from a real DOM.
pub struct MockBrowser {
    dom: Mutex<Vec<(Selector, Arc<MockElement>)>>,
    current_frame: Mutex<Option<FrameId>>,
    frame_ops: Mutex<Vec<FrameOp>>,
    pending_alerts: AtomicUsize,
    purge_hooks: Mutex<Vec<Hook>>,
}

impl MockBrowser {
    /// New browser with an empty DOM, top-level context
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            dom: Mutex::new(Vec::new()),
            current_frame: Mutex::new(None),
            frame_ops: Mutex::new(Vec::new()),
            pending_alerts: AtomicUsize::new(0),
            purge_hooks: Mutex::new(Vec::new()),
        })
    }

    /// Attach an element under a selector; insertion order is DOM order
    pub fn attach(&self, selector: Selector, element: Arc<MockElement>) {
        if let Ok(mut dom) = self.dom.lock() {
            dom.push((selector, element));
        }
    }

    /// Remove every element attached under the selector
    pub fn detach(&self, selector: &Selector) {
        if let Ok(mut dom) = self.dom.lock() {
            dom.retain(|(attached, _)| attached != selector);
        }
    }

    /// The frame context the session currently sits in
    #[must_use]
    pub fn current_frame(&self) -> Option<FrameId> {
        self.current_frame.lock().map(|frame| frame.clone()).unwrap_or(None)
    }

    /// Every frame operation performed, in order
    #[must_use]
    pub fn frame_ops(&self) -> Vec<FrameOp> {
        self.frame_ops.lock().map(|ops| ops.clone()).unwrap_or_default()
    }

    /// Queue alerts for the next purge to dismiss
    pub fn set_pending_alerts(&self, count: usize) {
        self.pending_alerts.store(count, Ordering::SeqCst);
    }

    /// Run a hook when a purge dismisses at least one alert
    pub fn on_purge(&self, hook: impl Fn() + 'static) {
        if let Ok(mut hooks) = self.purge_hooks.lock() {
            hooks.push(Box::new(hook));
        }
    }
}

impl std::fmt::Debug for MockBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dom_size = self.dom.lock().map(|dom| dom.len()).unwrap_or(0);
        f.debug_struct("MockBrowser")
            .field("dom_size", &dom_size)
            .field("current_frame", &self.current_frame())
            .finish_non_exhaustive()
    }
}

fn as_element_ref(element: &Arc<MockElement>) -> ElementRef {
    element.clone()
}

impl Browser for MockBrowser {
    fn find_element(&self, selector: &Selector) -> Option<ElementRef> {
        self.dom.lock().ok().and_then(|dom| {
            dom.iter()
                .find(|(attached, element)| {
                    attached == selector && !element.stale.load(Ordering::SeqCst)
                })
                .map(|(_, element)| as_element_ref(element))
        })
    }

    fn find_elements(&self, selector: &Selector, _timeout_secs: f64) -> Vec<ElementRef> {
        self.dom
            .lock()
            .map(|dom| {
                dom.iter()
                    .filter(|(attached, element)| {
                        attached == selector && !element.stale.load(Ordering::SeqCst)
                    })
                    .map(|(_, element)| as_element_ref(element))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn select_frame(&self, frame: &FrameId) {
        if let Ok(mut ops) = self.frame_ops.lock() {
            ops.push(FrameOp::Select(frame.clone()));
        }
        if let Ok(mut current) = self.current_frame.lock() {
            *current = Some(frame.clone());
        }
    }

    fn reset_frame(&self) {
        if let Ok(mut ops) = self.frame_ops.lock() {
            ops.push(FrameOp::Reset);
        }
        if let Ok(mut current) = self.current_frame.lock() {
            *current = None;
        }
    }

    fn purge_alerts(&self, _context: &str) -> usize {
        let purged = self.pending_alerts.swap(0, Ordering::SeqCst);
        if purged > 0 {
            if let Ok(hooks) = self.purge_hooks.lock() {
                for hook in hooks.iter() {
                    hook();
                }
            }
        }
        purged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_defaults() {
        let element = MockElement::new("button");
        assert_eq!(element.is_displayed(true), Ok(true));
        assert_eq!(element.is_enabled(), Ok(true));
        assert_eq!(element.frame(), None);
        assert_eq!(element.describe(), "button");
    }

    #[test]
    fn test_stale_element_fails_every_call() {
        let element = MockElement::new("button");
        element.set_stale(true);
        assert_eq!(element.is_displayed(true), Err(FacadeError::Stale));
        assert_eq!(element.is_enabled(), Err(FacadeError::Stale));
        assert_eq!(element.text(true), Err(FacadeError::Stale));
        assert_eq!(element.click(), Err(FacadeError::Stale));
        assert_eq!(element.click_count(), 0);
    }

    #[test]
    fn test_stale_after_displays() {
        let element = MockElement::new("dialog");
        element.stale_after_displays(2);
        assert_eq!(element.is_displayed(true), Ok(true));
        assert_eq!(element.is_displayed(true), Ok(true));
        assert_eq!(element.is_displayed(true), Err(FacadeError::Stale));
        assert_eq!(element.is_displayed(true), Err(FacadeError::Stale));
    }

    #[test]
    fn test_click_script_and_hooks() {
        let element = MockElement::new("trigger");
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        element.on_click(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        element.script_click(Ok(ClickOutcome::NotInteractable));

        assert_eq!(element.click(), Ok(ClickOutcome::NotInteractable));
        assert_eq!(element.click(), Ok(ClickOutcome::Clicked));
        assert_eq!(element.click_count(), 2);
        // Hooks run for both delivered outcomes
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_scripted_driver_error_skips_hooks() {
        let element = MockElement::new("trigger");
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        element.on_click(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        element.script_click(Err(FacadeError::Driver("lost session".into())));

        assert!(element.click().is_err());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_find_child() {
        let dialog = MockElement::new("dialog");
        let button = MockElement::new("ok");
        dialog.add_child(Selector::css("button.ok"), button.clone());

        let found = dialog.find(&Selector::css("button.ok")).unwrap();
        assert_eq!(found.describe(), "ok");
        assert!(dialog.find(&Selector::css("button.cancel")).is_none());
    }

    #[test]
    fn test_browser_dom_order() {
        let browser = MockBrowser::new();
        let selector = Selector::css("div.modal");
        let first = MockElement::new("first");
        let second = MockElement::new("second");
        browser.attach(selector.clone(), first);
        browser.attach(selector.clone(), second);

        let all = browser.find_elements(&selector, 0.0);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].describe(), "first");
        assert_eq!(all[1].describe(), "second");
        assert_eq!(
            browser.find_element(&selector).unwrap().describe(),
            "first"
        );
    }

    #[test]
    fn test_stale_elements_leave_the_dom() {
        let browser = MockBrowser::new();
        let selector = Selector::css("div.modal");
        let element = MockElement::new("modal");
        browser.attach(selector.clone(), element.clone());

        assert!(browser.find_element(&selector).is_some());
        element.set_stale(true);
        assert!(browser.find_element(&selector).is_none());
        assert!(browser.find_elements(&selector, 0.0).is_empty());
    }

    #[test]
    fn test_browser_detach() {
        let browser = MockBrowser::new();
        let selector = Selector::css("div.modal");
        browser.attach(selector.clone(), MockElement::new("d"));
        browser.detach(&selector);
        assert!(browser.find_element(&selector).is_none());
    }

    #[test]
    fn test_frame_bookkeeping() {
        let browser = MockBrowser::new();
        let frame = FrameId::new("editor");
        browser.select_frame(&frame);
        assert_eq!(browser.current_frame(), Some(frame.clone()));
        browser.reset_frame();
        assert_eq!(browser.current_frame(), None);
        assert_eq!(
            browser.frame_ops(),
            vec![FrameOp::Select(frame), FrameOp::Reset]
        );
    }

    #[test]
    fn test_purge_alerts() {
        let browser = MockBrowser::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        browser.on_purge(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(browser.purge_alerts("test"), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        browser.set_pending_alerts(2);
        assert_eq!(browser.purge_alerts("test"), 2);
        assert_eq!(browser.purge_alerts("test"), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
