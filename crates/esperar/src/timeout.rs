//! Polling/timeout engine.
//!
//! A [`Timeout`] blocks until a [`Condition`] reaches a wanted boolean
//! value or a per-call deadline expires. The loop is shared by every
//! condition specialization; nothing else in the core sleeps.
//!
//! The execution model is strictly single-threaded cooperative polling:
//! each wait is a blocking loop around `std::thread::sleep`, cancellation
//! is purely time-based, and there is no event-driven notification from
//! the underlying UI.

use crate::result::{EsperarError, EsperarResult};
use std::thread;
use std::time::{Duration, Instant};

/// Default pause between condition evaluations (100ms)
pub const DEFAULT_PAUSE_MS: u64 = 100;

/// A boolean-valued, re-evaluatable predicate with a human-readable
/// description, used as the wait target.
pub trait Condition {
    /// Evaluate the condition once
    fn check(&self) -> bool;

    /// Description for logs and error messages
    fn describe(&self) -> String;

    /// Message raised when a wait expires.
    ///
    /// `still` is the value the condition kept for the whole wait.
    /// Implementations may append diagnostic state (e.g., the last
    /// observed text) to the default message.
    fn failure_message(&self, still: bool, elapsed: Duration) -> String {
        format!(
            "Condition '{}' was still {still} after {:.1} seconds, give up",
            self.describe(),
            elapsed.as_secs_f64()
        )
    }
}

/// A closure-backed condition
pub struct FnCondition<F: Fn() -> bool> {
    func: F,
    description: String,
}

impl<F: Fn() -> bool> FnCondition<F> {
    /// Create a condition from a closure and a description
    pub fn new(func: F, description: impl Into<String>) -> Self {
        Self {
            func,
            description: description.into(),
        }
    }
}

impl<F: Fn() -> bool> std::fmt::Debug for FnCondition<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCondition")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<F: Fn() -> bool> Condition for FnCondition<F> {
    fn check(&self) -> bool {
        (self.func)()
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

/// Negation of another condition
#[derive(Debug)]
pub struct Not<C: Condition> {
    inner: C,
}

impl<C: Condition> Not<C> {
    /// Negate a condition
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<C: Condition> Condition for Not<C> {
    fn check(&self) -> bool {
        !self.inner.check()
    }

    fn describe(&self) -> String {
        format!("not [{}]", self.inner.describe())
    }
}

/// Direction of a wait: towards `true` or away from it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitDirection {
    /// Block while the condition is false; done once it turns true
    Until,
    /// Block while the condition is true; done once it turns false
    While,
}

/// Reusable wait loop with a fixed pause and a configurable expiry policy.
///
/// The maximum duration is supplied per call, not at construction, so the
/// same instance is reusable under different deadlines. No state survives
/// a call.
#[derive(Debug, Clone, Copy)]
pub struct Timeout {
    pause: Duration,
    fail_on_expiry: bool,
}

impl Default for Timeout {
    fn default() -> Self {
        Self {
            pause: Duration::from_millis(DEFAULT_PAUSE_MS),
            fail_on_expiry: true,
        }
    }
}

impl Timeout {
    /// Create a timeout with the default pause, raising on expiry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pause between condition evaluations
    #[must_use]
    pub const fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Set whether expiry raises [`EsperarError::WaitTimeout`] or returns
    /// `Ok(false)`
    #[must_use]
    pub const fn with_fail_on_expiry(mut self, fail_on_expiry: bool) -> Self {
        self.fail_on_expiry = fail_on_expiry;
        self
    }

    /// Expiry returns `Ok(false)` instead of raising
    #[must_use]
    pub const fn soft(self) -> Self {
        self.with_fail_on_expiry(false)
    }

    /// Block while the condition is false; `Ok(true)` once it turns true
    pub fn wait_until(
        &self,
        condition: &dyn Condition,
        duration_secs: f64,
    ) -> EsperarResult<bool> {
        self.wait(WaitDirection::Until, condition, duration_secs)
    }

    /// Block while the condition is true; `Ok(true)` once it turns false
    pub fn wait_while(
        &self,
        condition: &dyn Condition,
        duration_secs: f64,
    ) -> EsperarResult<bool> {
        self.wait(WaitDirection::While, condition, duration_secs)
    }

    /// Run the wait loop in the given direction.
    ///
    /// The condition is evaluated once immediately; if already satisfied
    /// the call returns without sleeping. Otherwise the loop sleeps the
    /// configured pause and re-evaluates until the deadline, computed from
    /// an [`Instant`] captured at entry, is crossed. Wall-clock comparison
    /// means slow condition evaluation cannot extend the effective timeout.
    /// Even with a duration shorter than the pause the condition is
    /// evaluated at least twice.
    ///
    /// `duration_secs` is converted to whole milliseconds by truncation,
    /// not rounding: a requested 0.9999-second deadline becomes 999ms.
    pub fn wait(
        &self,
        direction: WaitDirection,
        condition: &dyn Condition,
        duration_secs: f64,
    ) -> EsperarResult<bool> {
        let duration = Duration::from_millis((duration_secs * 1000.0) as u64);
        let target = direction == WaitDirection::Until;
        let start = Instant::now();

        // Zero-wait fast path
        if condition.check() == target {
            return Ok(true);
        }

        let deadline = start + duration;
        loop {
            thread::sleep(self.pause);
            if condition.check() == target {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        let elapsed = start.elapsed();
        if self.fail_on_expiry {
            Err(EsperarError::WaitTimeout {
                condition: condition.describe(),
                elapsed_ms: elapsed.as_millis() as u64,
                dialog: None,
                message: condition.failure_message(!target, elapsed),
            })
        } else {
            Ok(false)
        }
    }
}
