// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `setInterval` / `setTimeout` wrappers that own their closures.
//!
//! [`Interval`] runs the reconciler's backstop tick. [`Timeout`] is a single
//! re-armable deadline: the driver arms it for the earliest of the
//! reconciler's and the watchdog's due times after every handler.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::{Cell, RefCell};

use ratekeeper_core::time::{Duration, HostTime};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = "setInterval")]
    fn set_interval(callback: &JsValue, ms: i32) -> i32;

    #[wasm_bindgen(js_name = "clearInterval")]
    fn clear_interval(id: i32);

    #[wasm_bindgen(js_name = "setTimeout")]
    fn set_timeout(callback: &JsValue, ms: i32) -> i32;

    #[wasm_bindgen(js_name = "clearTimeout")]
    fn clear_timeout(id: i32);
}

/// Converts a duration to a timer delay in whole milliseconds, rounding up so
/// the timer never fires before the deadline.
pub(crate) fn delay_ms(delay: Duration) -> i32 {
    let ms = delay.ticks().div_ceil(1000);
    i32::try_from(ms).unwrap_or(i32::MAX)
}

/// A repeating timer. Dropping it clears the interval.
pub struct Interval {
    id: i32,
    _closure: Closure<dyn FnMut()>,
}

impl Interval {
    /// Starts calling `callback` every `period`.
    pub fn start(period: Duration, callback: impl FnMut() + 'static) -> Self {
        let closure = Closure::wrap(Box::new(callback) as Box<dyn FnMut()>);
        let id = set_interval(closure.as_ref().unchecked_ref(), delay_ms(period));
        Self {
            id,
            _closure: closure,
        }
    }
}

impl Drop for Interval {
    fn drop(&mut self) {
        clear_interval(self.id);
    }
}

impl core::fmt::Debug for Interval {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Interval")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// A one-shot timer that can be re-armed for an earlier deadline.
///
/// Create with [`Timeout::new`], then call [`arm`](Self::arm). Arming for a
/// later deadline than the one already pending is a no-op; the pending
/// callback re-arms on its way out.
pub struct Timeout {
    inner: Rc<TimeoutInner>,
}

type TimeoutClosure = Closure<dyn FnMut()>;

struct TimeoutInner {
    /// The JS closure handed to `setTimeout`.
    closure: RefCell<Option<TimeoutClosure>>,
    callback: RefCell<Box<dyn FnMut()>>,
    /// Handle of the pending `setTimeout`, if any.
    id: Cell<Option<i32>>,
    due: Cell<Option<HostTime>>,
}

impl Timeout {
    /// Creates an unarmed timeout that calls `callback` when it fires.
    pub fn new(callback: impl FnMut() + 'static) -> Self {
        let inner = Rc::new(TimeoutInner {
            closure: RefCell::new(None),
            callback: RefCell::new(Box::new(callback)),
            id: Cell::new(None),
            due: Cell::new(None),
        });

        let fired = Rc::clone(&inner);
        let closure = Closure::wrap(Box::new(move || {
            fired.id.set(None);
            fired.due.set(None);
            fired.callback.borrow_mut()();
        }) as Box<dyn FnMut()>);
        *inner.closure.borrow_mut() = Some(closure);

        Self { inner }
    }

    /// Schedules the callback for `due`, unless an earlier fire is pending.
    pub fn arm(&self, now: HostTime, due: HostTime) {
        if self.inner.due.get().is_some_and(|pending| pending <= due) {
            return;
        }
        self.cancel();
        if let Some(ref closure) = *self.inner.closure.borrow() {
            let delay = delay_ms(due.saturating_duration_since(now));
            let id = set_timeout(closure.as_ref().unchecked_ref(), delay);
            self.inner.id.set(Some(id));
            self.inner.due.set(Some(due));
        }
    }

    /// Cancels the pending fire, if any.
    pub fn cancel(&self) {
        if let Some(id) = self.inner.id.take() {
            clear_timeout(id);
        }
        self.inner.due.set(None);
    }

    /// Returns the pending deadline.
    #[must_use]
    pub fn due(&self) -> Option<HostTime> {
        self.inner.due.get()
    }
}

impl Drop for Timeout {
    fn drop(&mut self) {
        self.cancel();
        // Break the closure -> inner cycle.
        self.inner.closure.borrow_mut().take();
    }
}

impl core::fmt::Debug for Timeout {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Timeout")
            .field("due", &self.inner.due.get())
            .finish_non_exhaustive()
    }
}
