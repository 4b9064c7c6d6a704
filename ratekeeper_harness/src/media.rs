// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scripted stand-in for the host's video element.

use alloc::collections::VecDeque;

use ratekeeper_core::reconciler::MediaTarget;
use ratekeeper_core::speed::Speed;

/// A simulated video element.
///
/// Every rate write that actually changes the rate queues a `ratechange`
/// event carrying the new rate, as the browser does. Events are delivered by
/// the [`SimHost`](crate::SimHost) after the current action completes.
///
/// The element in the page and the element the driver has attached are
/// tracked separately. As a [`MediaTarget`] it only reaches the page's
/// element once that element has been [`attach`](Self::attach)ed, and only
/// then do its events reach the driver.
#[derive(Clone, Debug)]
pub struct SimVideo {
    element: Option<u32>,
    attached: Option<u32>,
    next_id: u32,
    rate: f64,
    ready: bool,
    events: VecDeque<f64>,
}

impl Default for SimVideo {
    fn default() -> Self {
        Self::new()
    }
}

impl SimVideo {
    /// Creates a page without a video element.
    #[must_use]
    pub fn new() -> Self {
        Self {
            element: None,
            attached: None,
            next_id: 0,
            rate: Speed::DEFAULT_RATE,
            ready: false,
            events: VecDeque::new(),
        }
    }

    /// Replaces the element with a fresh one at the host's default rate.
    ///
    /// Returns the new element's id.
    pub fn replace(&mut self, ready: bool) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.element = Some(id);
        self.rate = Speed::DEFAULT_RATE;
        self.ready = ready;
        self.events.clear();
        id
    }

    /// Removes the element.
    pub fn remove(&mut self) {
        self.element = None;
        self.ready = false;
        self.events.clear();
    }

    /// Marks the element as having loaded its metadata.
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Returns the current element's id.
    #[must_use]
    pub fn element(&self) -> Option<u32> {
        self.element
    }

    /// Returns the id of the element the driver listens to.
    #[must_use]
    pub fn attached(&self) -> Option<u32> {
        self.attached
    }

    /// Attaches the page's current element. Returns `false` if there is none
    /// or it is already attached.
    pub fn attach(&mut self) -> bool {
        if self.element.is_none() || self.attached == self.element {
            return false;
        }
        self.attached = self.element;
        self.events.clear();
        true
    }

    /// Stops listening to any element.
    pub fn detach(&mut self) {
        self.attached = None;
        self.events.clear();
    }

    /// Returns `true` if the page's current element is the attached one.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.element.is_some() && self.attached == self.element
    }

    /// Returns `true` if an element exists and reports metadata readiness.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.element.is_some() && self.ready
    }

    /// Returns the live rate regardless of attachment.
    #[must_use]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// The host page changes the rate; a `ratechange` event follows.
    pub fn host_set(&mut self, rate: f64) {
        self.write(rate);
    }

    /// The host page changes the rate without a `ratechange` event reaching
    /// us (a listener detached mid-swap, or a reset inside the player's own
    /// source switch).
    pub fn host_set_silently(&mut self, rate: f64) {
        self.rate = rate;
    }

    /// Takes the oldest undelivered `ratechange` event.
    pub fn next_event(&mut self) -> Option<f64> {
        self.events.pop_front()
    }

    fn write(&mut self, rate: f64) {
        if self.element.is_none() {
            return;
        }
        let changed = self.rate != rate;
        self.rate = rate;
        if changed && self.is_live() {
            self.events.push_back(rate);
        }
    }
}

impl MediaTarget for SimVideo {
    fn playback_rate(&self) -> Option<f64> {
        self.is_live().then_some(self.rate)
    }

    fn set_playback_rate(&mut self, rate: f64) {
        if self.is_live() {
            self.write(rate);
        }
    }
}
