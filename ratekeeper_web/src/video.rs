// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The host's video element as a [`MediaTarget`].

use alloc::boxed::Box;

use ratekeeper_core::reconciler::MediaTarget;
use wasm_bindgen::JsCast as _;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::{Event, HtmlVideoElement, Node};

type Listener = Closure<dyn FnMut(Event)>;

/// Event handlers attached to whichever video element is current.
pub struct VideoEvents {
    ratechange: Listener,
    play: Listener,
    loadedmetadata: Listener,
}

impl VideoEvents {
    /// Wraps the three media-event handlers.
    pub fn new(
        ratechange: impl FnMut(Event) + 'static,
        play: impl FnMut(Event) + 'static,
        loadedmetadata: impl FnMut(Event) + 'static,
    ) -> Self {
        Self {
            ratechange: Closure::wrap(Box::new(ratechange) as Box<dyn FnMut(Event)>),
            play: Closure::wrap(Box::new(play) as Box<dyn FnMut(Event)>),
            loadedmetadata: Closure::wrap(Box::new(loadedmetadata) as Box<dyn FnMut(Event)>),
        }
    }

    fn pairs(&self) -> [(&'static str, &Listener); 3] {
        [
            ("ratechange", &self.ratechange),
            ("play", &self.play),
            ("loadedmetadata", &self.loadedmetadata),
        ]
    }
}

impl core::fmt::Debug for VideoEvents {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VideoEvents").finish_non_exhaustive()
    }
}

/// The primary video element, if one is attached, plus its listeners.
///
/// Moving to a different element detaches the listeners from the old one, so
/// events from a video the host has discarded never reach the reconciler.
pub struct HostVideo {
    element: Option<HtmlVideoElement>,
    events: VideoEvents,
}

impl HostVideo {
    /// Creates an adapter with no element attached.
    #[must_use]
    pub fn new(events: VideoEvents) -> Self {
        Self {
            element: None,
            events,
        }
    }

    /// Returns the attached element.
    #[must_use]
    pub fn element(&self) -> Option<&HtmlVideoElement> {
        self.element.as_ref()
    }

    /// Returns `true` if `candidate` is the attached element.
    #[must_use]
    pub fn is_attached(&self, candidate: &HtmlVideoElement) -> bool {
        let node: &Node = candidate;
        self.element
            .as_ref()
            .is_some_and(|el| el.is_same_node(Some(node)))
    }

    /// Attaches `element`, moving the listeners over.
    ///
    /// Returns `Ok(false)` if it was already attached.
    pub fn attach(&mut self, element: HtmlVideoElement) -> Result<bool, JsValue> {
        if self.is_attached(&element) {
            return Ok(false);
        }
        self.detach()?;
        for (kind, listener) in self.events.pairs() {
            element.add_event_listener_with_callback(kind, listener.as_ref().unchecked_ref())?;
        }
        self.element = Some(element);
        Ok(true)
    }

    /// Drops the attached element, removing the listeners.
    pub fn detach(&mut self) -> Result<(), JsValue> {
        if let Some(old) = self.element.take() {
            for (kind, listener) in self.events.pairs() {
                old.remove_event_listener_with_callback(kind, listener.as_ref().unchecked_ref())?;
            }
        }
        Ok(())
    }
}

impl MediaTarget for HostVideo {
    fn playback_rate(&self) -> Option<f64> {
        self.element.as_ref().map(|el| el.playback_rate())
    }

    fn set_playback_rate(&mut self, rate: f64) {
        if let Some(el) = &self.element {
            el.set_playback_rate(rate);
        }
    }
}

impl core::fmt::Debug for HostVideo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HostVideo")
            .field("attached", &self.element.is_some())
            .finish_non_exhaustive()
    }
}
