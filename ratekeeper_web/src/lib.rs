// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Content-script driver for ratekeeper.
//!
//! This crate connects the state machines in `ratekeeper_core` to the page:
//!
//! - [`now`]: `performance.now()` as a [`HostTime`]
//! - [`Interval`] / [`Timeout`]: timer wrappers that own their closures
//! - [`HostVideo`]: the host's video element as a `MediaTarget`
//! - [`dom`]: primary-player probing and orphan removal
//! - [`Panel`]: the injected button and speed panel
//! - [`ExtensionStore`]: `chrome.storage.local` persistence
//! - [`messaging`]: `chrome.runtime.onMessage` popup protocol
//! - [`ConsoleSink`]: trace events on the browser console
//!
//! Build with: `wasm-pack build --target no-modules ratekeeper_web`, then
//! load the output from the extension's content-script shim.

#![no_std]
#![cfg_attr(
    not(target_arch = "wasm32"),
    allow(dead_code, reason = "this crate only runs in the browser")
)]

extern crate alloc;

mod app;
mod console;
pub mod dom;
pub mod messaging;
mod panel;
mod storage;
mod timer;
mod video;

pub use console::ConsoleSink;
pub use panel::{IntentHandler, Panel};
pub use storage::ExtensionStore;
pub use timer::{Interval, Timeout};
pub use video::{HostVideo, VideoEvents};

use ratekeeper_core::time::HostTime;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = performance, js_name = "now")]
    fn performance_now() -> f64;
}

/// Returns the current host time from `performance.now()`.
#[must_use]
pub fn now() -> HostTime {
    HostTime::from_millis_f64(performance_now())
}

/// Content-script entry point.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn start() -> Result<(), JsValue> {
    app::run()
}
