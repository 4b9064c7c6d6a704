// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Browser console [`TraceSink`].

use alloc::format;

use ratekeeper_core::reconciler::RateDecision;
use ratekeeper_core::trace::{
    CorrectionEvent, MountTransitionEvent, PersistEvent, RateDecisionEvent, SpeedChangeEvent,
    TraceSink,
};
use wasm_bindgen::JsValue;
use web_sys::console;

const PREFIX: &str = "[ratekeeper]";

/// Writes trace events to the browser console.
///
/// Rate decisions that need no action (echoes, unchanged rates) are only
/// logged when `verbose` is set.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleSink {
    verbose: bool,
}

impl ConsoleSink {
    /// Creates a sink that logs actions only.
    #[must_use]
    pub const fn new() -> Self {
        Self { verbose: false }
    }

    /// Creates a sink that also logs every rate decision.
    #[must_use]
    pub const fn verbose() -> Self {
        Self { verbose: true }
    }
}

fn ms(at: ratekeeper_core::time::HostTime) -> u64 {
    at.ticks() / 1000
}

impl TraceSink for ConsoleSink {
    fn on_speed_change(&mut self, e: &SpeedChangeEvent) {
        console::info_1(&JsValue::from_str(&format!(
            "{PREFIX} {}ms speed {} ({:?}, requested {})",
            ms(e.at),
            e.applied,
            e.source,
            e.requested
        )));
    }

    fn on_rate_decision(&mut self, e: &RateDecisionEvent) {
        let quiet = matches!(
            e.decision,
            RateDecision::Echo | RateDecision::Unchanged | RateDecision::Suspended
        );
        if quiet && !self.verbose {
            return;
        }
        console::debug_1(&JsValue::from_str(&format!(
            "{PREFIX} {}ms rate {} -> {:?}",
            ms(e.at),
            e.observed,
            e.decision
        )));
    }

    fn on_correction(&mut self, e: &CorrectionEvent) {
        console::info_1(&JsValue::from_str(&format!(
            "{PREFIX} {}ms corrected {} -> {} ({:?})",
            ms(e.at),
            e.from,
            e.to,
            e.reason
        )));
    }

    fn on_persist(&mut self, e: &PersistEvent) {
        if e.ok {
            console::debug_1(&JsValue::from_str(&format!(
                "{PREFIX} {}ms saved {}",
                ms(e.at),
                e.speed
            )));
        } else {
            console::warn_1(&JsValue::from_str(&format!(
                "{PREFIX} {}ms storage failed, keeping {} in memory only",
                ms(e.at),
                e.speed
            )));
        }
    }

    fn on_mount_transition(&mut self, e: &MountTransitionEvent) {
        console::debug_1(&JsValue::from_str(&format!(
            "{PREFIX} {}ms mount {:?} -> {:?}",
            ms(e.at),
            e.from,
            e.to
        )));
    }
}
