// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the reconciler and the mount loop.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! drivers call after every decision. All method bodies default to no-ops, so
//! implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).

use crate::mount::MountPhaseKind;
use crate::reconciler::{CorrectionReason, RateDecision};
use crate::speed::Speed;
use crate::time::HostTime;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Where a desired-speed change came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeSource {
    /// A preset button in the panel.
    Preset,
    /// The panel slider.
    Slider,
    /// A keyboard shortcut.
    Keyboard,
    /// The reset action.
    Reset,
    /// A `setSpeed` message from the popup.
    Message,
    /// Loaded from storage or delivered by a storage change notification.
    Storage,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when the desired speed changes.
#[derive(Clone, Copy, Debug)]
pub struct SpeedChangeEvent {
    /// When the change was applied.
    pub at: HostTime,
    /// The raw value that was requested.
    pub requested: f64,
    /// The speed after clamping.
    pub applied: Speed,
    /// Who asked for it.
    pub source: ChangeSource,
}

/// Emitted after the reconciler classifies an observed rate change.
#[derive(Clone, Copy, Debug)]
pub struct RateDecisionEvent {
    /// When the rate change was observed.
    pub at: HostTime,
    /// The rate reported by the video element.
    pub observed: f64,
    /// How the reconciler classified it.
    pub decision: RateDecision,
}

/// Emitted when the reconciler writes the desired speed back onto the video.
#[derive(Clone, Copy, Debug)]
pub struct CorrectionEvent {
    /// When the correction was written.
    pub at: HostTime,
    /// The live rate before the correction.
    pub from: f64,
    /// The speed that was re-applied.
    pub to: Speed,
    /// Which path triggered it.
    pub reason: CorrectionReason,
}

/// Emitted after a persistence flush.
#[derive(Clone, Copy, Debug)]
pub struct PersistEvent {
    /// When the write was attempted.
    pub at: HostTime,
    /// The value written.
    pub speed: Speed,
    /// Whether the store accepted it. A rejected write disables persistence
    /// for the rest of the session.
    pub ok: bool,
}

/// Emitted when the mount watchdog changes phase.
#[derive(Clone, Copy, Debug)]
pub struct MountTransitionEvent {
    /// When the transition happened.
    pub at: HostTime,
    /// Phase before.
    pub from: MountPhaseKind,
    /// Phase after.
    pub to: MountPhaseKind,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the drivers.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when the desired speed changes.
    fn on_speed_change(&mut self, e: &SpeedChangeEvent) {
        _ = e;
    }

    /// Called after an observed rate change is classified.
    fn on_rate_decision(&mut self, e: &RateDecisionEvent) {
        _ = e;
    }

    /// Called when the desired speed is re-applied to the video.
    fn on_correction(&mut self, e: &CorrectionEvent) {
        _ = e;
    }

    /// Called after a persistence write.
    fn on_persist(&mut self, e: &PersistEvent) {
        _ = e;
    }

    /// Called when the mount watchdog changes phase.
    fn on_mount_transition(&mut self, e: &MountTransitionEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`SpeedChangeEvent`].
    #[inline]
    pub fn speed_change(&mut self, e: &SpeedChangeEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_speed_change(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`RateDecisionEvent`].
    #[inline]
    pub fn rate_decision(&mut self, e: &RateDecisionEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_rate_decision(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`CorrectionEvent`].
    #[inline]
    pub fn correction(&mut self, e: &CorrectionEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_correction(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PersistEvent`].
    #[inline]
    pub fn persist(&mut self, e: &PersistEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_persist(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`MountTransitionEvent`].
    #[inline]
    pub fn mount_transition(&mut self, e: &MountTransitionEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_mount_transition(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
