// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are printed in milliseconds.

use std::io::Write;

use ratekeeper_core::mount::MountPhaseKind;
use ratekeeper_core::reconciler::{CorrectionReason, RateDecision};
use ratekeeper_core::time::HostTime;
use ratekeeper_core::trace::{
    ChangeSource, CorrectionEvent, MountTransitionEvent, PersistEvent, RateDecisionEvent,
    SpeedChangeEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns the destination.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn ms(t: HostTime) -> f64 {
    t.ticks() as f64 / 1000.0
}

fn source_name(source: ChangeSource) -> &'static str {
    match source {
        ChangeSource::Preset => "preset",
        ChangeSource::Slider => "slider",
        ChangeSource::Keyboard => "keyboard",
        ChangeSource::Reset => "reset",
        ChangeSource::Message => "message",
        ChangeSource::Storage => "storage",
    }
}

fn reason_name(reason: CorrectionReason) -> &'static str {
    match reason {
        CorrectionReason::Tick => "tick",
        CorrectionReason::Play => "play",
        CorrectionReason::Restore => "restore",
        CorrectionReason::Attach => "attach",
    }
}

pub(crate) fn phase_name(phase: MountPhaseKind) -> &'static str {
    match phase {
        MountPhaseKind::Idle => "idle",
        MountPhaseKind::Searching => "searching",
        MountPhaseKind::Mounted => "mounted",
        MountPhaseKind::Dormant => "dormant",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_speed_change(&mut self, e: &SpeedChangeEvent) {
        let _ = writeln!(
            self.writer,
            "[speed] {} requested={} applied={} at {:.1}ms",
            source_name(e.source),
            e.requested,
            e.applied,
            ms(e.at),
        );
    }

    fn on_rate_decision(&mut self, e: &RateDecisionEvent) {
        let decision = match e.decision {
            RateDecision::Suspended => "suspended".to_owned(),
            RateDecision::Echo => "echo".to_owned(),
            RateDecision::Unchanged => "unchanged".to_owned(),
            RateDecision::CaughtUp => "caught-up".to_owned(),
            RateDecision::OverrideStarted => "override".to_owned(),
            RateDecision::OverrideEnded { restore_at } => {
                format!("override-ended restore@{:.1}ms", ms(restore_at))
            }
        };
        let _ = writeln!(
            self.writer,
            "[rate] observed={} {decision} at {:.1}ms",
            e.observed,
            ms(e.at),
        );
    }

    fn on_correction(&mut self, e: &CorrectionEvent) {
        let _ = writeln!(
            self.writer,
            "[correct] {} {} -> {} at {:.1}ms",
            reason_name(e.reason),
            e.from,
            e.to,
            ms(e.at),
        );
    }

    fn on_persist(&mut self, e: &PersistEvent) {
        let status = if e.ok { "ok" } else { "FAILED" };
        let _ = writeln!(
            self.writer,
            "[persist] speed={} {status} at {:.1}ms",
            e.speed,
            ms(e.at),
        );
    }

    fn on_mount_transition(&mut self, e: &MountTransitionEvent) {
        let _ = writeln!(
            self.writer,
            "[mount] {} -> {} at {:.1}ms",
            phase_name(e.from),
            phase_name(e.to),
            ms(e.at),
        );
    }
}
