// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A [`TraceSink`] that keeps every event for later assertions.

use alloc::vec::Vec;

use ratekeeper_core::mount::MountPhaseKind;
use ratekeeper_core::reconciler::{CorrectionReason, RateDecision};
use ratekeeper_core::trace::{
    CorrectionEvent, MountTransitionEvent, PersistEvent, RateDecisionEvent, SpeedChangeEvent,
    TraceSink,
};

/// One recorded trace event.
#[derive(Clone, Copy, Debug)]
pub enum Recorded {
    /// See [`TraceSink::on_speed_change`].
    SpeedChange(SpeedChangeEvent),
    /// See [`TraceSink::on_rate_decision`].
    RateDecision(RateDecisionEvent),
    /// See [`TraceSink::on_correction`].
    Correction(CorrectionEvent),
    /// See [`TraceSink::on_persist`].
    Persist(PersistEvent),
    /// See [`TraceSink::on_mount_transition`].
    MountTransition(MountTransitionEvent),
}

impl Recorded {
    /// Dispatches this event to `sink`.
    pub fn replay(&self, sink: &mut dyn TraceSink) {
        match self {
            Self::SpeedChange(e) => sink.on_speed_change(e),
            Self::RateDecision(e) => sink.on_rate_decision(e),
            Self::Correction(e) => sink.on_correction(e),
            Self::Persist(e) => sink.on_persist(e),
            Self::MountTransition(e) => sink.on_mount_transition(e),
        }
    }
}

/// Records events in arrival order.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    events: Vec<Recorded>,
}

impl RecordingSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every event, oldest first.
    #[must_use]
    pub fn events(&self) -> &[Recorded] {
        &self.events
    }

    /// Drops everything recorded so far.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Replays every event, oldest first, into `sink`.
    pub fn replay(&self, sink: &mut dyn TraceSink) {
        for e in &self.events {
            e.replay(sink);
        }
    }

    /// Iterates over corrections.
    pub fn corrections(&self) -> impl Iterator<Item = &CorrectionEvent> {
        self.events.iter().filter_map(|e| match e {
            Recorded::Correction(c) => Some(c),
            _ => None,
        })
    }

    /// Iterates over corrections made for `reason`.
    pub fn corrections_for(&self, reason: CorrectionReason) -> impl Iterator<Item = &CorrectionEvent> {
        self.corrections().filter(move |c| c.reason == reason)
    }

    /// Iterates over rate decisions.
    pub fn decisions(&self) -> impl Iterator<Item = RateDecision> + '_ {
        self.events.iter().filter_map(|e| match e {
            Recorded::RateDecision(d) => Some(d.decision),
            _ => None,
        })
    }

    /// Counts transitions into `phase`.
    #[must_use]
    pub fn entered(&self, phase: MountPhaseKind) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Recorded::MountTransition(t) if t.to == phase))
            .count()
    }
}

impl TraceSink for RecordingSink {
    fn on_speed_change(&mut self, e: &SpeedChangeEvent) {
        self.events.push(Recorded::SpeedChange(*e));
    }

    fn on_rate_decision(&mut self, e: &RateDecisionEvent) {
        self.events.push(Recorded::RateDecision(*e));
    }

    fn on_correction(&mut self, e: &CorrectionEvent) {
        self.events.push(Recorded::Correction(*e));
    }

    fn on_persist(&mut self, e: &PersistEvent) {
        self.events.push(Recorded::Persist(*e));
    }

    fn on_mount_transition(&mut self, e: &MountTransitionEvent) {
        self.events.push(Recorded::MountTransition(*e));
    }
}
