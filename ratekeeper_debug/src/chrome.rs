// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`ChromeTraceSink`] collects trace events as they arrive and
//! [`write`](ChromeTraceSink::write)s them as [Chrome Trace Event Format][format]
//! JSON. Mount phases become duration slices on their own track, so a trace
//! shows at a glance how long each search took and when the surface was
//! lost.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use ratekeeper_core::time::HostTime;
use ratekeeper_core::trace::{
    CorrectionEvent, MountTransitionEvent, PersistEvent, RateDecisionEvent, SpeedChangeEvent,
    TraceSink,
};

use crate::pretty::phase_name;

const TID_RECONCILER: u32 = 0;
const TID_MOUNT: u32 = 1;

/// Collects trace events and exports them as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
#[derive(Debug, Default)]
pub struct ChromeTraceSink {
    events: Vec<Value>,
    /// A `"B"` event on the mount track is waiting for its `"E"`.
    mount_slice_open: bool,
}

impl ChromeTraceSink {
    /// Creates an empty exporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the events collected so far.
    #[must_use]
    pub fn events(&self) -> &[Value] {
        &self.events
    }

    /// Writes every collected event as one JSON array.
    pub fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *writer, &self.events)?;
        writeln!(writer)
    }

    fn instant(&mut self, name: &str, cat: &str, at: HostTime, tid: u32, args: Value) {
        self.events.push(json!({
            "ph": "i",
            "name": name,
            "cat": cat,
            "ts": at.ticks(),
            "pid": 0,
            "tid": tid,
            "s": "t",
            "args": args,
        }));
    }
}

impl TraceSink for ChromeTraceSink {
    fn on_speed_change(&mut self, e: &SpeedChangeEvent) {
        self.instant(
            "SpeedChange",
            "Speed",
            e.at,
            TID_RECONCILER,
            json!({
                "requested": e.requested,
                "applied": e.applied.get(),
                "source": format!("{:?}", e.source),
            }),
        );
    }

    fn on_rate_decision(&mut self, e: &RateDecisionEvent) {
        self.instant(
            "RateDecision",
            "Reconciler",
            e.at,
            TID_RECONCILER,
            json!({
                "observed": e.observed,
                "decision": format!("{:?}", e.decision),
            }),
        );
    }

    fn on_correction(&mut self, e: &CorrectionEvent) {
        self.instant(
            "Correction",
            "Reconciler",
            e.at,
            TID_RECONCILER,
            json!({
                "from": e.from,
                "to": e.to.get(),
                "reason": format!("{:?}", e.reason),
            }),
        );
    }

    fn on_persist(&mut self, e: &PersistEvent) {
        self.instant(
            "Persist",
            "Storage",
            e.at,
            TID_RECONCILER,
            json!({
                "speed": e.speed.get(),
                "ok": e.ok,
            }),
        );
    }

    fn on_mount_transition(&mut self, e: &MountTransitionEvent) {
        // Close the slice for the phase we leave, open one for the next.
        let ts = e.at.ticks();
        if self.mount_slice_open {
            self.events.push(json!({
                "ph": "E",
                "name": phase_name(e.from),
                "cat": "Mount",
                "ts": ts,
                "pid": 0,
                "tid": TID_MOUNT,
            }));
        }
        self.mount_slice_open = true;
        self.events.push(json!({
            "ph": "B",
            "name": phase_name(e.to),
            "cat": "Mount",
            "ts": ts,
            "pid": 0,
            "tid": TID_MOUNT,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratekeeper_core::mount::MountPhaseKind;
    use ratekeeper_core::reconciler::CorrectionReason;
    use ratekeeper_core::speed::Speed;

    #[test]
    fn correction_is_an_instant_event() {
        let mut sink = ChromeTraceSink::new();
        sink.on_correction(&CorrectionEvent {
            at: HostTime(6_000_000),
            from: 1.0,
            to: Speed::clamped(1.5),
            reason: CorrectionReason::Tick,
        });
        let e = &sink.events()[0];
        assert_eq!(e["ph"], "i");
        assert_eq!(e["ts"], 6_000_000);
        assert_eq!(e["args"]["reason"], "Tick");
        assert_eq!(e["args"]["to"], 1.5);
    }

    #[test]
    fn mount_transitions_pair_up_as_slices() {
        let mut sink = ChromeTraceSink::new();
        sink.on_mount_transition(&MountTransitionEvent {
            at: HostTime(0),
            from: MountPhaseKind::Idle,
            to: MountPhaseKind::Searching,
        });
        sink.on_mount_transition(&MountTransitionEvent {
            at: HostTime(250_000),
            from: MountPhaseKind::Searching,
            to: MountPhaseKind::Mounted,
        });
        let phases: Vec<_> = sink
            .events()
            .iter()
            .map(|e| (e["ph"].as_str(), e["name"].as_str()))
            .collect();
        assert_eq!(
            phases,
            [
                (Some("B"), Some("searching")),
                (Some("E"), Some("searching")),
                (Some("B"), Some("mounted")),
            ]
        );
    }

    #[test]
    fn mount_slices_are_balanced() {
        let mut host = ratekeeper_harness::SimHost::new();
        host.navigate("/watch?v=a");
        host.render_player(true);
        host.advance_ms(10);
        host.rebuild_player();
        host.advance_ms(500);

        let mut sink = ChromeTraceSink::new();
        host.trace().replay(&mut sink);
        let mut depth = 0_i32;
        for e in sink.events().iter().filter(|e| e["tid"] == TID_MOUNT) {
            match e["ph"].as_str() {
                Some("B") => depth += 1,
                Some("E") => depth -= 1,
                _ => {}
            }
            assert!((0..=1).contains(&depth), "unbalanced: {e}");
        }
        assert_eq!(depth, 1, "the current phase stays open");
    }

    #[test]
    fn writes_a_json_array() {
        let mut host = ratekeeper_harness::SimHost::new();
        host.navigate("/watch?v=a");
        host.render_player(true);
        host.advance_ms(2_000);
        host.host_rate_silently(0.5);
        host.advance_ms(1_000);

        let mut sink = ChromeTraceSink::new();
        host.trace().replay(&mut sink);
        let mut out = Vec::<u8>::new();
        sink.write(&mut out).unwrap();

        let parsed: Value = serde_json::from_slice(&out).unwrap();
        let events = parsed.as_array().unwrap();
        assert!(
            events.iter().any(|e| e["name"] == "Correction"),
            "backstop correction missing: {parsed}"
        );
        assert!(events.iter().all(|e| e["pid"] == 0));
    }
}
