// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reconciliation between the desired speed and the host's playback rate.
//!
//! The host page is not a cooperating API: it rewrites its own video
//! element's `playbackRate` for its own reasons (advertisements resetting to
//! 1×, hold-to-fast-forward gestures). The [`Reconciler`] can only tell those
//! apart by timing and magnitude:
//!
//! - a change shortly after our own write is an echo;
//! - a change to the desired speed means the host caught up;
//! - the first divergence is a temporary override and is left alone;
//! - a second divergence away from that override means the override ended
//!   and the host fell back to its own default, so the desired speed is
//!   restored after a short grace delay.
//!
//! A periodic backstop ([`on_periodic_tick`](Reconciler::on_periodic_tick))
//! re-asserts the desired speed when nothing else explains a drift.
//!
//! The second-divergence rule cannot distinguish "host reset to default" from
//! "host entered a different deliberate rate". It assumes the former.
//!
//! A first divergence *to* the host's default rate is ambiguous the other way:
//! it is what an advertisement ending looks like. Such an override is only
//! tolerated for `external_grace`, after which the backstop corrects it.
//!
//! # Timers
//!
//! The reconciler never sleeps. Work that must happen later (the restore
//! after an override ends, the debounced storage write) is recorded with a
//! due time; drivers query [`next_deadline`](Reconciler::next_deadline) and
//! call [`service`](Reconciler::service) once it passes. Due work re-reads
//! live state when it fires.

use crate::config::ReconcilerConfig;
use crate::persist::{Persistence, SpeedStore};
use crate::speed::Speed;
use crate::time::HostTime;
use crate::trace::PersistEvent;

/// The host page's video element, as seen by the reconciler.
///
/// The browser driver implements this over `HtmlVideoElement`; tests use a
/// scripted stand-in.
pub trait MediaTarget {
    /// Returns the live playback rate, or `None` if no video is attached.
    fn playback_rate(&self) -> Option<f64>;

    /// Writes the playback rate. Does nothing if no video is attached.
    fn set_playback_rate(&mut self, rate: f64);
}

/// How an observed rate change was classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateDecision {
    /// A drag is in progress; only the observed rate was recorded.
    Suspended,
    /// The change followed our own write.
    Echo,
    /// The rate did not really change.
    Unchanged,
    /// The host moved to the desired speed on its own.
    CaughtUp,
    /// The host entered a temporary override; it is tolerated.
    OverrideStarted,
    /// The host left its temporary override; the desired speed will be
    /// restored at `restore_at` unless live state says otherwise by then.
    OverrideEnded {
        /// When the restore fires.
        restore_at: HostTime,
    },
}

/// Which path asked for a correction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CorrectionReason {
    /// The periodic backstop tick.
    Tick,
    /// The video's `play` event.
    Play,
    /// The grace-delay restore after an override ended.
    Restore,
    /// A new video element was attached.
    Attach,
}

/// Result of an attempt to re-assert the desired speed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Correction {
    /// A drag is in progress.
    Suspended,
    /// There is no video element.
    NoMedia,
    /// The live rate already matches the desired speed.
    InSync,
    /// The allow-correction gate held the correction back.
    Deferred,
    /// A manual change after the restore was scheduled made it moot.
    Superseded,
    /// The desired speed was written.
    Applied {
        /// The live rate before the write.
        from: f64,
        /// The speed that was written.
        to: Speed,
    },
}

/// Work done by one [`Reconciler::service`] call.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServiceReport {
    /// Outcome of a restore that came due, if one did.
    pub restore: Option<Correction>,
    /// Outcome of a storage flush that came due, if one did.
    pub persist: Option<PersistEvent>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PendingRestore {
    due: HostTime,
    scheduled_at: HostTime,
}

/// Owns the desired speed and decides how to answer host rate changes.
#[derive(Debug)]
pub struct Reconciler<S> {
    config: ReconcilerConfig,
    desired: Speed,
    last_manual_change: Option<HostTime>,
    last_external_change: Option<HostTime>,
    previous_observed: f64,
    temporary_rate: Option<f64>,
    dragging: bool,
    pending_restore: Option<PendingRestore>,
    persistence: Persistence<S>,
}

impl<S: SpeedStore> Reconciler<S> {
    /// Creates a reconciler at [`Speed::DEFAULT`] writing through `store`.
    #[must_use]
    pub fn new(config: ReconcilerConfig, store: S) -> Self {
        Self {
            desired: Speed::DEFAULT,
            last_manual_change: None,
            last_external_change: None,
            previous_observed: Speed::DEFAULT_RATE,
            temporary_rate: None,
            dragging: false,
            pending_restore: None,
            persistence: Persistence::new(store, config.persist_debounce),
            config,
        }
    }

    /// Sets the desired speed from a user action.
    ///
    /// Clamps `requested`, writes it to the video immediately, and schedules a
    /// debounced storage write. Returns the applied speed so callers can
    /// refresh every display surface, or `None` if `requested` is not a
    /// finite number (state is left untouched).
    pub fn set_desired_speed<M: MediaTarget + ?Sized>(
        &mut self,
        now: HostTime,
        requested: f64,
        media: &mut M,
    ) -> Option<Speed> {
        let speed = Speed::parse(requested)?;
        self.desired = speed;
        media.set_playback_rate(speed.get());
        self.last_manual_change = Some(now);
        self.persistence.schedule(now, speed);
        Some(speed)
    }

    /// Classifies a rate change reported by the video element.
    pub fn on_observed_rate_change(&mut self, now: HostTime, new_rate: f64) -> RateDecision {
        if !new_rate.is_finite() {
            return RateDecision::Unchanged;
        }
        if self.dragging {
            self.previous_observed = new_rate;
            return RateDecision::Suspended;
        }
        if now.is_within(self.last_manual_change, self.config.echo_window) {
            self.previous_observed = new_rate;
            self.temporary_rate = None;
            return RateDecision::Echo;
        }
        if self.same_rate(new_rate, self.previous_observed) {
            return RateDecision::Unchanged;
        }

        self.last_external_change = Some(now);

        let decision = if self.same_rate(new_rate, self.desired.get()) {
            self.temporary_rate = None;
            RateDecision::CaughtUp
        } else {
            match self.temporary_rate {
                Some(temporary) if !self.same_rate(new_rate, temporary) => {
                    self.temporary_rate = None;
                    let restore_at = now.saturating_add(self.config.restore_delay);
                    self.pending_restore = Some(PendingRestore {
                        due: restore_at,
                        scheduled_at: now,
                    });
                    RateDecision::OverrideEnded { restore_at }
                }
                _ => {
                    self.temporary_rate = Some(new_rate);
                    RateDecision::OverrideStarted
                }
            }
        };

        self.previous_observed = new_rate;
        decision
    }

    /// Backstop: re-asserts the desired speed if the video drifted and
    /// nothing explains the drift.
    pub fn on_periodic_tick<M: MediaTarget + ?Sized>(
        &mut self,
        now: HostTime,
        media: &mut M,
    ) -> Correction {
        self.correct(now, media)
    }

    /// Same as the backstop, invoked when the video starts playing.
    pub fn on_play<M: MediaTarget + ?Sized>(&mut self, now: HostTime, media: &mut M) -> Correction {
        self.correct(now, media)
    }

    /// Suspends reconciliation while the user drags the slider.
    pub fn begin_user_drag(&mut self) {
        self.dragging = true;
    }

    /// Resumes reconciliation after a drag.
    pub fn end_user_drag(&mut self) {
        self.dragging = false;
    }

    /// Fires any timers whose due time has passed.
    pub fn service<M: MediaTarget + ?Sized>(
        &mut self,
        now: HostTime,
        media: &mut M,
    ) -> ServiceReport {
        let restore = match self.pending_restore {
            Some(pending) if now >= pending.due => {
                self.pending_restore = None;
                Some(self.fire_restore(pending, media))
            }
            _ => None,
        };
        ServiceReport {
            restore,
            persist: self.persistence.flush_due(now),
        }
    }

    /// Returns the earliest time [`service`](Self::service) has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<HostTime> {
        let restore = self.pending_restore.map(|p| p.due);
        match (restore, self.persistence.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Applies a speed that is already durable: loaded at startup or changed
    /// by another context (the popup, another tab).
    ///
    /// Ignored while a drag or a local write is in flight, since the local
    /// intent is newer. Returns `true` if the desired speed changed.
    pub fn adopt_stored<M: MediaTarget + ?Sized>(
        &mut self,
        now: HostTime,
        speed: Speed,
        media: &mut M,
    ) -> bool {
        if self.dragging || self.persistence.deadline().is_some() {
            return false;
        }
        self.persistence.note_durable(speed);
        if self.desired == speed {
            return false;
        }
        self.desired = speed;
        media.set_playback_rate(speed.get());
        self.last_manual_change = Some(now);
        true
    }

    /// Re-applies the desired speed to a freshly attached video element.
    ///
    /// Observation history belongs to the old element and is discarded.
    pub fn attach_media<M: MediaTarget + ?Sized>(
        &mut self,
        now: HostTime,
        media: &mut M,
    ) -> Correction {
        self.temporary_rate = None;
        self.pending_restore = None;
        let Some(live) = media.playback_rate() else {
            self.previous_observed = self.desired.get();
            return Correction::NoMedia;
        };
        self.previous_observed = live;
        if self.same_rate(live, self.desired.get()) {
            return Correction::InSync;
        }
        media.set_playback_rate(self.desired.get());
        self.last_manual_change = Some(now);
        Correction::Applied {
            from: live,
            to: self.desired,
        }
    }

    /// Returns `true` if a correction may be written now.
    ///
    /// Corrections are held back shortly after a manual change, while the
    /// live rate equals an active temporary override, and shortly after any
    /// external rate change. An override at [`Speed::DEFAULT_RATE`] does not
    /// hold corrections back on its own.
    #[must_use]
    pub fn allows_correction(&self, now: HostTime, live_rate: f64) -> bool {
        let recent_manual = now.is_within(self.last_manual_change, self.config.manual_grace);
        let in_override = self.temporary_rate.is_some_and(|t| {
            self.same_rate(live_rate, t) && !self.same_rate(t, Speed::DEFAULT_RATE)
        });
        let recent_external = now.is_within(self.last_external_change, self.config.external_grace);
        !(recent_manual || in_override || recent_external)
    }

    /// Returns the desired speed.
    #[must_use]
    pub fn desired(&self) -> Speed {
        self.desired
    }

    /// Returns the active temporary override rate, if any.
    #[must_use]
    pub fn temporary_rate(&self) -> Option<f64> {
        self.temporary_rate
    }

    /// Returns the last rate seen from the video.
    #[must_use]
    pub fn previous_observed(&self) -> f64 {
        self.previous_observed
    }

    /// Returns `true` while a slider drag is in progress.
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Returns `true` while a restore is waiting for its grace delay.
    #[must_use]
    pub fn restore_pending(&self) -> bool {
        self.pending_restore.is_some()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Returns the persistence writer.
    #[must_use]
    pub fn persistence(&self) -> &Persistence<S> {
        &self.persistence
    }

    /// Returns the persistence writer mutably.
    pub fn persistence_mut(&mut self) -> &mut Persistence<S> {
        &mut self.persistence
    }

    fn same_rate(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.config.tolerance
    }

    fn correct<M: MediaTarget + ?Sized>(&mut self, now: HostTime, media: &mut M) -> Correction {
        if self.dragging {
            return Correction::Suspended;
        }
        let Some(live) = media.playback_rate() else {
            return Correction::NoMedia;
        };
        if self.same_rate(live, self.desired.get()) {
            return Correction::InSync;
        }
        if !self.allows_correction(now, live) {
            return Correction::Deferred;
        }
        media.set_playback_rate(self.desired.get());
        Correction::Applied {
            from: live,
            to: self.desired,
        }
    }

    fn fire_restore<M: MediaTarget + ?Sized>(
        &mut self,
        pending: PendingRestore,
        media: &mut M,
    ) -> Correction {
        if self.dragging {
            return Correction::Suspended;
        }
        if self
            .last_manual_change
            .is_some_and(|t| t >= pending.scheduled_at)
        {
            return Correction::Superseded;
        }
        let Some(live) = media.playback_rate() else {
            return Correction::NoMedia;
        };
        if self.same_rate(live, self.desired.get()) {
            return Correction::InSync;
        }
        // A new override that began during the delay is legitimate.
        if self.temporary_rate.is_some_and(|t| self.same_rate(live, t)) {
            return Correction::Deferred;
        }
        media.set_playback_rate(self.desired.get());
        Correction::Applied {
            from: live,
            to: self.desired,
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::error::StoreError;
    use crate::time::Duration;

    #[derive(Debug, Default)]
    struct NullStore;

    impl SpeedStore for NullStore {
        fn save(&mut self, _key: &str, _value: f64) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct FakeVideo {
        rate: Option<f64>,
        writes: Vec<f64>,
    }

    impl FakeVideo {
        fn at(rate: f64) -> Self {
            Self {
                rate: Some(rate),
                writes: Vec::new(),
            }
        }
    }

    impl MediaTarget for FakeVideo {
        fn playback_rate(&self) -> Option<f64> {
            self.rate
        }

        fn set_playback_rate(&mut self, rate: f64) {
            if self.rate.is_some() {
                self.rate = Some(rate);
                self.writes.push(rate);
            }
        }
    }

    fn ms(v: u64) -> HostTime {
        HostTime(Duration::from_millis(v).ticks())
    }

    fn reconciler_at(speed: f64, video: &mut FakeVideo) -> Reconciler<NullStore> {
        let mut r = Reconciler::new(ReconcilerConfig::web(), NullStore);
        r.set_desired_speed(ms(0), speed, video);
        // Echo of our own write.
        assert_eq!(r.on_observed_rate_change(ms(10), speed), RateDecision::Echo);
        assert!(r.service(ms(300), video).persist.is_some());
        video.writes.clear();
        r
    }

    #[test]
    fn set_desired_speed_clamps_and_writes() {
        let mut video = FakeVideo::at(1.0);
        let mut r = Reconciler::new(ReconcilerConfig::web(), NullStore);
        assert_eq!(r.set_desired_speed(ms(0), 25.0, &mut video), Some(Speed::MAX));
        assert_eq!(r.desired(), Speed::MAX);
        assert_eq!(video.writes, &[10.0]);

        assert_eq!(r.set_desired_speed(ms(5), f64::NAN, &mut video), None);
        assert_eq!(r.desired(), Speed::MAX, "non-finite input is rejected");
    }

    #[test]
    fn echo_within_window_is_ignored() {
        let mut video = FakeVideo::at(1.0);
        let mut r = Reconciler::new(ReconcilerConfig::web(), NullStore);
        r.set_desired_speed(ms(1_000), 2.0, &mut video);
        assert_eq!(r.on_observed_rate_change(ms(1_250), 2.0), RateDecision::Echo);
        assert_eq!(r.previous_observed(), 2.0);
        assert!(r.temporary_rate().is_none());
    }

    #[test]
    fn tiny_changes_are_unchanged() {
        let mut video = FakeVideo::at(1.0);
        let mut r = reconciler_at(1.5, &mut video);
        assert_eq!(
            r.on_observed_rate_change(ms(2_000), 1.505),
            RateDecision::Unchanged
        );
    }

    #[test]
    fn host_catching_up_clears_override() {
        let mut video = FakeVideo::at(1.0);
        let mut r = reconciler_at(1.5, &mut video);
        assert_eq!(
            r.on_observed_rate_change(ms(2_000), 2.0),
            RateDecision::OverrideStarted
        );
        assert_eq!(r.temporary_rate(), Some(2.0));
        assert_eq!(
            r.on_observed_rate_change(ms(3_000), 1.5),
            RateDecision::CaughtUp
        );
        assert!(r.temporary_rate().is_none());
        assert!(!r.restore_pending());
    }

    #[test]
    fn override_end_schedules_restore() {
        let mut video = FakeVideo::at(1.0);
        let mut r = reconciler_at(1.5, &mut video);

        video.rate = Some(2.0);
        r.on_observed_rate_change(ms(2_000), 2.0);
        video.rate = Some(1.0);
        let decision = r.on_observed_rate_change(ms(3_000), 1.0);
        assert_eq!(
            decision,
            RateDecision::OverrideEnded {
                restore_at: ms(3_100)
            }
        );
        assert_eq!(r.next_deadline(), Some(ms(3_100)));

        assert!(r.service(ms(3_050), &mut video).restore.is_none());
        let report = r.service(ms(3_100), &mut video);
        assert_eq!(
            report.restore,
            Some(Correction::Applied {
                from: 1.0,
                to: Speed::clamped(1.5)
            })
        );
        assert_eq!(video.rate, Some(1.5));
    }

    #[test]
    fn restore_respects_new_override_during_delay() {
        let mut video = FakeVideo::at(1.0);
        let mut r = reconciler_at(1.5, &mut video);

        r.on_observed_rate_change(ms(2_000), 2.0);
        r.on_observed_rate_change(ms(3_000), 1.0);
        // Host starts another hold gesture before the restore fires.
        video.rate = Some(2.0);
        assert_eq!(
            r.on_observed_rate_change(ms(3_050), 2.0),
            RateDecision::OverrideStarted
        );
        let report = r.service(ms(3_100), &mut video);
        assert_eq!(report.restore, Some(Correction::Deferred));
        assert_eq!(video.rate, Some(2.0));
    }

    #[test]
    fn restore_is_superseded_by_manual_change() {
        let mut video = FakeVideo::at(1.0);
        let mut r = reconciler_at(1.5, &mut video);

        r.on_observed_rate_change(ms(2_000), 2.0);
        r.on_observed_rate_change(ms(3_000), 1.0);
        r.set_desired_speed(ms(3_020), 0.75, &mut video);
        video.rate = Some(1.0);
        let report = r.service(ms(3_100), &mut video);
        assert_eq!(report.restore, Some(Correction::Superseded));
    }

    #[test]
    fn restore_skipped_while_dragging() {
        let mut video = FakeVideo::at(1.0);
        let mut r = reconciler_at(1.5, &mut video);

        r.on_observed_rate_change(ms(2_000), 2.0);
        r.on_observed_rate_change(ms(3_000), 1.0);
        r.begin_user_drag();
        let report = r.service(ms(3_200), &mut video);
        assert_eq!(report.restore, Some(Correction::Suspended));
        assert!(video.writes.is_empty());
    }

    #[test]
    fn gate_blocks_recent_manual_and_external() {
        let mut video = FakeVideo::at(1.0);
        let mut r = reconciler_at(1.5, &mut video);
        // Manual change at 0 ms.
        assert!(!r.allows_correction(ms(400), 1.0));
        assert!(r.allows_correction(ms(600), 1.0));

        r.on_observed_rate_change(ms(5_000), 3.0);
        assert!(!r.allows_correction(ms(5_100), 1.0), "external grace");
        assert!(!r.allows_correction(ms(7_000), 3.0), "temporary override");
        assert!(r.allows_correction(ms(7_000), 1.0));
    }

    #[test]
    fn reset_to_default_expires_after_external_grace() {
        let mut video = FakeVideo::at(1.0);
        let mut r = reconciler_at(1.5, &mut video);
        video.rate = Some(1.0);
        assert_eq!(
            r.on_observed_rate_change(ms(5_000), 1.0),
            RateDecision::OverrideStarted
        );
        assert_eq!(r.on_periodic_tick(ms(5_500), &mut video), Correction::Deferred);
        assert_eq!(
            r.on_periodic_tick(ms(6_000), &mut video),
            Correction::Applied {
                from: 1.0,
                to: Speed::clamped(1.5)
            }
        );
    }

    #[test]
    fn tick_corrects_silent_drift() {
        let mut video = FakeVideo::at(1.0);
        let mut r = reconciler_at(1.5, &mut video);
        video.rate = Some(1.0);
        assert_eq!(
            r.on_periodic_tick(ms(1_000), &mut video),
            Correction::Applied {
                from: 1.0,
                to: Speed::clamped(1.5)
            }
        );
        assert_eq!(r.on_periodic_tick(ms(2_000), &mut video), Correction::InSync);
    }

    #[test]
    fn tick_defers_inside_grace_and_suspends_on_drag() {
        let mut video = FakeVideo::at(1.0);
        let mut r = reconciler_at(1.5, &mut video);
        video.rate = Some(1.0);
        assert_eq!(r.on_periodic_tick(ms(400), &mut video), Correction::Deferred);

        r.begin_user_drag();
        assert_eq!(r.on_periodic_tick(ms(5_000), &mut video), Correction::Suspended);
        assert_eq!(
            r.on_observed_rate_change(ms(5_000), 4.0),
            RateDecision::Suspended
        );
        r.end_user_drag();
        assert_eq!(
            r.on_play(ms(6_000), &mut video),
            Correction::Applied {
                from: 1.0,
                to: Speed::clamped(1.5)
            }
        );
    }

    #[test]
    fn no_media_is_harmless() {
        let mut video = FakeVideo {
            rate: None,
            writes: Vec::new(),
        };
        let mut r = Reconciler::new(ReconcilerConfig::web(), NullStore);
        assert_eq!(r.set_desired_speed(ms(0), 2.0, &mut video), Some(Speed::clamped(2.0)));
        assert_eq!(r.on_periodic_tick(ms(2_000), &mut video), Correction::NoMedia);
        assert_eq!(r.attach_media(ms(2_000), &mut video), Correction::NoMedia);
    }

    #[test]
    fn attach_reapplies_and_resets_history() {
        let mut video = FakeVideo::at(1.0);
        let mut r = reconciler_at(2.5, &mut video);
        r.on_observed_rate_change(ms(2_000), 3.0);
        assert!(r.temporary_rate().is_some());

        let mut fresh = FakeVideo::at(1.0);
        assert_eq!(
            r.attach_media(ms(4_000), &mut fresh),
            Correction::Applied {
                from: 1.0,
                to: Speed::clamped(2.5)
            }
        );
        assert!(r.temporary_rate().is_none());
        assert_eq!(fresh.rate, Some(2.5));
        assert_eq!(
            r.on_observed_rate_change(ms(4_010), 2.5),
            RateDecision::Echo
        );
    }

    #[test]
    fn adopt_stored_applies_durable_value() {
        let mut video = FakeVideo::at(1.0);
        let mut r = Reconciler::new(ReconcilerConfig::web(), NullStore);
        assert!(r.adopt_stored(ms(0), Speed::clamped(1.75), &mut video));
        assert_eq!(video.rate, Some(1.75));
        assert!(r.next_deadline().is_none(), "durable values are not rewritten");
        assert!(!r.adopt_stored(ms(10), Speed::clamped(1.75), &mut video));
    }

    #[test]
    fn adopt_stored_yields_to_local_intent() {
        let mut video = FakeVideo::at(1.0);
        let mut r = Reconciler::new(ReconcilerConfig::web(), NullStore);
        r.set_desired_speed(ms(0), 2.5, &mut video);
        assert!(!r.adopt_stored(ms(100), Speed::clamped(2.0), &mut video));
        assert_eq!(r.desired(), Speed::clamped(2.5));

        r.service(ms(400), &mut video);
        r.begin_user_drag();
        assert!(!r.adopt_stored(ms(500), Speed::clamped(2.0), &mut video));
    }
}
