// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deterministic simulated host for ratekeeper.
//!
//! [`SimHost`] drives the core state machines the way the browser driver
//! does, but against a virtual clock, a scripted video element
//! ([`SimVideo`]), a simulated player DOM ([`SimPage`]), and an in-memory
//! store ([`MemoryStore`]). Every trace event lands in a [`RecordingSink`].
//!
//! Time only moves through [`SimHost::advance`], which fires the backstop
//! tick and every reconciler or watchdog deadline in order. `ratechange`
//! events queued by rate writes are delivered after each action, at the
//! current virtual time.
//!
//! As in the browser, the video element is only reachable after the driver
//! finds and attaches it. That happens on every probe and every backstop tick
//! outside the idle phase, whether or not the control surface is mounted.

#![no_std]

extern crate alloc;

mod media;
mod page;
mod record;
mod store;

#[cfg(test)]
mod scenarios;

pub use media::SimVideo;
pub use page::SimPage;
pub use record::{Recorded, RecordingSink};
pub use store::MemoryStore;

use alloc::string::String;

use ratekeeper_core::config::{MountConfig, ReconcilerConfig};
use ratekeeper_core::error::MessageError;
use ratekeeper_core::host::HostProfile;
use ratekeeper_core::message;
use ratekeeper_core::mount::{MountCommand, MountPhase, MountWatchdog};
use ratekeeper_core::persist::{StoredValue, decode_stored};
use ratekeeper_core::reconciler::{Correction, CorrectionReason, Reconciler};
use ratekeeper_core::speed::Speed;
use ratekeeper_core::surface::{self, Intent, KeyPress};
use ratekeeper_core::time::{Duration, HostTime};
use ratekeeper_core::trace::{
    ChangeSource, CorrectionEvent, MountTransitionEvent, RateDecisionEvent, SpeedChangeEvent,
    Tracer,
};

/// A simulated page running the content script.
#[derive(Debug)]
pub struct SimHost {
    now: HostTime,
    profile: HostProfile,
    reconciler: Reconciler<MemoryStore>,
    watchdog: MountWatchdog,
    video: SimVideo,
    page: SimPage,
    sink: RecordingSink,
    tick_interval: Duration,
    next_tick: HostTime,
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHost {
    /// Creates a blank page at time zero with the browser timing windows.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ReconcilerConfig::web(), MountConfig::web())
    }

    /// Creates a blank page with custom timing windows.
    #[must_use]
    pub fn with_config(reconciler: ReconcilerConfig, mount: MountConfig) -> Self {
        Self {
            now: HostTime(0),
            profile: HostProfile::YOUTUBE,
            tick_interval: reconciler.tick_interval,
            next_tick: HostTime(0).saturating_add(reconciler.tick_interval),
            reconciler: Reconciler::new(reconciler, MemoryStore::new()),
            watchdog: MountWatchdog::new(mount),
            video: SimVideo::new(),
            page: SimPage::empty(),
            sink: RecordingSink::new(),
        }
    }

    // -- Accessors -----------------------------------------------------------

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> HostTime {
        self.now
    }

    /// The reconciler under test.
    #[must_use]
    pub fn reconciler(&self) -> &Reconciler<MemoryStore> {
        &self.reconciler
    }

    /// The mount watchdog under test.
    #[must_use]
    pub fn watchdog(&self) -> &MountWatchdog {
        &self.watchdog
    }

    /// The simulated video element.
    #[must_use]
    pub fn video(&self) -> &SimVideo {
        &self.video
    }

    /// The simulated page.
    #[must_use]
    pub fn page(&self) -> &SimPage {
        &self.page
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &MemoryStore {
        self.reconciler.persistence().store()
    }

    /// Makes the backing store reject (or accept again) every write.
    pub fn reject_writes(&mut self, reject: bool) {
        self.reconciler
            .persistence_mut()
            .store_mut()
            .reject_writes(reject);
    }

    /// Everything traced so far.
    #[must_use]
    pub fn trace(&self) -> &RecordingSink {
        &self.sink
    }

    /// Forgets everything traced so far.
    pub fn clear_trace(&mut self) {
        self.sink.clear();
    }

    // -- Time ----------------------------------------------------------------

    /// Advances the virtual clock by `by`, firing every timer that comes due.
    pub fn advance(&mut self, by: Duration) {
        let end = self.now.saturating_add(by);
        loop {
            self.deliver_rate_events();
            let next = [
                Some(self.next_tick),
                self.reconciler.next_deadline(),
                self.watchdog.next_poll(),
            ]
            .into_iter()
            .flatten()
            .filter(|t| *t <= end)
            .min();
            let Some(at) = next else {
                break;
            };
            self.now = self.now.max(at);
            if self.now >= self.next_tick {
                self.next_tick = self.next_tick.saturating_add(self.tick_interval);
                self.backstop();
            } else {
                self.service();
                self.poll();
            }
        }
        self.now = end;
    }

    /// Shorthand for [`advance`](Self::advance) in milliseconds.
    pub fn advance_ms(&mut self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    // -- User and popup input ------------------------------------------------

    /// Delivers a control-surface intent.
    pub fn apply(&mut self, intent: Intent) {
        match intent {
            Intent::DragStart => self.reconciler.begin_user_drag(),
            Intent::DragEnd => self.reconciler.end_user_drag(),
            _ => {
                if let (Some(requested), Some(source)) =
                    (intent.requested(self.reconciler.desired()), intent.source())
                {
                    self.set_speed(requested, source);
                }
            }
        }
        self.deliver_rate_events();
    }

    /// Sets the desired speed directly, as from any panel widget.
    pub fn set_speed(&mut self, requested: f64, source: ChangeSource) -> Option<Speed> {
        let now = self.now;
        let applied = self
            .reconciler
            .set_desired_speed(now, requested, &mut self.video)?;
        Tracer::new(&mut self.sink).speed_change(&SpeedChangeEvent {
            at: now,
            requested,
            applied,
            source,
        });
        self.deliver_rate_events();
        Some(applied)
    }

    /// Delivers a key press. Ignored while no video is attached.
    pub fn key(&mut self, press: &KeyPress<'_>) {
        if self.video.attached().is_none() {
            return;
        }
        if let Some(intent) = surface::shortcut(press) {
            self.apply(intent);
        }
    }

    /// Delivers a popup message and returns the JSON reply.
    pub fn message(&mut self, json: &str) -> Result<String, MessageError> {
        let request = message::decode_request(json)?;
        let response = message::respond(&mut self.reconciler, self.now, request, &mut self.video);
        self.deliver_rate_events();
        message::encode_response(&response)
    }

    /// Delivers a stored value, as from the initial load or a storage change
    /// notification. Returns `true` if the desired speed changed.
    pub fn storage_value(&mut self, raw: StoredValue<'_>) -> bool {
        let Some(speed) = decode_stored(raw) else {
            return false;
        };
        let now = self.now;
        let adopted = self.reconciler.adopt_stored(now, speed, &mut self.video);
        if adopted {
            Tracer::new(&mut self.sink).speed_change(&SpeedChangeEvent {
                at: now,
                requested: speed.get(),
                applied: speed,
                source: ChangeSource::Storage,
            });
        }
        self.deliver_rate_events();
        adopted
    }

    // -- Host page behaviour -------------------------------------------------

    /// The host's router moved to `path`.
    pub fn navigate(&mut self, path: &str) {
        self.page.remove_injected();
        let is_video_page = self.profile.is_video_page(path);
        if !is_video_page {
            self.video.detach();
        }
        let t = self.watchdog.navigate(self.now, is_video_page);
        self.trace_mount(t);
    }

    /// The host renders its player with a fresh video element.
    pub fn render_player(&mut self, video_ready: bool) {
        self.render_player_unobserved(video_ready);
        self.mutation();
    }

    /// Like [`render_player`](Self::render_player), but the mutation
    /// observer never hears about it.
    pub fn render_player_unobserved(&mut self, video_ready: bool) {
        self.page.render_player();
        self.video.replace(video_ready);
    }

    /// The host renders a player whose controls no selector matches.
    pub fn render_player_without_controls(&mut self, video_ready: bool) {
        self.page.render_player();
        self.page.controls = false;
        self.video.replace(video_ready);
        self.mutation();
    }

    /// The host tears down and rebuilds its player (ad break, fullscreen).
    pub fn rebuild_player(&mut self) {
        self.page.destroy_player();
        self.video.remove();
        self.mutation();
        self.render_player(true);
    }

    /// The host swaps the video element for a new one without touching the
    /// controls.
    pub fn replace_video(&mut self) {
        self.video.replace(true);
        self.mutation();
    }

    /// The video element finished loading metadata.
    pub fn video_ready(&mut self) {
        self.video.set_ready(true);
        if !self.video.is_live() {
            return;
        }
        let now = self.now;
        let c = self.reconciler.attach_media(now, &mut self.video);
        self.trace_correction(c, CorrectionReason::Attach);
        self.deliver_rate_events();
    }

    /// The host writes the rate; a `ratechange` event follows.
    pub fn host_rate(&mut self, rate: f64) {
        self.video.host_set(rate);
        self.deliver_rate_events();
    }

    /// The host writes the rate and no `ratechange` event reaches us.
    pub fn host_rate_silently(&mut self, rate: f64) {
        self.video.host_set_silently(rate);
    }

    /// The video fired `play`.
    pub fn play(&mut self) {
        if !self.video.is_live() {
            return;
        }
        let now = self.now;
        let c = self.reconciler.on_play(now, &mut self.video);
        self.trace_correction(c, CorrectionReason::Play);
        self.deliver_rate_events();
    }

    // -- Driver internals ----------------------------------------------------

    fn deliver_rate_events(&mut self) {
        while let Some(observed) = self.video.next_event() {
            let decision = self.reconciler.on_observed_rate_change(self.now, observed);
            Tracer::new(&mut self.sink).rate_decision(&RateDecisionEvent {
                at: self.now,
                observed,
                decision,
            });
        }
    }

    fn mutation(&mut self) {
        let t = self
            .watchdog
            .on_mutation(self.now, self.page.button_live());
        self.trace_mount(t);
    }

    fn backstop(&mut self) {
        self.service();
        self.sync_video();
        let now = self.now;
        let c = self.reconciler.on_periodic_tick(now, &mut self.video);
        self.trace_correction(c, CorrectionReason::Tick);
        self.poll();
    }

    fn service(&mut self) {
        let report = self.reconciler.service(self.now, &mut self.video);
        if let Some(c) = report.restore {
            self.trace_correction(c, CorrectionReason::Restore);
        }
        if let Some(e) = report.persist {
            Tracer::new(&mut self.sink).persist(&e);
        }
        self.deliver_rate_events();
    }

    fn poll(&mut self) {
        if !self.watchdog.poll_due(self.now) {
            return;
        }
        self.sync_video();
        let probe = self.page.probe(self.video.is_ready());
        let (command, t) = self.watchdog.on_probe(self.now, &probe);
        self.trace_mount(t);
        if command != MountCommand::Mount || !self.watchdog.begin_reinjection() {
            return;
        }

        self.page.remove_injected();
        let inserted = self.page.insert();
        self.watchdog.end_reinjection();
        let t = if inserted {
            self.watchdog.mounted(self.now)
        } else {
            self.watchdog.mount_failed(self.now)
        };
        self.trace_mount(t);
        if inserted {
            // Our own insertion shows up as a mutation too.
            self.mutation();
        }
    }

    /// Attaches the page's video element if it is not the attached one.
    fn sync_video(&mut self) {
        if matches!(self.watchdog.phase(), MountPhase::Idle) || !self.video.attach() {
            return;
        }
        let now = self.now;
        let c = self.reconciler.attach_media(now, &mut self.video);
        self.trace_correction(c, CorrectionReason::Attach);
        self.deliver_rate_events();
    }

    fn trace_correction(&mut self, c: Correction, reason: CorrectionReason) {
        if let Correction::Applied { from, to } = c {
            Tracer::new(&mut self.sink).correction(&CorrectionEvent {
                at: self.now,
                from,
                to,
                reason,
            });
        }
    }

    fn trace_mount(&mut self, t: Option<MountTransitionEvent>) {
        if let Some(e) = t {
            Tracer::new(&mut self.sink).mount_transition(&e);
        }
    }

    /// Returns `true` once the control surface is mounted.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        matches!(self.watchdog.phase(), MountPhase::Mounted)
    }
}
