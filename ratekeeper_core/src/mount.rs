// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mount watchdog: keeps the control surface attached to the host player.
//!
//! The host is a single-page application that destroys and rebuilds its
//! player on navigation, ad transitions, and fullscreen toggles. The
//! [`MountWatchdog`] is the single owner of "should we be looking for the
//! player right now". Drivers feed it three kinds of signal and act on what
//! it answers:
//!
//! ```text
//!   navigate(is_video_page) ──► Idle | Searching
//!   poll_due() + on_probe() ──► Wait | Mount          (Searching, Dormant)
//!   on_mutation(button_live) ──► Searching            (Mounted, Dormant)
//! ```
//!
//! A search has a wall-clock budget. Once it is spent the watchdog goes
//! [`Dormant`](MountPhase::Dormant): it keeps probing at a much lower cadence
//! forever, so a later host-side fix or a late-rendering player still
//! self-heals, and any navigation or DOM mutation starts a fresh search.

use crate::config::MountConfig;
use crate::time::HostTime;
use crate::trace::MountTransitionEvent;

/// Watchdog phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountPhase {
    /// Not on a watch page.
    Idle,
    /// Polling for a ready primary player.
    Searching {
        /// When this search started.
        since: HostTime,
        /// When the next probe is due.
        next_poll: HostTime,
    },
    /// The control surface is attached and was verified live.
    Mounted,
    /// The search budget ran out; probing continues at the dormant cadence.
    Dormant {
        /// When the next probe is due.
        next_poll: HostTime,
    },
}

/// Field-less mirror of [`MountPhase`] for tracing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MountPhaseKind {
    /// See [`MountPhase::Idle`].
    Idle,
    /// See [`MountPhase::Searching`].
    Searching,
    /// See [`MountPhase::Mounted`].
    Mounted,
    /// See [`MountPhase::Dormant`].
    Dormant,
}

impl MountPhase {
    /// Returns the phase without its timestamps.
    #[must_use]
    pub const fn kind(self) -> MountPhaseKind {
        match self {
            Self::Idle => MountPhaseKind::Idle,
            Self::Searching { .. } => MountPhaseKind::Searching,
            Self::Mounted => MountPhaseKind::Mounted,
            Self::Dormant { .. } => MountPhaseKind::Dormant,
        }
    }
}

/// What a DOM probe found.
///
/// All fields describe the *primary* player only; secondary preview players
/// must never be reported here.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Probe {
    /// The primary player container exists.
    pub player_found: bool,
    /// A controls container was found inside the primary player.
    pub controls_found: bool,
    /// The primary video reports at least metadata readiness.
    pub video_ready: bool,
    /// Controls-container width in CSS pixels.
    pub width: f64,
    /// Controls-container height in CSS pixels.
    pub height: f64,
}

/// What the driver should do after a probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountCommand {
    /// Nothing yet; keep waiting for the next poll.
    Wait,
    /// Remove any leftover nodes, insert the control surface, and report back
    /// through [`MountWatchdog::mounted`] or [`MountWatchdog::mount_failed`].
    Mount,
}

/// The injection/recovery state machine.
#[derive(Clone, Debug)]
pub struct MountWatchdog {
    config: MountConfig,
    phase: MountPhase,
    reinjecting: bool,
    mounts: u64,
}

impl MountWatchdog {
    /// Creates an idle watchdog.
    #[must_use]
    pub const fn new(config: MountConfig) -> Self {
        Self {
            config,
            phase: MountPhase::Idle,
            reinjecting: false,
            mounts: 0,
        }
    }

    /// Returns the current phase.
    #[must_use]
    pub const fn phase(&self) -> MountPhase {
        self.phase
    }

    /// Returns how many times a mount succeeded.
    #[must_use]
    pub const fn mount_count(&self) -> u64 {
        self.mounts
    }

    /// Handles a page navigation.
    pub fn navigate(&mut self, now: HostTime, is_video_page: bool) -> Option<MountTransitionEvent> {
        let next = if is_video_page {
            self.searching(now)
        } else {
            MountPhase::Idle
        };
        self.transition(now, next)
    }

    /// Returns `true` if a probe should run now.
    #[must_use]
    pub fn poll_due(&self, now: HostTime) -> bool {
        match self.phase {
            MountPhase::Searching { next_poll, .. } | MountPhase::Dormant { next_poll } => {
                !self.reinjecting && now >= next_poll
            }
            MountPhase::Idle | MountPhase::Mounted => false,
        }
    }

    /// Returns when the next probe is due, if the watchdog is polling.
    #[must_use]
    pub fn next_poll(&self) -> Option<HostTime> {
        match self.phase {
            MountPhase::Searching { next_poll, .. } | MountPhase::Dormant { next_poll } => {
                Some(next_poll)
            }
            MountPhase::Idle | MountPhase::Mounted => None,
        }
    }

    /// Evaluates a probe taken while searching or dormant.
    pub fn on_probe(
        &mut self,
        now: HostTime,
        probe: &Probe,
    ) -> (MountCommand, Option<MountTransitionEvent>) {
        match self.phase {
            MountPhase::Searching { since, .. } => {
                if self.is_ready(probe) {
                    return (MountCommand::Mount, None);
                }
                let elapsed = now.saturating_duration_since(since);
                let next = if elapsed >= self.config.search_budget {
                    MountPhase::Dormant {
                        next_poll: now.saturating_add(self.config.dormant_interval),
                    }
                } else {
                    MountPhase::Searching {
                        since,
                        next_poll: now.saturating_add(self.config.poll_interval),
                    }
                };
                (MountCommand::Wait, self.transition(now, next))
            }
            MountPhase::Dormant { .. } => {
                if self.is_ready(probe) {
                    return (MountCommand::Mount, None);
                }
                let next = MountPhase::Dormant {
                    next_poll: now.saturating_add(self.config.dormant_interval),
                };
                (MountCommand::Wait, self.transition(now, next))
            }
            MountPhase::Idle | MountPhase::Mounted => (MountCommand::Wait, None),
        }
    }

    /// Reports that the control surface was inserted and verified.
    pub fn mounted(&mut self, now: HostTime) -> Option<MountTransitionEvent> {
        self.mounts += 1;
        self.transition(now, MountPhase::Mounted)
    }

    /// Reports that insertion failed; the search continues.
    pub fn mount_failed(&mut self, now: HostTime) -> Option<MountTransitionEvent> {
        let next = match self.phase {
            MountPhase::Searching { since, .. } => MountPhase::Searching {
                since,
                next_poll: now.saturating_add(self.config.poll_interval),
            },
            MountPhase::Dormant { .. } => MountPhase::Dormant {
                next_poll: now.saturating_add(self.config.dormant_interval),
            },
            other => other,
        };
        self.transition(now, next)
    }

    /// Handles a page-wide DOM mutation.
    ///
    /// `button_live` is whether the previously inserted button is still
    /// connected to the document.
    pub fn on_mutation(&mut self, now: HostTime, button_live: bool) -> Option<MountTransitionEvent> {
        match self.phase {
            MountPhase::Mounted if !button_live => {
                let next = self.searching(now);
                self.transition(now, next)
            }
            MountPhase::Dormant { .. } => {
                let next = self.searching(now);
                self.transition(now, next)
            }
            _ => None,
        }
    }

    /// Marks a reinjection as in flight. Returns `false` if one already is.
    pub fn begin_reinjection(&mut self) -> bool {
        if self.reinjecting {
            return false;
        }
        self.reinjecting = true;
        true
    }

    /// Clears the in-flight reinjection flag.
    pub fn end_reinjection(&mut self) {
        self.reinjecting = false;
    }

    fn is_ready(&self, probe: &Probe) -> bool {
        probe.player_found
            && probe.controls_found
            && probe.video_ready
            && probe.width >= self.config.min_width
            && probe.height >= self.config.min_height
    }

    fn searching(&self, now: HostTime) -> MountPhase {
        MountPhase::Searching {
            since: now,
            next_poll: now,
        }
    }

    fn transition(&mut self, now: HostTime, next: MountPhase) -> Option<MountTransitionEvent> {
        let from = self.phase.kind();
        self.phase = next;
        (from != next.kind()).then_some(MountTransitionEvent {
            at: now,
            from,
            to: next.kind(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Duration;

    fn ms(v: u64) -> HostTime {
        HostTime(Duration::from_millis(v).ticks())
    }

    fn ready() -> Probe {
        Probe {
            player_found: true,
            controls_found: true,
            video_ready: true,
            width: 300.0,
            height: 48.0,
        }
    }

    #[test]
    fn non_video_page_stays_idle() {
        let mut w = MountWatchdog::new(MountConfig::web());
        assert!(w.navigate(ms(0), false).is_none());
        assert_eq!(w.phase(), MountPhase::Idle);
        assert!(!w.poll_due(ms(10_000)));
    }

    #[test]
    fn search_mounts_once_ready() {
        let mut w = MountWatchdog::new(MountConfig::web());
        let e = w.navigate(ms(0), true).unwrap();
        assert_eq!(e.to, MountPhaseKind::Searching);
        assert!(w.poll_due(ms(0)));

        let (cmd, _) = w.on_probe(ms(0), &Probe::default());
        assert_eq!(cmd, MountCommand::Wait);
        assert!(!w.poll_due(ms(100)));
        assert!(w.poll_due(ms(250)));

        let (cmd, _) = w.on_probe(ms(250), &ready());
        assert_eq!(cmd, MountCommand::Mount);
        let e = w.mounted(ms(260)).unwrap();
        assert_eq!(e.to, MountPhaseKind::Mounted);
        assert_eq!(w.mount_count(), 1);
        assert!(!w.poll_due(ms(10_000)));
    }

    #[test]
    fn degenerate_dimensions_are_not_ready() {
        let mut w = MountWatchdog::new(MountConfig::web());
        w.navigate(ms(0), true);
        let collapsed = Probe {
            width: 0.0,
            height: 0.0,
            ..ready()
        };
        assert_eq!(w.on_probe(ms(0), &collapsed).0, MountCommand::Wait);
        let unready = Probe {
            video_ready: false,
            ..ready()
        };
        assert_eq!(w.on_probe(ms(250), &unready).0, MountCommand::Wait);
    }

    #[test]
    fn exhausted_budget_goes_dormant_and_keeps_polling() {
        let mut w = MountWatchdog::new(MountConfig::web());
        w.navigate(ms(0), true);
        let (_, e) = w.on_probe(ms(10_000), &Probe::default());
        assert_eq!(e.unwrap().to, MountPhaseKind::Dormant);

        assert!(!w.poll_due(ms(12_000)));
        assert!(w.poll_due(ms(15_000)));
        let (cmd, e) = w.on_probe(ms(15_000), &Probe::default());
        assert_eq!(cmd, MountCommand::Wait);
        assert!(e.is_none(), "dormant to dormant is not a transition");
        assert!(w.poll_due(ms(20_000)));

        assert_eq!(w.on_probe(ms(20_000), &ready()).0, MountCommand::Mount);
    }

    #[test]
    fn mutation_restarts_dormant_search() {
        let mut w = MountWatchdog::new(MountConfig::web());
        w.navigate(ms(0), true);
        w.on_probe(ms(10_000), &Probe::default());
        let e = w.on_mutation(ms(11_000), false).unwrap();
        assert_eq!(e.to, MountPhaseKind::Searching);
        assert!(w.poll_due(ms(11_000)));
    }

    #[test]
    fn detached_button_triggers_search() {
        let mut w = MountWatchdog::new(MountConfig::web());
        w.navigate(ms(0), true);
        w.on_probe(ms(0), &ready());
        w.mounted(ms(0));

        assert!(w.on_mutation(ms(500), true).is_none());
        let e = w.on_mutation(ms(600), false).unwrap();
        assert_eq!(e.from, MountPhaseKind::Mounted);
        assert_eq!(e.to, MountPhaseKind::Searching);
    }

    #[test]
    fn reinjection_guard_blocks_polls() {
        let mut w = MountWatchdog::new(MountConfig::web());
        w.navigate(ms(0), true);
        assert!(w.begin_reinjection());
        assert!(!w.begin_reinjection());
        assert!(!w.poll_due(ms(1_000)));
        w.end_reinjection();
        assert!(w.poll_due(ms(1_000)));
    }

    #[test]
    fn failed_mount_retries_later() {
        let mut w = MountWatchdog::new(MountConfig::web());
        w.navigate(ms(0), true);
        assert_eq!(w.on_probe(ms(0), &ready()).0, MountCommand::Mount);
        assert!(w.mount_failed(ms(5)).is_none());
        assert!(!w.poll_due(ms(100)));
        assert!(w.poll_due(ms(255)));
    }
}
