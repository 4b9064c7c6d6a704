// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Timing windows for the reconciler and the mount watchdog.
//!
//! The windows were tuned against the host page's observed behavior. They
//! trade responsiveness for stability: shrinking them makes the reconciler
//! fight the host sooner, widening them leaves a wrong rate on screen longer.

use crate::time::Duration;

/// Configuration for the [`Reconciler`](crate::reconciler::Reconciler).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReconcilerConfig {
    /// Rate changes observed this soon after a manual change are treated as
    /// the echo of our own write.
    pub echo_window: Duration,
    /// Corrections are suppressed this long after a manual change.
    pub manual_grace: Duration,
    /// Corrections are suppressed this long after any external rate change.
    pub external_grace: Duration,
    /// Delay before restoring the desired speed once the host ends a
    /// temporary override.
    pub restore_delay: Duration,
    /// Coalescing window for persistence writes.
    pub persist_debounce: Duration,
    /// Period of the backstop reconciliation tick.
    pub tick_interval: Duration,
    /// Rates closer than this are considered equal.
    pub tolerance: f64,
}

impl ReconcilerConfig {
    /// Default configuration for the supported host page.
    #[must_use]
    pub const fn web() -> Self {
        Self {
            echo_window: Duration::from_millis(300),
            manual_grace: Duration::from_millis(500),
            external_grace: Duration::from_millis(1000),
            restore_delay: Duration::from_millis(100),
            persist_debounce: Duration::from_millis(300),
            tick_interval: Duration::from_millis(1000),
            tolerance: crate::speed::RATE_TOLERANCE,
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self::web()
    }
}

/// Configuration for the [`MountWatchdog`](crate::mount::MountWatchdog).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MountConfig {
    /// Probe cadence while actively searching for the player.
    pub poll_interval: Duration,
    /// Wall-clock budget for one search before going dormant.
    pub search_budget: Duration,
    /// Probe cadence once the search budget is spent.
    pub dormant_interval: Duration,
    /// Smallest controls-container width accepted as laid out, in CSS pixels.
    pub min_width: f64,
    /// Smallest controls-container height accepted as laid out, in CSS pixels.
    pub min_height: f64,
}

impl MountConfig {
    /// Default configuration for the supported host page.
    #[must_use]
    pub const fn web() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            search_budget: Duration::from_millis(10_000),
            dormant_interval: Duration::from_millis(5_000),
            min_width: 40.0,
            min_height: 20.0,
        }
    }
}

impl Default for MountConfig {
    fn default() -> Self {
        Self::web()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_defaults() {
        let cfg = ReconcilerConfig::default();
        assert_eq!(cfg.echo_window.as_millis(), 300);
        assert_eq!(cfg.manual_grace.as_millis(), 500);
        assert_eq!(cfg.external_grace.as_millis(), 1000);
        assert_eq!(cfg.restore_delay.as_millis(), 100);
        assert_eq!(cfg.persist_debounce.as_millis(), 300);
        assert_eq!(cfg.tick_interval.as_millis(), 1000);

        let mount = MountConfig::default();
        assert!(mount.dormant_interval > mount.poll_interval);
        assert!(mount.search_budget > mount.poll_interval);
    }
}
