// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Debounced persistence of the desired speed.
//!
//! A slider drag produces a stream of speeds; only the last value inside a
//! [`persist_debounce`](crate::config::ReconcilerConfig::persist_debounce)
//! window is written. The first rejected write switches persistence off for
//! the rest of the session, leaving in-memory control intact.

use crate::error::StoreError;
use crate::speed::Speed;
use crate::time::{Duration, HostTime};
use crate::trace::PersistEvent;

/// Storage key holding the desired speed.
pub const SPEED_KEY: &str = "preferredSpeed";

/// Write side of the key-value persistence adapter.
///
/// Reads and change notifications are asynchronous in the browser and are
/// delivered to the reconciler through
/// [`Reconciler::adopt_stored`](crate::reconciler::Reconciler::adopt_stored).
pub trait SpeedStore {
    /// Durably stores `value` under `key`.
    fn save(&mut self, key: &str, value: f64) -> Result<(), StoreError>;
}

/// A raw value read back from storage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StoredValue<'a> {
    /// The key is absent.
    Missing,
    /// A numeric value.
    Number(f64),
    /// A string value, as written by older builds.
    Text(&'a str),
}

/// Validates a stored value.
///
/// Returns `None` for missing, non-numeric, or non-finite values; finite
/// values are clamped into the speed domain.
#[must_use]
pub fn decode_stored(raw: StoredValue<'_>) -> Option<Speed> {
    match raw {
        StoredValue::Missing => None,
        StoredValue::Number(v) => Speed::parse(v),
        StoredValue::Text(s) => s.trim().parse::<f64>().ok().and_then(Speed::parse),
    }
}

/// Coalesces a burst of values into one, emitted after a quiet period.
#[derive(Clone, Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(T, HostTime)>,
    last_flushed: Option<T>,
}

impl<T: Copy + PartialEq> Debouncer<T> {
    /// Creates a debouncer with the given quiet window.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            last_flushed: None,
        }
    }

    /// Records a new value and restarts the quiet window.
    pub fn push(&mut self, now: HostTime, value: T) {
        self.pending = Some((value, now.saturating_add(self.window)));
    }

    /// Returns when the pending value becomes due, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<HostTime> {
        self.pending.map(|(_, due)| due)
    }

    /// Returns `true` if a value is waiting for its window to close.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Takes the pending value once its window has closed.
    ///
    /// A value equal to the last one taken is dropped instead of returned.
    pub fn take_due(&mut self, now: HostTime) -> Option<T> {
        let (value, due) = self.pending?;
        if now < due {
            return None;
        }
        self.pending = None;
        if self.last_flushed == Some(value) {
            return None;
        }
        self.last_flushed = Some(value);
        Some(value)
    }

    /// Records `value` as already durable without emitting it.
    pub fn mark_flushed(&mut self, value: T) {
        self.last_flushed = Some(value);
    }

    /// Drops the pending value.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

/// Debounced writer over a [`SpeedStore`].
#[derive(Debug)]
pub struct Persistence<S> {
    store: S,
    debounce: Debouncer<Speed>,
    degraded: bool,
    last_error: Option<StoreError>,
}

impl<S: SpeedStore> Persistence<S> {
    /// Creates a writer with the given debounce window.
    #[must_use]
    pub const fn new(store: S, window: Duration) -> Self {
        Self {
            store,
            debounce: Debouncer::new(window),
            degraded: false,
            last_error: None,
        }
    }

    /// Schedules `speed` to be written once the window closes.
    ///
    /// Does nothing once persistence has been disabled by a failed write.
    pub fn schedule(&mut self, now: HostTime, speed: Speed) {
        if !self.degraded {
            self.debounce.push(now, speed);
        }
    }

    /// Notes that `speed` is already durable (loaded or changed elsewhere).
    pub fn note_durable(&mut self, speed: Speed) {
        self.debounce.cancel();
        self.debounce.mark_flushed(speed);
    }

    /// Returns when the next write is due.
    #[must_use]
    pub fn deadline(&self) -> Option<HostTime> {
        self.debounce.deadline()
    }

    /// Writes the coalesced value if its window has closed.
    pub fn flush_due(&mut self, now: HostTime) -> Option<PersistEvent> {
        let speed = self.debounce.take_due(now)?;
        let ok = match self.store.save(SPEED_KEY, speed.get()) {
            Ok(()) => true,
            Err(e) => {
                self.last_error = Some(e);
                self.degraded = true;
                self.debounce.cancel();
                false
            }
        };
        Some(PersistEvent { at: now, speed, ok })
    }

    /// Returns `true` once a write has failed and persistence is off.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Returns the error that disabled persistence, if one did.
    #[must_use]
    pub fn last_error(&self) -> Option<&StoreError> {
        self.last_error.as_ref()
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the underlying store mutably.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString as _;
    use alloc::vec::Vec;

    use super::*;

    #[derive(Default)]
    struct VecStore {
        writes: Vec<f64>,
        fail: bool,
    }

    impl SpeedStore for VecStore {
        fn save(&mut self, key: &str, value: f64) -> Result<(), StoreError> {
            assert_eq!(key, SPEED_KEY, "writes go to the speed key");
            if self.fail {
                return Err(StoreError::Rejected("quota".to_string()));
            }
            self.writes.push(value);
            Ok(())
        }
    }

    const WINDOW: Duration = Duration::from_millis(300);

    #[test]
    fn burst_collapses_to_last_value() {
        let mut d = Debouncer::new(WINDOW);
        d.push(HostTime(0), 1);
        d.push(HostTime(100_000), 2);
        d.push(HostTime(200_000), 3);
        assert_eq!(d.take_due(HostTime(450_000)), None);
        assert_eq!(d.take_due(HostTime(500_000)), Some(3));
        assert!(!d.is_pending());
    }

    #[test]
    fn repeated_value_is_not_reemitted() {
        let mut d = Debouncer::new(WINDOW);
        d.push(HostTime(0), 7);
        assert_eq!(d.take_due(HostTime(300_000)), Some(7));
        d.push(HostTime(1_000_000), 7);
        assert_eq!(d.take_due(HostTime(2_000_000)), None);
    }

    #[test]
    fn flush_writes_once() {
        let mut p = Persistence::new(VecStore::default(), WINDOW);
        p.schedule(HostTime(0), Speed::clamped(1.5));
        p.schedule(HostTime(50_000), Speed::clamped(1.5));
        assert!(p.flush_due(HostTime(200_000)).is_none());
        let e = p.flush_due(HostTime(350_000)).unwrap();
        assert!(e.ok);
        assert_eq!(p.store().writes, &[1.5]);
        assert!(p.flush_due(HostTime(900_000)).is_none());
    }

    #[test]
    fn failure_degrades_to_memory_only() {
        let mut p = Persistence::new(
            VecStore {
                fail: true,
                ..VecStore::default()
            },
            WINDOW,
        );
        p.schedule(HostTime(0), Speed::clamped(2.0));
        let e = p.flush_due(HostTime(300_000)).unwrap();
        assert!(!e.ok);
        assert!(p.is_degraded());
        assert_eq!(
            p.last_error(),
            Some(&StoreError::Rejected("quota".to_string()))
        );

        p.store_mut().fail = false;
        p.schedule(HostTime(400_000), Speed::clamped(3.0));
        assert!(p.deadline().is_none());
        assert!(p.store().writes.is_empty());
    }

    #[test]
    fn durable_value_is_not_rewritten() {
        let mut p = Persistence::new(VecStore::default(), WINDOW);
        p.note_durable(Speed::clamped(1.25));
        p.schedule(HostTime(0), Speed::clamped(1.25));
        assert!(p.flush_due(HostTime(300_000)).is_none());
    }

    #[test]
    fn decode_stored_values() {
        assert_eq!(decode_stored(StoredValue::Missing), None);
        assert_eq!(
            decode_stored(StoredValue::Number(1.75)),
            Some(Speed::clamped(1.75))
        );
        assert_eq!(decode_stored(StoredValue::Number(40.0)), Some(Speed::MAX));
        assert_eq!(decode_stored(StoredValue::Number(f64::NAN)), None);
        assert_eq!(
            decode_stored(StoredValue::Text(" 2.5 ")),
            Some(Speed::clamped(2.5))
        );
        assert_eq!(decode_stored(StoredValue::Text("fast")), None);
    }
}
