// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The playback-speed domain.
//!
//! [`Speed`] is the user's intended playback rate. It can only be built
//! through a clamping constructor, so a `Speed` value is always inside
//! [`Speed::MIN`]..=[`Speed::MAX`].

use core::fmt;

/// Two rates closer than this are considered equal.
pub const RATE_TOLERANCE: f64 = 0.01;

/// Returns `true` if two raw playback rates are equal within
/// [`RATE_TOLERANCE`].
#[inline]
#[must_use]
pub fn rates_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= RATE_TOLERANCE
}

/// A playback speed clamped to `[0.2, 10.0]`.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub struct Speed(f64);

impl Default for Speed {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Speed {
    /// Slowest allowed speed.
    pub const MIN_RATE: f64 = 0.2;
    /// Fastest allowed speed.
    pub const MAX_RATE: f64 = 10.0;
    /// Speed used when nothing has been stored yet.
    pub const DEFAULT_RATE: f64 = 1.0;

    /// The slowest speed.
    pub const MIN: Self = Self(Self::MIN_RATE);
    /// The fastest speed.
    pub const MAX: Self = Self(Self::MAX_RATE);
    /// Normal speed.
    pub const DEFAULT: Self = Self(Self::DEFAULT_RATE);

    /// Clamps a finite rate into the speed domain.
    ///
    /// Non-finite input falls back to [`Speed::DEFAULT`]; use
    /// [`parse`](Self::parse) to reject it instead.
    #[must_use]
    pub fn clamped(rate: f64) -> Self {
        Self::parse(rate).unwrap_or(Self::DEFAULT)
    }

    /// Validates a rate arriving from outside (storage, messages, widgets).
    ///
    /// Returns `None` for NaN and infinities, otherwise the clamped speed.
    #[must_use]
    pub fn parse(rate: f64) -> Option<Self> {
        if rate.is_finite() {
            Some(Self(rate.clamp(Self::MIN_RATE, Self::MAX_RATE)))
        } else {
            None
        }
    }

    /// Returns the rate as a plain `f64`.
    #[inline]
    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }

    /// Returns `true` if `rate` equals this speed within [`RATE_TOLERANCE`].
    #[inline]
    #[must_use]
    pub fn matches(self, rate: f64) -> bool {
        rates_match(self.get(), rate)
    }

    /// Adds `delta`, rounds to two decimals, and clamps.
    #[must_use]
    pub fn step(self, delta: f64) -> Self {
        Self::clamped(round2(self.get() + delta))
    }
}

impl fmt::Debug for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Speed({})", self.get())
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Trim trailing zeros: 1.50 -> 1.5, 2.00 -> 2.
        let hundredths = round2(self.get()) * 100.0 + 0.5;
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "speed is within [0.2, 10], hundredths fit in u32"
        )]
        let hundredths = hundredths as u32;
        let whole = hundredths / 100;
        let frac = hundredths % 100;
        if frac == 0 {
            write!(f, "{whole}")
        } else if frac % 10 == 0 {
            write!(f, "{whole}.{}", frac / 10)
        } else {
            write!(f, "{whole}.{frac:02}")
        }
    }
}

fn round2(v: f64) -> f64 {
    // `f64::round` lives in std; add-and-truncate works for the positive domain.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "values are bounded by the speed domain plus one step"
    )]
    let scaled = (v * 100.0 + 0.5) as i64;
    scaled as f64 / 100.0
}
