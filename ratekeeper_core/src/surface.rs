// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Control-surface intents: what the panel and keyboard ask for.
//!
//! Widgets are built by the browser driver; this module only maps raw input
//! (a preset index, a slider position, a key press) to an [`Intent`] and an
//! intent to the requested speed.

use alloc::string::String;

use crate::speed::Speed;
use crate::trace::ChangeSource;

/// Preset speeds shown in the panel, in display order.
pub const PRESETS: [f64; 10] = [0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0, 2.5, 3.0, 4.0];

/// Keyboard increment and decrement step.
pub const KEY_STEP: f64 = 0.1;

/// Slider positions run from `0` to this value.
pub const SLIDER_MAX: u32 = 1000;

/// A user action on the control surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Intent {
    /// A preset button was pressed.
    Preset(Speed),
    /// The slider moved.
    Slide(Speed),
    /// Speed up by [`KEY_STEP`].
    Increment,
    /// Slow down by [`KEY_STEP`].
    Decrement,
    /// Back to [`Speed::DEFAULT`].
    Reset,
    /// The slider grab started.
    DragStart,
    /// The slider was released.
    DragEnd,
}

impl Intent {
    /// Returns the speed this intent requests, given the current one.
    ///
    /// Drag boundaries request nothing.
    #[must_use]
    pub fn requested(self, current: Speed) -> Option<f64> {
        match self {
            Self::Preset(s) | Self::Slide(s) => Some(s.get()),
            Self::Increment => Some(current.step(KEY_STEP).get()),
            Self::Decrement => Some(current.step(-KEY_STEP).get()),
            Self::Reset => Some(Speed::DEFAULT_RATE),
            Self::DragStart | Self::DragEnd => None,
        }
    }

    /// Returns the trace source for this intent, if it changes the speed.
    #[must_use]
    pub const fn source(self) -> Option<ChangeSource> {
        match self {
            Self::Preset(_) => Some(ChangeSource::Preset),
            Self::Slide(_) => Some(ChangeSource::Slider),
            Self::Increment | Self::Decrement => Some(ChangeSource::Keyboard),
            Self::Reset => Some(ChangeSource::Reset),
            Self::DragStart | Self::DragEnd => None,
        }
    }
}

/// A key press, reduced to what the shortcut mapping needs.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyPress<'a> {
    /// `KeyboardEvent.key`.
    pub key: &'a str,
    /// Ctrl was held.
    pub ctrl: bool,
    /// Alt was held.
    pub alt: bool,
    /// Meta was held.
    pub meta: bool,
    /// Focus is in an input, textarea, or contenteditable element.
    pub editable_focus: bool,
}

/// Maps a key press to a shortcut intent.
#[must_use]
pub fn shortcut(press: &KeyPress<'_>) -> Option<Intent> {
    if press.ctrl || press.alt || press.meta || press.editable_focus {
        return None;
    }
    match press.key {
        "d" | "D" => Some(Intent::Increment),
        "s" | "S" => Some(Intent::Decrement),
        "r" | "R" => Some(Intent::Reset),
        _ => None,
    }
}

/// Maps a slider position in `[0, SLIDER_MAX]` to a speed.
///
/// Out-of-range positions are clamped; non-finite ones are rejected.
#[must_use]
pub fn slider_speed(position: f64) -> Option<Speed> {
    if !position.is_finite() {
        return None;
    }
    let t = position.clamp(0.0, f64::from(SLIDER_MAX)) / f64::from(SLIDER_MAX);
    Speed::parse(Speed::MIN_RATE + t * (Speed::MAX_RATE - Speed::MIN_RATE))
        .map(|s| s.step(0.0))
}

/// Maps a speed to the nearest slider position.
#[must_use]
pub fn slider_position(speed: Speed) -> u32 {
    let t = (speed.get() - Speed::MIN_RATE) / (Speed::MAX_RATE - Speed::MIN_RATE);
    let pos = t * f64::from(SLIDER_MAX) + 0.5;
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "t is in [0, 1], so pos is in [0.5, 1000.5]"
    )]
    let pos = pos as u32;
    pos.min(SLIDER_MAX)
}

/// Button text for `speed`, e.g. `"1.5×"`.
#[must_use]
pub fn label(speed: Speed) -> String {
    alloc::format!("{speed}×")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_in_domain_and_ordered() {
        for pair in PRESETS.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        for p in PRESETS {
            assert_eq!(Speed::clamped(p).get(), p);
        }
    }

    fn key(k: &str) -> KeyPress<'_> {
        KeyPress {
            key: k,
            ..KeyPress::default()
        }
    }

    #[test]
    fn shortcuts() {
        assert_eq!(shortcut(&key("d")), Some(Intent::Increment));
        assert_eq!(shortcut(&key("s")), Some(Intent::Decrement));
        assert_eq!(shortcut(&key("r")), Some(Intent::Reset));
        assert_eq!(shortcut(&key("x")), None);

        let with_ctrl = KeyPress {
            ctrl: true,
            ..key("d")
        };
        assert_eq!(shortcut(&with_ctrl), None);
        let typing = KeyPress {
            editable_focus: true,
            ..key("s")
        };
        assert_eq!(shortcut(&typing), None);
    }

    #[test]
    fn keyboard_steps_round_to_hundredths() {
        let mut s = Speed::DEFAULT;
        for _ in 0..3 {
            s = Speed::clamped(Intent::Increment.requested(s).unwrap());
        }
        assert_eq!(s.get(), 1.3);
        assert_eq!(Intent::Reset.requested(s), Some(1.0));
        assert_eq!(Intent::DragStart.requested(s), None);
    }

    #[test]
    fn slider_ends_map_to_domain_ends() {
        assert_eq!(slider_speed(0.0), Some(Speed::MIN));
        assert_eq!(slider_speed(1000.0), Some(Speed::MAX));
        assert_eq!(slider_speed(5000.0), Some(Speed::MAX));
        assert_eq!(slider_speed(f64::NAN), None);
        assert_eq!(slider_position(Speed::MIN), 0);
        assert_eq!(slider_position(Speed::MAX), SLIDER_MAX);
    }

    #[test]
    fn slider_position_round_trips_presets() {
        for p in PRESETS {
            let s = Speed::clamped(p);
            let back = slider_speed(f64::from(slider_position(s))).unwrap();
            assert!(back.matches(p), "{p} came back as {back}");
        }
    }

    #[test]
    fn label_text() {
        assert_eq!(label(Speed::clamped(1.5)), "1.5×");
        assert_eq!(label(Speed::DEFAULT), "1×");
    }
}
