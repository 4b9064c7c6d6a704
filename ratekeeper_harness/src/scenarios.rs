// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end scenarios on the simulated host.

use alloc::vec::Vec;

use ratekeeper_core::mount::MountPhaseKind;
use ratekeeper_core::persist::StoredValue;
use ratekeeper_core::reconciler::{CorrectionReason, RateDecision};
use ratekeeper_core::speed::Speed;
use ratekeeper_core::surface::{Intent, KeyPress};
use ratekeeper_core::trace::ChangeSource;

use crate::{Recorded, SimHost};

/// A watch page with the control surface mounted at 1×.
fn mounted_host() -> SimHost {
    let mut h = SimHost::new();
    h.navigate("/watch?v=first");
    h.render_player(true);
    h.advance_ms(10);
    assert!(h.is_mounted(), "player was ready, mount should be immediate");
    h
}

/// [`mounted_host`] with the desired speed set and all windows expired.
fn host_at(speed: f64) -> SimHost {
    let mut h = mounted_host();
    h.set_speed(speed, ChangeSource::Preset);
    h.advance_ms(2_000);
    h.clear_trace();
    h
}

#[test]
fn stored_speed_is_clamped() {
    let mut h = SimHost::new();
    for (requested, stored) in [
        (-3.0, 0.2),
        (0.05, 0.2),
        (0.2, 0.2),
        (1.25, 1.25),
        (9.99, 9.99),
        (10.0, 10.0),
        (64.0, 10.0),
    ] {
        h.set_speed(requested, ChangeSource::Slider);
        h.advance_ms(400);
        assert_eq!(h.store().value(), Some(stored), "requested {requested}");
        assert_eq!(h.reconciler().desired().get(), stored);
    }
}

#[test]
fn non_finite_requests_change_nothing() {
    let mut h = host_at(1.5);
    assert_eq!(h.set_speed(f64::NAN, ChangeSource::Message), None);
    assert_eq!(h.set_speed(f64::INFINITY, ChangeSource::Message), None);
    h.advance_ms(1_000);
    assert_eq!(h.reconciler().desired(), Speed::clamped(1.5));
    assert_eq!(h.video().rate(), 1.5);
}

#[test]
fn same_speed_twice_writes_once() {
    let mut h = mounted_host();
    h.set_speed(1.5, ChangeSource::Preset);
    h.advance_ms(400);
    h.set_speed(1.5, ChangeSource::Preset);
    h.advance_ms(400);
    h.set_speed(1.5, ChangeSource::Keyboard);
    h.set_speed(1.5, ChangeSource::Keyboard);
    h.advance_ms(400);
    assert_eq!(h.store().writes(), &[1.5]);
}

#[test]
fn own_write_is_an_echo() {
    let mut h = mounted_host();
    h.clear_trace();
    h.set_speed(2.0, ChangeSource::Preset);
    h.advance_ms(250);

    let decisions: Vec<_> = h.trace().decisions().collect();
    assert_eq!(decisions, &[RateDecision::Echo]);
    assert_eq!(h.trace().corrections().count(), 0);
    assert_eq!(h.reconciler().temporary_rate(), None);
    assert!(!h.reconciler().restore_pending());
}

#[test]
fn hold_is_tolerated_and_release_is_restored() {
    let mut h = host_at(1.5);

    // Hold-to-fast-forward.
    h.host_rate(2.0);
    assert_eq!(
        h.trace().decisions().last(),
        Some(RateDecision::OverrideStarted)
    );
    h.advance_ms(1_500);
    assert_eq!(h.video().rate(), 2.0, "the hold must not be corrected");
    assert_eq!(h.trace().corrections().count(), 0);

    // Release: the host falls back to its own default.
    h.host_rate(1.0);
    let released_at = h.now();
    assert!(matches!(
        h.trace().decisions().last(),
        Some(RateDecision::OverrideEnded { .. })
    ));
    h.advance_ms(100);
    assert_eq!(h.video().rate(), 1.5);

    let restores: Vec<_> = h
        .trace()
        .corrections_for(CorrectionReason::Restore)
        .collect();
    assert_eq!(restores.len(), 1);
    assert_eq!(restores[0].from, 1.0);
    assert!(restores[0].at.saturating_duration_since(released_at).as_millis() <= 100);
}

#[test]
fn silent_reset_is_caught_by_backstop() {
    let mut h = host_at(1.5);
    h.advance_ms(3_000);
    let reset_at = h.now();
    h.host_rate_silently(1.0);

    h.advance_ms(1_000);
    assert_eq!(h.video().rate(), 1.5);
    let ticks: Vec<_> = h.trace().corrections_for(CorrectionReason::Tick).collect();
    assert_eq!(ticks.len(), 1);
    assert!(ticks[0].at.saturating_duration_since(reset_at).as_millis() <= 1_000);
}

#[test]
fn reset_to_default_after_an_ad_is_corrected() {
    let mut h = host_at(1.5);
    h.advance_ms(3_000);
    let reset_at = h.now();
    h.host_rate(1.0);
    assert_eq!(
        h.trace().decisions().last(),
        Some(RateDecision::OverrideStarted)
    );

    h.advance_ms(500);
    assert_eq!(h.video().rate(), 1.0, "still inside the external grace");

    h.advance_ms(1_500);
    assert_eq!(h.video().rate(), 1.5);
    let ticks: Vec<_> = h.trace().corrections_for(CorrectionReason::Tick).collect();
    assert_eq!(ticks.len(), 1);
    assert!(ticks[0].at.saturating_duration_since(reset_at).as_millis() <= 2_000);
    assert_eq!(h.reconciler().temporary_rate(), None);

    h.advance_ms(10_000);
    assert_eq!(h.trace().corrections().count(), 1);
}

#[test]
fn drag_writes_once_after_release() {
    let mut h = mounted_host();
    h.apply(Intent::DragStart);
    for i in 1..=20_u32 {
        h.apply(Intent::Slide(Speed::clamped(f64::from(10 + i) / 10.0)));
        h.advance_ms(50);
        assert!(h.store().writes().is_empty(), "no write while dragging");
    }
    assert_eq!(h.video().rate(), 3.0);
    h.apply(Intent::DragEnd);

    h.advance_ms(200);
    assert!(h.store().writes().is_empty(), "debounce window still open");
    h.advance_ms(50);
    assert_eq!(h.store().writes(), &[3.0]);

    h.advance_ms(2_000);
    assert_eq!(h.store().writes(), &[3.0]);
}

#[test]
fn drag_suspends_reconciliation() {
    let mut h = host_at(1.5);
    h.apply(Intent::DragStart);
    h.host_rate(1.0);
    h.advance_ms(2_500);
    assert_eq!(h.video().rate(), 1.0);
    assert!(h.trace().decisions().all(|d| d == RateDecision::Suspended));
    assert_eq!(h.trace().corrections().count(), 0);

    h.apply(Intent::DragEnd);
    h.advance_ms(1_000);
    assert_eq!(h.video().rate(), 1.5);
}

#[test]
fn remounts_never_duplicate_the_surface() {
    let mut h = host_at(1.25);
    for _ in 0..3 {
        h.rebuild_player();
        assert!(h.page().button_nodes() <= 1);
        h.advance_ms(300);
        assert!(h.is_mounted());
        assert_eq!(h.page().button_nodes(), 1);
        assert_eq!(h.page().panel_nodes(), 1);
        assert_eq!(h.video().rate(), 1.25, "new element gets the desired speed");
    }
    assert_eq!(h.trace().entered(MountPhaseKind::Mounted), 3);
}

#[test]
fn navigation_remounts_and_reapplies() {
    let mut h = host_at(1.75);
    h.navigate("/watch?v=second");
    assert_eq!(h.page().button_nodes(), 0);
    h.replace_video();
    assert_eq!(h.video().rate(), 1.0);

    h.advance_ms(500);
    assert!(h.is_mounted());
    assert_eq!(h.page().button_nodes(), 1);
    assert_eq!(h.video().rate(), 1.75);
    assert_eq!(
        h.trace().corrections_for(CorrectionReason::Attach).count(),
        1
    );
}

#[test]
fn leaving_the_watch_page_goes_idle() {
    let mut h = host_at(1.5);
    h.navigate("/feed/subscriptions");
    assert_eq!(h.trace().entered(MountPhaseKind::Idle), 1);
    h.advance_ms(20_000);
    assert_eq!(h.page().button_nodes(), 0);
    assert_eq!(h.watchdog().mount_count(), 1);
}

#[test]
fn late_player_is_found_after_going_dormant() {
    let mut h = SimHost::new();
    h.navigate("/watch?v=slow");
    h.advance_ms(10_500);
    assert_eq!(h.trace().entered(MountPhaseKind::Dormant), 1);
    assert!(!h.is_mounted());

    h.render_player(true);
    h.advance_ms(10);
    assert!(h.is_mounted());
}

#[test]
fn dormant_probe_self_heals_without_mutations() {
    let mut h = SimHost::new();
    h.navigate("/watch?v=slow");
    h.advance_ms(10_500);
    h.render_player_unobserved(true);

    // Dormant probes run every 5 s; the next one is at 15 s.
    h.advance_ms(4_000);
    assert!(!h.is_mounted());
    h.advance_ms(600);
    assert!(h.is_mounted());
    assert_eq!(h.trace().entered(MountPhaseKind::Searching), 1);
    assert_eq!(h.trace().entered(MountPhaseKind::Mounted), 1);
}

#[test]
fn player_without_controls_is_still_controlled() {
    let mut h = SimHost::new();
    assert!(h.storage_value(StoredValue::Number(1.75)));
    h.navigate("/watch?v=bare");
    h.render_player_without_controls(true);
    h.advance_ms(10);
    assert_eq!(h.video().rate(), 1.75, "stored speed reaches the video");

    h.advance_ms(11_000);
    assert_eq!(h.trace().entered(MountPhaseKind::Dormant), 1);
    assert!(!h.is_mounted());
    assert_eq!(h.page().button_nodes(), 0);

    assert_eq!(
        h.message(r#"{"action":"setSpeed","speed":2}"#).unwrap(),
        r#"{"success":true,"currentSpeed":2.0}"#
    );
    assert_eq!(h.video().rate(), 2.0);

    h.host_rate_silently(1.0);
    h.advance_ms(1_000);
    assert_eq!(h.video().rate(), 2.0, "backstop runs without a mount");
}

#[test]
fn video_is_unreachable_until_attached() {
    let mut h = SimHost::new();
    h.navigate("/watch?v=x");
    h.render_player_unobserved(true);
    assert_eq!(
        h.message(r#"{"action":"setSpeed","speed":3}"#).unwrap(),
        r#"{"success":true,"currentSpeed":3.0}"#
    );
    assert_eq!(h.video().rate(), 1.0);

    h.advance_ms(10);
    assert_eq!(h.video().rate(), 3.0);
    assert_eq!(
        h.trace().corrections_for(CorrectionReason::Attach).count(),
        1
    );
}

#[test]
fn waits_for_metadata_before_mounting() {
    let mut h = SimHost::new();
    assert!(h.storage_value(StoredValue::Number(2.0)));
    h.navigate("/watch?v=x");
    h.render_player(false);
    h.advance_ms(1_000);
    assert!(!h.is_mounted());

    h.video_ready();
    h.advance_ms(250);
    assert!(h.is_mounted());
    assert_eq!(h.video().rate(), 2.0);
}

#[test]
fn storage_failure_keeps_control_in_memory() {
    let mut h = host_at(1.0);
    h.reject_writes(true);
    h.set_speed(2.5, ChangeSource::Preset);
    h.advance_ms(400);
    assert!(h.reconciler().persistence().is_degraded());
    assert!(h.reconciler().persistence().last_error().is_some());
    assert!(
        h.trace()
            .events()
            .iter()
            .any(|e| matches!(e, Recorded::Persist(p) if !p.ok))
    );

    h.reject_writes(false);
    h.set_speed(3.0, ChangeSource::Preset);
    h.advance_ms(400);
    assert_eq!(h.video().rate(), 3.0);
    assert_eq!(h.store().writes(), &[1.0]);
}

#[test]
fn storage_change_from_elsewhere_is_adopted_without_rewrite() {
    let mut h = host_at(1.0);
    assert!(h.storage_value(StoredValue::Number(2.5)));
    assert_eq!(h.video().rate(), 2.5);
    h.advance_ms(1_000);
    assert_eq!(h.store().writes(), &[1.0], "adopted values are not written back");

    assert!(!h.storage_value(StoredValue::Text("garbage")));
    assert!(!h.storage_value(StoredValue::Missing));
    assert_eq!(h.reconciler().desired(), Speed::clamped(2.5));
}

#[test]
fn popup_round_trip() {
    let mut h = host_at(1.0);
    assert_eq!(
        h.message(r#"{"action":"setSpeed","speed":25}"#).unwrap(),
        r#"{"success":true,"currentSpeed":10.0}"#
    );
    assert_eq!(h.video().rate(), 10.0);
    assert_eq!(
        h.message(r#"{"action":"getSpeed"}"#).unwrap(),
        r#"{"currentSpeed":10.0}"#
    );
    assert!(h.message(r#"{"action":"selfDestruct"}"#).is_err());
}

fn press(key: &str) -> KeyPress<'_> {
    KeyPress {
        key,
        ..KeyPress::default()
    }
}

#[test]
fn keyboard_shortcuts_step_and_reset() {
    let mut h = host_at(1.0);
    h.key(&press("d"));
    h.key(&press("d"));
    assert_eq!(h.reconciler().desired().get(), 1.2);
    h.key(&press("s"));
    assert_eq!(h.reconciler().desired().get(), 1.1);
    h.key(&KeyPress {
        ctrl: true,
        ..press("r")
    });
    assert_eq!(h.reconciler().desired().get(), 1.1);
    h.key(&press("r"));
    assert_eq!(h.reconciler().desired(), Speed::DEFAULT);
}
