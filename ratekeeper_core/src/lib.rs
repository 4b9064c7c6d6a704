// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! State machines for a playback-speed overlay on a hostile host page.
//!
//! `ratekeeper_core` holds everything the content script decides, and none of
//! the browser glue that carries it out. It is `no_std` compatible (with
//! `alloc`); every operation takes the current [`HostTime`](time::HostTime)
//! explicitly, so the same code runs under `performance.now()` in the browser
//! and under a virtual clock in tests.
//!
//! # Architecture
//!
//! ```text
//!   panel / keys / popup ──► Intent ──► Reconciler::set_desired_speed()
//!                                              │            │
//!                                              ▼            ▼
//!   video `ratechange` ──► on_observed_rate_change()   Persistence ──► SpeedStore
//!   1 s backstop, `play` ──► on_periodic_tick() / on_play()
//!                                              │
//!                          next_deadline() ◄───┴───► service()
//!
//!   navigation / mutations ──► MountWatchdog ──► MountCommand::Mount ──► driver
//! ```
//!
//! **[`reconciler`]**: Decides whether an observed `playbackRate` change is
//! an echo of our own write, a host catch-up, a temporary override to leave
//! alone, or a drift to correct.
//!
//! **[`persist`]**: Debounced, deduplicating writes of the desired speed,
//! degrading to memory-only on the first storage failure.
//!
//! **[`mount`]**: Injection/recovery watchdog: bounded search, dormant
//! polling, remount after the host rebuilds its player.
//!
//! **[`host`]**: Selectors and event names of the supported host.
//!
//! **[`message`]**: `serde` protocol for the extension popup.
//!
//! **[`surface`]**: Presets, keyboard shortcuts, slider mapping.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types, with
//! a zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod config;
pub mod error;
pub mod host;
pub mod message;
pub mod mount;
pub mod persist;
pub mod reconciler;
pub mod speed;
pub mod surface;
pub mod time;
pub mod trace;
