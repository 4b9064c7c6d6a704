// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pretty-printing and Chrome trace export for ratekeeper diagnostics.
//!
//! This crate provides [`TraceSink`](ratekeeper_core::trace::TraceSink)
//! implementations for development and post-mortem analysis of the
//! reconciler and the mount watchdog:
//!
//! - [`pretty::PrettyPrintSink`]: human-readable one-line-per-event output.
//! - [`chrome::ChromeTraceSink`]: collects events and writes Chrome Trace
//!   Event Format JSON.

pub mod chrome;
pub mod pretty;
