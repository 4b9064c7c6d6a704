// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated host DOM around the player.

use ratekeeper_core::mount::Probe;

/// The parts of the host page the watchdog cares about.
///
/// Tracks how many nodes carrying the marker classes exist, so tests can
/// assert that mounting never duplicates the control surface.
#[derive(Clone, Debug)]
pub struct SimPage {
    /// The primary player container exists.
    pub player: bool,
    /// The controls container exists inside the player.
    pub controls: bool,
    /// Controls-container width in CSS pixels.
    pub width: f64,
    /// Controls-container height in CSS pixels.
    pub height: f64,
    button_nodes: u32,
    panel_nodes: u32,
}

impl Default for SimPage {
    fn default() -> Self {
        Self::empty()
    }
}

impl SimPage {
    /// A page with no player.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            player: false,
            controls: false,
            width: 0.0,
            height: 0.0,
            button_nodes: 0,
            panel_nodes: 0,
        }
    }

    /// Renders a full-size player with controls.
    pub fn render_player(&mut self) {
        self.player = true;
        self.controls = true;
        self.width = 640.0;
        self.height = 48.0;
    }

    /// Tears the player down, taking any injected nodes with it.
    pub fn destroy_player(&mut self) {
        self.player = false;
        self.controls = false;
        self.width = 0.0;
        self.height = 0.0;
        self.button_nodes = 0;
        self.panel_nodes = 0;
    }

    /// Probes the page; `video_ready` comes from the video element.
    #[must_use]
    pub fn probe(&self, video_ready: bool) -> Probe {
        Probe {
            player_found: self.player,
            controls_found: self.player && self.controls,
            video_ready,
            width: self.width,
            height: self.height,
        }
    }

    /// Removes every marker node.
    pub fn remove_injected(&mut self) {
        self.button_nodes = 0;
        self.panel_nodes = 0;
    }

    /// Inserts one button and one panel. Returns `false` if there is nowhere
    /// to put them.
    pub fn insert(&mut self) -> bool {
        if !(self.player && self.controls) {
            return false;
        }
        self.button_nodes += 1;
        self.panel_nodes += 1;
        true
    }

    /// Returns `true` while an injected button is in the document.
    #[must_use]
    pub fn button_live(&self) -> bool {
        self.button_nodes > 0
    }

    /// Number of nodes carrying the button marker.
    #[must_use]
    pub fn button_nodes(&self) -> u32 {
        self.button_nodes
    }

    /// Number of nodes carrying the panel marker.
    #[must_use]
    pub fn panel_nodes(&self) -> u32 {
        self.panel_nodes
    }
}
