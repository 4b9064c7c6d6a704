// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Static description of the supported host page family.
//!
//! Every selector here is scoped by the primary player's stable id. The host
//! also renders preview players (hover thumbnails, miniplayer) that share the
//! same generic class names; a bare class match would find those first.

/// Selectors, event names, and markers for one host page family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostProfile {
    /// Stable selector for the primary player container.
    pub player: &'static str,
    /// Selector for the primary video element, scoped to the player.
    pub video: &'static str,
    /// Controls-container selectors, scoped to the player, tried in order.
    pub controls: &'static [&'static str],
    /// Window-level events fired by the host's client-side router.
    pub navigation_events: &'static [&'static str],
    /// Path prefixes of pages that host a primary player.
    pub video_paths: &'static [&'static str],
    /// Class carried by the injected toggle button.
    pub button_class: &'static str,
    /// Class carried by the injected panel.
    pub panel_class: &'static str,
}

impl HostProfile {
    /// The single supported host.
    pub const YOUTUBE: Self = Self {
        player: "#movie_player",
        video: "#movie_player video.html5-main-video",
        controls: &[
            "#movie_player .ytp-right-controls",
            "#movie_player .ytp-chrome-controls .ytp-right-controls",
            "#movie_player .ytp-chrome-bottom",
        ],
        navigation_events: &["yt-navigate-finish", "yt-page-data-updated", "popstate"],
        video_paths: &["/watch", "/shorts/", "/live/", "/embed/"],
        button_class: "ratekeeper-button",
        panel_class: "ratekeeper-panel",
    };

    /// Returns `true` if `path` is a page with a primary player.
    #[must_use]
    pub fn is_video_page(&self, path: &str) -> bool {
        self.video_paths.iter().any(|prefix| {
            path.strip_prefix(prefix).is_some_and(|rest| {
                // "/watch" must not match "/watchlist".
                prefix.ends_with('/') || rest.is_empty() || rest.starts_with(['?', '/'])
            })
        })
    }

    /// Selector matching every injected node, for orphan removal.
    #[must_use]
    pub fn marker_selector(&self) -> alloc::string::String {
        alloc::format!(".{}, .{}", self.button_class, self.panel_class)
    }
}

impl Default for HostProfile {
    fn default() -> Self {
        Self::YOUTUBE
    }
}
