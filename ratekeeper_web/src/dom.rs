// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host DOM queries.

use ratekeeper_core::host::HostProfile;
use ratekeeper_core::mount::Probe;
use wasm_bindgen::JsCast as _;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, HtmlElement, HtmlVideoElement};

/// `HTMLMediaElement.HAVE_METADATA`.
const HAVE_METADATA: u16 = 1;

/// Result of one probe: the readiness report plus the nodes it found.
#[derive(Debug, Default)]
pub struct Found {
    /// Readiness report for the mount watchdog.
    pub probe: Probe,
    /// The primary player container.
    pub player: Option<HtmlElement>,
    /// The primary video element.
    pub video: Option<HtmlVideoElement>,
    /// The controls container the button goes into.
    pub controls: Option<HtmlElement>,
}

/// Locates the primary player, its video, and its controls container.
///
/// Controls selectors are tried in profile order; the first match wins.
pub fn probe(document: &Document, profile: &HostProfile) -> Result<Found, JsValue> {
    let player = query::<HtmlElement>(document, profile.player)?;
    let video = find_video(document, profile)?;
    let mut controls = None;
    for selector in profile.controls {
        if let Some(el) = query::<HtmlElement>(document, selector)? {
            controls = Some(el);
            break;
        }
    }

    let (width, height) = controls.as_ref().map_or((0.0, 0.0), |el| {
        let rect = el.get_bounding_client_rect();
        (rect.width(), rect.height())
    });

    Ok(Found {
        probe: Probe {
            player_found: player.is_some(),
            controls_found: controls.is_some(),
            video_ready: video
                .as_ref()
                .is_some_and(|v| v.ready_state() >= HAVE_METADATA),
            width,
            height,
        },
        player,
        video,
        controls,
    })
}

/// Finds the primary video element.
pub fn find_video(
    document: &Document,
    profile: &HostProfile,
) -> Result<Option<HtmlVideoElement>, JsValue> {
    query::<HtmlVideoElement>(document, profile.video)
}

/// Removes every node carrying one of the marker classes.
///
/// Returns how many were removed.
pub fn remove_orphans(document: &Document, profile: &HostProfile) -> Result<u32, JsValue> {
    let nodes = document.query_selector_all(&profile.marker_selector())?;
    let count = nodes.length();
    for i in 0..count {
        if let Some(el) = nodes.get(i).and_then(|n| n.dyn_into::<Element>().ok()) {
            el.remove();
        }
    }
    Ok(count)
}

/// Returns `true` if keyboard focus is in a text-entry element.
#[must_use]
pub fn editable_focus(document: &Document) -> bool {
    let Some(active) = document.active_element() else {
        return false;
    };
    is_text_entry_tag(&active.tag_name())
        || active
            .dyn_ref::<HtmlElement>()
            .is_some_and(HtmlElement::is_content_editable)
}

fn is_text_entry_tag(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("input")
        || tag.eq_ignore_ascii_case("textarea")
        || tag.eq_ignore_ascii_case("select")
}

fn query<T: JsCast>(document: &Document, selector: &str) -> Result<Option<T>, JsValue> {
    Ok(document
        .query_selector(selector)?
        .and_then(|el| el.dyn_into::<T>().ok()))
}
