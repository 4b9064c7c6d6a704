// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The injected toggle button and speed panel.
//!
//! The button sits in the host's controls bar and shows the current speed.
//! Clicking it opens the panel: a row of presets, a slider over the full
//! speed domain, and a reset button. Every widget reports an [`Intent`];
//! the panel never touches the video itself.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;

use ratekeeper_core::host::HostProfile;
use ratekeeper_core::speed::Speed;
use ratekeeper_core::surface::{self, Intent, PRESETS, SLIDER_MAX};
use wasm_bindgen::JsCast as _;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Event, EventTarget, HtmlButtonElement, HtmlElement, HtmlInputElement};

const BUTTON_CSS: &str = "width: auto; min-width: 48px; padding: 0 6px; font: 600 13px/1 sans-serif; color: #fff; text-align: center; vertical-align: top;";
const PANEL_CSS: &str = "position: absolute; right: 12px; bottom: 60px; z-index: 70; display: none; padding: 10px 12px; border-radius: 8px; background: rgba(28,28,28,0.92); color: #eee; font: 13px/1.4 sans-serif;";
const PRESET_CSS: &str = "margin: 2px; padding: 3px 7px; border: 0; border-radius: 4px; background: rgba(255,255,255,0.12); color: inherit; cursor: pointer;";
const ACTIVE_CLASS: &str = "ratekeeper-active";

/// Callback receiving every intent raised by the panel.
pub type IntentHandler = Rc<dyn Fn(Intent)>;

type Listener = Closure<dyn FnMut(Event)>;

/// The mounted control surface.
pub struct Panel {
    button: HtmlButtonElement,
    root: HtmlElement,
    label: HtmlElement,
    slider: HtmlInputElement,
    presets: Vec<(HtmlButtonElement, Speed)>,
    /// Held so the listeners stay valid for the panel's lifetime.
    listeners: Vec<Listener>,
}

impl core::fmt::Debug for Panel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Panel")
            .field("live", &self.is_live())
            .field("presets", &self.presets.len())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl Panel {
    /// Builds the button and panel, detached from the document.
    pub fn build(
        document: &Document,
        profile: &HostProfile,
        speed: Speed,
        on_intent: IntentHandler,
    ) -> Result<Self, JsValue> {
        let button: HtmlButtonElement = document.create_element("button")?.unchecked_into();
        button.set_class_name(&alloc::format!("{} ytp-button", profile.button_class));
        button.set_attribute("title", "Playback speed")?;
        style(&button, BUTTON_CSS)?;

        let root = element(document, "div")?;
        root.set_class_name(profile.panel_class);
        style(&root, PANEL_CSS)?;

        let label = element(document, "div")?;
        style(&label, "margin-bottom: 6px; font-weight: 600;")?;
        root.append_child(&label)?;

        let row = element(document, "div")?;
        style(&row, "display: flex; flex-wrap: wrap; max-width: 260px;")?;
        let mut presets = Vec::with_capacity(PRESETS.len());
        for rate in PRESETS {
            let speed = Speed::clamped(rate);
            let b: HtmlButtonElement = document.create_element("button")?.unchecked_into();
            b.set_text_content(Some(&surface::label(speed)));
            style(&b, PRESET_CSS)?;
            row.append_child(&b)?;
            presets.push((b, speed));
        }
        root.append_child(&row)?;

        let slider: HtmlInputElement = document.create_element("input")?.unchecked_into();
        slider.set_type("range");
        slider.set_min("0");
        slider.set_max(&alloc::format!("{SLIDER_MAX}"));
        slider.set_step("1");
        style(&slider, "display: block; width: 100%; margin: 8px 0;")?;
        root.append_child(&slider)?;

        let reset: HtmlButtonElement = document.create_element("button")?.unchecked_into();
        reset.set_text_content(Some("Reset"));
        style(&reset, PRESET_CSS)?;
        root.append_child(&reset)?;

        let mut panel = Self {
            button,
            root,
            label,
            slider,
            presets,
            listeners: Vec::new(),
        };
        panel.bind(&reset, on_intent)?;
        panel.refresh(speed);
        Ok(panel)
    }

    fn bind(&mut self, reset: &HtmlButtonElement, on_intent: IntentHandler) -> Result<(), JsValue> {
        let root = self.root.clone();
        self.listen(&self.button.clone(), "click", move |event| {
            event.stop_propagation();
            let open = root
                .style()
                .get_property_value("display")
                .is_ok_and(|d| d == "block");
            let _ = root
                .style()
                .set_property("display", if open { "none" } else { "block" });
        })?;

        // Clicks inside the panel must not reach the player's play/pause.
        self.listen(&self.root.clone(), "click", |event| event.stop_propagation())?;

        for (b, speed) in self.presets.clone() {
            let handler = Rc::clone(&on_intent);
            self.listen(&b, "click", move |_| handler(Intent::Preset(speed)))?;
        }

        let handler = Rc::clone(&on_intent);
        self.listen(reset, "click", move |_| handler(Intent::Reset))?;

        let slider = self.slider.clone();
        let handler = Rc::clone(&on_intent);
        self.listen(&self.slider.clone(), "input", move |_| {
            if let Some(speed) = surface::slider_speed(slider.value_as_number()) {
                handler(Intent::Slide(speed));
            }
        })?;

        let handler = Rc::clone(&on_intent);
        self.listen(&self.slider.clone(), "pointerdown", move |_| {
            handler(Intent::DragStart);
        })?;
        for kind in ["pointerup", "pointercancel", "change"] {
            let handler = Rc::clone(&on_intent);
            self.listen(&self.slider.clone(), kind, move |_| handler(Intent::DragEnd))?;
        }
        Ok(())
    }

    fn listen(
        &mut self,
        target: &EventTarget,
        kind: &str,
        f: impl FnMut(Event) + 'static,
    ) -> Result<(), JsValue> {
        let cb = Closure::wrap(Box::new(f) as Box<dyn FnMut(Event)>);
        target.add_event_listener_with_callback(kind, cb.as_ref().unchecked_ref())?;
        self.listeners.push(cb);
        Ok(())
    }

    /// Inserts the button at the front of `controls` and the panel into
    /// `player`.
    pub fn insert(&self, controls: &HtmlElement, player: &HtmlElement) -> Result<(), JsValue> {
        controls.insert_before(&self.button, controls.first_child().as_ref())?;
        player.append_child(&self.root)?;
        Ok(())
    }

    /// Returns `true` while the button is still in the document.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.button.is_connected() && self.root.is_connected()
    }

    /// Shows `speed` on every display surface.
    pub fn refresh(&self, speed: Speed) {
        let text = surface::label(speed);
        self.button.set_text_content(Some(&text));
        self.label.set_text_content(Some(&alloc::format!("Speed {text}")));
        self.slider
            .set_value_as_number(f64::from(surface::slider_position(speed)));
        for (b, preset) in &self.presets {
            let _ = b.class_list().toggle_with_force(ACTIVE_CLASS, *preset == speed);
        }
    }

    /// Removes both nodes from the document.
    pub fn remove(&self) {
        self.button.remove();
        self.root.remove();
    }
}

fn element(doc: &Document, tag: &str) -> Result<HtmlElement, JsValue> {
    Ok(doc.create_element(tag)?.unchecked_into())
}

fn style(el: &web_sys::Element, css: &str) -> Result<(), JsValue> {
    el.set_attribute("style", css)
}
