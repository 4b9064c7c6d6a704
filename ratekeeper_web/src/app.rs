// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Content-script wiring.
//!
//! All state lives in one `Rc<RefCell<App>>`. Every browser callback holds a
//! `Weak` to it and borrows it for the duration of a single handler. After
//! each handler the deadline timer is re-armed for the earliest due time of
//! the reconciler and the mount watchdog.

use alloc::boxed::Box;
use alloc::format;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use core::cell::RefCell;

use ratekeeper_core::config::{MountConfig, ReconcilerConfig};
use ratekeeper_core::host::HostProfile;
use ratekeeper_core::message::{self, Request, Response};
use ratekeeper_core::mount::{MountCommand, MountPhase, MountWatchdog};
use ratekeeper_core::reconciler::{Correction, CorrectionReason, MediaTarget as _, Reconciler};
use ratekeeper_core::speed::Speed;
use ratekeeper_core::surface::{self, Intent, KeyPress};
use ratekeeper_core::time::HostTime;
use ratekeeper_core::trace::{
    ChangeSource, CorrectionEvent, MountTransitionEvent, RateDecisionEvent, SpeedChangeEvent,
    Tracer,
};
use wasm_bindgen::JsCast as _;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::{
    Document, Event, HtmlVideoElement, KeyboardEvent, MutationObserver, MutationObserverInit,
    Window,
};

use crate::console::ConsoleSink;
use crate::dom::{self, Found};
use crate::panel::{IntentHandler, Panel};
use crate::storage::ExtensionStore;
use crate::timer::{Interval, Timeout};
use crate::video::{HostVideo, VideoEvents};
use crate::now;

type Shared = Rc<RefCell<App>>;

pub(crate) struct App {
    this: Weak<RefCell<Self>>,
    window: Window,
    document: Document,
    profile: HostProfile,
    reconciler: Reconciler<ExtensionStore>,
    watchdog: MountWatchdog,
    video: HostVideo,
    panel: Option<Panel>,
    deadline: Timeout,
    _backstop: Interval,
    sink: ConsoleSink,
    /// `pathname + search` of the last handled navigation.
    location: Option<String>,
}

/// Runs `f` on the app if it is still alive and not already borrowed.
fn with_app<R>(this: &Weak<RefCell<App>>, f: impl FnOnce(&mut App) -> R) -> Option<R> {
    let app = this.upgrade()?;
    let mut guard = app.try_borrow_mut().ok()?;
    Some(f(&mut guard))
}

fn log_error(context: &str, e: &JsValue) {
    web_sys::console::error_2(&JsValue::from_str(&format!("[ratekeeper] {context}")), e);
}

impl App {
    fn new(this: &Weak<RefCell<Self>>, window: Window, document: Document) -> Self {
        let config = ReconcilerConfig::web();

        let events = {
            let (a, b, c) = (this.clone(), this.clone(), this.clone());
            VideoEvents::new(
                move |_: Event| {
                    let _ = with_app(&a, Self::on_ratechange);
                },
                move |_: Event| {
                    let _ = with_app(&b, Self::on_play);
                },
                move |_: Event| {
                    let _ = with_app(&c, Self::on_loadedmetadata);
                },
            )
        };

        let fired = this.clone();
        let deadline = Timeout::new(move || {
            let _ = with_app(&fired, Self::on_deadline);
        });
        let ticked = this.clone();
        let backstop = Interval::start(config.tick_interval, move || {
            let _ = with_app(&ticked, Self::on_backstop);
        });

        Self {
            this: this.clone(),
            window,
            document,
            profile: HostProfile::YOUTUBE,
            reconciler: Reconciler::new(config, ExtensionStore::new()),
            watchdog: MountWatchdog::new(MountConfig::web()),
            video: HostVideo::new(events),
            panel: None,
            deadline,
            _backstop: backstop,
            sink: ConsoleSink::new(),
            location: None,
        }
    }

    // -- Reconciler inputs ---------------------------------------------------

    fn on_ratechange(&mut self) {
        let Some(observed) = self.video.playback_rate() else {
            return;
        };
        let now = now();
        let decision = self.reconciler.on_observed_rate_change(now, observed);
        Tracer::new(&mut self.sink).rate_decision(&RateDecisionEvent {
            at: now,
            observed,
            decision,
        });
        self.reschedule(now);
    }

    fn on_play(&mut self) {
        let now = now();
        let c = self.reconciler.on_play(now, &mut self.video);
        self.trace_correction(now, c, CorrectionReason::Play);
        self.reschedule(now);
    }

    fn on_loadedmetadata(&mut self) {
        let now = now();
        let c = self.reconciler.attach_media(now, &mut self.video);
        self.trace_correction(now, c, CorrectionReason::Attach);
        self.reschedule(now);
    }

    fn on_backstop(&mut self) {
        let now = now();
        self.service(now);
        // The video is reachable whether or not the surface is mounted.
        if !matches!(self.watchdog.phase(), MountPhase::Idle) {
            match dom::find_video(&self.document, &self.profile) {
                Ok(Some(v)) => self.adopt_video(now, v),
                Ok(None) => {}
                Err(e) => log_error("video lookup failed", &e),
            }
        }
        let c = self.reconciler.on_periodic_tick(now, &mut self.video);
        self.trace_correction(now, c, CorrectionReason::Tick);
        self.reschedule(now);
    }

    fn on_deadline(&mut self) {
        let now = now();
        self.service(now);
        self.poll(now);
        self.reschedule(now);
    }

    fn service(&mut self, now: HostTime) {
        let report = self.reconciler.service(now, &mut self.video);
        if let Some(c) = report.restore {
            self.trace_correction(now, c, CorrectionReason::Restore);
        }
        if let Some(e) = report.persist {
            Tracer::new(&mut self.sink).persist(&e);
            if let Some(err) = self.reconciler.persistence().last_error().filter(|_| !e.ok) {
                log_error("storage write failed", &JsValue::from_str(&format!("{err}")));
            }
        }
    }

    // -- Intents -------------------------------------------------------------

    fn on_intent(&mut self, intent: Intent) {
        match intent {
            Intent::DragStart => self.reconciler.begin_user_drag(),
            Intent::DragEnd => self.reconciler.end_user_drag(),
            _ => {
                let (Some(requested), Some(source)) =
                    (intent.requested(self.reconciler.desired()), intent.source())
                else {
                    return;
                };
                self.set_speed(now(), requested, source);
            }
        }
    }

    fn set_speed(&mut self, now: HostTime, requested: f64, source: ChangeSource) {
        let Some(applied) = self
            .reconciler
            .set_desired_speed(now, requested, &mut self.video)
        else {
            return;
        };
        self.speed_changed(now, requested, applied, source);
    }

    fn speed_changed(&mut self, now: HostTime, requested: f64, applied: Speed, source: ChangeSource) {
        Tracer::new(&mut self.sink).speed_change(&SpeedChangeEvent {
            at: now,
            requested,
            applied,
            source,
        });
        if let Some(panel) = &self.panel {
            panel.refresh(applied);
        }
        self.reschedule(now);
    }

    fn on_key(&mut self, event: &KeyboardEvent) {
        if self.video.element().is_none() {
            return;
        }
        let key = event.key();
        let press = KeyPress {
            key: &key,
            ctrl: event.ctrl_key(),
            alt: event.alt_key(),
            meta: event.meta_key(),
            editable_focus: dom::editable_focus(&self.document),
        };
        if let Some(intent) = surface::shortcut(&press) {
            self.on_intent(intent);
        }
    }

    fn on_request(&mut self, request: Request) -> Response {
        let now = now();
        let response = message::respond(&mut self.reconciler, now, request, &mut self.video);
        if let (Request::SetSpeed { speed: Some(requested) }, Response::SetSpeed { success: true, .. }) =
            (request, response)
        {
            let applied = self.reconciler.desired();
            self.speed_changed(now, requested, applied, ChangeSource::Message);
        }
        response
    }

    fn on_stored(&mut self, speed: Speed) {
        let now = now();
        if self.reconciler.adopt_stored(now, speed, &mut self.video) {
            self.speed_changed(now, speed.get(), speed, ChangeSource::Storage);
        }
    }

    // -- Mounting ------------------------------------------------------------

    fn on_navigation(&mut self) {
        let location = self.window.location();
        let path = location.pathname().unwrap_or_default();
        let key = format!("{path}{}", location.search().unwrap_or_default());
        if self.location.as_deref() == Some(key.as_str()) {
            return;
        }
        self.location = Some(key);

        let now = now();
        if let Some(panel) = self.panel.take() {
            panel.remove();
        }
        let is_video_page = self.profile.is_video_page(&path);
        if !is_video_page && let Err(e) = self.video.detach() {
            log_error("could not detach video", &e);
        }
        let transition = self.watchdog.navigate(now, is_video_page);
        self.trace_mount(transition);
        self.reschedule(now);
    }

    fn on_mutation(&mut self) {
        let now = now();
        let live = self.panel.as_ref().is_some_and(Panel::is_live);
        let transition = self.watchdog.on_mutation(now, live);
        if transition.is_some() && !live {
            self.panel = None;
        }
        self.trace_mount(transition);
        self.reschedule(now);
    }

    fn poll(&mut self, now: HostTime) {
        if !self.watchdog.poll_due(now) {
            return;
        }
        let mut found = dom::probe(&self.document, &self.profile).unwrap_or_else(|e| {
            log_error("probe failed", &e);
            Found::default()
        });
        if let Some(video) = found.video.take() {
            self.adopt_video(now, video);
        }
        let (command, transition) = self.watchdog.on_probe(now, &found.probe);
        self.trace_mount(transition);
        if command == MountCommand::Mount && self.watchdog.begin_reinjection() {
            let result = self.try_mount(found);
            self.watchdog.end_reinjection();
            let transition = match result {
                Ok(true) => self.watchdog.mounted(now),
                Ok(false) => self.watchdog.mount_failed(now),
                Err(e) => {
                    log_error("mount failed", &e);
                    self.watchdog.mount_failed(now)
                }
            };
            self.trace_mount(transition);
        }
    }

    fn try_mount(&mut self, found: Found) -> Result<bool, JsValue> {
        let (Some(controls), Some(player)) = (found.controls, found.player) else {
            return Ok(false);
        };
        self.panel = None;
        dom::remove_orphans(&self.document, &self.profile)?;

        let panel = Panel::build(
            &self.document,
            &self.profile,
            self.reconciler.desired(),
            self.intent_handler(),
        )?;
        panel.insert(&controls, &player)?;
        if !panel.is_live() {
            panel.remove();
            return Ok(false);
        }
        self.panel = Some(panel);
        Ok(true)
    }

    /// Attaches `video` if it is not already the attached element.
    fn adopt_video(&mut self, now: HostTime, video: HtmlVideoElement) {
        match self.video.attach(video) {
            Ok(true) => {
                let c = self.reconciler.attach_media(now, &mut self.video);
                self.trace_correction(now, c, CorrectionReason::Attach);
            }
            Ok(false) => {}
            Err(e) => log_error("could not attach video", &e),
        }
    }

    fn intent_handler(&self) -> IntentHandler {
        let this = self.this.clone();
        Rc::new(move |intent| {
            let _ = with_app(&this, |app| app.on_intent(intent));
        })
    }

    // -- Helpers -------------------------------------------------------------

    fn reschedule(&self, now: HostTime) {
        let due = match (self.reconciler.next_deadline(), self.watchdog.next_poll()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if let Some(due) = due {
            self.deadline.arm(now, due);
        }
    }

    fn trace_correction(&mut self, now: HostTime, c: Correction, reason: CorrectionReason) {
        if let Correction::Applied { from, to } = c {
            Tracer::new(&mut self.sink).correction(&CorrectionEvent {
                at: now,
                from,
                to,
                reason,
            });
        }
    }

    fn trace_mount(&mut self, transition: Option<MountTransitionEvent>) {
        if let Some(e) = transition {
            Tracer::new(&mut self.sink).mount_transition(&e);
        }
    }
}

impl core::fmt::Debug for App {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("App")
            .field("desired", &self.reconciler.desired())
            .field("mount", &self.watchdog.phase())
            .field("video", &self.video)
            .field("panel", &self.panel)
            .finish_non_exhaustive()
    }
}

/// Builds the app and subscribes it to every browser signal.
pub(crate) fn run() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let app: Shared = Rc::new_cyclic(|this| RefCell::new(App::new(this, window, document)));
    bind(&app)?;
    app.borrow_mut().on_navigation();

    // Callbacks only hold weak references; the app lives as long as the page.
    core::mem::forget(app);
    Ok(())
}

fn bind(app: &Shared) -> Result<(), JsValue> {
    let this = Rc::downgrade(app);
    let (window, document, profile) = {
        let a = app.borrow();
        (a.window.clone(), a.document.clone(), a.profile)
    };

    // Storage: initial load, then changes made by the popup or other tabs.
    {
        let a = app.borrow();
        let store = a.reconciler.persistence().store();
        let loaded = this.clone();
        store.load(move |speed| {
            if let Some(speed) = speed {
                let _ = with_app(&loaded, |app| app.on_stored(speed));
            }
        })?;
        let changed = this.clone();
        store.subscribe(move |speed| {
            let _ = with_app(&changed, |app| app.on_stored(speed));
        })?;
    }

    let handled = this.clone();
    crate::messaging::listen(move |request| {
        with_app(&handled, |app| app.on_request(request)).unwrap_or(match request {
            Request::SetSpeed { .. } => Response::SetSpeed {
                success: false,
                current_speed: Speed::DEFAULT_RATE,
            },
            Request::GetSpeed => Response::GetSpeed {
                current_speed: Speed::DEFAULT_RATE,
            },
        })
    })?;

    let navigated = this.clone();
    let nav_cb = Closure::wrap(Box::new(move |_event: Event| {
        let _ = with_app(&navigated, App::on_navigation);
    }) as Box<dyn FnMut(Event)>);
    for kind in profile.navigation_events {
        window.add_event_listener_with_callback(kind, nav_cb.as_ref().unchecked_ref())?;
    }
    nav_cb.forget();

    let keyed = this.clone();
    let key_cb = Closure::wrap(Box::new(move |event: Event| {
        if let Some(event) = event.dyn_ref::<KeyboardEvent>() {
            let _ = with_app(&keyed, |app| app.on_key(event));
        }
    }) as Box<dyn FnMut(Event)>);
    document.add_event_listener_with_callback("keydown", key_cb.as_ref().unchecked_ref())?;
    key_cb.forget();

    let mutated = this;
    let mutation_cb = Closure::wrap(Box::new(move |_records: JsValue, _observer: JsValue| {
        let _ = with_app(&mutated, App::on_mutation);
    }) as Box<dyn FnMut(JsValue, JsValue)>);
    let observer = MutationObserver::new(mutation_cb.as_ref().unchecked_ref())?;
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    if let Some(root) = document.document_element() {
        observer.observe_with_options(&root, &init)?;
    }
    mutation_cb.forget();

    Ok(())
}
