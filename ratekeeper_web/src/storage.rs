// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `chrome.storage.local` persistence adapter.

use alloc::boxed::Box;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use core::cell::RefCell;

use ratekeeper_core::error::StoreError;
use ratekeeper_core::persist::{SPEED_KEY, SpeedStore, StoredValue, decode_stored};
use ratekeeper_core::speed::Speed;
use wasm_bindgen::JsCast as _;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = "get")]
    fn local_get(keys: &JsValue, callback: &js_sys::Function) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = "set")]
    fn local_set(items: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "onChanged"], js_name = "addListener")]
    fn on_changed_add_listener(callback: &js_sys::Function) -> Result<(), JsValue>;
}

/// [`SpeedStore`] over `chrome.storage.local`.
///
/// Writes are fire-and-forget promises. A rejection is remembered and
/// reported by the next [`save`](SpeedStore::save).
#[derive(Debug, Default)]
pub struct ExtensionStore {
    rejected: Rc<RefCell<Option<String>>>,
}

impl ExtensionStore {
    /// Creates the adapter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the stored speed and hands it to `done`.
    ///
    /// `done` receives `None` if nothing valid is stored.
    pub fn load(&self, done: impl FnOnce(Option<Speed>) + 'static) -> Result<(), JsValue> {
        let callback = Closure::once_into_js(move |items: JsValue| {
            let raw = js_sys::Reflect::get(&items, &JsValue::from_str(SPEED_KEY))
                .unwrap_or(JsValue::UNDEFINED);
            done(decode_js(&raw));
        });
        local_get(&JsValue::from_str(SPEED_KEY), callback.unchecked_ref())?;
        Ok(())
    }

    /// Calls `changed` whenever another context writes the speed key.
    pub fn subscribe(&self, mut changed: impl FnMut(Speed) + 'static) -> Result<(), JsValue> {
        let callback = Closure::wrap(Box::new(move |changes: JsValue, area: JsValue| {
            if area.as_string().as_deref() != Some("local") {
                return;
            }
            let Ok(change) = js_sys::Reflect::get(&changes, &JsValue::from_str(SPEED_KEY)) else {
                return;
            };
            if change.is_undefined() {
                return;
            }
            let new_value = js_sys::Reflect::get(&change, &JsValue::from_str("newValue"))
                .unwrap_or(JsValue::UNDEFINED);
            if let Some(speed) = decode_js(&new_value) {
                changed(speed);
            }
        }) as Box<dyn FnMut(JsValue, JsValue)>);
        on_changed_add_listener(callback.as_ref().unchecked_ref())?;
        // The listener lives as long as the page.
        callback.forget();
        Ok(())
    }
}

impl SpeedStore for ExtensionStore {
    fn save(&mut self, key: &str, value: f64) -> Result<(), StoreError> {
        if let Some(reason) = self.rejected.borrow_mut().take() {
            return Err(StoreError::Rejected(reason));
        }

        let items = js_sys::Object::new();
        js_sys::Reflect::set(&items, &JsValue::from_str(key), &JsValue::from_f64(value))
            .map_err(|e| StoreError::Rejected(describe(&e)))?;
        let result = local_set(&items).map_err(|e| {
            if js_sys::Reflect::get(&e, &JsValue::from_str("name"))
                .ok()
                .and_then(|n| n.as_string())
                .as_deref()
                == Some("ReferenceError")
            {
                StoreError::Unavailable
            } else {
                StoreError::Rejected(describe(&e))
            }
        })?;

        if let Some(promise) = result.dyn_ref::<js_sys::Promise>() {
            let rejected = Rc::clone(&self.rejected);
            let on_reject = Closure::once(move |e: JsValue| {
                *rejected.borrow_mut() = Some(describe(&e));
            });
            let _ = promise.catch(&on_reject);
            on_reject.forget();
        }
        Ok(())
    }
}

fn decode_js(raw: &JsValue) -> Option<Speed> {
    if let Some(n) = raw.as_f64() {
        decode_stored(StoredValue::Number(n))
    } else if let Some(s) = raw.as_string() {
        decode_stored(StoredValue::Text(&s))
    } else {
        decode_stored(StoredValue::Missing)
    }
}

fn describe(e: &JsValue) -> String {
    e.as_string()
        .or_else(|| {
            e.dyn_ref::<js_sys::Error>()
                .map(|err| String::from(err.message()))
        })
        .unwrap_or_else(|| format!("{e:?}"))
}
