// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `chrome.runtime.onMessage` listener for the popup.

use alloc::boxed::Box;

use ratekeeper_core::error::MessageError;
use ratekeeper_core::message::{self, Request, Response};
use wasm_bindgen::JsCast as _;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "runtime", "onMessage"], js_name = "addListener")]
    fn on_message_add_listener(callback: &js_sys::Function) -> Result<(), JsValue>;
}

/// Answers popup requests with `handle`.
///
/// Malformed messages are logged and left unanswered. Replies are sent
/// synchronously, so the listener never keeps the channel open.
pub fn listen(mut handle: impl FnMut(Request) -> Response + 'static) -> Result<(), JsValue> {
    let callback = Closure::wrap(Box::new(
        move |msg: JsValue, _sender: JsValue, send_response: JsValue| -> bool {
            let request = js_sys::JSON::stringify(&msg)
                .ok()
                .and_then(|s| s.as_string())
                .ok_or_else(|| MessageError::Malformed("not serializable".into()))
                .and_then(|text| message::decode_request(&text));
            let request = match request {
                Ok(r) => r,
                Err(e) => {
                    web_sys::console::warn_1(&JsValue::from_str(&alloc::format!(
                        "[ratekeeper] ignoring message: {e}"
                    )));
                    return false;
                }
            };

            let reply = message::encode_response(&handle(request))
                .map_err(|e| JsValue::from_str(&alloc::format!("{e}")))
                .and_then(|json| js_sys::JSON::parse(&json));
            match (reply, send_response.dyn_ref::<js_sys::Function>()) {
                (Ok(value), Some(send)) => {
                    let _ = send.call1(&JsValue::NULL, &value);
                }
                (Err(e), _) => web_sys::console::warn_1(&e),
                (Ok(_), None) => {}
            }
            false
        },
    ) as Box<dyn FnMut(JsValue, JsValue, JsValue) -> bool>);
    on_message_add_listener(callback.as_ref().unchecked_ref())?;
    callback.forget();
    Ok(())
}
