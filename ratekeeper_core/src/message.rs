// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Request/response protocol spoken with the extension popup.
//!
//! ```text
//! {"action":"setSpeed","speed":1.5}  ->  {"success":true,"currentSpeed":1.5}
//! {"action":"getSpeed"}              ->  {"currentSpeed":1.5}
//! ```

use alloc::string::{String, ToString as _};

use serde::{Deserialize, Serialize};

use crate::error::MessageError;
use crate::persist::SpeedStore;
use crate::reconciler::{MediaTarget, Reconciler};
use crate::time::HostTime;

/// A popup request.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Set the desired speed. A missing or `null` speed is answered with
    /// `success: false`.
    SetSpeed {
        /// Requested speed, clamped on arrival.
        #[serde(default)]
        speed: Option<f64>,
    },
    /// Report the desired speed.
    GetSpeed,
}

/// Reply to a [`Request`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// Reply to [`Request::SetSpeed`].
    #[serde(rename_all = "camelCase")]
    SetSpeed {
        /// Whether the speed was applied.
        success: bool,
        /// The desired speed after handling.
        current_speed: f64,
    },
    /// Reply to [`Request::GetSpeed`].
    #[serde(rename_all = "camelCase")]
    GetSpeed {
        /// The desired speed.
        current_speed: f64,
    },
}

/// Decodes a request from its JSON text.
pub fn decode_request(json: &str) -> Result<Request, MessageError> {
    serde_json::from_str(json).map_err(|e| MessageError::Malformed(e.to_string()))
}

/// Encodes a response as JSON text.
pub fn encode_response(response: &Response) -> Result<String, MessageError> {
    serde_json::to_string(response).map_err(|e| MessageError::Encode(e.to_string()))
}

/// Answers `request` against the reconciler.
pub fn respond<S: SpeedStore, M: MediaTarget + ?Sized>(
    reconciler: &mut Reconciler<S>,
    now: HostTime,
    request: Request,
    media: &mut M,
) -> Response {
    match request {
        Request::SetSpeed { speed } => {
            let applied = speed.and_then(|v| reconciler.set_desired_speed(now, v, media));
            Response::SetSpeed {
                success: applied.is_some(),
                current_speed: reconciler.desired().get(),
            }
        }
        Request::GetSpeed => Response::GetSpeed {
            current_speed: reconciler.desired().get(),
        },
    }
}
