// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! None of these are fatal. Storage errors switch persistence off for the
//! session; message errors are answered with a failure response.

use alloc::string::String;

/// A persistence adapter rejected a read or write.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The storage area does not exist in this context.
    #[error("storage is unavailable")]
    Unavailable,
    /// The storage call threw or reported an error.
    #[error("storage rejected the request: {0}")]
    Rejected(String),
}

/// A popup message could not be decoded.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    /// The payload was not valid JSON or did not match any request shape.
    #[error("malformed message: {0}")]
    Malformed(String),
    /// A response could not be serialized.
    #[error("could not encode response: {0}")]
    Encode(String),
}
