// Copyright 2026 the Ratekeeper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory [`SpeedStore`].

use alloc::string::ToString as _;
use alloc::vec::Vec;

use ratekeeper_core::error::StoreError;
use ratekeeper_core::persist::{SPEED_KEY, SpeedStore};

/// Records every write; can be told to start rejecting them.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    writes: Vec<f64>,
    reject: bool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following write fail.
    pub fn reject_writes(&mut self, reject: bool) {
        self.reject = reject;
    }

    /// Returns every accepted write, oldest first.
    #[must_use]
    pub fn writes(&self) -> &[f64] {
        &self.writes
    }

    /// Returns the value a fresh load would see.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.writes.last().copied()
    }
}

impl SpeedStore for MemoryStore {
    fn save(&mut self, key: &str, value: f64) -> Result<(), StoreError> {
        if key != SPEED_KEY {
            return Err(StoreError::Rejected("unknown key".to_string()));
        }
        if self.reject {
            return Err(StoreError::Rejected("quota exceeded".to_string()));
        }
        self.writes.push(value);
        Ok(())
    }
}
