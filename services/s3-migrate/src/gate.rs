// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Destination existence check
//!
//! The destination bucket is the only record of what has been copied. A
//! key that already exists there is never transferred again, which is what
//! makes a re-run of the whole program safe.

use std::sync::Arc;

use s3_store::{Store, StoreError, join_key};

use crate::source::{Source, SourceError};

/// Outcome of a destination lookup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    /// The object exists with the given size
    Present(u64),
    Absent,
}

pub struct IdempotencyGate {
    destination: Arc<dyn Store>,
    dst_prefix: String,
}

impl IdempotencyGate {
    pub fn new(destination: Arc<dyn Store>, dst_prefix: impl Into<String>) -> Self {
        Self {
            destination,
            dst_prefix: dst_prefix.into(),
        }
    }

    /// Fully qualified destination key for a source key
    pub fn destination_key(&self, source: &dyn Source, key: &str) -> Result<String, SourceError> {
        Ok(join_key(&self.dst_prefix, &source.object_name(key)?))
    }

    /// Stat `dst_key`; only "no such key" counts as absent
    pub async fn check(&self, dst_key: &str) -> Result<Presence, StoreError> {
        match self.destination.stat(dst_key).await {
            Ok(entry) => Ok(Presence::Present(entry.size)),
            Err(e) if e.is_not_found() => Ok(Presence::Absent),
            Err(e) => Err(e),
        }
    }
}
