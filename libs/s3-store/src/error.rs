// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Store error type

use thiserror::Error;

/// Errors returned by [`crate::Store`] operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key does not exist in the bucket
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The key cannot be used as an object location
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("list failed: {0}")]
    List(String),

    #[error("stat failed: {0}")]
    Stat(String),

    #[error("get failed: {0}")]
    Get(String),

    #[error("put failed: {0}")]
    Put(String),

    #[error("delete failed: {0}")]
    Delete(String),

    /// The object body could not be read to completion
    #[error("read failed: {0}")]
    Read(String),

    /// The body length disagreed with the size announced by the source
    #[error("size mismatch: expected {expected} bytes, read {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// True for the "no such key" signal
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
