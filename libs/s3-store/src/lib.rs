// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Bucket-scoped object store client
//!
//! This crate is the boundary between the migration engine and an
//! S3-compatible object store. The engine only ever talks to a [`Store`]:
//! a handle bound to one bucket that can list, stat, get, put and delete
//! objects. [`S3Store`] implements it on top of `object_store`, and can
//! wrap any other `ObjectStore` backend (the in-memory one is handy in
//! tests).
//!
//! # Modules
//!
//! - [`endpoint`] - Endpoint configuration (URL, credentials, bucket addressing)
//! - [`error`] - Store error type
//! - [`keys`] - Key joining helpers
//! - [`s3`] - `object_store` backed implementation
//! - [`tuning`] - Upload tuning (part size, parallelism, multipart/hash toggles)

pub mod endpoint;
pub mod error;
pub mod keys;
pub mod s3;
pub mod tuning;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};

pub use endpoint::{BucketLookup, EndpointConfig};
pub use error::{StoreError, StoreResult};
pub use keys::join_key;
pub use s3::S3Store;
pub use tuning::TransferTuning;

/// An object as reported by a listing or a stat call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Key within the bucket
    pub key: String,
    /// Size in bytes
    pub size: u64,
}

/// A readable object body plus its length, when known
pub struct ObjectReader {
    size: Option<u64>,
    stream: BoxStream<'static, StoreResult<Bytes>>,
}

impl ObjectReader {
    pub fn new(stream: BoxStream<'static, StoreResult<Bytes>>, size: Option<u64>) -> Self {
        Self { size, stream }
    }

    /// Body made of a single in-memory buffer
    pub fn from_bytes(bytes: Bytes) -> Self {
        let size = Some(bytes.len() as u64);
        Self::new(stream::once(async move { Ok(bytes) }).boxed(), size)
    }

    /// Byte length of the body, if the source reported one
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn into_stream(self) -> BoxStream<'static, StoreResult<Bytes>> {
        self.stream
    }
}

impl std::fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectReader")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Handle to a single bucket of an object store
///
/// Implementations must be cheap to share between tasks; the engine holds
/// them behind an `Arc` and calls them concurrently from every worker.
#[async_trait]
pub trait Store: Send + Sync {
    /// Name of the bucket this handle is bound to
    fn bucket(&self) -> &str;

    /// Recursively list every object whose key starts with `prefix`
    ///
    /// The stream is lazy; errors are yielded in-band and the caller
    /// decides whether they end the listing.
    fn list(&self, prefix: &str) -> BoxStream<'static, StoreResult<ObjectEntry>>;

    /// Look up an object without reading it
    ///
    /// Returns [`StoreError::NotFound`] when the key does not exist.
    async fn stat(&self, key: &str) -> StoreResult<ObjectEntry>;

    /// Open an object for reading
    async fn get(&self, key: &str) -> StoreResult<ObjectReader>;

    /// Write `body` under `key`, returning the number of bytes stored
    async fn put(&self, key: &str, body: ObjectReader, tuning: &TransferTuning)
    -> StoreResult<u64>;

    /// Remove an object
    async fn delete(&self, key: &str) -> StoreResult<()>;
}
