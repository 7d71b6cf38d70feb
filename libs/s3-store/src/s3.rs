// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! `object_store` backed [`Store`]
//!
//! Keys are used verbatim. `object_store` would percent-encode characters
//! such as `~` or `#` when building a path with `Path::from`, so every
//! location here goes through [`Path::parse`] instead.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore, ObjectStoreExt, PutPayload, WriteMultipart};
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::endpoint::{BucketLookup, EndpointConfig};
use crate::error::{StoreError, StoreResult};
use crate::keys::listing_root;
use crate::tuning::TransferTuning;
use crate::{ObjectEntry, ObjectReader, Store};

/// S3-compatible bucket handle
#[derive(Clone)]
pub struct S3Store {
    inner: Arc<dyn ObjectStore>,
    bucket: String,
}

impl S3Store {
    /// Build a client for the endpoint described by `config`
    ///
    /// Only `tuning.disable_content_hash` matters here; the remaining knobs
    /// are applied per `put`. No request is made, so bad credentials only
    /// show up on first use.
    pub fn connect(config: &EndpointConfig, tuning: &TransferTuning) -> StoreResult<Self> {
        let store = AmazonS3Builder::new()
            .with_endpoint(config.endpoint_url())
            .with_allow_http(config.allow_http())
            .with_region(config.region.clone())
            .with_bucket_name(config.bucket.clone())
            .with_access_key_id(config.access_key.clone())
            .with_secret_access_key(config.secret_key.expose_secret())
            .with_virtual_hosted_style_request(config.bucket_lookup == BucketLookup::Dns)
            .with_unsigned_payload(tuning.disable_content_hash)
            .build()
            .map_err(|e| StoreError::InvalidEndpoint(e.to_string()))?;

        debug!(
            endpoint = %config.endpoint_url(),
            bucket = %config.bucket,
            lookup = %config.bucket_lookup,
            "Created S3 client"
        );

        Ok(Self::from_object_store(config.bucket.clone(), Arc::new(store)))
    }

    /// Wrap an existing `ObjectStore`, such as `object_store::memory::InMemory`
    pub fn from_object_store(bucket: impl Into<String>, inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            bucket: bucket.into(),
        }
    }

    /// Upload in one request, holding at most about `part_size` bytes
    ///
    /// A body that turns out larger than that is handed to the multipart
    /// path along with what was already read.
    async fn put_single(
        &self,
        location: &Path,
        body: ObjectReader,
        tuning: &TransferTuning,
    ) -> StoreResult<u64> {
        let expected = body.size();
        if expected.is_some_and(|size| size > tuning.part_size) {
            info!(
                key = %location,
                size = expected,
                part_size = tuning.part_size,
                "Object larger than part size, uploading as multipart"
            );
            return self.put_multipart(location, body, tuning).await;
        }

        let (head, rest) = match read_head(body.into_stream(), tuning.part_size).await? {
            BodyHead::Complete(head) => (head, None),
            BodyHead::Overflow { head, rest } => (head, Some(rest)),
        };

        if let Some(rest) = rest {
            warn!(
                key = %location,
                part_size = tuning.part_size,
                "Body grew past part size, uploading as multipart"
            );
            let body = stream::once(async move { Ok(head) }).chain(rest).boxed();
            return self
                .put_multipart(location, ObjectReader::new(body, expected), tuning)
                .await;
        }

        let written = head.len() as u64;
        check_size(expected, written)?;

        self.inner
            .put(location, PutPayload::from(head))
            .await
            .map_err(|e| StoreError::Put(e.to_string()))?;

        Ok(written)
    }

    async fn put_multipart(
        &self,
        location: &Path,
        body: ObjectReader,
        tuning: &TransferTuning,
    ) -> StoreResult<u64> {
        let expected = body.size();
        let upload = self
            .inner
            .put_multipart(location)
            .await
            .map_err(|e| StoreError::Put(e.to_string()))?;

        let mut pending = PendingUpload::new(
            WriteMultipart::new_with_chunk_size(upload, tuning.part_size as usize),
            location.clone(),
        );
        let in_flight = tuning.parts_in_flight();
        let mut stream = body.into_stream();
        let mut written = 0u64;

        let streamed: StoreResult<()> = async {
            while let Some(chunk) = stream.try_next().await? {
                let writer = pending.writer()?;
                writer
                    .wait_for_capacity(in_flight)
                    .await
                    .map_err(|e| StoreError::Put(e.to_string()))?;
                writer.write(&chunk);
                written += chunk.len() as u64;
            }
            check_size(expected, written)
        }
        .await;

        let Some(writer) = pending.take() else {
            return Err(StoreError::Put("multipart upload already closed".to_string()));
        };

        if let Err(e) = streamed {
            if let Err(abort_err) = writer.abort().await {
                warn!(
                    bucket = %self.bucket,
                    key = %location,
                    error = %abort_err,
                    "Failed to abort multipart upload"
                );
            }
            return Err(e);
        }

        writer
            .finish()
            .await
            .map_err(|e| StoreError::Put(e.to_string()))?;

        Ok(written)
    }
}

/// Multipart upload that is aborted if dropped before it is taken back
///
/// Dropping happens when the surrounding future is cancelled mid-transfer;
/// the abort then runs as a detached task.
struct PendingUpload {
    writer: Option<WriteMultipart>,
    location: Path,
}

impl PendingUpload {
    fn new(writer: WriteMultipart, location: Path) -> Self {
        Self {
            writer: Some(writer),
            location,
        }
    }

    fn writer(&mut self) -> StoreResult<&mut WriteMultipart> {
        self.writer
            .as_mut()
            .ok_or_else(|| StoreError::Put("multipart upload already closed".to_string()))
    }

    fn take(&mut self) -> Option<WriteMultipart> {
        self.writer.take()
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        let Some(writer) = self.writer.take() else {
            return;
        };
        let location = self.location.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match writer.abort().await {
                        Ok(()) => debug!(key = %location, "Aborted interrupted multipart upload"),
                        Err(e) => warn!(
                            key = %location,
                            error = %e,
                            "Failed to abort interrupted multipart upload"
                        ),
                    }
                });
            }
            Err(_) => warn!(
                key = %location,
                "No runtime to abort interrupted multipart upload"
            ),
        }
    }
}

/// Start of a body, read up to a byte limit
enum BodyHead {
    /// The whole body fit within the limit
    Complete(Bytes),
    /// The limit was crossed; `rest` yields whatever follows `head`
    Overflow {
        head: Bytes,
        rest: BoxStream<'static, StoreResult<Bytes>>,
    },
}

/// Read from `stream` until it ends or more than `limit` bytes are held
async fn read_head(
    mut stream: BoxStream<'static, StoreResult<Bytes>>,
    limit: u64,
) -> StoreResult<BodyHead> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.try_next().await? {
        buffer.extend_from_slice(&chunk);
        if buffer.len() as u64 > limit {
            return Ok(BodyHead::Overflow {
                head: buffer.freeze(),
                rest: stream,
            });
        }
    }
    Ok(BodyHead::Complete(buffer.freeze()))
}

fn parse_key(key: &str) -> StoreResult<Path> {
    Path::parse(key).map_err(|e| StoreError::InvalidKey {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl Store for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list(&self, prefix: &str) -> BoxStream<'static, StoreResult<ObjectEntry>> {
        // object_store lists by path segment; S3 prefixes are raw strings, so
        // list the enclosing segment and filter.
        let root = match listing_root(prefix) {
            "" => None,
            root => match parse_key(root) {
                Ok(root) => Some(root),
                Err(e) => return stream::once(async move { Err(e) }).boxed(),
            },
        };
        let prefix = prefix.to_string();

        self.inner
            .list(root.as_ref())
            .map_err(|e| StoreError::List(e.to_string()))
            .map_ok(entry_from_meta)
            .try_filter(move |entry| std::future::ready(entry.key.starts_with(&prefix)))
            .boxed()
    }

    async fn stat(&self, key: &str) -> StoreResult<ObjectEntry> {
        match self.inner.head(&parse_key(key)?).await {
            Ok(meta) => Ok(entry_from_meta(meta)),
            Err(object_store::Error::NotFound { .. }) => Err(StoreError::NotFound(key.to_string())),
            Err(e) => Err(StoreError::Stat(e.to_string())),
        }
    }

    async fn get(&self, key: &str) -> StoreResult<ObjectReader> {
        let result = self.inner.get(&parse_key(key)?).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => StoreError::NotFound(key.to_string()),
            other => StoreError::Get(other.to_string()),
        })?;

        let size = result.meta.size;
        let stream = result
            .into_stream()
            .map_err(|e| StoreError::Read(e.to_string()))
            .boxed();

        Ok(ObjectReader::new(stream, Some(size)))
    }

    async fn put(
        &self,
        key: &str,
        body: ObjectReader,
        tuning: &TransferTuning,
    ) -> StoreResult<u64> {
        let start = Instant::now();
        let location = parse_key(key)?;
        let single = tuning.single_request(body.size());

        let result = if single {
            self.put_single(&location, body, tuning).await
        } else {
            self.put_multipart(&location, body, tuning).await
        };

        match &result {
            Ok(bytes) => debug!(
                bucket = %self.bucket,
                key = %key,
                size_bytes = bytes,
                single_request = single,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Put object"
            ),
            Err(e) => debug!(
                bucket = %self.bucket,
                key = %key,
                single_request = single,
                error = %e,
                "Put object failed"
            ),
        }

        result
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner
            .delete(&parse_key(key)?)
            .await
            .map_err(|e| match e {
                object_store::Error::NotFound { .. } => StoreError::NotFound(key.to_string()),
                other => StoreError::Delete(other.to_string()),
            })
    }
}

fn entry_from_meta(meta: ObjectMeta) -> ObjectEntry {
    ObjectEntry {
        key: meta.location.to_string(),
        size: meta.size,
    }
}

fn check_size(expected: Option<u64>, actual: u64) -> StoreResult<()> {
    match expected {
        Some(expected) if expected != actual => Err(StoreError::SizeMismatch { expected, actual }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    use object_store::memory::InMemory;
    use object_store::{MultipartUpload, PutResult, UploadPart};
    use pretty_assertions::assert_eq;

    fn memory_store() -> S3Store {
        S3Store::from_object_store("test-bucket", Arc::new(InMemory::new()))
    }

    async fn read_all(reader: ObjectReader) -> Vec<u8> {
        let mut out = Vec::new();
        let mut stream = reader.into_stream();
        while let Some(chunk) = stream.try_next().await.unwrap() {
            out.extend_from_slice(&chunk);
        }
        out
    }

    fn chunked(chunks: Vec<&'static [u8]>, size: Option<u64>) -> ObjectReader {
        let stream = stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from_static(c)))).boxed();
        ObjectReader::new(stream, size)
    }

    #[tokio::test]
    async fn stat_missing_is_not_found() {
        let store = memory_store();
        let err = store.stat("nope").await.unwrap_err();
        assert!(err.is_not_found(), "unexpected error: {}", err);
    }

    #[tokio::test]
    async fn single_put_then_get() {
        let store = memory_store();
        let tuning = TransferTuning::default();

        let written = store
            .put("a/b.bin", ObjectReader::from_bytes(Bytes::from_static(b"hello")), &tuning)
            .await
            .unwrap();
        assert_eq!(written, 5);

        let entry = store.stat("a/b.bin").await.unwrap();
        assert_eq!(entry, ObjectEntry { key: "a/b.bin".to_string(), size: 5 });

        let reader = store.get("a/b.bin").await.unwrap();
        assert_eq!(reader.size(), Some(5));
        assert_eq!(read_all(reader).await, b"hello");
    }

    #[tokio::test]
    async fn multipart_put_of_unknown_length_body() {
        let store = memory_store();
        let tuning = TransferTuning {
            part_size: 4,
            disable_multipart: false,
            concurrent_stream_parts: true,
            ..Default::default()
        };

        let body = chunked(vec![b"abc", b"defgh", b"ij"], None);
        let written = store.put("big.bin", body, &tuning).await.unwrap();
        assert_eq!(written, 10);

        let reader = store.get("big.bin").await.unwrap();
        assert_eq!(read_all(reader).await, b"abcdefghij");
    }

    #[tokio::test]
    async fn size_mismatch_leaves_nothing_behind() {
        let store = memory_store();
        let tuning = TransferTuning::default();

        let body = chunked(vec![b"abc"], Some(10));
        let err = store.put("short.bin", body, &tuning).await.unwrap_err();
        assert!(matches!(err, StoreError::SizeMismatch { expected: 10, actual: 3 }));
        assert!(store.stat("short.bin").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn list_filters_by_raw_prefix() {
        let store = memory_store();
        let tuning = TransferTuning::default();
        for key in ["sealed/s-t01000-1", "sealed/s-t01000-2", "sealed-old/x", "cache/y"] {
            store
                .put(key, ObjectReader::from_bytes(Bytes::from_static(b"x")), &tuning)
                .await
                .unwrap();
        }

        let mut keys: Vec<String> = store
            .list("sealed/s-")
            .map_ok(|e| e.key)
            .try_collect()
            .await
            .unwrap();
        keys.sort();
        assert_eq!(keys, vec!["sealed/s-t01000-1", "sealed/s-t01000-2"]);

        let all: Vec<ObjectEntry> = store.list("").try_collect().await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn delete_removes_object() {
        let store = memory_store();
        store
            .put(
                "gone.bin",
                ObjectReader::from_bytes(Bytes::from_static(b"x")),
                &TransferTuning::default(),
            )
            .await
            .unwrap();

        store.delete("gone.bin").await.unwrap();
        assert!(store.stat("gone.bin").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn keys_with_reserved_characters_round_trip() {
        let memory = Arc::new(InMemory::new());
        let store = S3Store::from_object_store("test-bucket", memory.clone());
        let tuning = TransferTuning::default();

        store
            .put(
                "sealed/file~1#a.bin",
                ObjectReader::from_bytes(Bytes::from_static(b"sector")),
                &tuning,
            )
            .await
            .unwrap();

        let listed: Vec<ObjectEntry> = store.list("sealed/").try_collect().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "sealed/file~1#a.bin");

        let reader = store.get(&listed[0].key).await.unwrap();
        store.put("up/file~1#a.bin", reader, &tuning).await.unwrap();
        assert_eq!(store.stat("up/file~1#a.bin").await.unwrap().size, 6);

        // The backend holds the key exactly as given, not percent-encoded.
        let raw: Vec<String> = memory
            .list(None)
            .map_ok(|meta| meta.location.as_ref().to_string())
            .try_collect()
            .await
            .unwrap();
        assert!(raw.contains(&"up/file~1#a.bin".to_string()), "{:?}", raw);

        store.delete(&listed[0].key).await.unwrap();
        assert!(store.stat("sealed/file~1#a.bin").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn unusable_key_is_rejected() {
        let store = memory_store();
        let err = store.stat("a//b").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey { .. }), "got {}", err);
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn read_head_stops_at_limit() {
        // An endless body still returns once the limit is crossed.
        let endless = stream::repeat_with(|| Ok(Bytes::from_static(b"abc"))).boxed();
        match read_head(endless, 10).await.unwrap() {
            BodyHead::Overflow { head, .. } => assert_eq!(head.len(), 12),
            BodyHead::Complete(_) => panic!("endless body reported complete"),
        }

        let short = chunked(vec![b"ab", b"c"], None).into_stream();
        match read_head(short, 10).await.unwrap() {
            BodyHead::Complete(head) => assert_eq!(head, Bytes::from_static(b"abc")),
            BodyHead::Overflow { .. } => panic!("short body overflowed"),
        }
    }

    #[tokio::test]
    async fn single_request_spills_large_bodies_to_multipart() {
        let store = memory_store();
        let tuning = TransferTuning {
            part_size: 4,
            ..Default::default()
        };
        assert!(tuning.disable_multipart);

        // Unknown length, discovered to be larger than a part.
        let body = chunked(vec![b"abc", b"defgh", b"ij"], None);
        assert_eq!(store.put("grown.bin", body, &tuning).await.unwrap(), 10);
        let reader = store.get("grown.bin").await.unwrap();
        assert_eq!(read_all(reader).await, b"abcdefghij");

        // Known length above a part.
        let body = chunked(vec![b"0123", b"4567"], Some(8));
        assert_eq!(store.put("known.bin", body, &tuning).await.unwrap(), 8);
        let reader = store.get("known.bin").await.unwrap();
        assert_eq!(read_all(reader).await, b"01234567");
    }

    #[derive(Debug)]
    struct FlagOnAbort(Arc<AtomicBool>);

    #[async_trait]
    impl MultipartUpload for FlagOnAbort {
        fn put_part(&mut self, _data: PutPayload) -> UploadPart {
            Box::pin(async { Ok(()) })
        }

        async fn complete(&mut self) -> object_store::Result<PutResult> {
            Ok(PutResult {
                e_tag: None,
                version: None,
            })
        }

        async fn abort(&mut self) -> object_store::Result<()> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn dropped_upload_is_aborted() {
        let aborted = Arc::new(AtomicBool::new(false));
        let writer = WriteMultipart::new(Box::new(FlagOnAbort(aborted.clone())));
        drop(PendingUpload::new(writer, Path::from("interrupted.bin")));

        for _ in 0..10 {
            if aborted.load(Ordering::SeqCst) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(aborted.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn taken_upload_is_not_aborted() {
        let aborted = Arc::new(AtomicBool::new(false));
        let writer = WriteMultipart::new(Box::new(FlagOnAbort(aborted.clone())));
        let mut pending = PendingUpload::new(writer, Path::from("done.bin"));

        pending.take().unwrap().finish().await.unwrap();
        drop(pending);
        tokio::task::yield_now().await;
        assert!(!aborted.load(Ordering::SeqCst));
    }
}
