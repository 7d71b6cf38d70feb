// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Where objects come from
//!
//! The three commands share one engine and differ only in their [`Source`]:
//!
//! - [`BucketSource`] - another S3-compatible bucket (`migrate`)
//! - [`LocalSource`] - files on local disk (`upload`)
//! - [`HttpSource`] - plain URLs from a key list (`download`)

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, TryStreamExt};
use reqwest::Client;
use s3_store::{ObjectEntry, ObjectReader, Store, StoreError};
use thiserror::Error;
use tokio_util::io::ReaderStream;
use url::Url;
use walkdir::WalkDir;

/// Which kind of source a job reads from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Bucket,
    Http,
    Local,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceKind::Bucket => "bucket",
            SourceKind::Http => "http",
            SourceKind::Local => "local",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("invalid object URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{operation} is not supported by {kind} sources")]
    Unsupported {
        kind: SourceKind,
        operation: &'static str,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("directory walk failed: {0}")]
    Walk(String),
}

/// A readable origin of objects
#[async_trait]
pub trait Source: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Recursively list everything under `prefix`
    fn list(&self, prefix: &str) -> BoxStream<'static, Result<ObjectEntry, SourceError>>;

    /// Open the object named by `key` for reading
    async fn open(&self, key: &str) -> Result<ObjectReader, SourceError>;

    /// Remove the object named by `key`
    async fn delete(&self, key: &str) -> Result<(), SourceError>;

    /// Name of the object relative to the destination prefix
    fn object_name(&self, key: &str) -> Result<String, SourceError>;
}

/// Objects in another bucket
pub struct BucketSource {
    store: Arc<dyn Store>,
}

impl BucketSource {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Source for BucketSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Bucket
    }

    fn list(&self, prefix: &str) -> BoxStream<'static, Result<ObjectEntry, SourceError>> {
        self.store.list(prefix).map_err(SourceError::from).boxed()
    }

    async fn open(&self, key: &str) -> Result<ObjectReader, SourceError> {
        Ok(self.store.get(key).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), SourceError> {
        Ok(self.store.delete(key).await?)
    }

    fn object_name(&self, key: &str) -> Result<String, SourceError> {
        Ok(key.to_string())
    }
}

/// Objects fetched with a plain `GET`
///
/// Keys are absolute URLs. There is nothing to list and nothing to delete.
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Source for HttpSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Http
    }

    fn list(&self, _prefix: &str) -> BoxStream<'static, Result<ObjectEntry, SourceError>> {
        stream::once(async {
            Err(SourceError::Unsupported {
                kind: SourceKind::Http,
                operation: "list",
            })
        })
        .boxed()
    }

    async fn open(&self, key: &str) -> Result<ObjectReader, SourceError> {
        let response = self.client.get(key).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: key.to_string(),
                status: status.as_u16(),
            });
        }

        let size = response.content_length();
        let body = response
            .bytes_stream()
            .map_err(|e| StoreError::Read(e.to_string()))
            .boxed();

        Ok(ObjectReader::new(body, size))
    }

    async fn delete(&self, _key: &str) -> Result<(), SourceError> {
        Err(SourceError::Unsupported {
            kind: SourceKind::Http,
            operation: "delete",
        })
    }

    fn object_name(&self, key: &str) -> Result<String, SourceError> {
        let invalid = |reason: &str| SourceError::InvalidUrl {
            url: key.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(key).map_err(|e| invalid(&e.to_string()))?;
        url.path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .map(str::to_string)
            .ok_or_else(|| invalid("no file name in path"))
    }
}

/// Files on the local filesystem
///
/// Keys are paths. Listing walks a directory tree and skips anything whose
/// name starts with a dot, including everything below a hidden directory.
#[derive(Debug, Default)]
pub struct LocalSource;

impl LocalSource {
    pub fn new() -> Self {
        Self
    }
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn walk_files(root: &Path) -> Vec<Result<ObjectEntry, SourceError>> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
        .filter_map(|entry| match entry {
            Ok(entry) if entry.file_type().is_file() => Some(
                entry
                    .metadata()
                    .map(|meta| ObjectEntry {
                        key: entry.path().to_string_lossy().into_owned(),
                        size: meta.len(),
                    })
                    .map_err(|e| SourceError::Walk(e.to_string())),
            ),
            Ok(_) => None,
            Err(e) => Some(Err(SourceError::Walk(e.to_string()))),
        })
        .collect()
}

#[async_trait]
impl Source for LocalSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    fn list(&self, prefix: &str) -> BoxStream<'static, Result<ObjectEntry, SourceError>> {
        let root = PathBuf::from(prefix);
        stream::once(async move {
            match tokio::task::spawn_blocking(move || walk_files(&root)).await {
                Ok(entries) => entries,
                Err(e) => vec![Err(SourceError::Walk(e.to_string()))],
            }
        })
        .flat_map(stream::iter)
        .boxed()
    }

    async fn open(&self, key: &str) -> Result<ObjectReader, SourceError> {
        let io_err = |source| SourceError::Io {
            path: PathBuf::from(key),
            source,
        };

        let file = tokio::fs::File::open(key).await.map_err(io_err)?;
        let size = file.metadata().await.map_err(io_err)?.len();
        let body = ReaderStream::new(file).map_err(StoreError::from).boxed();

        Ok(ObjectReader::new(body, Some(size)))
    }

    async fn delete(&self, key: &str) -> Result<(), SourceError> {
        tokio::fs::remove_file(key)
            .await
            .map_err(|source| SourceError::Io {
                path: PathBuf::from(key),
                source,
            })
    }

    fn object_name(&self, key: &str) -> Result<String, SourceError> {
        Ok(key.trim_start_matches("./").trim_start_matches('/').to_string())
    }
}
