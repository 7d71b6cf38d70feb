// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Error types
//!
//! Two tiers. [`MigrateError`] ends the whole run and reaches the process
//! exit code. [`TransferError`] belongs to a single job: it is logged and
//! counted, and never escapes the worker that produced it.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use s3_store::StoreError;
use thiserror::Error;

use crate::relocation::RelocationError;
use crate::source::SourceError;

/// Run-fatal errors
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read key list {}: {source}", path.display())]
    KeyList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("listing failed: {0}")]
    Listing(#[source] SourceError),

    #[error("failed to connect {side}: {source}")]
    Connect {
        side: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("enumerator task failed: {0}")]
    Enumerator(String),
}

/// Stage of the per-object pipeline a failure happened in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    /// Deriving the destination key from the source key
    Resolve,
    /// Destination existence check
    Check,
    /// Waiting for a worker slot
    Admit,
    /// Opening the source object
    Open,
    /// Streaming the body to the destination
    Upload,
    /// Declare/drop notification
    Relocate,
    /// Removing the source object
    Delete,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Resolve => "resolve",
            Step::Check => "check",
            Step::Admit => "admit",
            Step::Open => "open",
            Step::Upload => "upload",
            Step::Relocate => "relocate",
            Step::Delete => "delete",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong inside a step
#[derive(Debug, Error)]
pub enum FailureCause {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Relocation(#[from] RelocationError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,
}

/// A job-scoped failure, tagged with the key and the step that failed
#[derive(Debug, Error)]
#[error("{step} failed for {key}: {cause}")]
pub struct TransferError {
    pub key: String,
    pub step: Step,
    #[source]
    pub cause: FailureCause,
}

impl TransferError {
    pub fn new(key: impl Into<String>, step: Step, cause: impl Into<FailureCause>) -> Self {
        Self {
            key: key.into(),
            step,
            cause: cause.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause, FailureCause::Cancelled)
    }
}
