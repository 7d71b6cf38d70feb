// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Object migration engine
//!
//! Copies objects from a bucket, a local directory or a list of URLs into
//! an S3-compatible bucket, once or continuously. One engine serves all
//! three commands; only the [`source::Source`] differs.
//!
//! A run is a single producer (the [`enumerator::Enumerator`]) feeding a
//! dispatcher that skips objects the destination already has and hands the
//! rest to a bounded pool of [`executor::TransferExecutor`] tasks.
//!
//! # Modules
//!
//! - [`cli`] - Command line surface
//! - [`config`] - Run configuration and validation
//! - [`dedup`] - Time-bounded record of dispatched keys
//! - [`enumerator`] - Key discovery (static list or live listing, optional watch)
//! - [`error`] - Run-fatal and per-job error types
//! - [`executor`] - Per-object transfer pipeline
//! - [`gate`] - Destination existence check
//! - [`http`] - HTTP client construction
//! - [`metrics`] - Prometheus metrics
//! - [`migrator`] - Run orchestration and worker pool
//! - [`relocation`] - Storage relocation notifications
//! - [`source`] - Bucket, HTTP and local sources
//! - [`summary`] - Per-run counters

pub mod cli;
pub mod config;
pub mod dedup;
pub mod enumerator;
pub mod error;
pub mod executor;
pub mod gate;
pub mod http;
pub mod metrics;
pub mod migrator;
pub mod relocation;
pub mod source;
pub mod summary;

use tokio::time::Instant;

pub use config::{Discovery, MigrateConfig, RunOptions, WatchConfig};
pub use error::{MigrateError, Step, TransferError};
pub use migrator::Migrator;
pub use summary::RunSummary;

/// One unit of work handed from the enumerator to the dispatcher
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferJob {
    /// Source URL, bucket key or file path
    pub key: String,
    /// Size from the listing; `None` for key lists
    pub size_hint: Option<u64>,
    /// When the enumerator emitted the job
    pub dispatched_at: Instant,
}
