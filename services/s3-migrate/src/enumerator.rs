// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Key discovery
//!
//! The enumerator is the single producer of [`TransferJob`]s. It runs as
//! its own task, owns the dedup cache outright, and hands jobs over a
//! bounded channel so it stalls whenever the dispatcher falls behind.

use std::path::Path;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::TransferJob;
use crate::config::{Discovery, WatchConfig};
use crate::dedup::DedupCache;
use crate::error::MigrateError;
use crate::source::Source;

/// Whether the producer should keep going
enum Flow {
    Continue,
    Stop,
}

pub struct Enumerator {
    source: Arc<dyn Source>,
    discovery: Discovery,
    watch: Option<WatchConfig>,
    cache: Box<dyn DedupCache>,
    tx: mpsc::Sender<TransferJob>,
    cancel: CancellationToken,
    emitted: u64,
}

impl Enumerator {
    pub fn new(
        source: Arc<dyn Source>,
        discovery: Discovery,
        watch: Option<WatchConfig>,
        cache: Box<dyn DedupCache>,
        tx: mpsc::Sender<TransferJob>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            discovery,
            watch,
            cache,
            tx,
            cancel,
            emitted: 0,
        }
    }

    /// Produce jobs until discovery is exhausted, the run is cancelled or
    /// the receiver goes away
    ///
    /// Returns the number of jobs emitted. The channel closes when this
    /// returns, whatever the outcome.
    pub async fn run(mut self) -> Result<u64, MigrateError> {
        match self.discovery.clone() {
            Discovery::StaticList(path) => {
                if self.watch.is_some() {
                    info!("Watch mode does not apply to key lists, reading once");
                }
                self.emit_static_list(&path).await?;
            }
            Discovery::Listing { prefix } => self.watch_listing(&prefix).await?,
        }
        Ok(self.emitted)
    }

    async fn emit_static_list(&mut self, path: &Path) -> Result<(), MigrateError> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| MigrateError::KeyList {
                    path: path.to_path_buf(),
                    source,
                })?;

        for line in content.lines() {
            let key = line.trim();
            if key.is_empty() {
                continue;
            }
            let job = TransferJob {
                key: key.to_string(),
                size_hint: None,
                dispatched_at: Instant::now(),
            };
            if let Flow::Stop = self.emit(job).await {
                break;
            }
        }

        info!(path = %path.display(), emitted = self.emitted, "Finished reading key list");
        Ok(())
    }

    async fn watch_listing(&mut self, prefix: &str) -> Result<(), MigrateError> {
        let mut pass = 0u64;
        loop {
            pass += 1;
            let before = self.emitted;
            let flow = self.list_once(prefix).await?;
            info!(
                prefix,
                pass,
                emitted = self.emitted - before,
                tracked = self.cache.len(),
                "Listing pass complete"
            );

            let Flow::Continue = flow else {
                return Ok(());
            };
            let Some(watch) = self.watch else {
                return Ok(());
            };

            tokio::select! {
                _ = tokio::time::sleep(watch.rescan_interval) => {}
                _ = self.cancel.cancelled() => return Ok(()),
            }

            let evicted = self.cache.evict_older_than(watch.retention, Instant::now());
            if evicted > 0 {
                debug!(evicted, "Evicted expired dispatch records");
            }
        }
    }

    async fn list_once(&mut self, prefix: &str) -> Result<Flow, MigrateError> {
        let mut entries = self.source.list(prefix);

        loop {
            let next = tokio::select! {
                next = entries.next() => next,
                _ = self.cancel.cancelled() => return Ok(Flow::Stop),
            };
            let Some(entry) = next else {
                return Ok(Flow::Continue);
            };
            let entry = entry.map_err(MigrateError::Listing)?;

            if self.cache.seen(&entry.key) {
                continue;
            }

            let now = Instant::now();
            self.cache.record(&entry.key, now);
            let job = TransferJob {
                key: entry.key,
                size_hint: Some(entry.size),
                dispatched_at: now,
            };
            if let Flow::Stop = self.emit(job).await {
                return Ok(Flow::Stop);
            }
        }
    }

    async fn emit(&mut self, job: TransferJob) -> Flow {
        let sent = tokio::select! {
            sent = self.tx.send(job) => sent.is_ok(),
            _ = self.cancel.cancelled() => false,
        };
        if sent {
            self.emitted += 1;
            Flow::Continue
        } else {
            debug!("Dispatcher gone, stopping enumeration");
            Flow::Stop
        }
    }
}
