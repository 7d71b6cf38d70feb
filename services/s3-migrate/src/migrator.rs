// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Run orchestration
//!
//! ```text
//! Enumerator --mpsc(1)--> dispatcher: gate check --> semaphore --> JoinSet
//!                                                                 |
//!                                             TransferExecutor per job
//! ```
//!
//! The dispatcher checks the destination *before* taking a pool slot, so
//! objects that are already there never occupy a worker. It reaps finished
//! tasks while it dispatches and drains the set before returning.

use std::sync::Arc;
use std::time::Instant;

use s3_store::{S3Store, Store};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::TransferJob;
use crate::config::{MigrateConfig, RunOptions, SourceConfig};
use crate::dedup::{DedupCache, MemoryDedupCache};
use crate::enumerator::Enumerator;
use crate::error::{FailureCause, MigrateError, Step, TransferError};
use crate::executor::{Relocation, TransferExecutor, run_step};
use crate::gate::{IdempotencyGate, Presence};
use crate::http;
use crate::metrics;
use crate::relocation::{JsonRpcNotifier, RelocationNotifier};
use crate::source::{BucketSource, HttpSource, LocalSource, Source};
use crate::summary::{RunCounters, RunSummary};

/// Capacity of the enumerator -> dispatcher handoff
const HANDOFF_CAPACITY: usize = 1;

pub struct Migrator {
    options: RunOptions,
    source: Arc<dyn Source>,
    destination: Arc<dyn Store>,
    relocation: Option<Relocation>,
    cache: Box<dyn DedupCache>,
}

impl Migrator {
    pub fn new(options: RunOptions, source: Arc<dyn Source>, destination: Arc<dyn Store>) -> Self {
        Self {
            options,
            source,
            destination,
            relocation: None,
            cache: Box::new(MemoryDedupCache::new()),
        }
    }

    /// Build the source, destination and notifier described by `config`
    pub fn connect(config: MigrateConfig) -> Result<Self, MigrateError> {
        config.validate()?;

        let tuning = config.run.tuning;
        let client = http::build_client(None).map_err(MigrateError::HttpClient)?;

        let source: Arc<dyn Source> = match &config.source {
            SourceConfig::Bucket(endpoint) => {
                let store = S3Store::connect(endpoint, &tuning).map_err(|source| {
                    MigrateError::Connect {
                        side: "source",
                        source,
                    }
                })?;
                Arc::new(BucketSource::new(Arc::new(store)))
            }
            SourceConfig::Http => Arc::new(HttpSource::new(client.clone())),
            SourceConfig::Local => Arc::new(LocalSource::new()),
        };

        let destination = S3Store::connect(&config.destination, &tuning).map_err(|source| {
            MigrateError::Connect {
                side: "destination",
                source,
            }
        })?;

        let relocation = config.relocation.map(|reloc| Relocation {
            notifier: Arc::new(JsonRpcNotifier::new(client, reloc.rpc_url, reloc.token))
                as Arc<dyn RelocationNotifier>,
            src_location: reloc.src_location,
            dst_location: reloc.dst_location,
        });

        info!(
            source = %source.kind(),
            destination = %config.destination.endpoint_url(),
            bucket = %config.destination.bucket,
            relocation = relocation.is_some(),
            "Configured migration"
        );

        Ok(Self::new(config.run, source, Arc::new(destination)).with_relocation(relocation))
    }

    pub fn with_relocation(mut self, relocation: Option<Relocation>) -> Self {
        self.relocation = relocation;
        self
    }

    /// Swap the in-memory dispatch record for another backing
    pub fn with_dedup_cache(mut self, cache: Box<dyn DedupCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Run until discovery is exhausted (or `cancel` fires) and every
    /// dispatched job has finished
    ///
    /// Per-job failures only show up in the summary. An error is returned
    /// for bad configuration or a failed enumeration, after in-flight jobs
    /// have drained.
    pub async fn run(self, cancel: CancellationToken) -> Result<RunSummary, MigrateError> {
        self.options.validate(self.source.kind())?;

        let start = Instant::now();
        let Migrator {
            options,
            source,
            destination,
            relocation,
            cache,
        } = self;

        let gate = Arc::new(IdempotencyGate::new(
            Arc::clone(&destination),
            options.dst_prefix.clone(),
        ));
        let executor = Arc::new(
            TransferExecutor::new(
                Arc::clone(&source),
                destination,
                Arc::clone(&gate),
                options.tuning,
            )
            .with_relocation(relocation)
            .with_remove_source(options.remove_source)
            .with_step_timeout(options.step_timeout),
        );

        let (tx, mut rx) = mpsc::channel::<TransferJob>(HANDOFF_CAPACITY);
        let producer = tokio::spawn(
            Enumerator::new(
                Arc::clone(&source),
                options.discovery.clone(),
                options.watch,
                cache,
                tx,
                cancel.clone(),
            )
            .run(),
        );

        let counters = Arc::new(RunCounters::default());
        let pool = Arc::new(Semaphore::new(options.concurrency));
        let mut tasks: JoinSet<()> = JoinSet::new();

        info!(
            concurrency = options.concurrency,
            dst_prefix = %options.dst_prefix,
            watch = options.watch.is_some(),
            remove = options.remove_source,
            "Starting migration"
        );

        loop {
            tokio::select! {
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    reap(result, &counters);
                }

                job = rx.recv() => {
                    let Some(job) = job else {
                        break;
                    };
                    counters.dispatched();

                    let admitted =
                        admit(&job, source.as_ref(), &gate, &options, &counters, &cancel).await;
                    let Some(dst_key) = admitted else {
                        continue;
                    };

                    let permit = tokio::select! {
                        permit = Arc::clone(&pool).acquire_owned() => permit,
                        _ = cancel.cancelled() => {
                            let e =
                                TransferError::new(job.key, Step::Admit, FailureCause::Cancelled);
                            log_failure(&e);
                            counters.failed(e.step);
                            break;
                        }
                    };
                    let Ok(permit) = permit else {
                        error!("Worker pool closed unexpectedly");
                        break;
                    };

                    let executor = Arc::clone(&executor);
                    let counters = Arc::clone(&counters);
                    let cancel = cancel.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        let outcome = executor.execute(&job, &dst_key, &cancel).await;
                        if let Err(e) = &outcome {
                            log_failure(e);
                        }
                        counters.record(&outcome);
                    });
                }
            }
        }

        // Stop the producer if we left the loop early; a no-op otherwise.
        drop(rx);

        info!(pending = tasks.len(), "Waiting for in-flight transfers");
        while let Some(result) = tasks.join_next().await {
            reap(result, &counters);
        }

        let produced = match producer.await {
            Ok(result) => result,
            Err(e) => Err(MigrateError::Enumerator(e.to_string())),
        };

        let elapsed = start.elapsed();
        metrics::record_run_duration(elapsed.as_secs_f64());
        let summary = counters.snapshot();
        info!(
            dispatched = summary.dispatched,
            transferred = summary.transferred,
            skipped_existing = summary.skipped_existing,
            failed = summary.failed,
            deleted = summary.deleted,
            relocated = summary.relocated,
            bytes = summary.bytes,
            duration_secs = elapsed.as_secs(),
            cancelled = cancel.is_cancelled(),
            "Migration finished"
        );

        match produced {
            Ok(_) => Ok(summary),
            Err(e) => {
                error!(error = %e, "Enumeration failed");
                Err(e)
            }
        }
    }
}

/// Destination check ahead of admission
///
/// Returns the destination key when the job should be handed to a worker.
async fn admit(
    job: &TransferJob,
    source: &dyn Source,
    gate: &IdempotencyGate,
    options: &RunOptions,
    counters: &RunCounters,
    cancel: &CancellationToken,
) -> Option<String> {
    let key = job.key.as_str();

    let dst_key = match gate.destination_key(source, key) {
        Ok(dst_key) => dst_key,
        Err(e) => {
            log_failure(&TransferError::new(key, Step::Resolve, e));
            counters.failed(Step::Resolve);
            return None;
        }
    };

    match run_step(key, Step::Check, options.step_timeout, cancel, gate.check(&dst_key)).await {
        Ok(Presence::Absent) => Some(dst_key),
        Ok(Presence::Present(size)) => {
            info!(key, dst_key = %dst_key, size, "Already at destination, skipping");
            counters.skipped();
            None
        }
        Err(e) => {
            log_failure(&e);
            counters.failed(e.step);
            None
        }
    }
}

fn reap(result: Result<(), tokio::task::JoinError>, counters: &RunCounters) {
    if let Err(e) = result {
        error!(error = %e, "Transfer task panicked");
        counters.panicked();
    }
}

fn log_failure(e: &TransferError) {
    if e.is_cancelled() {
        info!(key = %e.key, step = %e.step, "Transfer cancelled");
    } else {
        warn!(key = %e.key, step = %e.step, error = %e.cause, "Transfer failed");
    }
}
