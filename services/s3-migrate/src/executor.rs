// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Per-object transfer pipeline
//!
//! Steps run strictly in order and the first failure ends the job:
//!
//! 1. re-check the destination (it may have appeared while the job queued)
//! 2. open the source
//! 3. upload to the destination
//! 4. relocation notification, when configured
//! 5. source removal, when configured
//!
//! A failed removal is logged but the job still counts as transferred.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use s3_store::{Store, TransferTuning};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::TransferJob;
use crate::error::{FailureCause, Step, TransferError};
use crate::gate::{IdempotencyGate, Presence};
use crate::metrics;
use crate::relocation::{RelocationNotifier, StorageUnit, relocate};
use crate::source::Source;

/// Relocation target for every transferred storage unit
pub struct Relocation {
    pub notifier: Arc<dyn RelocationNotifier>,
    /// Location the unit is dropped from
    pub src_location: String,
    /// Location the unit is declared at
    pub dst_location: String,
}

/// How a job ended when it did not fail
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// The destination already had the object
    AlreadyPresent,
    Transferred {
        bytes: u64,
        relocated: bool,
        deleted: bool,
    },
}

/// Run `fut` as one pipeline step
///
/// The step fails with [`FailureCause::Timeout`] once `limit` elapses and
/// with [`FailureCause::Cancelled`] as soon as `cancel` fires.
pub(crate) async fn run_step<T, E, F>(
    key: &str,
    step: Step,
    limit: Option<Duration>,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, TransferError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<FailureCause>,
{
    let bounded = async {
        match limit {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(FailureCause::Timeout(limit)),
            },
            None => fut.await.map_err(Into::into),
        }
    };

    let result = tokio::select! {
        result = bounded => result,
        _ = cancel.cancelled() => Err(FailureCause::Cancelled),
    };

    result.map_err(|cause| TransferError::new(key, step, cause))
}

pub struct TransferExecutor {
    source: Arc<dyn Source>,
    destination: Arc<dyn Store>,
    gate: Arc<IdempotencyGate>,
    tuning: TransferTuning,
    relocation: Option<Relocation>,
    remove_source: bool,
    step_timeout: Option<Duration>,
}

impl TransferExecutor {
    pub fn new(
        source: Arc<dyn Source>,
        destination: Arc<dyn Store>,
        gate: Arc<IdempotencyGate>,
        tuning: TransferTuning,
    ) -> Self {
        Self {
            source,
            destination,
            gate,
            tuning,
            relocation: None,
            remove_source: false,
            step_timeout: None,
        }
    }

    pub fn with_relocation(mut self, relocation: Option<Relocation>) -> Self {
        self.relocation = relocation;
        self
    }

    pub fn with_remove_source(mut self, remove_source: bool) -> Self {
        self.remove_source = remove_source;
        self
    }

    /// Bound for every step except the upload itself
    pub fn with_step_timeout(mut self, step_timeout: Option<Duration>) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    /// Copy one object from the source to `dst_key`
    pub async fn execute(
        &self,
        job: &TransferJob,
        dst_key: &str,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome, TransferError> {
        let key = job.key.as_str();
        let limit = self.step_timeout;

        let presence = run_step(key, Step::Check, limit, cancel, self.gate.check(dst_key)).await?;
        if let Presence::Present(size) = presence {
            info!(key, dst_key, size, "Destination appeared while queued, skipping");
            return Ok(JobOutcome::AlreadyPresent);
        }

        let reader = run_step(key, Step::Open, limit, cancel, self.source.open(key)).await?;
        if let (Some(listed), Some(actual)) = (job.size_hint, reader.size())
            && listed != actual
        {
            warn!(key, listed, actual, "Source size changed since listing");
        }

        let start = std::time::Instant::now();
        let bytes = run_step(
            key,
            Step::Upload,
            None,
            cancel,
            self.destination.put(dst_key, reader, &self.tuning),
        )
        .await?;
        let elapsed = start.elapsed();
        info!(
            key,
            dst_key,
            bytes,
            duration_ms = elapsed.as_millis() as u64,
            "Transferred object"
        );

        let relocated = match &self.relocation {
            Some(relocation) => self.relocate(key, relocation, cancel).await?,
            None => false,
        };

        let deleted = self.remove_source && self.delete_source(key, cancel).await;

        Ok(JobOutcome::Transferred {
            bytes,
            relocated,
            deleted,
        })
    }

    async fn relocate(
        &self,
        key: &str,
        relocation: &Relocation,
        cancel: &CancellationToken,
    ) -> Result<bool, TransferError> {
        let unit = match StorageUnit::from_key(key) {
            Ok(unit) => unit,
            Err(e) => {
                info!(key, reason = %e, "No storage unit in key, skipping relocation");
                return Ok(false);
            }
        };

        run_step(
            key,
            Step::Relocate,
            self.step_timeout,
            cancel,
            relocate(
                relocation.notifier.as_ref(),
                &relocation.src_location,
                &relocation.dst_location,
                &unit,
            ),
        )
        .await?;

        Ok(true)
    }

    async fn delete_source(&self, key: &str, cancel: &CancellationToken) -> bool {
        match run_step(key, Step::Delete, self.step_timeout, cancel, self.source.delete(key)).await {
            Ok(()) => {
                debug!(key, "Removed source object");
                true
            }
            Err(e) => {
                warn!(key, step = %e.step, error = %e.cause, "Failed to remove source object");
                metrics::record_error(Step::Delete);
                false
            }
        }
    }
}
