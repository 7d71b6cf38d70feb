// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Per-run counters

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Step, TransferError};
use crate::executor::JobOutcome;
use crate::metrics;

/// Totals for one run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Keys handed over by the enumerator
    pub dispatched: u64,
    pub transferred: u64,
    /// Keys the destination already had
    pub skipped_existing: u64,
    pub failed: u64,
    /// Source objects removed after transfer
    pub deleted: u64,
    pub relocated: u64,
    /// Bytes written to the destination
    pub bytes: u64,
}

/// Shared counters updated by the dispatcher and every worker
#[derive(Debug, Default)]
pub(crate) struct RunCounters {
    dispatched: AtomicU64,
    transferred: AtomicU64,
    skipped_existing: AtomicU64,
    failed: AtomicU64,
    deleted: AtomicU64,
    relocated: AtomicU64,
    bytes: AtomicU64,
}

impl RunCounters {
    pub fn dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn skipped(&self) {
        self.skipped_existing.fetch_add(1, Ordering::Relaxed);
        metrics::record_object_skipped();
    }

    pub fn failed(&self, step: Step) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        metrics::record_object_failed(step);
    }

    /// A job whose task died before reporting an outcome
    pub fn panicked(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        metrics::record_task_panic();
    }

    pub fn record(&self, outcome: &Result<JobOutcome, TransferError>) {
        match outcome {
            Ok(JobOutcome::AlreadyPresent) => self.skipped(),
            Ok(JobOutcome::Transferred {
                bytes,
                relocated,
                deleted,
            }) => {
                self.transferred.fetch_add(1, Ordering::Relaxed);
                self.bytes.fetch_add(*bytes, Ordering::Relaxed);
                metrics::record_object_transferred(*bytes);
                if *relocated {
                    self.relocated.fetch_add(1, Ordering::Relaxed);
                    metrics::record_relocation();
                }
                if *deleted {
                    self.deleted.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(e) => self.failed(e.step),
        }
    }

    pub fn snapshot(&self) -> RunSummary {
        RunSummary {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            transferred: self.transferred.load(Ordering::Relaxed),
            skipped_existing: self.skipped_existing.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            relocated: self.relocated.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use s3_store::StoreError;

    #[test]
    fn outcomes_map_to_counters() {
        let counters = RunCounters::default();
        counters.dispatched();
        counters.dispatched();
        counters.dispatched();

        counters.record(&Ok(JobOutcome::Transferred {
            bytes: 10,
            relocated: true,
            deleted: false,
        }));
        counters.record(&Ok(JobOutcome::AlreadyPresent));
        counters.record(&Err(TransferError::new(
            "k",
            Step::Open,
            StoreError::Get("boom".to_string()),
        )));

        assert_eq!(
            counters.snapshot(),
            RunSummary {
                dispatched: 3,
                transferred: 1,
                skipped_existing: 1,
                failed: 1,
                deleted: 0,
                relocated: 1,
                bytes: 10,
            }
        );
    }
}
