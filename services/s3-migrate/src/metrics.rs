// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Prometheus metrics for migration runs
//!
//! The binary is a batch job, so nothing is served: the registry is written
//! out as a node-exporter textfile when the run ends.
//!
//! - Objects by status (transferred, skipped, failed)
//! - Bytes written to the destination
//! - Errors by pipeline step
//! - Run duration

use std::path::Path;

use prometheus::{Counter, CounterVec, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

use crate::error::Step;

// Static metric definitions cannot fail for valid names; a failure here is
// a programming error and should panic at startup.
#[allow(clippy::expect_used)]
mod metrics_impl {
    use super::*;
    use lazy_static::lazy_static;

    lazy_static! {
        pub static ref REGISTRY: Registry = Registry::new();

        pub static ref BYTES_TOTAL: Counter = Counter::with_opts(
            Opts::new("s3_migrate_bytes_total", "Total bytes written to the destination")
        ).expect("valid metric name");

        /// Objects by status (transferred, skipped, failed)
        pub static ref OBJECTS_TOTAL: CounterVec = CounterVec::new(
            Opts::new("s3_migrate_objects_total", "Objects processed by status"),
            &["status"]
        ).expect("valid metric name and labels");

        /// Errors by pipeline step
        pub static ref ERRORS_TOTAL: CounterVec = CounterVec::new(
            Opts::new("s3_migrate_errors_total", "Errors by pipeline step"),
            &["step"]
        ).expect("valid metric name and labels");

        pub static ref RELOCATIONS_TOTAL: Counter = Counter::with_opts(
            Opts::new("s3_migrate_relocations_total", "Storage units declared and dropped")
        ).expect("valid metric name");

        /// Transfer tasks that panicked; each also counts as a failed object
        pub static ref TASK_PANICS: Counter = Counter::with_opts(
            Opts::new("s3_migrate_task_panics_total", "Transfer tasks that panicked")
        ).expect("valid metric name");

        pub static ref RUN_DURATION: Histogram = Histogram::with_opts(
            HistogramOpts::new(
                "s3_migrate_run_duration_seconds",
                "Wall-clock duration of a migration run in seconds"
            )
            // 1m, 5m, 15m, 1h, 4h, 12h, 1d, 2d
            .buckets(vec![60.0, 300.0, 900.0, 3600.0, 14400.0, 43200.0, 86400.0, 172800.0])
        ).expect("valid histogram opts");
    }
}

pub use metrics_impl::{
    BYTES_TOTAL, ERRORS_TOTAL, OBJECTS_TOTAL, REGISTRY, RELOCATIONS_TOTAL, RUN_DURATION,
    TASK_PANICS,
};

/// Register all metrics with the registry
///
/// Call once at startup. Panics if called twice.
#[allow(clippy::expect_used)]
pub fn register_metrics() {
    REGISTRY
        .register(Box::new(BYTES_TOTAL.clone()))
        .expect("Failed to register BYTES_TOTAL");
    REGISTRY
        .register(Box::new(OBJECTS_TOTAL.clone()))
        .expect("Failed to register OBJECTS_TOTAL");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("Failed to register ERRORS_TOTAL");
    REGISTRY
        .register(Box::new(RELOCATIONS_TOTAL.clone()))
        .expect("Failed to register RELOCATIONS_TOTAL");
    REGISTRY
        .register(Box::new(TASK_PANICS.clone()))
        .expect("Failed to register TASK_PANICS");
    REGISTRY
        .register(Box::new(RUN_DURATION.clone()))
        .expect("Failed to register RUN_DURATION");
}

/// Metrics in Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}

/// Write the registry to `path` as a textfile
///
/// Writes to a sibling temp file first so a collector never reads a
/// truncated file.
pub fn write_textfile(path: &Path) -> std::io::Result<()> {
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, gather_metrics())?;
    std::fs::rename(&tmp, path)
}

pub fn record_object_transferred(bytes: u64) {
    BYTES_TOTAL.inc_by(bytes as f64);
    OBJECTS_TOTAL.with_label_values(&["transferred"]).inc();
}

/// Record an object the destination already had
pub fn record_object_skipped() {
    OBJECTS_TOTAL.with_label_values(&["skipped"]).inc();
}

pub fn record_object_failed(step: Step) {
    OBJECTS_TOTAL.with_label_values(&["failed"]).inc();
    record_error(step);
}

/// Record an error that did not fail its job (e.g. source removal)
pub fn record_error(step: Step) {
    ERRORS_TOTAL.with_label_values(&[step.as_str()]).inc();
}

pub fn record_task_panic() {
    OBJECTS_TOTAL.with_label_values(&["failed"]).inc();
    TASK_PANICS.inc();
}

pub fn record_relocation() {
    RELOCATIONS_TOTAL.inc();
}

pub fn record_run_duration(duration_secs: f64) {
    RUN_DURATION.observe(duration_secs);
}
