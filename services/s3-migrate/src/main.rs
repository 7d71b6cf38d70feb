// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! s3-migrate
//!
//! Copies objects into an S3-compatible bucket from another bucket
//! (`migrate`), from local disk (`upload`) or from a list of URLs
//! (`download`). Objects already present at the destination are skipped, so
//! a failed run can simply be started again.
//!
//! The exit status is non-zero only for configuration and enumeration
//! errors; individual failed objects are logged and counted.

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use s3_migrate::Migrator;
use s3_migrate::cli::Cli;
use s3_migrate::{http, metrics};

/// Log filter used when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "s3_migrate=info,s3_store=info";

fn print_version() {
    let version = env!("CARGO_PKG_VERSION");
    let name = env!("CARGO_PKG_NAME");
    let buildstamp = option_env!("STAMP").unwrap_or("no-STAMP");
    println!("{} {} ({})", name, version, buildstamp);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
        ))
        .init();

    print_version();

    http::install_crypto_provider();
    metrics::register_metrics();

    let command = cli.command.name();
    let invocation = cli
        .command
        .into_invocation()
        .context("Invalid configuration")?;
    let metrics_file = invocation.metrics_file;

    let migrator =
        Migrator::connect(invocation.config).context("Failed to set up migration")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing in-flight steps");
                cancel.cancel();
            }
        });
    }

    info!(command, "Starting");
    let result = migrator.run(cancel).await;

    if let Some(path) = &metrics_file {
        metrics::write_textfile(path)
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }

    let summary = result.with_context(|| format!("{} failed", command))?;
    if summary.failed > 0 {
        warn!(
            failed = summary.failed,
            "Some objects failed; re-run to retry them"
        );
    }

    Ok(())
}
