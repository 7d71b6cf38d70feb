// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Run configuration
//!
//! Built once from the command line, validated, then shared read-only by
//! the enumerator and every worker.

use std::path::PathBuf;
use std::time::Duration;

use s3_store::{EndpointConfig, TransferTuning};
use secrecy::SecretString;
use url::Url;

use crate::dedup::DEFAULT_RETENTION;
use crate::error::MigrateError;
use crate::source::SourceKind;

/// Default number of concurrent transfers
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default pause between listings in watch mode (60 minutes)
pub const DEFAULT_RESCAN_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// How keys are discovered
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Discovery {
    /// Newline-delimited keys read once from a file
    StaticList(PathBuf),
    /// Live listing of the source under a prefix (a directory for local
    /// sources)
    Listing { prefix: String },
}

/// Periodic re-listing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchConfig {
    pub rescan_interval: Duration,
    /// How long a dispatched key is suppressed from re-emission
    pub retention: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            rescan_interval: DEFAULT_RESCAN_INTERVAL,
            retention: DEFAULT_RETENTION,
        }
    }
}

/// Engine settings, independent of how the endpoints are reached
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub discovery: Discovery,
    /// Ignored for static lists
    pub watch: Option<WatchConfig>,
    pub dst_prefix: String,
    pub tuning: TransferTuning,
    /// Maximum number of transfers in flight
    pub concurrency: usize,
    /// Delete the source object after a successful transfer
    pub remove_source: bool,
    /// Bound on every step except the upload
    pub step_timeout: Option<Duration>,
}

impl RunOptions {
    pub fn new(discovery: Discovery) -> Self {
        Self {
            discovery,
            watch: None,
            dst_prefix: String::new(),
            tuning: TransferTuning::default(),
            concurrency: DEFAULT_CONCURRENCY,
            remove_source: false,
            step_timeout: None,
        }
    }

    /// Check the options make sense for a source of kind `kind`
    pub fn validate(&self, kind: SourceKind) -> Result<(), MigrateError> {
        if self.concurrency == 0 {
            return Err(MigrateError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        self.tuning.validate().map_err(MigrateError::Config)?;

        if let Some(watch) = &self.watch
            && (watch.rescan_interval.is_zero() || watch.retention.is_zero())
        {
            return Err(MigrateError::Config(
                "rescan interval and retention must be non-zero".to_string(),
            ));
        }
        if self.step_timeout.is_some_and(|t| t.is_zero()) {
            return Err(MigrateError::Config(
                "step timeout must be non-zero".to_string(),
            ));
        }

        if kind == SourceKind::Http {
            if matches!(self.discovery, Discovery::Listing { .. }) {
                return Err(MigrateError::Config(
                    "HTTP sources need a key list".to_string(),
                ));
            }
            if self.remove_source {
                return Err(MigrateError::Config(
                    "HTTP sources cannot be removed".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Where the objects come from
#[derive(Debug)]
pub enum SourceConfig {
    Bucket(EndpointConfig),
    Http,
    Local,
}

impl SourceConfig {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceConfig::Bucket(_) => SourceKind::Bucket,
            SourceConfig::Http => SourceKind::Http,
            SourceConfig::Local => SourceKind::Local,
        }
    }
}

/// Node-management service to notify after each transferred storage unit
#[derive(Debug)]
pub struct RelocationConfig {
    /// Storage location the unit is dropped from
    pub src_location: String,
    /// Storage location the unit is declared at
    pub dst_location: String,
    pub rpc_url: Url,
    pub token: SecretString,
}

impl RelocationConfig {
    /// Build from the four optional settings, which must be all set or all
    /// unset
    pub fn from_parts(
        src_location: Option<String>,
        dst_location: Option<String>,
        rpc: Option<String>,
        token: Option<String>,
    ) -> Result<Option<Self>, MigrateError> {
        match (src_location, dst_location, rpc, token) {
            (None, None, None, None) => Ok(None),
            (Some(src_location), Some(dst_location), Some(rpc), Some(token)) => {
                let rpc_url = Url::parse(&rpc).map_err(|e| {
                    MigrateError::Config(format!("invalid RPC endpoint {:?}: {}", rpc, e))
                })?;
                Ok(Some(Self {
                    src_location,
                    dst_location,
                    rpc_url,
                    token: SecretString::from(token),
                }))
            }
            _ => Err(MigrateError::Config(
                "relocation needs all of --src-uuid, --dst-uuid, --rpc and --token".to_string(),
            )),
        }
    }
}

/// Everything one invocation needs
#[derive(Debug)]
pub struct MigrateConfig {
    pub source: SourceConfig,
    pub destination: EndpointConfig,
    pub relocation: Option<RelocationConfig>,
    pub run: RunOptions,
}

impl MigrateConfig {
    pub fn validate(&self) -> Result<(), MigrateError> {
        self.run.validate(self.source.kind())
    }
}
