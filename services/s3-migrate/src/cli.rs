// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Command line surface
//!
//! Every flag can also be set through the upper-snake environment variable
//! of the same name (`--dst-endpoint` / `DST_ENDPOINT`).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use s3_store::endpoint::DEFAULT_REGION;
use bytesize::ByteSize;
use s3_store::tuning::DEFAULT_NUM_THREADS;
use s3_store::{BucketLookup, EndpointConfig, TransferTuning};
use secrecy::SecretString;

use crate::config::{
    DEFAULT_CONCURRENCY, Discovery, MigrateConfig, RelocationConfig, RunOptions, SourceConfig,
    WatchConfig,
};

#[derive(Parser, Debug)]
#[command(name = "s3-migrate")]
#[command(about = "Copy objects into an S3-compatible bucket", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Copy objects from one bucket to another
    Migrate(MigrateArgs),
    /// Upload local files to a bucket
    Upload(UploadArgs),
    /// Download a list of URLs into a bucket
    Download(DownloadArgs),
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Source endpoint, e.g. http://10.0.0.1:9000
    #[arg(long, env = "SRC_ENDPOINT")]
    pub src_endpoint: String,

    #[arg(long, env = "SRC_ACCESS_KEY")]
    pub src_access_key: String,

    #[arg(long, env = "SRC_SECRET_KEY", hide_env_values = true)]
    pub src_secret_key: String,

    #[arg(long, env = "SRC_BUCKET")]
    pub src_bucket: String,

    #[arg(long, env = "SRC_REGION", default_value = DEFAULT_REGION)]
    pub src_region: String,

    /// Only migrate keys starting with this prefix
    #[arg(long, env = "SRC_PREFIX", default_value = "")]
    pub src_prefix: String,

    #[arg(long, env = "SRC_BUCKET_LOOKUP", default_value_t = BucketLookup::Auto)]
    pub src_bucket_lookup: BucketLookup,

    /// Read keys from this file instead of listing the source bucket
    #[arg(long, env = "FILELIST")]
    pub filelist: Option<PathBuf>,

    /// Keep re-listing the source
    #[arg(long, env = "WATCH")]
    pub watch: bool,

    /// Delete source objects after they are copied
    #[arg(long, env = "REMOVE")]
    pub remove: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Directory to walk for files
    #[arg(long, env = "DIR", required_unless_present = "filelist", conflicts_with = "filelist")]
    pub dir: Option<PathBuf>,

    /// Read file paths from this file
    #[arg(long, env = "FILELIST")]
    pub filelist: Option<PathBuf>,

    /// Keep re-walking the directory
    #[arg(long, env = "WATCH")]
    pub watch: bool,

    /// Delete local files after they are uploaded
    #[arg(long, env = "REMOVE")]
    pub remove: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// File with one URL per line
    #[arg(long, env = "FILELIST")]
    pub filelist: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Flags shared by every command
#[derive(Args, Debug)]
pub struct CommonArgs {
    #[command(flatten)]
    pub destination: DestinationArgs,

    #[command(flatten)]
    pub tuning: TuningArgs,

    /// Maximum number of concurrent transfers
    #[arg(long, env = "CONCURRENT", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrent: usize,

    /// Seconds between listings in watch mode
    #[arg(long, env = "RESCAN_INTERVAL_SECS", default_value_t = 3600)]
    pub rescan_interval_secs: u64,

    /// Hours a dispatched key is not re-dispatched in watch mode
    #[arg(long, env = "RETENTION_HOURS", default_value_t = 48)]
    pub retention_hours: u64,

    /// Bound on every step except the upload itself
    #[arg(long, env = "STEP_TIMEOUT_SECS")]
    pub step_timeout_secs: Option<u64>,

    /// Write Prometheus metrics to this file when the run ends
    #[arg(long, env = "METRICS_FILE")]
    pub metrics_file: Option<PathBuf>,

    #[command(flatten)]
    pub relocation: RelocationArgs,
}

#[derive(Args, Debug)]
pub struct DestinationArgs {
    /// Destination endpoint, e.g. https://s3.example.com
    #[arg(long, env = "DST_ENDPOINT")]
    pub dst_endpoint: String,

    #[arg(long, env = "DST_ACCESS_KEY")]
    pub dst_access_key: String,

    #[arg(long, env = "DST_SECRET_KEY", hide_env_values = true)]
    pub dst_secret_key: String,

    #[arg(long, env = "DST_BUCKET")]
    pub dst_bucket: String,

    #[arg(long, env = "DST_REGION", default_value = DEFAULT_REGION)]
    pub dst_region: String,

    /// Prefix prepended to every destination key
    #[arg(long, env = "DST_PREFIX", default_value = "")]
    pub dst_prefix: String,

    /// Bucket addressing: auto, path or dns
    #[arg(long, env = "DST_BUCKET_LOOKUP", default_value_t = BucketLookup::Auto)]
    pub dst_bucket_lookup: BucketLookup,
}

#[derive(Args, Debug)]
pub struct TuningArgs {
    /// Multipart part size, e.g. 16MiB
    #[arg(long, env = "PART_SIZE", default_value = "16MiB")]
    pub part_size: ByteSize,

    /// Parts uploaded in parallel when --enable-mem-cache is set
    #[arg(long, env = "NUM_THREADS", default_value_t = DEFAULT_NUM_THREADS)]
    pub num_threads: u32,

    /// Buffer several parts in memory and upload them concurrently
    #[arg(long, env = "ENABLE_MEM_CACHE")]
    pub enable_mem_cache: bool,

    /// Upload objects that fit in one part with a single request
    #[arg(long, env = "DISABLE_MULTIPART", default_value_t = true, action = ArgAction::Set)]
    pub disable_multipart: bool,

    /// Sign requests without hashing the body
    #[arg(long, env = "DISABLE_CONTENT_SHA256", default_value_t = true, action = ArgAction::Set)]
    pub disable_content_sha256: bool,
}

#[derive(Args, Debug)]
pub struct RelocationArgs {
    /// Storage location to drop relocated units from
    #[arg(long, env = "SRC_UUID")]
    pub src_uuid: Option<String>,

    /// Storage location to declare relocated units at
    #[arg(long, env = "DST_UUID")]
    pub dst_uuid: Option<String>,

    /// Node-management JSON-RPC endpoint
    #[arg(long, env = "RPC")]
    pub rpc: Option<String>,

    /// Bearer token for --rpc
    #[arg(long, env = "TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// A validated configuration plus the options only the binary cares about
#[derive(Debug)]
pub struct Invocation {
    pub config: MigrateConfig,
    pub metrics_file: Option<PathBuf>,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Migrate(_) => "migrate",
            Command::Upload(_) => "upload",
            Command::Download(_) => "download",
        }
    }

    /// Turn parsed flags into a validated configuration
    pub fn into_invocation(self) -> Result<Invocation> {
        let (source, discovery, watch, remove, common) = match self {
            Command::Migrate(args) => {
                let endpoint = EndpointConfig {
                    url: EndpointConfig::parse_url(&args.src_endpoint)
                        .context("invalid --src-endpoint")?,
                    access_key: args.src_access_key,
                    secret_key: SecretString::from(args.src_secret_key),
                    region: args.src_region,
                    bucket: args.src_bucket,
                    bucket_lookup: args.src_bucket_lookup,
                };
                let discovery = match args.filelist {
                    Some(path) => Discovery::StaticList(path),
                    None => Discovery::Listing {
                        prefix: args.src_prefix,
                    },
                };
                (
                    SourceConfig::Bucket(endpoint),
                    discovery,
                    args.watch,
                    args.remove,
                    args.common,
                )
            }
            Command::Upload(args) => {
                let discovery = match (args.dir, args.filelist) {
                    (Some(dir), None) => Discovery::Listing {
                        prefix: dir.to_string_lossy().into_owned(),
                    },
                    (None, Some(path)) => Discovery::StaticList(path),
                    _ => anyhow::bail!("upload needs exactly one of --dir or --filelist"),
                };
                (
                    SourceConfig::Local,
                    discovery,
                    args.watch,
                    args.remove,
                    args.common,
                )
            }
            Command::Download(args) => (
                SourceConfig::Http,
                Discovery::StaticList(args.filelist),
                false,
                false,
                args.common,
            ),
        };

        let relocation = RelocationConfig::from_parts(
            common.relocation.src_uuid,
            common.relocation.dst_uuid,
            common.relocation.rpc,
            common.relocation.token,
        )?;

        let dst = common.destination;
        let destination = EndpointConfig {
            url: EndpointConfig::parse_url(&dst.dst_endpoint).context("invalid --dst-endpoint")?,
            access_key: dst.dst_access_key,
            secret_key: SecretString::from(dst.dst_secret_key),
            region: dst.dst_region,
            bucket: dst.dst_bucket,
            bucket_lookup: dst.dst_bucket_lookup,
        };

        let retention_secs = common
            .retention_hours
            .checked_mul(60 * 60)
            .with_context(|| format!("--retention-hours {} is too large", common.retention_hours))?;

        let tuning = TransferTuning {
            part_size: common.tuning.part_size.as_u64(),
            num_threads: common.tuning.num_threads,
            concurrent_stream_parts: common.tuning.enable_mem_cache,
            disable_multipart: common.tuning.disable_multipart,
            disable_content_hash: common.tuning.disable_content_sha256,
        };

        let run = RunOptions {
            discovery,
            watch: watch.then(|| WatchConfig {
                rescan_interval: Duration::from_secs(common.rescan_interval_secs),
                retention: Duration::from_secs(retention_secs),
            }),
            dst_prefix: dst.dst_prefix,
            tuning,
            concurrency: common.concurrent,
            remove_source: remove,
            step_timeout: common.step_timeout_secs.map(Duration::from_secs),
        };

        let config = MigrateConfig {
            source,
            destination,
            relocation,
            run,
        };
        config.validate()?;

        Ok(Invocation {
            config,
            metrics_file: common.metrics_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    const DST: &[&str] = &[
        "--dst-endpoint",
        "http://127.0.0.1:9000",
        "--dst-access-key",
        "ak",
        "--dst-secret-key",
        "sk",
        "--dst-bucket",
        "sealed",
    ];

    fn parse(args: &[&str]) -> Result<Invocation> {
        let argv = std::iter::once("s3-migrate")
            .chain(args.iter().copied())
            .chain(DST.iter().copied());
        Cli::try_parse_from(argv)?.command.into_invocation()
    }

    #[test]
    fn download_defaults() {
        let inv = parse(&["download", "--filelist", "urls.txt"]).unwrap();
        let run = &inv.config.run;

        assert!(matches!(inv.config.source, SourceConfig::Http));
        assert_eq!(run.discovery, Discovery::StaticList(PathBuf::from("urls.txt")));
        assert_eq!(run.concurrency, 10);
        assert_eq!(run.tuning, TransferTuning::default());
        assert_eq!(run.watch, None);
        assert!(!run.remove_source);
        assert!(inv.config.relocation.is_none());
        assert_eq!(inv.config.destination.bucket, "sealed");
        assert_eq!(inv.config.destination.region, "us-east-1");
    }

    #[test]
    fn migrate_with_listing_and_watch() {
        let inv = parse(&[
            "migrate",
            "--src-endpoint",
            "http://10.0.0.1:9000",
            "--src-access-key",
            "a",
            "--src-secret-key",
            "s",
            "--src-bucket",
            "sectors",
            "--src-prefix",
            "sealed/",
            "--watch",
            "--remove",
            "--rescan-interval-secs",
            "60",
            "--retention-hours",
            "1",
            "--part-size",
            "32MiB",
            "--disable-multipart",
            "false",
            "--enable-mem-cache",
            "--concurrent",
            "3",
        ])
        .unwrap();
        let run = &inv.config.run;

        assert_eq!(
            run.discovery,
            Discovery::Listing {
                prefix: "sealed/".to_string()
            }
        );
        assert_eq!(
            run.watch,
            Some(WatchConfig {
                rescan_interval: Duration::from_secs(60),
                retention: Duration::from_secs(3600),
            })
        );
        assert!(run.remove_source);
        assert_eq!(run.concurrency, 3);
        assert_eq!(run.tuning.part_size, 32 * 1024 * 1024);
        assert!(!run.tuning.disable_multipart);
        assert!(run.tuning.concurrent_stream_parts);
        match &inv.config.source {
            SourceConfig::Bucket(endpoint) => assert_eq!(endpoint.bucket, "sectors"),
            other => panic!("unexpected source: {:?}", other),
        }
    }

    #[test]
    fn upload_needs_dir_or_filelist() {
        assert!(parse(&["upload"]).is_err());
        assert!(parse(&["upload", "--dir", "/data", "--filelist", "f.txt"]).is_err());

        let inv = parse(&["upload", "--dir", "/data/sealed"]).unwrap();
        assert_eq!(
            inv.config.run.discovery,
            Discovery::Listing {
                prefix: "/data/sealed".to_string()
            }
        );
    }

    #[test]
    fn partial_relocation_flags_are_rejected() {
        let err = parse(&["download", "--filelist", "u.txt", "--src-uuid", "a"]).unwrap_err();
        assert!(err.to_string().contains("relocation needs all of"));

        let inv = parse(&[
            "download",
            "--filelist",
            "u.txt",
            "--src-uuid",
            "a",
            "--dst-uuid",
            "b",
            "--rpc",
            "http://127.0.0.1:2345/rpc/v0",
            "--token",
            "t",
        ])
        .unwrap();
        let reloc = inv.config.relocation.unwrap();
        assert_eq!(reloc.dst_location, "b");
    }

    #[test]
    fn bad_endpoint_is_a_config_error() {
        let argv = [
            "s3-migrate",
            "download",
            "--filelist",
            "u.txt",
            "--dst-endpoint",
            "s3.example.com",
            "--dst-access-key",
            "ak",
            "--dst-secret-key",
            "sk",
            "--dst-bucket",
            "b",
        ];
        let err = Cli::try_parse_from(argv)
            .unwrap()
            .command
            .into_invocation()
            .unwrap_err();
        assert!(format!("{:#}", err).contains("invalid --dst-endpoint"));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        assert!(parse(&["download", "--filelist", "u.txt", "--concurrent", "0"]).is_err());
    }

    #[test]
    fn part_size_accepts_human_units() {
        let inv = parse(&["download", "--filelist", "u.txt", "--part-size", "64MiB"]).unwrap();
        assert_eq!(inv.config.run.tuning.part_size, 64 * 1024 * 1024);

        let inv = parse(&["download", "--filelist", "u.txt", "--part-size", "6000000"]).unwrap();
        assert_eq!(inv.config.run.tuning.part_size, 6_000_000);

        assert!(parse(&["download", "--filelist", "u.txt", "--part-size", "lots"]).is_err());
    }

    #[test]
    fn part_size_below_s3_minimum_is_rejected() {
        assert!(parse(&["download", "--filelist", "u.txt", "--part-size", "1MiB"]).is_err());
    }

    #[test]
    fn oversized_retention_is_a_config_error() {
        let err = parse(&[
            "download",
            "--filelist",
            "u.txt",
            "--retention-hours",
            "18446744073709551615",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("--retention-hours"), "{:#}", err);
    }
}
