// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Endpoint configuration

use std::fmt;
use std::str::FromStr;

use secrecy::SecretString;
use url::Url;

use crate::error::{StoreError, StoreResult};

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// How bucket names are addressed in request URLs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BucketLookup {
    /// Let the client decide; resolves to path style
    #[default]
    Auto,
    /// `scheme://host/bucket/key`
    Path,
    /// `scheme://bucket.host/key`
    Dns,
}

impl fmt::Display for BucketLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BucketLookup::Auto => "auto",
            BucketLookup::Path => "path",
            BucketLookup::Dns => "dns",
        };
        f.write_str(s)
    }
}

impl FromStr for BucketLookup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(BucketLookup::Auto),
            "path" => Ok(BucketLookup::Path),
            "dns" => Ok(BucketLookup::Dns),
            other => Err(format!(
                "invalid bucket lookup {:?}, must be one of: dns, path, auto",
                other
            )),
        }
    }
}

/// Everything needed to reach one bucket
///
/// Built once at startup and shared read-only by every worker.
#[derive(Debug)]
pub struct EndpointConfig {
    /// `scheme://host[:port]`
    pub url: Url,
    pub access_key: String,
    pub secret_key: SecretString,
    pub region: String,
    pub bucket: String,
    pub bucket_lookup: BucketLookup,
}

impl EndpointConfig {
    /// Parse and validate an endpoint URL
    ///
    /// Only `http` and `https` are accepted and a host is required.
    pub fn parse_url(endpoint: &str) -> StoreResult<Url> {
        let url = Url::parse(endpoint)
            .map_err(|e| StoreError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(StoreError::InvalidEndpoint(format!(
                "{}: scheme must be http or https",
                endpoint
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(StoreError::InvalidEndpoint(format!(
                "{}: missing host",
                endpoint
            )));
        }
        Ok(url)
    }

    /// True when requests go over plain HTTP
    pub fn allow_http(&self) -> bool {
        self.url.scheme() == "http"
    }

    /// Base URL handed to the S3 client
    ///
    /// With DNS bucket lookup the bucket becomes a subdomain of the host, the
    /// form virtual-hosted-style clients expect.
    pub fn endpoint_url(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        let port = self
            .url
            .port()
            .map(|p| format!(":{}", p))
            .unwrap_or_default();

        match self.bucket_lookup {
            BucketLookup::Dns => format!("{}://{}.{}{}", self.url.scheme(), self.bucket, host, port),
            BucketLookup::Auto | BucketLookup::Path => {
                format!("{}://{}{}", self.url.scheme(), host, port)
            }
        }
    }
}
