// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Storage relocation notifications
//!
//! Sealed sector files are named `s-<owner address>-<number>`. After such a
//! file has been copied, the node-management service is told to declare the
//! sector at the destination storage location and then to drop it from the
//! source location. The two calls are strictly ordered: if the declare
//! fails, the drop is never sent, so the worst case is a sector registered
//! in both places.

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

#[allow(clippy::expect_used)]
mod pattern {
    use super::Regex;
    use lazy_static::lazy_static;

    lazy_static! {
        /// `<anything>s-<address>-<number>`
        pub static ref STORAGE_UNIT: Regex =
            Regex::new(r".*s-([tf]\d+)-(\d+)").expect("valid storage unit pattern");
    }
}

/// Errors from identity parsing and the notification RPC
#[derive(Debug, Error)]
pub enum RelocationError {
    #[error("key {0:?} does not name a storage unit")]
    InvalidKey(String),

    #[error("invalid owner address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("invalid sequence number {0:?}")]
    InvalidNumber(String),

    #[error("RPC request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC {method} returned HTTP {status}")]
    Status { method: &'static str, status: u16 },

    #[error("RPC {method} returned error {code}: {message}")]
    Rpc {
        method: &'static str,
        code: i64,
        message: String,
    },
}

impl RelocationError {
    /// True when the key simply isn't a storage unit, as opposed to an RPC
    /// failure
    pub fn is_identity(&self) -> bool {
        matches!(
            self,
            RelocationError::InvalidKey(_)
                | RelocationError::InvalidAddress { .. }
                | RelocationError::InvalidNumber(_)
        )
    }
}

/// Owner and sequence number of one sealed storage unit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StorageUnit {
    /// Numeric actor id of the owner
    pub owner: u64,
    /// Sequence number within the owner
    pub number: u64,
}

impl StorageUnit {
    /// Derive the identity embedded in an object key
    pub fn from_key(key: &str) -> Result<Self, RelocationError> {
        let caps = pattern::STORAGE_UNIT
            .captures(key)
            .ok_or_else(|| RelocationError::InvalidKey(key.to_string()))?;

        let (address, number) = match (caps.get(1), caps.get(2)) {
            (Some(a), Some(n)) => (a.as_str(), n.as_str()),
            _ => return Err(RelocationError::InvalidKey(key.to_string())),
        };

        let owner = resolve_id_address(address)?;
        let number = number
            .parse::<u64>()
            .map_err(|_| RelocationError::InvalidNumber(number.to_string()))?;

        Ok(Self { owner, number })
    }
}

/// Resolve an ID address such as `t01000` to its numeric id
///
/// An address is a network letter (`t` testnet, `f` mainnet), a protocol
/// digit, then the payload. Only protocol `0` (ID addresses) carries a
/// numeric id directly.
pub fn resolve_id_address(address: &str) -> Result<u64, RelocationError> {
    let invalid = |reason: &str| RelocationError::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    };

    let mut chars = address.chars();
    match chars.next() {
        Some('t') | Some('f') => {}
        _ => return Err(invalid("unknown network")),
    }
    match chars.next() {
        Some('0') => {}
        Some(_) => return Err(invalid("not an ID address")),
        None => return Err(invalid("missing protocol")),
    }

    let payload = chars.as_str();
    if payload.is_empty() || !payload.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("payload is not a decimal id"));
    }
    payload
        .parse::<u64>()
        .map_err(|_| invalid("id does not fit in 64 bits"))
}

/// The two calls of the node-management protocol
#[async_trait]
pub trait RelocationNotifier: Send + Sync {
    /// Register `unit` under storage location `location`
    async fn declare(&self, location: &str, unit: &StorageUnit) -> Result<(), RelocationError>;

    /// Deregister `unit` from storage location `location`
    async fn drop_unit(&self, location: &str, unit: &StorageUnit) -> Result<(), RelocationError>;
}

/// Declare at `to`, then drop from `from`
///
/// The drop is only attempted once the declare has succeeded.
pub async fn relocate(
    notifier: &dyn RelocationNotifier,
    from: &str,
    to: &str,
    unit: &StorageUnit,
) -> Result<(), RelocationError> {
    notifier.declare(to, unit).await?;
    info!(
        owner = unit.owner,
        number = unit.number,
        location = %to,
        "Declared storage unit"
    );

    if let Err(e) = notifier.drop_unit(from, unit).await {
        // Left declared in both locations; an operator has to drop it.
        error!(
            owner = unit.owner,
            number = unit.number,
            declared_at = %to,
            still_at = %from,
            error = %e,
            "Storage unit declared but not dropped"
        );
        return Err(e);
    }
    info!(
        owner = unit.owner,
        number = unit.number,
        location = %from,
        "Dropped storage unit"
    );

    Ok(())
}

const DECLARE_METHOD: &str = "Filecoin.StorageDeclareSector";
const DROP_METHOD: &str = "Filecoin.StorageDropSector";

#[derive(Debug, Deserialize)]
struct RpcReply {
    #[serde(default)]
    error: Option<RpcFault>,
}

#[derive(Debug, Deserialize)]
struct RpcFault {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// JSON-RPC 2.0 client for the node-management endpoint
pub struct JsonRpcNotifier {
    client: Client,
    endpoint: Url,
    token: SecretString,
}

impl JsonRpcNotifier {
    pub fn new(client: Client, endpoint: Url, token: SecretString) -> Self {
        Self {
            client,
            endpoint,
            token,
        }
    }

    async fn call(
        &self,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<(), RelocationError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.token.expose_secret())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RelocationError::Status {
                method,
                status: status.as_u16(),
            });
        }

        // Nodes answer 200 even for application errors.
        let body = response.text().await?;
        if let Ok(RpcReply {
            error: Some(fault),
        }) = serde_json::from_str::<RpcReply>(&body)
        {
            return Err(RelocationError::Rpc {
                method,
                code: fault.code,
                message: fault.message,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl RelocationNotifier for JsonRpcNotifier {
    async fn declare(&self, location: &str, unit: &StorageUnit) -> Result<(), RelocationError> {
        self.call(
            DECLARE_METHOD,
            json!([location, { "Miner": unit.owner, "Number": unit.number }, 1, true]),
        )
        .await
    }

    async fn drop_unit(&self, location: &str, unit: &StorageUnit) -> Result<(), RelocationError> {
        self.call(
            DROP_METHOD,
            json!([location, { "Miner": unit.owner, "Number": unit.number }, 1]),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier(server: &MockServer) -> JsonRpcNotifier {
        JsonRpcNotifier::new(
            crate::http::build_client(None).unwrap(),
            Url::parse(&server.uri()).unwrap(),
            SecretString::from("sekrit".to_string()),
        )
    }

    #[test]
    fn parses_storage_unit_from_key() {
        assert_eq!(
            StorageUnit::from_key("sealed/s-t01000-42").unwrap(),
            StorageUnit {
                owner: 1000,
                number: 42
            }
        );
        assert_eq!(
            StorageUnit::from_key("cache/deep/s-f0123-7").unwrap(),
            StorageUnit { owner: 123, number: 7 }
        );
    }

    #[test]
    fn rejects_keys_without_identity() {
        let err = StorageUnit::from_key("sealed/readme.txt").unwrap_err();
        assert!(err.is_identity());
        assert!(matches!(err, RelocationError::InvalidKey(_)));

        // Secp256k1-style address: right shape, wrong protocol.
        let err = StorageUnit::from_key("sealed/s-t1234-5").unwrap_err();
        assert!(matches!(err, RelocationError::InvalidAddress { .. }));
    }

    #[test]
    fn id_address_rule() {
        assert_eq!(resolve_id_address("t01000").unwrap(), 1000);
        assert_eq!(resolve_id_address("f00").unwrap(), 0);
        assert!(resolve_id_address("t0").is_err());
        assert!(resolve_id_address("x01000").is_err());
        assert!(resolve_id_address("t2abc").is_err());
        assert!(resolve_id_address("t099999999999999999999999").is_err());
    }

    #[tokio::test]
    async fn declare_sends_json_rpc_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer sekrit"))
            .and(body_partial_json(json!({
                "jsonrpc": "2.0",
                "method": "Filecoin.StorageDeclareSector",
                "params": ["dst-uuid", {"Miner": 1000, "Number": 42}, 1, true],
                "id": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let unit = StorageUnit {
            owner: 1000,
            number: 42,
        };
        notifier(&server).declare("dst-uuid", &unit).await.unwrap();
    }

    #[tokio::test]
    async fn non_200_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let unit = StorageUnit { owner: 1, number: 1 };
        let err = notifier(&server).drop_unit("src", &unit).await.unwrap_err();
        assert!(matches!(err, RelocationError::Status { status: 401, .. }));
        assert!(!err.is_identity());
    }

    #[tokio::test]
    async fn rpc_error_member_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": 1, "message": "sector not found"}
            })))
            .mount(&server)
            .await;

        let unit = StorageUnit { owner: 1, number: 1 };
        let err = notifier(&server).drop_unit("src", &unit).await.unwrap_err();
        match err {
            RelocationError::Rpc { code, message, .. } => {
                assert_eq!(code, 1);
                assert_eq!(message, "sector not found");
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
