// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! HTTP client construction

use std::time::Duration;

use reqwest::Client;
use rustls::crypto::CryptoProvider;

/// Connect timeout for every outbound HTTP client
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Install the ring rustls provider as the process default
///
/// reqwest is built without a provider, so this must run before the first
/// client is created. Calling it again is harmless.
pub fn install_crypto_provider() {
    // Err only means a provider is already installed.
    let _ = CryptoProvider::install_default(rustls::crypto::ring::default_provider());
}

/// Build a client with an optional whole-request timeout
///
/// Downloads pass `None`: a large body can legitimately take longer than
/// any fixed bound, and per-step timeouts are applied by the caller.
pub fn build_client(request_timeout: Option<Duration>) -> Result<Client, reqwest::Error> {
    install_crypto_provider();

    let mut builder = Client::builder().connect_timeout(CONNECT_TIMEOUT);
    if let Some(timeout) = request_timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}
