// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OAuth v2 install URL and CSRF state.

use rand::RngCore;

/// 32 random bytes, hex encoded.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Build the Slack install URL a browser is sent to.
pub fn authorize_url(
    base: &str,
    client_id: &str,
    scopes: &[String],
    redirect_uri: &str,
    state: &str,
) -> String {
    format!(
        "{base}?client_id={}&scope={}&redirect_uri={}&state={}",
        urlencoding::encode(client_id),
        urlencoding::encode(&scopes.join(",")),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(state),
    )
}
