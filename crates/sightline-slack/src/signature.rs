// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook request signing.
//!
//! Slack signs `v0:{timestamp}:{raw body}` with HMAC-SHA256 under the app's
//! signing secret and sends `v0=<hex>` in `X-Slack-Signature`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Why a request failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureError {
    MissingHeaders,
    BadTimestamp,
    Stale,
    Malformed,
    Mismatch,
}

impl std::fmt::Display for SignatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SignatureError::MissingHeaders => "missing signature headers",
            SignatureError::BadTimestamp => "invalid request timestamp",
            SignatureError::Stale => "request timestamp outside tolerance",
            SignatureError::Malformed => "malformed signature",
            SignatureError::Mismatch => "signature mismatch",
        };
        f.write_str(text)
    }
}

impl std::error::Error for SignatureError {}

/// Compute the `v0=` signature for a request.
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
    let digest = mac(secret, timestamp, body)?.finalize().into_bytes();
    Ok(format!("v0={}", hex::encode(digest)))
}

fn mac(secret: &str, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::Malformed)?;
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(mac)
}

/// Verify a webhook request in constant time.
///
/// `now` is the current unix time; requests whose timestamp is more than
/// `tolerance_secs` away are rejected to block replays.
pub fn verify_signature(
    secret: &str,
    timestamp: Option<&str>,
    body: &[u8],
    signature: Option<&str>,
    now: i64,
    tolerance_secs: u64,
) -> Result<(), SignatureError> {
    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        return Err(SignatureError::MissingHeaders);
    };

    let sent_at: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::BadTimestamp)?;
    if now.abs_diff(sent_at) > tolerance_secs {
        debug!(sent_at, now, "stale webhook timestamp");
        return Err(SignatureError::Stale);
    }

    let provided = signature
        .strip_prefix("v0=")
        .and_then(|hex_sig| hex::decode(hex_sig).ok())
        .ok_or(SignatureError::Malformed)?;

    mac(secret, timestamp, body)?
        .verify_slice(&provided)
        .map_err(|_| SignatureError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const BODY: &[u8] = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&team_domain=testteamnow&channel_id=G8PSS9T3V&channel_name=foobar&user_id=U2CERLKJA&user_name=roadrunner&command=%2Fwebhook-collect&text=&response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2FT1DC2JH3J%2F397700885554%2F96rGlfmibIGlgcZRskXaIFfN&trigger_id=398738663015.47445629121.803a0bc887a14d10d2c447fce8b6703c";

    #[test]
    fn matches_slack_documented_example() {
        let signature = sign(SECRET, "1531420618", BODY).unwrap();
        assert_eq!(
            signature,
            "v0=a2114d57b48eac39b9ad189dd8316235a7b4a8d21a10bd27519666489c69b503"
        );
        assert_eq!(
            verify_signature(SECRET, Some("1531420618"), BODY, Some(&signature), 1531420618, 300),
            Ok(())
        );
    }

    #[test]
    fn rejects_tampered_body_and_wrong_secret() {
        let signature = sign(SECRET, "100", BODY).unwrap();
        assert_eq!(
            verify_signature(SECRET, Some("100"), b"other", Some(&signature), 100, 300),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_signature("nope", Some("100"), BODY, Some(&signature), 100, 300),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_and_malformed_requests() {
        let signature = sign(SECRET, "100", BODY).unwrap();
        assert_eq!(
            verify_signature(SECRET, Some("100"), BODY, Some(&signature), 100 + 301, 300),
            Err(SignatureError::Stale)
        );
        assert_eq!(
            verify_signature(SECRET, Some("abc"), BODY, Some(&signature), 100, 300),
            Err(SignatureError::BadTimestamp)
        );
        assert_eq!(
            verify_signature(SECRET, Some("100"), BODY, Some("v1=zz"), 100, 300),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(SECRET, None, BODY, Some(&signature), 100, 300),
            Err(SignatureError::MissingHeaders)
        );
    }
}
