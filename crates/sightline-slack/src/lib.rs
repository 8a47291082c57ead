// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack plumbing for Sightline.
//!
//! A `reqwest` client for the Web API methods the backend calls, OAuth v2
//! install URL construction, webhook signature verification, and typed
//! Events API payloads.

pub mod client;
pub mod events;
pub mod oauth;
pub mod scopes;
pub mod signature;

pub use client::SlackClient;
pub use events::{Envelope, InboundEvent, InboundKind, SlackEvent, classify, parse_envelope};
pub use oauth::{authorize_url, generate_state};
pub use scopes::{has_required_scopes, missing_scopes, parse_scopes};
pub use signature::{SIGNATURE_HEADER, SignatureError, TIMESTAMP_HEADER, sign, verify_signature};
