// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events API payloads.

use serde::Deserialize;

/// Outer webhook envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        team_id: String,
        #[serde(default)]
        event_id: Option<String>,
        event: SlackEvent,
    },
    AppRateLimited {
        #[serde(default)]
        team_id: Option<String>,
        #[serde(default)]
        minute_rate_limited: Option<i64>,
    },
    #[serde(other)]
    Unknown,
}

/// Inner event of an `event_callback`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    AppMention {
        user: String,
        channel: String,
        #[serde(default)]
        text: String,
        ts: String,
        #[serde(default)]
        thread_ts: Option<String>,
        #[serde(default)]
        bot_id: Option<String>,
    },
    Message {
        #[serde(default)]
        user: Option<String>,
        channel: String,
        #[serde(default)]
        text: Option<String>,
        ts: String,
        #[serde(default)]
        thread_ts: Option<String>,
        #[serde(default)]
        channel_type: Option<String>,
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        bot_id: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    AppMention,
    DirectMessage,
}

/// A user message the backend should answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub kind: InboundKind,
    pub user: String,
    pub channel: String,
    pub ts: String,
    pub thread_ts: Option<String>,
    pub text: String,
}

impl InboundEvent {
    pub fn is_dm(&self) -> bool {
        self.kind == InboundKind::DirectMessage
    }

    /// Timestamp of the thread this message belongs to; a top-level message
    /// starts its own thread.
    pub fn thread_root(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }
}

pub fn parse_envelope(body: &[u8]) -> Result<Envelope, serde_json::Error> {
    serde_json::from_slice(body)
}

/// Pick out mentions and direct messages. Bot traffic, edits and other
/// message subtypes, and plain channel chatter yield `None`.
pub fn classify(event: &SlackEvent) -> Option<InboundEvent> {
    match event {
        SlackEvent::AppMention {
            user,
            channel,
            text,
            ts,
            thread_ts,
            bot_id,
        } => {
            if bot_id.is_some() {
                return None;
            }
            Some(InboundEvent {
                kind: InboundKind::AppMention,
                user: user.clone(),
                channel: channel.clone(),
                ts: ts.clone(),
                thread_ts: thread_ts.clone(),
                text: text.clone(),
            })
        }
        SlackEvent::Message {
            user: Some(user),
            channel,
            text,
            ts,
            thread_ts,
            channel_type: Some(channel_type),
            subtype: None,
            bot_id: None,
        } if channel_type == "im" => Some(InboundEvent {
            kind: InboundKind::DirectMessage,
            user: user.clone(),
            channel: channel.clone(),
            ts: ts.clone(),
            thread_ts: thread_ts.clone(),
            text: text.clone().unwrap_or_default(),
        }),
        _ => None,
    }
}
