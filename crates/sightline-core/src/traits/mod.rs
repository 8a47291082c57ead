// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! Every external system the services talk to (secret store, Slack, the LLM
//! gateway, value search) sits behind one of these traits. All of them use
//! `#[async_trait]` so they can be held as `Arc<dyn Trait>`.

pub mod adapter;
pub mod llm;
pub mod search;
pub mod secret;
pub mod slack;

pub use adapter::Adapter;
pub use llm::{AgentModel, AgentRequest, ObjectRequest, TextGenerator, ToolSpec};
pub use search::{StoredValue, ValueSearch};
pub use secret::{SecretRecord, SecretStore};
pub use slack::{OAuthAccess, PostMessage, SlackApi, SlackChannel, SlackUser};
