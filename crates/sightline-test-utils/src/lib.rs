// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Sightline integration tests.
//!
//! Provides mock collaborators and a harness for fast, deterministic tests
//! without Slack, an LLM gateway, or a real passphrase prompt.
//!
//! # Components
//!
//! - [`MockSlackApi`] - records Slack calls, scripted failures
//! - [`ScriptedGenerator`] / [`ScriptedAgent`] - FIFO LLM responses
//! - [`TestHarness`] - temp database, unlocked vault, seeded organization

pub mod harness;
pub mod mock_llm;
pub mod mock_slack;

pub use harness::{TEST_SIGNING_SECRET, TestHarness, fast_vault_config};
pub use mock_llm::{ScriptedAgent, ScriptedGenerator};
pub use mock_slack::{
    MockSlackApi, SlackCall, TEST_BOT_TOKEN, TEST_INSTALLER_ID, TEST_TEAM_ID,
    default_oauth_access, slack_user,
};
