// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for CRUD operations on storage entities.

pub mod api_tokens;
pub mod chats;
pub mod data_sources;
pub mod integrations;
pub mod messages;
pub mod organizations;
pub mod slack_messages;
pub mod tasks;
pub mod users;
