// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Sightline backend.
//!
//! Provides the error type, domain types, the LLM message model, and the
//! collaborator traits every other crate builds on.

pub mod error;
pub mod messages;
pub mod traits;
pub mod types;

pub use error::{ErrorCode, SightlineError};
pub use messages::{ChatMessage, ContentPart, Role};
pub use traits::{
    Adapter, AgentModel, SecretStore, SlackApi, TextGenerator, ValueSearch,
};
pub use types::HealthStatus;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sightline_error_variants_construct() {
        let _config = SightlineError::Config("test".into());
        let _storage = SightlineError::storage(std::io::Error::other("test"));
        let _vault = SightlineError::Vault("locked".into());
        let _slack = SightlineError::slack("invalid_auth");
        let _provider = SightlineError::provider("boom");
        let _api = SightlineError::api(ErrorCode::InvalidRequest, "bad");
        let _timeout = SightlineError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = SightlineError::Internal("test".into());
    }

    #[test]
    fn collaborator_traits_are_object_safe() {
        fn _secret(_: &dyn SecretStore) {}
        fn _slack(_: &dyn SlackApi) {}
        fn _generator(_: &dyn TextGenerator) {}
        fn _agent(_: &dyn AgentModel) {}
        fn _search(_: &dyn ValueSearch) {}
    }
}
