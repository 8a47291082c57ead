// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait shared by external collaborators.

use async_trait::async_trait;

use crate::error::SightlineError;
use crate::types::HealthStatus;

/// Identity and health reporting for an external collaborator.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Human-readable name used in logs and health output.
    fn name(&self) -> &str;

    /// Reports the collaborator's current status.
    async fn health_check(&self) -> Result<HealthStatus, SightlineError> {
        Ok(HealthStatus::Healthy)
    }
}
