// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Side effects whose failure must never affect the primary operation.

use std::future::Future;

use sightline_core::SightlineError;
use tracing::warn;

/// Await `fut`, logging and discarding any error.
pub async fn best_effort<T, Fut>(label: &str, fut: Fut) -> Option<T>
where
    Fut: Future<Output = Result<T, SightlineError>>,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(operation = label, error = %e, "best-effort operation failed");
            None
        }
    }
}
