// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for Sightline.
//!
//! Two retry tiers wrap LLM-backed work: the step tier retries a plain async
//! operation, the agent tier additionally recovers the conversation that a
//! failed attempt may have persisted. Both share one failure classifier and
//! one backoff law, and can be layered as middleware.

pub mod backoff;
pub mod best_effort;
pub mod classify;
pub mod middleware;
pub mod retry;

pub use backoff::{RetryPolicy, backoff_delay};
pub use best_effort::best_effort;
pub use classify::{Retryable, is_overloaded_message, is_overloaded_value};
pub use middleware::{LoggingMiddleware, Middleware, Next, Operation, RetryMiddleware, compose};
pub use retry::{FailedAttempt, handle_failed_attempt, retry_agent, retry_step, run_attempt};
