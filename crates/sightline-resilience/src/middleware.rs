// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Onion-style middleware around a repeatable async operation.
//!
//! `compose(vec![a, b], op)` yields `a(b(op))`: `a`'s code before
//! `next.run()` runs first and its code after `next.run()` runs last.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::BoxFuture;
use sightline_core::SightlineError;
use tracing::{info, warn};

use crate::backoff::RetryPolicy;
use crate::retry::retry_step;

/// A repeatable async operation. Each call starts a fresh attempt.
pub type Operation<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, SightlineError>> + Send + Sync>;

/// The rest of the chain, as seen by one middleware layer.
pub struct Next<T> {
    inner: Operation<T>,
}

impl<T> Clone for Next<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Next<T> {
    /// Invoke the inner layers. May be called more than once.
    pub async fn run(&self) -> Result<T, SightlineError> {
        (self.inner)().await
    }
}

#[async_trait]
pub trait Middleware<T: Send + 'static>: Send + Sync {
    async fn handle(&self, next: Next<T>) -> Result<T, SightlineError>;
}

/// Wrap `op` in `layers`; the first layer is the outermost.
pub fn compose<T: Send + 'static>(
    layers: Vec<Arc<dyn Middleware<T>>>,
    op: Operation<T>,
) -> Operation<T> {
    layers.into_iter().rev().fold(op, |inner, layer| {
        let wrapped: Operation<T> = Arc::new(move || -> BoxFuture<'static, Result<T, SightlineError>> {
            let layer = Arc::clone(&layer);
            let next = Next {
                inner: Arc::clone(&inner),
            };
            Box::pin(async move { layer.handle(next).await })
        });
        wrapped
    })
}

/// Retries the inner chain with the step-tier policy.
pub struct RetryMiddleware {
    label: String,
    policy: RetryPolicy,
}

impl RetryMiddleware {
    pub fn new(label: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            label: label.into(),
            policy,
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Middleware<T> for RetryMiddleware {
    async fn handle(&self, next: Next<T>) -> Result<T, SightlineError> {
        let label = self.label.as_str();
        retry_step(
            &self.policy,
            || next.run(),
            |attempt, error| warn!(operation = label, attempt, error = %error, "retrying"),
        )
        .await
    }
}

/// Logs duration and outcome of the inner chain.
pub struct LoggingMiddleware {
    label: String,
}

impl LoggingMiddleware {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Middleware<T> for LoggingMiddleware {
    async fn handle(&self, next: Next<T>) -> Result<T, SightlineError> {
        let started = Instant::now();
        let result = next.run().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(operation = %self.label, elapsed_ms, "operation succeeded"),
            Err(e) => warn!(operation = %self.label, elapsed_ms, error = %e, "operation failed"),
        }
        result
    }
}
