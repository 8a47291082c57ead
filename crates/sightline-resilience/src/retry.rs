// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Step-level and agent-level retry wrappers.
//!
//! Both wrappers call the operation at most `max_attempts` times, sleep
//! `base * 2^(n-1)` after failed attempt `n`, and hand back the last error
//! unchanged once attempts run out. `on_retry` fires before each retry and
//! never after the final failure.

use std::future::Future;
use std::time::Duration;

use sightline_core::{ChatMessage, SightlineError};
use tracing::{debug, warn};

use crate::backoff::RetryPolicy;
use crate::classify::Retryable;

/// Run one attempt under the policy's deadline, if any.
pub async fn run_attempt<T, Fut>(policy: &RetryPolicy, attempt: Fut) -> Result<T, SightlineError>
where
    Fut: Future<Output = Result<T, SightlineError>>,
{
    match policy.attempt_timeout {
        Some(duration) => tokio::time::timeout(duration, attempt)
            .await
            .unwrap_or(Err(SightlineError::Timeout { duration })),
        None => attempt.await,
    }
}

fn should_retry(policy: &RetryPolicy, attempt: u32, error: &SightlineError) -> bool {
    attempt < policy.max_attempts && (policy.retry_all_errors || error.is_retriable())
}

/// Retry a plain async operation.
///
/// `on_retry(attempt, &error)` receives the number of the attempt that just
/// failed.
pub async fn retry_step<T, F, Fut, R>(
    policy: &RetryPolicy,
    mut op: F,
    mut on_retry: R,
) -> Result<T, SightlineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SightlineError>>,
    R: FnMut(u32, &SightlineError),
{
    let mut attempt = 1;
    loop {
        match run_attempt(policy, op()).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !should_retry(policy, attempt, &error) {
                    debug!(attempt, error = %error, "giving up");
                    return Err(error);
                }
                let delay = policy.delay_for(attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %error, "step failed, retrying");
                on_retry(attempt, &error);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// What to do after a failed agent attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedAttempt {
    pub should_retry: bool,
    /// Conversation for the next attempt.
    pub next_messages: Vec<ChatMessage>,
    /// Number of messages taken from recovery; zero when the pre-failure
    /// conversation is reused.
    pub recovered_count: usize,
    pub delay: Duration,
}

/// Decide whether to retry a failed agent attempt and with which messages.
///
/// Recovery runs only when a retry will happen. A recovery error or an empty
/// recovery falls back to `messages`, the conversation before the failure.
pub async fn handle_failed_attempt<Rec, RecFut>(
    policy: &RetryPolicy,
    attempt: u32,
    error: &SightlineError,
    messages: &[ChatMessage],
    recover: &mut Rec,
) -> FailedAttempt
where
    Rec: FnMut() -> RecFut,
    RecFut: Future<Output = Result<Vec<ChatMessage>, SightlineError>>,
{
    if !should_retry(policy, attempt, error) {
        return FailedAttempt {
            should_retry: false,
            next_messages: messages.to_vec(),
            recovered_count: 0,
            delay: Duration::ZERO,
        };
    }

    let (next_messages, recovered_count) = match recover().await {
        Ok(recovered) if !recovered.is_empty() => {
            let count = recovered.len();
            (recovered, count)
        }
        Ok(_) => {
            debug!(attempt, "nothing recovered, reusing pre-failure messages");
            (messages.to_vec(), 0)
        }
        Err(recovery_error) => {
            warn!(attempt, error = %recovery_error, "message recovery failed, reusing pre-failure messages");
            (messages.to_vec(), 0)
        }
    };

    FailedAttempt {
        should_retry: true,
        next_messages,
        recovered_count,
        delay: policy.delay_for(attempt),
    }
}

/// Retry an agent run over a conversation.
///
/// A failed attempt may already have persisted part of its output, so before
/// each retry `recover()` re-reads the stored conversation and, when it yields
/// messages, the next attempt starts from those. `on_retry(attempt,
/// recovered_count)` fires before each retry.
pub async fn retry_agent<T, F, Fut, Rec, RecFut, R>(
    policy: &RetryPolicy,
    messages: Vec<ChatMessage>,
    mut op: F,
    mut recover: Rec,
    mut on_retry: R,
) -> Result<T, SightlineError>
where
    F: FnMut(Vec<ChatMessage>) -> Fut,
    Fut: Future<Output = Result<T, SightlineError>>,
    Rec: FnMut() -> RecFut,
    RecFut: Future<Output = Result<Vec<ChatMessage>, SightlineError>>,
    R: FnMut(u32, usize),
{
    let mut current = messages;
    let mut attempt = 1;
    loop {
        let error = match run_attempt(policy, op(current.clone())).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let decision = handle_failed_attempt(policy, attempt, &error, &current, &mut recover).await;
        if !decision.should_retry {
            debug!(attempt, error = %error, "agent giving up");
            return Err(error);
        }

        warn!(
            attempt,
            recovered = decision.recovered_count,
            delay_ms = decision.delay.as_millis() as u64,
            error = %error,
            "agent attempt failed, retrying"
        );
        on_retry(attempt, decision.recovered_count);
        tokio::time::sleep(decision.delay).await;
        current = decision.next_messages;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn overloaded() -> SightlineError {
        SightlineError::Provider {
            message: "upstream".into(),
            status: Some(529),
            payload: Some(serde_json::json!({"type": "overloaded_error"})),
            source: None,
        }
    }

    fn policy(base_ms: u64) -> RetryPolicy {
        RetryPolicy::step().with_base_delay(Duration::from_millis(base_ms))
    }

    #[tokio::test(start_paused = true)]
    async fn step_sleeps_with_exponential_backoff() {
        let start = Instant::now();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let calls_in = calls.clone();

        let result = retry_step(
            &policy(1000),
            || {
                let calls = calls_in.clone();
                async move {
                    let mut calls = calls.lock().unwrap();
                    calls.push(start.elapsed().as_millis());
                    if calls.len() < 3 { Err(overloaded()) } else { Ok("done") }
                }
            },
            |_, _| {},
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(*calls.lock().unwrap(), vec![0, 1000, 3000]);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_original_error_after_max_attempts() {
        let mut calls = 0;
        let mut retries = Vec::new();
        let result: Result<(), _> = retry_step(
            &policy(10),
            || {
                calls += 1;
                async { Err(SightlineError::provider("model overloaded: attempt")) }
            },
            |attempt, _| retries.push(attempt),
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "provider error: model overloaded: attempt");
        assert!(matches!(err, SightlineError::Provider { .. }));
        assert_eq!(calls, 3);
        assert_eq!(retries, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retriable_errors_fail_fast() {
        let mut calls = 0;
        let result: Result<(), _> = retry_step(
            &policy(10),
            || {
                calls += 1;
                async { Err(SightlineError::Internal("bad input".into())) }
            },
            |_, _| panic!("no retry expected"),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_all_errors_overrides_classification() {
        let mut p = policy(10);
        p.retry_all_errors = true;
        let mut calls = 0;
        let result: Result<(), _> = retry_step(
            &p,
            || {
                calls += 1;
                async { Err(SightlineError::Internal("bad".into())) }
            },
            |_, _| {},
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_deadline_turns_hangs_into_retriable_timeouts() {
        let p = policy(10)
            .with_max_attempts(2)
            .with_attempt_timeout(Duration::from_secs(5));
        let mut calls = 0;
        let result: Result<(), _> = retry_step(
            &p,
            || {
                calls += 1;
                std::future::pending::<Result<(), SightlineError>>()
            },
            |_, err| assert!(matches!(err, SightlineError::Timeout { .. })),
        )
        .await;
        assert!(matches!(result, Err(SightlineError::Timeout { .. })));
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn agent_retry_uses_recovered_messages() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in = seen.clone();
        let mut recovered_counts = Vec::new();

        let result = retry_agent(
            &policy(10),
            vec![ChatMessage::user("hi")],
            |messages: Vec<ChatMessage>| {
                let seen = seen_in.clone();
                async move {
                    let mut seen = seen.lock().unwrap();
                    seen.push(messages.len());
                    if seen.len() == 1 { Err(overloaded()) } else { Ok(messages) }
                }
            },
            || async {
                Ok::<_, SightlineError>(vec![
                    ChatMessage::user("hi"),
                    ChatMessage::assistant("partial"),
                ])
            },
            |_, count| recovered_counts.push(count),
        )
        .await
        .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(recovered_counts, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn agent_retry_falls_back_when_recovery_fails() {
        let original = vec![ChatMessage::user("question"), ChatMessage::assistant("a")];
        let inputs = Arc::new(Mutex::new(Vec::new()));
        let inputs_in = inputs.clone();

        let result = retry_agent(
            &policy(10),
            original.clone(),
            |messages: Vec<ChatMessage>| {
                let inputs = inputs_in.clone();
                async move {
                    let mut inputs = inputs.lock().unwrap();
                    inputs.push(messages);
                    if inputs.len() < 3 { Err(overloaded()) } else { Ok(()) }
                }
            },
            || async { Err::<Vec<ChatMessage>, _>(SightlineError::Internal("db down".into())) },
            |_, count| assert_eq!(count, 0),
        )
        .await;

        assert!(result.is_ok());
        let inputs = inputs.lock().unwrap();
        assert_eq!(inputs.len(), 3);
        assert!(inputs.iter().all(|m| *m == original));
    }

    #[tokio::test(start_paused = true)]
    async fn agent_retry_never_reports_the_final_failure() {
        let mut recover_calls = 0;
        let mut retries = Vec::new();
        let result: Result<(), _> = retry_agent(
            &policy(10),
            vec![ChatMessage::user("q")],
            |_| async { Err(overloaded()) },
            || {
                recover_calls += 1;
                async { Ok::<_, SightlineError>(Vec::new()) }
            },
            |attempt, _| retries.push(attempt),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(retries, vec![1, 2]);
        assert_eq!(recover_calls, 2);
    }

    #[tokio::test]
    async fn handle_failed_attempt_stops_at_limit_without_recovering() {
        let messages = vec![ChatMessage::user("q")];
        let mut recover_calls = 0;
        let mut recover = || {
            recover_calls += 1;
            async { Ok::<_, SightlineError>(vec![ChatMessage::assistant("unused")]) }
        };
        let decision =
            handle_failed_attempt(&policy(10), 3, &overloaded(), &messages, &mut recover).await;
        assert!(!decision.should_retry);
        assert_eq!(decision.next_messages, messages);
        assert_eq!(recover_calls, 0);
    }
}
