//! crates/hospital_chat_core/src/gateway.rs
//!
//! The conversation gateway: turns one submitted message into one resolved
//! reply from the asynchronous backend, hiding its submit/poll protocol
//! behind a single call.
//!
//! The backend reports `in_progress` until it finishes, and its status flip
//! and the answer's appearance in the message list are not perfectly
//! synchronized, so after the status polling budget is spent a secondary
//! stage polls the message list directly for a terminal answer.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::backoff::BackoffPolicy;
use crate::domain::{ChatReply, Submission, SubmissionStatus};
use crate::ports::{BackendError, ChatBackend};

/// Terminal outcomes of one gateway call.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Transport failure reaching the backend; the caller-facing layer may
    /// retry with its own bounded policy.
    #[error("Chat backend unavailable: {0}")]
    BackendUnavailable(String),
    /// The backend responded but signaled failure, or broke protocol by
    /// completing without an assistant answer. Terminal for this message.
    #[error("Chat backend rejected the message: {0}")]
    BackendRejected(String),
    /// Both polling stages exhausted without a terminal answer.
    #[error("Timed out waiting for the chat backend")]
    Timeout,
}

/// Polling schedule for one gateway call.
///
/// The status stage grows one current delay with two rates: `progress` while
/// the backend reports `in_progress`, `transport_error` after a failed poll.
/// The fallback stage runs a fresh schedule against the message list.
#[derive(Debug, Clone, Copy)]
pub struct GatewayTuning {
    pub progress: BackoffPolicy,
    pub transport_error: BackoffPolicy,
    pub fallback: BackoffPolicy,
    /// Hard wall-clock ceiling for the whole call.
    pub total_budget: Duration,
}

impl Default for GatewayTuning {
    fn default() -> Self {
        Self {
            progress: BackoffPolicy::new(
                Duration::from_millis(500),
                1.2,
                Duration::from_millis(2000),
                20,
            ),
            transport_error: BackoffPolicy::new(
                Duration::from_millis(500),
                1.5,
                Duration::from_millis(3000),
                20,
            ),
            fallback: BackoffPolicy::new(
                Duration::from_millis(1000),
                1.5,
                Duration::from_millis(3000),
                10,
            ),
            total_budget: Duration::from_secs(60),
        }
    }
}

/// Drives a `ChatBackend` submission to a resolved reply.
pub struct ChatGateway {
    backend: Arc<dyn ChatBackend>,
    tuning: GatewayTuning,
}

impl ChatGateway {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self::with_tuning(backend, GatewayTuning::default())
    }

    pub fn with_tuning(backend: Arc<dyn ChatBackend>, tuning: GatewayTuning) -> Self {
        Self { backend, tuning }
    }

    /// Submits `text` under `user_id`, polls to completion, and extracts the
    /// assistant's answer.
    ///
    /// Passing a prior `conversation_id` keeps the turn inside an existing
    /// conversation; otherwise the backend mints one and the reply carries it
    /// back for the caller to persist. Submit strictly precedes all polls and
    /// polls are strictly sequential.
    pub async fn send(
        &self,
        user_id: &str,
        conversation_id: Option<&str>,
        text: &str,
    ) -> Result<ChatReply, GatewayError> {
        let started = Instant::now();

        // Submit failures are immediately fatal for this call; retrying is
        // the caller's concern.
        let submission = self
            .backend
            .submit(user_id, conversation_id, text)
            .await
            .map_err(fatal)?;
        debug!(
            chat_id = %submission.chat_id,
            conversation_id = %submission.conversation_id,
            "message submitted"
        );

        // Stage one: poll the submission status.
        let mut delay = self.tuning.progress.initial_delay;
        for attempt in 1..=self.tuning.progress.max_attempts {
            self.wait(started, delay).await?;
            match self.backend.status(&submission).await {
                Ok(SubmissionStatus::Completed) => {
                    debug!(attempt, "submission completed");
                    return self.extract(&submission).await;
                }
                Ok(SubmissionStatus::Failed) => {
                    return Err(GatewayError::BackendRejected(
                        "backend reported the submission failed".to_string(),
                    ));
                }
                Ok(SubmissionStatus::InProgress) => {
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "still in progress");
                    delay = self.tuning.progress.grow(delay);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "status poll failed");
                    delay = self.tuning.transport_error.grow(delay);
                }
            }
        }

        // Stage two: the backend sometimes delivers the answer before it
        // flips the status field, so poll the message list directly.
        let mut delay = self.tuning.fallback.initial_delay;
        for attempt in 1..=self.tuning.fallback.max_attempts {
            self.wait(started, delay).await?;
            match self.backend.messages(&submission).await {
                Ok(messages) => {
                    if let Some(answer) = messages.iter().find(|m| m.is_answer()) {
                        debug!(attempt, "answer found by fallback polling");
                        return Ok(ChatReply {
                            answer: answer.content.clone(),
                            conversation_id: submission.conversation_id.clone(),
                        });
                    }
                }
                Err(e) => {
                    warn!(attempt, error = %e, "fallback message poll failed");
                }
            }
            delay = self.tuning.fallback.grow(delay);
        }

        Err(GatewayError::Timeout)
    }

    /// Sleeps for `delay` unless that would overrun the total budget, in
    /// which case the call times out deterministically.
    async fn wait(&self, started: Instant, delay: Duration) -> Result<(), GatewayError> {
        if started.elapsed() + delay >= self.tuning.total_budget {
            return Err(GatewayError::Timeout);
        }
        tokio::time::sleep(delay).await;
        Ok(())
    }

    /// Picks the assistant's answer out of the message list of a completed
    /// submission. A completed submission without one is a protocol
    /// violation by the backend.
    async fn extract(&self, submission: &Submission) -> Result<ChatReply, GatewayError> {
        let messages = self.backend.messages(submission).await.map_err(fatal)?;
        match messages.iter().find(|m| m.is_answer()) {
            Some(answer) => Ok(ChatReply {
                answer: answer.content.clone(),
                conversation_id: submission.conversation_id.clone(),
            }),
            None => Err(GatewayError::BackendRejected(
                "completed submission carried no assistant answer".to_string(),
            )),
        }
    }
}

fn fatal(e: BackendError) -> GatewayError {
    match e {
        BackendError::Unavailable(m) => GatewayError::BackendUnavailable(m),
        BackendError::Rejected(m) => GatewayError::BackendRejected(m),
    }
}
