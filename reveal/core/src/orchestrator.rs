//! Request Orchestration
//!
//! Exactly one answer request may be outstanding per conversation. The
//! orchestrator owns the cancellation token for the in-flight call:
//! registering a new call cancels the previous one first, and `cancel()`
//! aborts whatever is pending. Cancellation is a distinguishable outcome,
//! not an error, so the caller can freeze the turn quietly instead of
//! surfacing a failure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::backend::{AnswerBackend, AnswerReply, AnswerRequest};

/// Outcome taxonomy for a failed or interrupted answer request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The call was cancelled before completion, either by the user or by a
    /// newer turn superseding it. Not an error from the user's perspective.
    #[error("request cancelled before completion")]
    Cancelled,

    /// The service answered, but with no usable text.
    #[error("assistant returned no usable text")]
    EmptyReply,

    /// Network failure or a service-reported error. Carries the
    /// human-readable cause for diagnostics.
    #[error("assistant request failed: {0}")]
    Upstream(String),
}

/// Issues answer requests, at most one in flight.
///
/// Retries are deliberately not a responsibility here; a failed or
/// cancelled turn requires explicit resubmission by the caller.
pub struct RequestOrchestrator<B> {
    /// The answer service
    backend: Arc<B>,
    /// Token of the in-flight call, tagged with a generation counter so a
    /// finished call only releases the slot it still owns.
    inflight: Mutex<Option<(u64, CancellationToken)>>,
    /// Generation counter for in-flight slots
    generation: AtomicU64,
}

impl<B: AnswerBackend> RequestOrchestrator<B> {
    /// Create an orchestrator over the given backend.
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            inflight: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Whether a call is currently outstanding.
    #[must_use]
    pub fn is_inflight(&self) -> bool {
        self.inflight.lock().is_some()
    }

    /// Abort the in-flight call, if any. Idempotent.
    pub fn cancel(&self) {
        if let Some((generation, token)) = self.inflight.lock().as_ref() {
            tracing::debug!(generation, "Cancelling in-flight answer request");
            token.cancel();
        }
    }

    /// Probe the backend.
    pub async fn health_check(&self) -> bool {
        self.backend.health_check().await
    }

    /// Send a request with a fresh cancellation token.
    pub async fn send(&self, request: AnswerRequest) -> Result<AnswerReply, SendError> {
        self.send_with(request, CancellationToken::new()).await
    }

    /// Send a request tied to a caller-supplied token, so one token can
    /// tear down both the request and the reveal it feeds.
    ///
    /// Any previously outstanding call is cancelled before this one is
    /// issued.
    pub async fn send_with(
        &self,
        request: AnswerRequest,
        cancel: CancellationToken,
    ) -> Result<AnswerReply, SendError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        {
            let mut slot = self.inflight.lock();
            if let Some((previous, token)) = slot.replace((generation, cancel.clone())) {
                tracing::debug!(superseded = previous, "Superseding in-flight answer request");
                token.cancel();
            }
        }

        let result = tokio::select! {
            () = cancel.cancelled() => Err(SendError::Cancelled),
            outcome = self.backend.generate(&request) => match outcome {
                Ok(reply) if reply.text.trim().is_empty() => Err(SendError::EmptyReply),
                Ok(reply) => Ok(reply),
                Err(error) => Err(SendError::Upstream(error.to_string())),
            },
        };

        // Release the slot only if a newer call has not already claimed it.
        {
            let mut slot = self.inflight.lock();
            if slot.as_ref().is_some_and(|(owner, _)| *owner == generation) {
                *slot = None;
            }
        }

        if let Err(error) = &result {
            tracing::debug!(generation, %error, "Answer request did not complete");
        }
        result
    }
}
