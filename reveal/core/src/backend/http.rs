//! HTTP Answer Backend
//!
//! Answer service client over a JSON REST API:
//! - `POST /v1/answers` - generate a complete reply for a prompt + history
//! - `GET /v1/health` - liveness probe
//!
//! The call is non-streaming: the service computes the whole reply and
//! returns it in one response body.

use std::time::Duration;

use async_trait::async_trait;

use super::traits::{AnswerBackend, AnswerReply, AnswerRequest};
use crate::config::ChatConfig;

/// HTTP client for the answer service
#[derive(Clone)]
pub struct HttpAnswerBackend {
    /// Service base URL, e.g. `http://localhost:8787`
    base_url: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpAnswerBackend {
    /// Create a new backend for the given base URL.
    ///
    /// `request_timeout` is an explicit policy knob: `None` (the default
    /// configuration) means the generate call has no cutoff other than
    /// user-triggered cancellation.
    pub fn new(base_url: impl Into<String>, request_timeout: Option<Duration>) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            base_url: base_url.into(),
            http_client: builder.build().expect("Failed to create HTTP client"),
        }
    }

    /// Create from engine configuration
    #[must_use]
    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(config.answer_url.clone(), config.request_timeout)
    }

    /// Create from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var("REVEAL_ANSWER_URL")
            .unwrap_or_else(|_| "http://localhost:8787".to_string());
        let timeout = std::env::var("REVEAL_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis);
        Self::new(base_url, timeout)
    }

    /// Get the configured base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get answers endpoint URL
    fn answers_url(&self) -> String {
        format!("{}/v1/answers", self.base_url)
    }

    /// Get health endpoint URL
    fn health_url(&self) -> String {
        format!("{}/v1/health", self.base_url)
    }
}

#[async_trait]
impl AnswerBackend for HttpAnswerBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn health_check(&self) -> bool {
        self.http_client
            .get(self.health_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|response| response.status().is_success())
            .unwrap_or(false)
    }

    async fn generate(&self, request: &AnswerRequest) -> anyhow::Result<AnswerReply> {
        let url = self.answers_url();
        tracing::debug!(
            url = %url,
            history_turns = request.history.len(),
            has_attachment = request.attachment.is_some(),
            "Sending answer request"
        );

        let response = self.http_client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("answer service returned {status}: {body}");
        }

        let reply: AnswerReply = response.json().await?;
        tracing::debug!(
            reply_chars = reply.text.chars().count(),
            sources = reply.sources.len(),
            "Answer received"
        );
        Ok(reply)
    }
}
