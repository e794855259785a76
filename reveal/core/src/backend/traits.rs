//! Answer Backend Traits
//!
//! Trait definition and wire types for the upstream answer service. The
//! abstraction keeps the engine independent of any particular provider:
//! the orchestrator sees a single async call with a reply, and transport,
//! auth, and endpoint details stay inside implementations.

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::message::Attachment;

/// Role vocabulary of the upstream answer service.
///
/// Internal roles are renamed into this vocabulary in exactly one place,
/// the history projection ([`crate::conversation::Conversation::history_window`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpstreamRole {
    /// The human side of a turn
    #[serde(rename = "USER")]
    User,
    /// The assistant side of a turn, in the service's own naming
    #[serde(rename = "CHATBOT")]
    Chatbot,
}

/// One prior turn, projected to exactly what the service needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who spoke, in upstream vocabulary
    pub role: UpstreamRole,
    /// The turn's text
    pub text: String,
}

/// An attachment encoded for the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedAttachment {
    /// Original file name
    pub name: String,
    /// MIME type
    pub media_type: String,
    /// Base64-encoded bytes
    pub data: String,
}

impl From<&Attachment> for EncodedAttachment {
    fn from(attachment: &Attachment) -> Self {
        Self {
            name: attachment.name.clone(),
            media_type: attachment.media_type.clone(),
            data: base64::engine::general_purpose::STANDARD.encode(&attachment.data),
        }
    }
}

/// A request to the answer service.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AnswerRequest {
    /// The user's prompt for this turn
    pub prompt: String,
    /// Bounded, role-normalized window of prior turns
    #[serde(default)]
    pub history: Vec<Turn>,
    /// Optional encoded attachment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<EncodedAttachment>,
}

impl AnswerRequest {
    /// Create a request with just a prompt
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Set the history window
    #[must_use]
    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    /// Attach an encoded upload
    #[must_use]
    pub fn with_attachment(mut self, attachment: EncodedAttachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// A citation the service may return alongside the reply text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Where the cited material lives
    pub url: String,
    /// Human-readable title, when the service provides one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// The complete reply from the answer service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerReply {
    /// Full reply text, passed through unchanged
    pub text: String,
    /// Citations, possibly empty
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

/// Answer service trait
///
/// Implement this trait to plug in a different provider. The upstream call
/// is non-streaming: one request, one complete reply.
#[async_trait]
pub trait AnswerBackend: Send + Sync {
    /// Get the backend name, for logs
    fn name(&self) -> &str;

    /// Check if the backend is healthy and reachable
    async fn health_check(&self) -> bool;

    /// Send a request and wait for the complete reply
    async fn generate(&self, request: &AnswerRequest) -> anyhow::Result<AnswerReply>;
}
