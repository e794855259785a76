//! Engine-to-UI Events
//!
//! Everything a surface needs to render the conversation arrives over one
//! mpsc channel of `ChatEvent`s. The UI stays a pure renderer: it applies
//! what the engine tells it and never second-guesses lifecycle.

use serde::{Deserialize, Serialize};

use crate::backend::SourceRef;
use crate::message::{Attachment, Lifecycle, Message, MessageId, Role};

/// Events pushed from the engine to the UI surface.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ChatEvent {
    /// A message was appended to the conversation (the user's turn, or the
    /// assistant placeholder that follows it).
    Message {
        /// Unique message ID for tracking
        id: MessageId,
        /// Who sent this message
        role: Role,
        /// Initial content (empty for a placeholder)
        content: String,
    },

    /// One reveal tick landed on an assistant message.
    Frame {
        /// Message being revealed
        id: MessageId,
        /// Stable prefix for the formatted rendering path
        content: String,
        /// In-flight suffix, shown unformatted so no characters vanish
        unstable: String,
    },

    /// A reveal reached the end of the reply.
    Settled {
        /// Message that finished
        id: MessageId,
        /// The literal full reply text
        content: String,
        /// Citations returned alongside the reply
        sources: Vec<SourceRef>,
    },

    /// The user stopped a turn; the message froze at its partial content.
    Stopped {
        /// Message that was stopped
        id: MessageId,
        /// Frozen content
        content: String,
    },

    /// A turn failed terminally.
    Failed {
        /// Message that errored
        id: MessageId,
        /// User-facing notice now shown as the message content
        notice: String,
        /// Original error text, for diagnostics only
        detail: String,
    },
}

/// Read-only snapshot of one message, as exposed to the UI layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageView {
    /// Unique message ID
    pub id: MessageId,
    /// Who sent this message
    pub role: Role,
    /// Current lifecycle state
    pub lifecycle: Lifecycle,
    /// Currently-visible text
    pub content: String,
    /// Withheld in-flight suffix (empty unless revealing)
    pub unstable: String,
    /// Attachment shown alongside a user message
    pub attachment: Option<Attachment>,
}

impl From<&Message> for MessageView {
    fn from(msg: &Message) -> Self {
        Self {
            id: msg.id.clone(),
            role: msg.role,
            lifecycle: msg.lifecycle,
            content: msg.content.clone(),
            unstable: msg.unstable.clone(),
            attachment: msg.attachment.clone(),
        }
    }
}
