//! Messages and their Lifecycle
//!
//! One `Message` per visible turn in the conversation. User messages are
//! settled the moment they are created; assistant messages walk a small
//! state machine driven by the request orchestrator and the reveal
//! scheduler. Transition methods are guarded: an invalid or stale move is
//! dropped (and logged at debug level), never applied and never a panic,
//! because a cancel-and-resend can race a still-in-flight tick.

use serde::{Deserialize, Serialize};

/// Message identifier
///
/// Opaque, unique, and monotonically assigned, so state updates can target
/// the correct message even after others were created or cancelled.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!("msg_{id}"))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// User input
    User,
    /// AI assistant reply
    Assistant,
}

/// Lifecycle of a single message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    /// Placeholder, no content yet; the request is still in flight
    Pending,
    /// Content growing tick by tick
    Revealing,
    /// Final; content is the full literal reply
    Settled,
    /// User-cancelled; content frozen at the last revealed prefix
    Stopped,
    /// Terminal failure; content replaced by a fixed notice
    Errored,
}

impl Lifecycle {
    /// Whether this state can never change again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Stopped | Self::Errored)
    }

    /// Whether the message is still being produced (pending or revealing).
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Revealing)
    }
}

/// An uploaded file or image shown alongside a user message.
///
/// Size and type validation happen before the attachment reaches this
/// subsystem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Original file name
    pub name: String,
    /// MIME type, e.g. `image/png`
    pub media_type: String,
    /// Raw bytes
    pub data: Vec<u8>,
}

impl Attachment {
    /// Create a new attachment
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data,
        }
    }
}

/// One turn in the visible conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: MessageId,
    /// Who sent this message
    pub role: Role,
    /// Current lifecycle state
    pub lifecycle: Lifecycle,
    /// Currently-visible text. For an in-progress assistant message this is
    /// the last stable prefix written by the scheduler; for a settled
    /// message, the full reply.
    pub content: String,
    /// In-flight suffix withheld from formatted rendering. Non-empty only
    /// while revealing; cleared on every terminal transition.
    pub unstable: String,
    /// Optional uploaded file shown alongside a user message
    pub attachment: Option<Attachment>,
    /// Original upstream error text, kept for diagnostics separately from
    /// the user-facing notice in `content`
    pub error_detail: Option<String>,
}

impl Message {
    /// Create a settled user message.
    pub fn user(content: impl Into<String>, attachment: Option<Attachment>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::User,
            lifecycle: Lifecycle::Settled,
            content: content.into(),
            unstable: String::new(),
            attachment,
            error_detail: None,
        }
    }

    /// Create a pending assistant placeholder.
    pub fn assistant_placeholder() -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Assistant,
            lifecycle: Lifecycle::Pending,
            content: String::new(),
            unstable: String::new(),
            attachment: None,
            error_detail: None,
        }
    }

    /// Create a settled assistant message, for seeding a conversation from
    /// the external store.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Assistant,
            lifecycle: Lifecycle::Settled,
            content: content.into(),
            unstable: String::new(),
            attachment: None,
            error_detail: None,
        }
    }

    /// The request resolved; reveal is starting. `Pending → Revealing`.
    pub fn begin_reveal(&mut self) -> bool {
        if self.lifecycle != Lifecycle::Pending {
            self.drop_transition("begin_reveal");
            return false;
        }
        self.lifecycle = Lifecycle::Revealing;
        true
    }

    /// Apply one scheduler tick. Only legal while `Revealing`.
    ///
    /// `stable` replaces the content wholesale: the splitter's stable half
    /// of a longer prefix can be shorter than the previous one when a new
    /// delimiter opens, and the visible text must track it.
    pub fn apply_frame(&mut self, stable: &str, unstable: &str) -> bool {
        if self.lifecycle != Lifecycle::Revealing {
            self.drop_transition("apply_frame");
            return false;
        }
        self.content.clear();
        self.content.push_str(stable);
        self.unstable.clear();
        self.unstable.push_str(unstable);
        true
    }

    /// The reveal reached the end. `Revealing → Settled`; content becomes
    /// the literal full text, bypassing the splitter.
    pub fn settle(&mut self, final_text: &str) -> bool {
        if self.lifecycle != Lifecycle::Revealing {
            self.drop_transition("settle");
            return false;
        }
        self.lifecycle = Lifecycle::Settled;
        self.content.clear();
        self.content.push_str(final_text);
        self.unstable.clear();
        true
    }

    /// User cancelled. `Pending | Revealing → Stopped`; content freezes at
    /// the last value the scheduler wrote.
    pub fn stop(&mut self) -> bool {
        if !self.lifecycle.is_active() {
            self.drop_transition("stop");
            return false;
        }
        self.lifecycle = Lifecycle::Stopped;
        self.unstable.clear();
        true
    }

    /// Terminal failure. `Pending | Revealing → Errored`; content is
    /// replaced by `notice`, the raw error kept in `error_detail`.
    pub fn fail(&mut self, notice: &str, detail: impl Into<String>) -> bool {
        if !self.lifecycle.is_active() {
            self.drop_transition("fail");
            return false;
        }
        self.lifecycle = Lifecycle::Errored;
        self.content.clear();
        self.content.push_str(notice);
        self.unstable.clear();
        self.error_detail = Some(detail.into());
        true
    }

    fn drop_transition(&self, attempted: &str) {
        tracing::debug!(
            message_id = %self.id,
            lifecycle = ?self.lifecycle,
            attempted,
            "Dropping invalid message transition"
        );
    }
}
