//! Conversation State
//!
//! The single shared resource of the engine: an insertion-ordered list of
//! messages, append-only except for in-place updates to the one active
//! assistant message. Every mutating method checks that its target is still
//! the current active message, so a tick or network resolution that lost a
//! race with cancel-and-resend is dropped instead of applied.
//!
//! # Invariant
//!
//! At most one assistant message is `Pending` or `Revealing` at any time.
//! `begin_turn` enforces it mechanically by force-stopping the previous
//! active message before appending the next pair.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::{Turn, UpstreamRole};
use crate::message::{Attachment, Lifecycle, Message, MessageId, Role};

/// Unique identifier for a conversation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    /// Create a new unique conversation ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form: first 8 chars of the UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// An ordered conversation and its single active assistant message.
#[derive(Clone, Debug)]
pub struct Conversation {
    /// Unique conversation ID
    id: ConversationId,
    /// Messages in insertion order
    messages: Vec<Message>,
    /// The one assistant message currently pending or revealing, if any
    active_assistant: Option<MessageId>,
}

impl Conversation {
    /// Create an empty conversation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
            active_assistant: None,
        }
    }

    /// Create a conversation seeded with history from the external store.
    ///
    /// The store should only hand over finished turns; any message that
    /// arrives still active is force-stopped so the invariant holds from
    /// the first moment.
    #[must_use]
    pub fn with_messages(messages: Vec<Message>) -> Self {
        let mut conversation = Self {
            id: ConversationId::new(),
            messages,
            active_assistant: None,
        };
        for msg in &mut conversation.messages {
            if msg.lifecycle.is_active() {
                tracing::warn!(message_id = %msg.id, "Seeded message was still active; stopping");
                msg.stop();
            }
        }
        conversation
    }

    /// Get the conversation ID
    #[must_use]
    pub fn id(&self) -> ConversationId {
        self.id
    }

    /// All messages, in insertion order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation holds no messages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Get a message by ID
    #[must_use]
    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// ID of the assistant message currently pending or revealing
    #[must_use]
    pub fn active_assistant(&self) -> Option<&MessageId> {
        self.active_assistant.as_ref()
    }

    /// Start a new turn: append the user's message and a pending assistant
    /// placeholder, returning both IDs.
    ///
    /// Any still-active assistant message is stopped first; two messages
    /// never reveal at once.
    pub fn begin_turn(
        &mut self,
        prompt: impl Into<String>,
        attachment: Option<Attachment>,
    ) -> (MessageId, MessageId) {
        self.stop_active();

        let user = Message::user(prompt, attachment);
        let user_id = user.id.clone();
        self.messages.push(user);

        let placeholder = Message::assistant_placeholder();
        let assistant_id = placeholder.id.clone();
        self.messages.push(placeholder);
        self.active_assistant = Some(assistant_id.clone());

        tracing::debug!(
            conversation = %self.id,
            user_id = %user_id,
            assistant_id = %assistant_id,
            "Turn started"
        );
        (user_id, assistant_id)
    }

    /// Stop the active assistant message, whichever it is.
    ///
    /// Returns the ID and frozen content when a message was actually
    /// stopped.
    pub fn stop_active(&mut self) -> Option<(MessageId, String)> {
        let id = self.active_assistant.clone()?;
        self.stop(&id).map(|content| (id, content))
    }

    /// Stop `id` if it is the active assistant message.
    ///
    /// Returns the frozen content when the stop applied.
    pub fn stop(&mut self, id: &MessageId) -> Option<String> {
        if self.active_assistant.as_ref() != Some(id) {
            return None;
        }
        let msg = self.messages.iter_mut().find(|m| &m.id == id)?;
        if !msg.stop() {
            return None;
        }
        self.active_assistant = None;
        Some(msg.content.clone())
    }

    /// Move `id` from pending to revealing. Applies only to the active
    /// assistant message.
    pub fn begin_reveal(&mut self, id: &MessageId) -> bool {
        self.with_active(id, Message::begin_reveal)
    }

    /// Write one reveal frame into `id`. Stale frames (a cancelled or
    /// superseded turn) are dropped.
    pub fn apply_frame(&mut self, id: &MessageId, stable: &str, unstable: &str) -> bool {
        self.with_active(id, |msg| msg.apply_frame(stable, unstable))
    }

    /// Settle `id` with the literal final text and release the active slot.
    pub fn settle(&mut self, id: &MessageId, final_text: &str) -> bool {
        let applied = self.with_active(id, |msg| msg.settle(final_text));
        if applied {
            self.active_assistant = None;
        }
        applied
    }

    /// Fail `id` with a user-facing notice, keeping the raw error for
    /// diagnostics, and release the active slot.
    pub fn fail(&mut self, id: &MessageId, notice: &str, detail: &str) -> bool {
        let applied = self.with_active(id, |msg| msg.fail(notice, detail));
        if applied {
            self.active_assistant = None;
        }
        applied
    }

    fn with_active(&mut self, id: &MessageId, apply: impl FnOnce(&mut Message) -> bool) -> bool {
        if self.active_assistant.as_ref() != Some(id) {
            tracing::debug!(message_id = %id, "Dropping update for non-active message");
            return false;
        }
        match self.messages.iter_mut().find(|m| &m.id == id) {
            Some(msg) => apply(msg),
            None => false,
        }
    }

    /// Project the bounded history window sent with the next request.
    ///
    /// Keeps finished turns only (`Settled`, and pragmatically `Stopped`
    /// when a frozen prefix remains), drops placeholders and anything still
    /// in flight, limits to the last `max_turns` user/assistant pairs, and
    /// renames roles into the upstream vocabulary. This is the single place
    /// internal roles meet upstream role names.
    #[must_use]
    pub fn history_window(&self, max_turns: usize) -> Vec<Turn> {
        let mut turns: Vec<Turn> = self
            .messages
            .iter()
            .filter(|m| {
                matches!(m.lifecycle, Lifecycle::Settled | Lifecycle::Stopped)
                    && !m.content.is_empty()
            })
            .map(|m| Turn {
                role: match m.role {
                    Role::User => UpstreamRole::User,
                    Role::Assistant => UpstreamRole::Chatbot,
                },
                text: m.content.clone(),
            })
            .collect();

        let keep = max_turns.saturating_mul(2);
        if turns.len() > keep {
            turns.drain(..turns.len() - keep);
        }
        turns
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn finished_turn(conversation: &mut Conversation, prompt: &str, reply: &str) {
        let (_, assistant_id) = conversation.begin_turn(prompt, None);
        conversation.begin_reveal(&assistant_id);
        conversation.settle(&assistant_id, reply);
    }

    #[test]
    fn test_begin_turn_appends_pair_and_tracks_active() {
        let mut conversation = Conversation::new();
        let (user_id, assistant_id) = conversation.begin_turn("Hello", None);

        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.message(&user_id).unwrap().role, Role::User);
        let assistant = conversation.message(&assistant_id).unwrap();
        assert_eq!(assistant.lifecycle, Lifecycle::Pending);
        assert_eq!(conversation.active_assistant(), Some(&assistant_id));
    }

    #[test]
    fn test_new_turn_force_stops_previous_active() {
        let mut conversation = Conversation::new();
        let (_, first) = conversation.begin_turn("one", None);
        conversation.begin_reveal(&first);
        conversation.apply_frame(&first, "par", "");

        let (_, second) = conversation.begin_turn("two", None);

        let stopped = conversation.message(&first).unwrap();
        assert_eq!(stopped.lifecycle, Lifecycle::Stopped);
        assert_eq!(stopped.content, "par");
        assert_eq!(conversation.active_assistant(), Some(&second));

        // Never two active assistant messages.
        let active = conversation
            .messages()
            .iter()
            .filter(|m| m.lifecycle.is_active())
            .count();
        assert_eq!(active, 1);
    }

    #[test]
    fn test_stale_updates_are_dropped() {
        let mut conversation = Conversation::new();
        let (_, first) = conversation.begin_turn("one", None);
        conversation.begin_reveal(&first);
        let (_, _second) = conversation.begin_turn("two", None);

        // The first turn was superseded; its late tick must not apply.
        assert!(!conversation.apply_frame(&first, "stale", ""));
        assert!(!conversation.settle(&first, "stale"));
        assert_eq!(conversation.message(&first).unwrap().lifecycle, Lifecycle::Stopped);
    }

    #[test]
    fn test_stop_returns_frozen_content_once() {
        let mut conversation = Conversation::new();
        let (_, id) = conversation.begin_turn("one", None);
        conversation.begin_reveal(&id);
        conversation.apply_frame(&id, "froz", "`en");

        assert_eq!(conversation.stop(&id), Some("froz".to_string()));
        // Idempotent from the caller's view: a second stop has no target.
        assert_eq!(conversation.stop(&id), None);
        assert_eq!(conversation.active_assistant(), None);
    }

    #[test]
    fn test_settle_releases_active_slot() {
        let mut conversation = Conversation::new();
        let (_, id) = conversation.begin_turn("hi", None);
        conversation.begin_reveal(&id);
        assert!(conversation.settle(&id, "done"));
        assert_eq!(conversation.active_assistant(), None);
        assert_eq!(conversation.message(&id).unwrap().content, "done");
    }

    #[test]
    fn test_fail_releases_active_slot_and_keeps_detail() {
        let mut conversation = Conversation::new();
        let (_, id) = conversation.begin_turn("hi", None);
        assert!(conversation.fail(&id, "notice", "boom"));
        assert_eq!(conversation.active_assistant(), None);
        let msg = conversation.message(&id).unwrap();
        assert_eq!(msg.content, "notice");
        assert_eq!(msg.error_detail.as_deref(), Some("boom"));
    }

    #[test]
    fn test_history_window_excludes_active_and_renames_roles() {
        let mut conversation = Conversation::new();
        finished_turn(&mut conversation, "q1", "a1");
        let (_, pending) = conversation.begin_turn("q2", None);

        let window = conversation.history_window(5);
        // q1/a1 finished; q2 is the current user prompt (settled, included
        // by lifecycle) but the pending placeholder is excluded.
        let texts: Vec<&str> = window.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["q1", "a1", "q2"]);
        assert_eq!(window[0].role, UpstreamRole::User);
        assert_eq!(window[1].role, UpstreamRole::Chatbot);
        assert!(conversation.message(&pending).is_some());
    }

    #[test]
    fn test_history_window_is_bounded_to_last_pairs() {
        let mut conversation = Conversation::new();
        for i in 0..6 {
            finished_turn(&mut conversation, &format!("q{i}"), &format!("a{i}"));
        }

        let window = conversation.history_window(2);
        let texts: Vec<&str> = window.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["q4", "a4", "q5", "a5"]);
    }

    #[test]
    fn test_history_window_keeps_stopped_prefix_drops_empty_stop() {
        let mut conversation = Conversation::new();

        // A turn stopped mid-reveal keeps its frozen prefix.
        let (_, first) = conversation.begin_turn("q1", None);
        conversation.begin_reveal(&first);
        conversation.apply_frame(&first, "partial answer", "");
        conversation.stop(&first);

        // A turn stopped while still pending has nothing to contribute.
        let (_, second) = conversation.begin_turn("q2", None);
        conversation.stop(&second);

        let window = conversation.history_window(5);
        let texts: Vec<&str> = window.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["q1", "partial answer", "q2"]);
    }

    #[test]
    fn test_with_messages_normalizes_active_seeds() {
        let mut stuck = Message::assistant_placeholder();
        stuck.begin_reveal();
        let seeded = Conversation::with_messages(vec![
            Message::user("q", None),
            stuck,
        ]);

        assert_eq!(seeded.active_assistant(), None);
        assert_eq!(seeded.messages()[1].lifecycle, Lifecycle::Stopped);
    }

    #[test]
    fn test_conversation_id_display_is_short() {
        let id = ConversationId::new();
        assert_eq!(format!("{id}").len(), 8);
    }
}
