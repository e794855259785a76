//! Chat Controller
//!
//! The conversation-scoped owner of everything mutable: the conversation,
//! the request orchestrator, the reveal scheduler, and the one active-turn
//! slot. "Is a reveal running" and "the current abort handle" are explicit
//! fields here rather than ambient module state, so the
//! single-active-assistant invariant is mechanically checkable.
//!
//! # Turn flow
//!
//! `submit` tears down the previous turn (cancel token, stop message),
//! projects the history window, appends the user message and an assistant
//! placeholder, then spawns a driver task that awaits the answer service
//! and hands the reply to the reveal scheduler. One cancellation token per
//! turn covers both the network call and the reveal; `cancel` fires it and
//! freezes the message wherever it is.
//!
//! The engine pushes [`ChatEvent`]s to the UI over the mpsc sender given at
//! construction; the UI renders what it is told and calls exactly two
//! operations back: `submit` and `cancel`.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::backend::{AnswerBackend, AnswerRequest, EncodedAttachment, SourceRef};
use crate::config::ChatConfig;
use crate::conversation::{Conversation, ConversationId};
use crate::events::{ChatEvent, MessageView};
use crate::message::{Attachment, Message, MessageId, Role};
use crate::orchestrator::{RequestOrchestrator, SendError};
use crate::scheduler::{RevealFrame, RevealHandle, RevealScheduler, RevealSink};

/// The reveal session of the turn in flight.
struct ActiveTurn {
    /// Assistant message this turn writes into
    assistant_id: MessageId,
    /// Token shared by the network call and the reveal
    cancel: CancellationToken,
    /// Reveal handle, present once the request has resolved
    reveal: Option<RevealHandle>,
}

/// State shared between the controller, its driver tasks, and reveal sinks.
struct Shared {
    conversation: Mutex<Conversation>,
    active: Mutex<Option<ActiveTurn>>,
    tx: mpsc::Sender<ChatEvent>,
}

impl Shared {
    async fn send(&self, event: ChatEvent) {
        if self.tx.send(event).await.is_err() {
            tracing::warn!("UI event channel closed; dropping event");
        }
    }

    /// Drop the active slot if `id` still owns it.
    fn release_if_owned(&self, id: &MessageId) {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|turn| &turn.assistant_id == id) {
            *active = None;
        }
    }
}

/// Sink wiring one reveal session to the conversation and the UI channel.
///
/// Every write goes through the conversation's id-checked methods, so a
/// frame that lost a race with cancel-and-resend dies here instead of
/// corrupting a newer turn.
struct TurnSink {
    shared: Arc<Shared>,
    message_id: MessageId,
    sources: Vec<SourceRef>,
}

#[async_trait::async_trait]
impl RevealSink for TurnSink {
    async fn on_frame(&self, frame: RevealFrame) {
        let event = {
            let mut conversation = self.shared.conversation.lock();
            conversation
                .apply_frame(&self.message_id, &frame.stable, &frame.unstable)
                .then(|| ChatEvent::Frame {
                    id: self.message_id.clone(),
                    content: frame.stable,
                    unstable: frame.unstable,
                })
        };
        if let Some(event) = event {
            self.shared.send(event).await;
        }
    }

    async fn on_settled(&self, final_text: &str) {
        let event = {
            let mut conversation = self.shared.conversation.lock();
            conversation
                .settle(&self.message_id, final_text)
                .then(|| ChatEvent::Settled {
                    id: self.message_id.clone(),
                    content: final_text.to_string(),
                    sources: self.sources.clone(),
                })
        };
        if event.is_some() {
            self.shared.release_if_owned(&self.message_id);
        }
        if let Some(event) = event {
            self.shared.send(event).await;
        }
    }
}

/// The engine's front door: one controller per visible conversation.
pub struct ChatController<B: AnswerBackend> {
    config: ChatConfig,
    orchestrator: Arc<RequestOrchestrator<B>>,
    scheduler: RevealScheduler,
    shared: Arc<Shared>,
}

impl<B: AnswerBackend + 'static> ChatController<B> {
    /// Create a controller over the given backend, pushing events to `tx`.
    pub fn new(backend: B, config: ChatConfig, tx: mpsc::Sender<ChatEvent>) -> Self {
        Self::with_history(backend, config, tx, Vec::new())
    }

    /// Create a controller seeded with prior messages from the external
    /// conversation store.
    pub fn with_history(
        backend: B,
        config: ChatConfig,
        tx: mpsc::Sender<ChatEvent>,
        messages: Vec<Message>,
    ) -> Self {
        let scheduler = RevealScheduler::new(config.reveal_interval);
        Self {
            config,
            orchestrator: Arc::new(RequestOrchestrator::new(backend)),
            scheduler,
            shared: Arc::new(Shared {
                conversation: Mutex::new(Conversation::with_messages(messages)),
                active: Mutex::new(None),
                tx,
            }),
        }
    }

    /// Get the conversation ID
    #[must_use]
    pub fn conversation_id(&self) -> ConversationId {
        self.shared.conversation.lock().id()
    }

    /// Whether a turn is currently pending or revealing.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.shared.active.lock().is_some()
    }

    /// Snapshot of every message, for rendering.
    #[must_use]
    pub fn messages(&self) -> Vec<MessageView> {
        self.shared
            .conversation
            .lock()
            .messages()
            .iter()
            .map(MessageView::from)
            .collect()
    }

    /// Probe the answer service, e.g. on mount.
    pub async fn backend_ready(&self) -> bool {
        self.orchestrator.health_check().await
    }

    /// Submit a user turn.
    ///
    /// Any previous turn is torn down first: its token is cancelled (which
    /// aborts the pending network call and stops the reveal) and its
    /// message is frozen as stopped. Only after that teardown is the new
    /// request issued. Returns the IDs of the new user message and
    /// assistant placeholder.
    pub async fn submit(
        &self,
        prompt: impl Into<String>,
        attachment: Option<Attachment>,
    ) -> (MessageId, MessageId) {
        let prompt = prompt.into();
        self.stop_active_turn().await;

        // History is projected before the new user message lands, so the
        // window never includes the turn being composed.
        let history = {
            let conversation = self.shared.conversation.lock();
            conversation.history_window(self.config.history_turns)
        };

        let encoded = attachment.as_ref().map(EncodedAttachment::from);
        let (user_id, assistant_id) = {
            let mut conversation = self.shared.conversation.lock();
            conversation.begin_turn(prompt.clone(), attachment)
        };

        self.shared
            .send(ChatEvent::Message {
                id: user_id.clone(),
                role: Role::User,
                content: prompt.clone(),
            })
            .await;
        self.shared
            .send(ChatEvent::Message {
                id: assistant_id.clone(),
                role: Role::Assistant,
                content: String::new(),
            })
            .await;

        let cancel = CancellationToken::new();
        *self.shared.active.lock() = Some(ActiveTurn {
            assistant_id: assistant_id.clone(),
            cancel: cancel.clone(),
            reveal: None,
        });

        let mut request = AnswerRequest::new(prompt).with_history(history);
        if let Some(encoded) = encoded {
            request = request.with_attachment(encoded);
        }

        self.spawn_driver(request, assistant_id.clone(), cancel);
        (user_id, assistant_id)
    }

    /// Cancel the turn in flight, if any. Safe to call at any time.
    ///
    /// Atomically stops the reveal and aborts the pending request (they
    /// share one token), then freezes the message at whatever content the
    /// scheduler last wrote.
    pub async fn cancel(&self) {
        self.stop_active_turn().await;
    }

    async fn stop_active_turn(&self) {
        let turn = self.shared.active.lock().take();
        let Some(turn) = turn else {
            return;
        };

        tracing::debug!(assistant_id = %turn.assistant_id, "Tearing down active turn");
        turn.cancel.cancel();
        if let Some(reveal) = &turn.reveal {
            reveal.cancel();
        }

        let event = {
            let mut conversation = self.shared.conversation.lock();
            conversation
                .stop(&turn.assistant_id)
                .map(|content| ChatEvent::Stopped {
                    id: turn.assistant_id.clone(),
                    content,
                })
        };
        if let Some(event) = event {
            self.shared.send(event).await;
        }
    }

    /// Drive one turn: await the answer, then start the reveal. Runs on its
    /// own task so `submit` returns immediately.
    fn spawn_driver(&self, request: AnswerRequest, assistant_id: MessageId, cancel: CancellationToken) {
        let orchestrator = Arc::clone(&self.orchestrator);
        let scheduler = self.scheduler.clone();
        let shared = Arc::clone(&self.shared);
        let error_notice = self.config.error_notice.clone();
        let empty_reply_notice = self.config.empty_reply_notice.clone();

        tokio::spawn(async move {
            match orchestrator.send_with(request, cancel.clone()).await {
                Ok(reply) => {
                    let revealing = {
                        let mut conversation = shared.conversation.lock();
                        conversation.begin_reveal(&assistant_id)
                    };
                    if !revealing {
                        // Cancelled or superseded while the reply was in
                        // flight; the message is already frozen.
                        tracing::debug!(assistant_id = %assistant_id, "Dropping stale reply");
                        return;
                    }

                    let sink = Arc::new(TurnSink {
                        shared: Arc::clone(&shared),
                        message_id: assistant_id.clone(),
                        sources: reply.sources,
                    });
                    let handle =
                        scheduler.spawn_with_token(reply.text, sink, cancel.clone());

                    let mut active = shared.active.lock();
                    match active.as_mut() {
                        Some(turn) if turn.assistant_id == assistant_id => {
                            turn.reveal = Some(handle);
                        }
                        // A newer turn owns the slot; our token is already
                        // cancelled, this just drops the handle eagerly.
                        _ => handle.cancel(),
                    }
                }
                Err(SendError::Cancelled) => {
                    // Not an error: the teardown path already froze the
                    // message and notified the UI.
                    tracing::debug!(assistant_id = %assistant_id, "Turn cancelled in flight");
                }
                Err(error) => {
                    let notice = match &error {
                        SendError::EmptyReply => empty_reply_notice,
                        _ => error_notice,
                    };
                    let detail = error.to_string();
                    let event = {
                        let mut conversation = shared.conversation.lock();
                        conversation
                            .fail(&assistant_id, &notice, &detail)
                            .then(|| ChatEvent::Failed {
                                id: assistant_id.clone(),
                                notice,
                                detail,
                            })
                    };
                    if event.is_some() {
                        shared.release_if_owned(&assistant_id);
                    }
                    if let Some(event) = event {
                        shared.send(event).await;
                    }
                }
            }
        });
    }
}
