//! Reveal Core - Headless Assistant-Reply Reveal Engine
//!
//! The upstream answer service is non-streaming: one request, one complete
//! reply. This crate presents that reply to a UI as if it were arriving
//! incrementally, guarantees that partially-revealed text never shows
//! syntactically broken markup, and lets the user cancel mid-reveal at any
//! point without corrupting subsequent turns.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        UI Surface                             │
//! │            submit(prompt, attachment) / cancel()              │
//! │                    ChatEvent (down, mpsc)                     │
//! └───────────────────────────┬──────────────────────────────────┘
//!                             │
//! ┌───────────────────────────┼──────────────────────────────────┐
//! │                    ChatController                             │
//! │  ┌────────────┐  ┌───────────────┐  ┌──────────────────────┐ │
//! │  │Conversation│  │    Request    │  │   RevealScheduler    │ │
//! │  │ + history  │  │ Orchestrator  │  │  ticks → splitter →  │ │
//! │  │   window   │  │ (one in-flight│  │  stable / unstable   │ │
//! │  │            │  │  call, token) │  │       frames         │ │
//! │  └────────────┘  └───────┬───────┘  └──────────────────────┘ │
//! └──────────────────────────┼───────────────────────────────────┘
//!                            │
//!                   AnswerBackend (HTTP)
//! ```
//!
//! # Key Types
//!
//! - [`ChatController`]: conversation-scoped front door; owns the single
//!   active turn and its cancellation token
//! - [`RevealScheduler`]: cancellable fixed-cadence reveal of a complete
//!   reply
//! - [`split_stable`]: divides a growing prefix into a renderable head and
//!   a withheld tail
//! - [`RequestOrchestrator`]: single-flight answer requests with a typed
//!   cancellation outcome
//! - [`Conversation`]: ordered messages, the single-active-assistant
//!   invariant, and the history window projection
//!
//! # Quick Start
//!
//! ```ignore
//! use reveal_core::{ChatConfig, ChatController, ChatEvent, HttpAnswerBackend};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Channel the engine pushes events through
//!     let (tx, mut rx) = mpsc::channel(100);
//!
//!     // Controller over the HTTP answer service
//!     let backend = HttpAnswerBackend::from_env();
//!     let config = ChatConfig::from_env();
//!     let controller = ChatController::new(backend, config, tx);
//!
//!     // Submit a turn; the reply reveals tick by tick
//!     controller.submit("Hello!", None).await;
//!
//!     // Render events as they arrive
//!     while let Some(event) = rx.recv().await {
//!         match event {
//!             ChatEvent::Frame { content, unstable, .. } => {
//!                 // content is safe to format; unstable is the in-flight tail
//!             }
//!             ChatEvent::Settled { content, .. } => {
//!                 // the literal full reply
//!             }
//!             _ => {}
//!         }
//!     }
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`markdown`]: stability splitting of partially-revealed rich text
//! - [`scheduler`]: the cancellable reveal tick loop
//! - [`orchestrator`]: single-flight request handling and error taxonomy
//! - [`message`]: message lifecycle state machine
//! - [`conversation`]: conversation state and history projection
//! - [`controller`]: the conversation-scoped controller
//! - [`backend`]: answer service trait and HTTP implementation
//! - [`events`]: engine-to-UI events and snapshots
//! - [`config`]: defaults, TOML file, environment overrides
//!
//! # No UI Dependencies
//!
//! This crate has **zero** dependencies on any rendering or UI framework.
//! How the stable prefix is styled, and how the unstable tail is shown, is
//! entirely the surface's concern.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod events;
pub mod markdown;
pub mod message;
pub mod orchestrator;
pub mod scheduler;

// Re-exports for convenience
pub use backend::{
    AnswerBackend, AnswerReply, AnswerRequest, EncodedAttachment, HttpAnswerBackend, SourceRef,
    Turn, UpstreamRole,
};
pub use config::{
    default_config_path, load_config, ChatConfig, ConfigError, DEFAULT_EMPTY_REPLY_NOTICE,
    DEFAULT_ERROR_NOTICE,
};
pub use controller::ChatController;
pub use conversation::{Conversation, ConversationId};
pub use events::{ChatEvent, MessageView};
pub use markdown::{split_stable, StableSplit};
pub use message::{Attachment, Lifecycle, Message, MessageId, Role};
pub use orchestrator::{RequestOrchestrator, SendError};
pub use scheduler::{RevealFrame, RevealHandle, RevealScheduler, RevealSink};
