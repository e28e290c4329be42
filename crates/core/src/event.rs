//! Chat lifecycle events delivered by the host.
//!
//! The host publishes one event per lifecycle change; the reconciliation
//! controller subscribes and decides whether to reprocess, reload or
//! reinitialize state.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All lifecycle events SAM reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// The generator started producing a message
    GenerationStarted,

    /// The generator finished a message
    GenerationEnded,

    /// The generator was interrupted (the partial message may exist)
    GenerationStopped,

    /// The user switched to another swipe of a message
    MessageSwiped { index: usize },

    /// A message's text was edited by hand
    MessageEdited { index: usize },

    /// Another chat was opened
    ChatChanged,
}

impl ChatEvent {
    /// Stable name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ChatEvent::GenerationStarted => "generation_started",
            ChatEvent::GenerationEnded => "generation_ended",
            ChatEvent::GenerationStopped => "generation_stopped",
            ChatEvent::MessageSwiped { .. } => "message_swiped",
            ChatEvent::MessageEdited { .. } => "message_edited",
            ChatEvent::ChatChanged => "chat_changed",
        }
    }
}

/// A broadcast-based event bus for chat events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<ChatEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: ChatEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ChatEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
