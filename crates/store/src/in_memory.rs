//! In-memory chat host — useful for testing and embedding.

use async_trait::async_trait;
use serde_json::Value;
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::RwLock;

use sam_core::{ChatMessage, ConversationId, HostError, MessageStore, Role, VariableStore};

use crate::transcript::Transcript;

/// A chat held entirely in memory.
///
/// Besides the host traits it exposes the mutations a chat frontend performs
/// (new messages, swipes, edits, switching chats) so tests can drive it.
#[derive(Clone)]
pub struct InMemoryChat {
    chat: Arc<RwLock<Transcript>>,
}

impl InMemoryChat {
    pub fn new(id: ConversationId) -> Self {
        Self::from_transcript(Transcript::new(id))
    }

    pub fn from_transcript(transcript: Transcript) -> Self {
        Self {
            chat: Arc::new(RwLock::new(transcript)),
        }
    }

    /// A copy of the whole chat.
    pub async fn snapshot(&self) -> Transcript {
        self.chat.read().await.clone()
    }

    /// Append a message. Returns its index.
    pub async fn push(&self, role: Role, text: impl Into<String>) -> usize {
        self.chat.write().await.push(role, text)
    }

    /// Add an alternate generation to a message and make it active.
    pub async fn add_swipe(&self, index: usize, text: impl Into<String>) -> Result<usize, HostError> {
        Ok(self.chat.write().await.message_mut(index)?.add_swipe(text))
    }

    /// Make an existing swipe active.
    pub async fn select_swipe(&self, index: usize, swipe_id: usize) -> Result<(), HostError> {
        let mut chat = self.chat.write().await;
        let message = chat.message_mut(index)?;
        if !message.select_swipe(swipe_id) {
            return Err(HostError::Storage(format!(
                "message {index} has no swipe {swipe_id}"
            )));
        }
        Ok(())
    }

    /// Drop the newest message (a deleted or failed generation).
    pub async fn pop(&self) -> Option<ChatMessage> {
        self.chat.write().await.messages.pop()
    }

    /// Replace the open chat with another one.
    pub async fn switch_to(&self, transcript: Transcript) {
        *self.chat.write().await = transcript;
    }
}

impl Default for InMemoryChat {
    fn default() -> Self {
        Self::new(ConversationId::new())
    }
}

#[async_trait]
impl MessageStore for InMemoryChat {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn conversation_id(&self) -> Result<ConversationId, HostError> {
        Ok(self.chat.read().await.id.clone())
    }

    async fn len(&self) -> Result<usize, HostError> {
        Ok(self.chat.read().await.messages.len())
    }

    async fn message(&self, index: usize) -> Result<ChatMessage, HostError> {
        self.chat.read().await.message(index).cloned()
    }

    async fn messages(&self, range: Range<usize>) -> Result<Vec<ChatMessage>, HostError> {
        Ok(self.chat.read().await.slice(range))
    }

    async fn set_message(&self, index: usize, text: String) -> Result<(), HostError> {
        self.chat.write().await.message_mut(index)?.set_text(text);
        Ok(())
    }
}

#[async_trait]
impl VariableStore for InMemoryChat {
    async fn variables(&self) -> Result<Value, HostError> {
        Ok(self.chat.read().await.variables())
    }

    async fn replace_variables(&self, variables: Value) -> Result<(), HostError> {
        self.chat.write().await.variables = variables;
        Ok(())
    }
}
