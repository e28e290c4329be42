//! The serializable chat document shared by both backends.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::Range;

use sam_core::{ChatMessage, ConversationId, HostError, Role};

/// A whole chat: its messages plus the canonical variable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: ConversationId,

    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    #[serde(default = "empty_object")]
    pub variables: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Transcript {
    pub fn new(id: ConversationId) -> Self {
        Self {
            id,
            messages: Vec::new(),
            variables: empty_object(),
        }
    }

    /// Append a message, numbering it by position. Returns its index.
    pub fn push(&mut self, role: Role, text: impl Into<String>) -> usize {
        let index = self.messages.len();
        self.messages.push(ChatMessage::new(index, role, text));
        index
    }

    pub fn message(&self, index: usize) -> Result<&ChatMessage, HostError> {
        let len = self.messages.len();
        self.messages
            .get(index)
            .ok_or(HostError::MessageOutOfRange { index, len })
    }

    pub fn message_mut(&mut self, index: usize) -> Result<&mut ChatMessage, HostError> {
        let len = self.messages.len();
        self.messages
            .get_mut(index)
            .ok_or(HostError::MessageOutOfRange { index, len })
    }

    /// Messages in `range`, clamped to the chat length.
    pub fn slice(&self, range: Range<usize>) -> Vec<ChatMessage> {
        let end = range.end.min(self.messages.len());
        let start = range.start.min(end);
        self.messages[start..end].to_vec()
    }

    /// Variable store contents, with `null` read as an empty object.
    pub fn variables(&self) -> Value {
        match &self.variables {
            Value::Null => empty_object(),
            other => other.clone(),
        }
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(ConversationId::new())
    }
}
