//! Chat message types as exposed by the host.
//!
//! The host owns message storage. SAM only sees a read model of each message
//! (role, current text, alternate swipes) and can overwrite the text.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (chat).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The player
    User,
    /// The narrative generator
    Assistant,
    /// Host-injected narration or instructions
    System,
}

/// A single message in a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Position of the message in the chat.
    pub message_id: usize,

    /// Who sent this message
    pub role: Role,

    /// The current text content
    pub message: String,

    /// Alternate generations for this position
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub swipes: Vec<String>,

    /// Which swipe is active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swipe_id: Option<usize>,
}

impl ChatMessage {
    /// Create a new user message.
    pub fn user(message_id: usize, text: impl Into<String>) -> Self {
        Self::new(message_id, Role::User, text)
    }

    /// Create a new generator message.
    pub fn assistant(message_id: usize, text: impl Into<String>) -> Self {
        Self::new(message_id, Role::Assistant, text)
    }

    pub fn new(message_id: usize, role: Role, text: impl Into<String>) -> Self {
        Self {
            message_id,
            role,
            message: text.into(),
            swipes: Vec::new(),
            swipe_id: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Text of the active swipe, falling back to `message`.
    pub fn active_text(&self) -> &str {
        self.swipes
            .get(self.swipe_id.unwrap_or(0))
            .map(String::as_str)
            .unwrap_or(&self.message)
    }

    /// Overwrite the text, keeping the active swipe in sync.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        let active = self.swipe_id.unwrap_or(0);
        if let Some(swipe) = self.swipes.get_mut(active) {
            swipe.clone_from(&text);
        }
        self.message = text;
    }

    /// Append an alternate generation and make it active.
    ///
    /// A message without swipes first records its current text as swipe 0.
    pub fn add_swipe(&mut self, text: impl Into<String>) -> usize {
        if self.swipes.is_empty() {
            self.swipes.push(self.message.clone());
        }
        self.swipes.push(text.into());
        let swipe_id = self.swipes.len() - 1;
        self.select_swipe(swipe_id);
        swipe_id
    }

    /// Switch to another swipe, making it the current text.
    ///
    /// Returns `false` if the swipe does not exist.
    pub fn select_swipe(&mut self, swipe_id: usize) -> bool {
        match self.swipes.get(swipe_id) {
            Some(text) => {
                self.message = text.clone();
                self.swipe_id = Some(swipe_id);
                true
            }
            None => false,
        }
    }
}
