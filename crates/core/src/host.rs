//! Host collaborator traits.
//!
//! SAM does not own chat storage. The host exposes its messages, its
//! per-chat variable store and a clock through these traits; reference
//! implementations live in `sam-store`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::ops::Range;
use std::sync::RwLock;

use crate::error::HostError;
use crate::message::{ChatMessage, ConversationId};

/// Read/write access to the active chat's messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// The backend name (e.g., "in_memory", "file").
    fn name(&self) -> &str;

    /// Identifier of the chat currently open in the host.
    async fn conversation_id(&self) -> Result<ConversationId, HostError>;

    /// Number of messages in the chat.
    async fn len(&self) -> Result<usize, HostError>;

    async fn is_empty(&self) -> Result<bool, HostError> {
        Ok(self.len().await? == 0)
    }

    /// Index of the newest message, if any.
    async fn last_index(&self) -> Result<Option<usize>, HostError> {
        Ok(self.len().await?.checked_sub(1))
    }

    /// Fetch one message. Out-of-range indices are an error.
    async fn message(&self, index: usize) -> Result<ChatMessage, HostError>;

    /// Fetch a range of messages, clamped to the chat length.
    async fn messages(&self, range: Range<usize>) -> Result<Vec<ChatMessage>, HostError>;

    /// Overwrite the text of the message at `index`.
    async fn set_message(&self, index: usize, text: String) -> Result<(), HostError>;
}

/// Whole-object access to the chat's structured variable store.
#[async_trait]
pub trait VariableStore: Send + Sync {
    /// Current contents (an empty object if nothing was stored yet).
    async fn variables(&self) -> Result<serde_json::Value, HostError>;

    /// Replace the contents wholesale.
    async fn replace_variables(&self, variables: serde_json::Value) -> Result<(), HostError>;
}

/// Wall-clock source for game-time schedules.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: RwLock::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}
