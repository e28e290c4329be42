//! Reconciliation — keeps a chat's canonical state consistent with its
//! messages as the chat changes.
//!
//! The host fires lifecycle events; the [`Reconciler`] reacts:
//!
//! | Event | Action |
//! |---|---|
//! | generation ended / stopped | process the last message: promote, apply, embed |
//! | message swiped | reload the nearest embedded state at or before the message |
//! | message edited | reload from the latest non-user message |
//! | chat changed | reset the session and reload from the latest non-user message |
//! | generation started | record where the generation began |
//!
//! Processing applies commands; reloading never does. Each conversation has
//! its own [`Session`] and lock, so handlers for one chat run one at a time.

mod controller;
mod session;

pub use controller::{Outcome, Reconciler};
pub use session::{Session, Watermark};

use sam_config::ReconcileConfig;
use sam_core::{EventBus, HostError};

/// Controller behavior, usually taken from `[reconcile]` in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Leave command tokens in the narrative when embedding the block.
    pub keep_commands: bool,
    /// Yield once before handling a swipe.
    pub defer_swipe: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            keep_commands: false,
            defer_swipe: true,
        }
    }
}

impl From<&ReconcileConfig> for ReconcileOptions {
    fn from(config: &ReconcileConfig) -> Self {
        Self {
            keep_commands: config.keep_commands,
            defer_swipe: config.defer_swipe,
        }
    }
}

/// An event bus sized by `[reconcile] event_capacity`.
pub fn event_bus(config: &ReconcileConfig) -> EventBus {
    EventBus::new(config.event_capacity)
}

/// Errors from a single handler run.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("host error: {0}")]
    Host(#[from] HostError),

    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ReconcileError> for sam_core::Error {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::Host(e) => sam_core::Error::Host(e),
            ReconcileError::Serialization(e) => sam_core::Error::Serialization(e),
        }
    }
}

pub type ReconcileResult<T> = std::result::Result<T, ReconcileError>;
