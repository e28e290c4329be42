//! # SAM Core
//!
//! Domain types, traits, and error definitions for SAM, the situational
//! awareness manager. SAM threads a structured world state through a chat:
//! messages carry inline commands and an embedded state snapshot, and the
//! canonical copy lives in the host's variable store.
//!
//! ## Design Philosophy
//!
//! The host (message storage, variable store, event delivery) is defined here
//! as traits. Implementations live in their own crates, which keeps the
//! interpreter and the reconciliation controller testable against in-memory
//! hosts.

pub mod error;
pub mod event;
pub mod host;
pub mod message;
pub mod path;
pub mod state;
pub mod value;

// Re-export key types at crate root for ergonomics
pub use error::{Error, HostError, PathError, Result};
pub use event::{ChatEvent, EventBus};
pub use host::{Clock, FixedClock, MessageStore, SystemClock, VariableStore};
pub use message::{ChatMessage, ConversationId, Role};
pub use path::{Segment, StatePath};
pub use state::{ScheduleTarget, State, Tick, VolatileEntry};
