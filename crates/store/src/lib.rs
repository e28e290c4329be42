//! Reference chat hosts for SAM.
//!
//! A real host (a chat frontend) owns its messages and variable store. These
//! backends stand in for one: [`InMemoryChat`] for tests and embedding,
//! [`FileChat`] for the CLI, where a chat is a single JSON document:
//!
//! ```json
//! { "id": "chat-1", "messages": [ { "message_id": 0, "role": "user", "message": "..." } ], "variables": {} }
//! ```

pub mod file;
pub mod in_memory;
mod transcript;

pub use file::FileChat;
pub use in_memory::InMemoryChat;
pub use transcript::Transcript;
