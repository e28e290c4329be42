//! Error types for the SAM domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all SAM operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Host collaborator errors ---
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    // --- State path errors ---
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures reported by the host's message store or variable store.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    #[error("Message index {index} out of range (chat has {len} messages)")]
    MessageOutOfRange { index: usize, len: usize },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Variable store error: {0}")]
    Variables(String),
}

/// Failures resolving or writing a dotted path inside the state tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("path '{path}' has an empty segment")]
    EmptySegment { path: String },

    #[error("path '{path}' has a malformed index")]
    BadIndex { path: String },

    #[error("cannot address key '{key}' inside an array at '{path}'")]
    KeyOnArray { path: String, key: String },

    #[error("index {index} at '{path}' is too far past the end of the array")]
    IndexTooLarge { path: String, index: usize },
}
