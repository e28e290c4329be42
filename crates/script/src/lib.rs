//! SAM Script — the inline command language and the state block codec.
//!
//! Assistant messages carry two kinds of markup. Inline commands request
//! mutations; the state block records the world after they were applied.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Schedule    │──▶│   Parser     │──▶│ Interpreter  │──▶│    Codec     │
//! │ promote_due  │   │ parse_cmds   │   │   apply      │   │ embed_block  │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//!   due volatiles      typed commands     [promoted..,       strip old block,
//!   become SETs        from the text       parsed..]         append new one
//! ```
//!
//! # Example
//!
//! ```text
//! The goblin strikes! <ADD :: player.hp :: -4>
//! <TIMED_SET :: door.open :: true :: lever :: false :: 2>
//! <RESPONSE_SUMMARY :: the party fought a goblin>
//! ```

pub mod codec;
mod command;
mod interpreter;
mod parser;
mod schedule;

pub use codec::{STATE_BLOCK_END, STATE_BLOCK_START, embed_block, parse_block, render_block, strip_blocks};
pub use command::{Command, CommandKind, parse_commands};
pub use interpreter::{ApplyReport, CommandOutcome, Interpreter};
pub use parser::{CommandScanner, RawCommand, scan, strip_commands};
pub use schedule::promote_due;

use sam_core::PathError;

/// Errors raised while converting or applying a single command.
///
/// These never escape a batch: the interpreter records them per command.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("malformed {kind} command: {reason}")]
    Malformed { kind: CommandKind, reason: String },

    #[error("invalid schedule time '{0}'")]
    InvalidTime(String),

    #[error("'{0}' is not a number")]
    NonNumeric(String),

    #[error("path error: {0}")]
    Path(#[from] PathError),
}
