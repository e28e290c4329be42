//! Typed commands — the five mutations a message can request.

use serde_json::Value;
use tracing::warn;

use sam_core::value::coerce_scalar;

use crate::parser::{self, RawCommand};
use crate::ScriptError;

/// The command keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Set,
    Add,
    TimedSet,
    ResponseSummary,
    CancelSet,
}

impl CommandKind {
    pub const ALL: [CommandKind; 5] = [
        CommandKind::Set,
        CommandKind::Add,
        CommandKind::TimedSet,
        CommandKind::ResponseSummary,
        CommandKind::CancelSet,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            CommandKind::Set => "SET",
            CommandKind::Add => "ADD",
            CommandKind::TimedSet => "TIMED_SET",
            CommandKind::ResponseSummary => "RESPONSE_SUMMARY",
            CommandKind::CancelSet => "CANCEL_SET",
        }
    }

    /// Exact, case-sensitive keyword lookup.
    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.keyword() == word)
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A validated command, ready for the interpreter.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Write `value` at `path`.
    Set { path: String, value: Value },
    /// Add `delta` to the number at `path`, or append it to an array.
    Add { path: String, delta: String },
    /// Schedule a write for a later round or time.
    TimedSet {
        path: String,
        value: Value,
        reason: String,
        game_time: bool,
        time_units: String,
    },
    /// Append a summary line.
    ResponseSummary(String),
    /// Drop scheduled writes by position, variable name or reason.
    CancelSet { identifier: String },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Set { .. } => CommandKind::Set,
            Command::Add { .. } => CommandKind::Add,
            Command::TimedSet { .. } => CommandKind::TimedSet,
            Command::ResponseSummary(_) => CommandKind::ResponseSummary,
            Command::CancelSet { .. } => CommandKind::CancelSet,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |v: &Value| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match self {
            Command::Set { path, value } => write!(f, "<SET :: {path} :: {}>", show(value)),
            Command::Add { path, delta } => write!(f, "<ADD :: {path} :: {delta}>"),
            Command::TimedSet {
                path,
                value,
                reason,
                game_time,
                time_units,
            } => write!(
                f,
                "<TIMED_SET :: {path} :: {} :: {reason} :: {game_time} :: {time_units}>",
                show(value)
            ),
            Command::ResponseSummary(text) => write!(f, "<RESPONSE_SUMMARY :: {text}>"),
            Command::CancelSet { identifier } => write!(f, "<CANCEL_SET :: {identifier}>"),
        }
    }
}

impl TryFrom<RawCommand<'_>> for Command {
    type Error = ScriptError;

    fn try_from(raw: RawCommand<'_>) -> Result<Self, Self::Error> {
        let kind = raw.kind;
        let fields: Vec<&str> = raw.params.split("::").map(str::trim).collect();
        let malformed = |reason: &str| ScriptError::Malformed {
            kind,
            reason: reason.to_string(),
        };
        let path = || match fields.first() {
            Some(path) if !path.is_empty() => Ok(path.to_string()),
            _ => Err(malformed("missing variable name")),
        };

        match kind {
            CommandKind::ResponseSummary => Ok(Command::ResponseSummary(raw.params.trim().to_string())),
            CommandKind::Set => {
                let path = path()?;
                let value = fields.get(1).ok_or_else(|| malformed("missing value"))?;
                Ok(Command::Set {
                    path,
                    value: coerce_scalar(value),
                })
            }
            CommandKind::Add => {
                let path = path()?;
                let delta = fields.get(1).ok_or_else(|| malformed("missing increment"))?;
                Ok(Command::Add {
                    path,
                    delta: delta.to_string(),
                })
            }
            CommandKind::TimedSet => {
                let path = path()?;
                let [_, value, reason, game_time, time_units] = match fields.get(..5) {
                    Some(&[a, b, c, d, e]) => [a, b, c, d, e],
                    _ => return Err(malformed("expected 5 fields")),
                };
                if [value, reason, game_time, time_units].iter().any(|f| f.is_empty()) {
                    return Err(malformed("empty field"));
                }
                Ok(Command::TimedSet {
                    path,
                    value: coerce_scalar(value),
                    reason: reason.to_string(),
                    game_time: game_time.eq_ignore_ascii_case("true"),
                    time_units: time_units.to_string(),
                })
            }
            CommandKind::CancelSet => Ok(Command::CancelSet { identifier: path()? }),
        }
    }
}

/// Scan `text` and convert every well-formed command.
///
/// Malformed commands are logged and skipped.
pub fn parse_commands(text: &str) -> impl Iterator<Item = Command> + '_ {
    parser::scan(text).filter_map(|raw| match Command::try_from(raw) {
        Ok(command) => Some(command),
        Err(e) => {
            warn!(error = %e, params = raw.params, "Skipping malformed command");
            None
        }
    })
}
