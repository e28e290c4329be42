//! Command interpreter — applies a batch of commands to a [`State`].
//!
//! Commands run in list order. Each one is isolated: a failure is logged,
//! recorded in the [`ApplyReport`], and the batch moves on.

use serde_json::Value;
use tracing::{debug, warn};

use sam_core::value::{number_value, numeric_reading, parse_number};
use sam_core::{ScheduleTarget, State, StatePath, Tick, VolatileEntry};

use crate::ScriptError;
use crate::command::Command;

/// What happened to one command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Applied,
    /// Well-formed but had nothing to act on.
    Skipped(String),
    Failed(ScriptError),
}

/// Per-command results of one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub entries: Vec<(Command, CommandOutcome)>,
}

impl ApplyReport {
    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, CommandOutcome::Applied))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, CommandOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, CommandOutcome::Failed(_)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn count(&self, pred: impl Fn(&CommandOutcome) -> bool) -> usize {
        self.entries.iter().filter(|(_, o)| pred(o)).count()
    }
}

impl std::fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} applied, {} skipped, {} failed",
            self.applied(),
            self.skipped(),
            self.failed()
        )
    }
}

/// Applies commands at a fixed point of the narrative clock.
#[derive(Debug, Clone, Copy)]
pub struct Interpreter {
    tick: Tick,
}

impl Interpreter {
    /// An interpreter whose TIMED_SET targets are relative to `tick`.
    pub fn at(tick: Tick) -> Self {
        Self { tick }
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Apply `commands` to `state` in order.
    pub fn apply(&self, state: &mut State, commands: impl IntoIterator<Item = Command>) -> ApplyReport {
        let mut report = ApplyReport::default();
        for command in commands {
            let outcome = match self.execute(state, &command) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(command = %command, error = %e, "Command failed");
                    CommandOutcome::Failed(e)
                }
            };
            if let CommandOutcome::Skipped(reason) = &outcome {
                debug!(command = %command, reason = %reason, "Command skipped");
            }
            report.entries.push((command, outcome));
        }

        debug!(
            round = self.tick.round,
            applied = report.applied(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Applied command batch"
        );
        report
    }

    fn execute(&self, state: &mut State, command: &Command) -> Result<CommandOutcome, ScriptError> {
        match command {
            Command::Set { path, value } => {
                StatePath::parse(path)?.set(&mut state.vars, value.clone())?;
                Ok(CommandOutcome::Applied)
            }
            Command::Add { path, delta } => add(state, path, delta),
            Command::TimedSet {
                path,
                value,
                reason,
                game_time,
                time_units,
            } => {
                let path = StatePath::parse(path)?;
                let target = self.schedule_target(*game_time, time_units)?;
                state.volatile.push(VolatileEntry {
                    var_name: path.as_str().to_string(),
                    value: value.clone(),
                    target,
                    reason: reason.clone(),
                });
                Ok(CommandOutcome::Applied)
            }
            Command::ResponseSummary(text) => {
                state.response_summary.push(text.clone());
                Ok(CommandOutcome::Applied)
            }
            Command::CancelSet { identifier } => Ok(cancel(state, identifier)),
        }
    }

    fn schedule_target(&self, game_time: bool, time_units: &str) -> Result<ScheduleTarget, ScriptError> {
        let invalid = || ScriptError::InvalidTime(time_units.to_string());
        if game_time {
            return ScheduleTarget::parse_game_time(time_units)
                .map(ScheduleTarget::GameTime)
                .ok_or_else(invalid);
        }
        let rounds: i64 = time_units.trim().parse().map_err(|_| invalid())?;
        Ok(ScheduleTarget::Round(self.tick.round.saturating_add(rounds)))
    }
}

fn add(state: &mut State, path: &str, delta: &str) -> Result<CommandOutcome, ScriptError> {
    let path = StatePath::parse(path)?;
    if let Some(Value::Array(items)) = path.get_mut(&mut state.vars) {
        items.push(Value::String(delta.to_string()));
        return Ok(CommandOutcome::Applied);
    }

    let base = match path.get(&state.vars) {
        None => Some(0.0),
        Some(current) => numeric_reading(current),
    };
    let Some(base) = base else {
        return Ok(CommandOutcome::Skipped(format!("current value at '{path}' is not numeric")));
    };
    let Some(delta) = parse_number(delta) else {
        return Ok(CommandOutcome::Skipped(ScriptError::NonNumeric(delta.to_string()).to_string()));
    };

    let sum = base + delta;
    if !sum.is_finite() {
        return Err(ScriptError::NonNumeric(sum.to_string()));
    }
    path.set(&mut state.vars, number_value(sum))?;
    Ok(CommandOutcome::Applied)
}

fn cancel(state: &mut State, identifier: &str) -> CommandOutcome {
    if state.volatile.is_empty() {
        return CommandOutcome::Skipped("no scheduled writes".into());
    }

    match identifier.parse::<usize>() {
        Ok(index) if index < state.volatile.len() => {
            let removed = state.volatile.remove(index);
            debug!(index, var = %removed.var_name, "Canceled scheduled write");
            CommandOutcome::Applied
        }
        _ => {
            let before = state.volatile.len();
            state.volatile.retain(|entry| !entry.matches(identifier));
            let removed = before - state.volatile.len();
            if removed == 0 {
                CommandOutcome::Skipped(format!("no scheduled write matches '{identifier}'"))
            } else {
                debug!(identifier, removed, "Canceled scheduled writes");
                CommandOutcome::Applied
            }
        }
    }
}
