//! Volatile schedule — promotes due entries into immediate writes.

use tracing::debug;

use sam_core::{State, Tick};

use crate::command::Command;

/// Remove every due entry from `state.volatile` and return them as `SET`s.
///
/// Relative order is kept on both sides: promoted commands come out in the
/// order they were scheduled, and entries that are not yet due stay in place.
pub fn promote_due(state: &mut State, tick: &Tick) -> Vec<Command> {
    let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut state.volatile)
        .into_iter()
        .partition(|entry| entry.is_due(tick));
    state.volatile = pending;

    if !due.is_empty() {
        debug!(
            round = tick.round,
            promoted = due.len(),
            pending = state.volatile.len(),
            "Promoting scheduled writes"
        );
    }

    due.into_iter()
        .map(|entry| Command::Set {
            path: entry.var_name,
            value: entry.value,
        })
        .collect()
}
