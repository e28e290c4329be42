//! State block codec — the JSON snapshot embedded at the end of a message.
//!
//! ```text
//! The storm passes.
//!
//! <!--<|state|>
//! {
//!   "static": { "hp": 7 },
//!   "volatile": [],
//!   "responseSummary": []
//! }
//! </|state|>-->
//! ```
//!
//! Parsing takes the *first* block (shortest match between the markers).
//! Stripping removes everything from the first start marker to the *last*
//! end marker, so duplicate or stray blocks are erased together.

use sam_core::State;
use tracing::{debug, warn};

/// Opening marker of an embedded state block.
pub const STATE_BLOCK_START: &str = "<!--<|state|>";
/// Closing marker of an embedded state block.
pub const STATE_BLOCK_END: &str = "</|state|>-->";

/// Decode the first embedded state block in `text`.
///
/// Returns `None` when there is no block, the block is empty, or its JSON
/// does not decode into a [`State`].
pub fn parse_block(text: &str) -> Option<State> {
    let body_start = text.find(STATE_BLOCK_START)? + STATE_BLOCK_START.len();
    let body_end = body_start + text[body_start..].find(STATE_BLOCK_END)?;
    let body = text[body_start..body_end].trim();
    if body.is_empty() {
        debug!("State block is empty");
        return None;
    }

    match serde_json::from_str::<State>(body) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!(error = %e, "Failed to parse state block JSON");
            None
        }
    }
}

/// Remove every embedded block, from the first start marker to the last end
/// marker.
pub fn strip_blocks(text: &str) -> String {
    let Some(start) = text.find(STATE_BLOCK_START) else {
        return text.to_string();
    };
    match text.rfind(STATE_BLOCK_END) {
        Some(end) if end >= start + STATE_BLOCK_START.len() => {
            let mut out = String::with_capacity(text.len());
            out.push_str(&text[..start]);
            out.push_str(&text[end + STATE_BLOCK_END.len()..]);
            out
        }
        _ => text.to_string(),
    }
}

/// Render a state as a block: markers around pretty-printed JSON.
pub fn render_block(state: &State) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string_pretty(state)?;
    Ok(format!("{STATE_BLOCK_START}\n{json}\n{STATE_BLOCK_END}"))
}

/// Replace any blocks in `narrative` with a fresh block for `state`.
pub fn embed_block(narrative: &str, state: &State) -> Result<String, serde_json::Error> {
    let clean = strip_blocks(narrative);
    Ok(format!("{}\n\n{}", clean.trim(), render_block(state)?))
}
