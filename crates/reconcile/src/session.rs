//! Per-conversation controller state.

use sha2::{Digest, Sha256};

/// The last message the controller wrote or reloaded, identified by position
/// and by a digest of its text.
#[derive(Clone, PartialEq, Eq)]
pub struct Watermark {
    pub index: usize,
    pub digest: [u8; 32],
}

impl Watermark {
    pub fn of(index: usize, text: &str) -> Self {
        Self {
            index,
            digest: digest(text),
        }
    }

    /// Whether the message at `index` with `text` is the one recorded.
    pub fn covers(&self, index: usize, text: &str) -> bool {
        self.index == index && self.digest == digest(text)
    }
}

impl std::fmt::Debug for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let short: String = self.digest[..4].iter().map(|b| format!("{b:02x}")).collect();
        write!(f, "Watermark({} @ {short})", self.index)
    }
}

fn digest(text: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}

/// What the controller remembers about one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Last message processed or reloaded.
    pub watermark: Option<Watermark>,
    /// Index of the newest message when the current generation started.
    ///
    /// The watermark decides whether a generation end is skipped; this only
    /// tells a failed generation apart from a repeated end event.
    pub generation_start: Option<usize>,
}

impl Session {
    /// Whether `text` at `index` was already handled.
    pub fn is_current(&self, index: usize, text: &str) -> bool {
        self.watermark
            .as_ref()
            .is_some_and(|mark| mark.covers(index, text))
    }
}
