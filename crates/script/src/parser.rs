//! Inline command scanner.
//!
//! Narrative text may carry commands anywhere in its body:
//!
//! ```text
//! The goblin strikes! <ADD :: player.hp :: -4>
//! <TIMED_SET :: door.open :: 1 :: lever pulled :: false :: 2>
//! <RESPONSE_SUMMARY :: the party fought a goblin>
//! ```
//!
//! Grammar (informal):
//! ```text
//! command  = "<" KEYWORD WS* "::" WS* params ">"
//! KEYWORD  = "SET" | "ADD" | "TIMED_SET" | "RESPONSE_SUMMARY" | "CANCEL_SET"
//! params   = any text up to the first ">"
//! ```
//!
//! Matching is global and non-overlapping. Brackets that do not form a
//! command are narrative text and are skipped without error.

use std::ops::Range;

use crate::command::CommandKind;

/// A command as it appears in the text, before its fields are split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCommand<'a> {
    pub kind: CommandKind,
    /// Everything between the leading `::` and the closing `>`.
    pub params: &'a str,
    /// Byte span of the whole `<...>` token.
    pub span: (usize, usize),
}

impl RawCommand<'_> {
    pub fn span(&self) -> Range<usize> {
        self.span.0..self.span.1
    }
}

/// A lazy, restartable scan over the commands in a text.
///
/// Cloning the scanner restarts from the clone's position.
#[derive(Debug, Clone)]
pub struct CommandScanner<'a> {
    text: &'a str,
    pos: usize,
}

/// Scan `text` for inline commands.
pub fn scan(text: &str) -> CommandScanner<'_> {
    CommandScanner { text, pos: 0 }
}

impl<'a> Iterator for CommandScanner<'a> {
    type Item = RawCommand<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.text.len() {
            let open = self.pos + self.text[self.pos..].find('<')?;
            match match_at(self.text, open) {
                Some(raw) => {
                    self.pos = raw.span.1;
                    return Some(raw);
                }
                None => self.pos = open + 1,
            }
        }
        None
    }
}

fn match_at(text: &str, open: usize) -> Option<RawCommand<'_>> {
    let rest = &text[open + 1..];
    let keyword_len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count();
    let kind = CommandKind::from_keyword(&rest[..keyword_len])?;

    let after_keyword = rest[keyword_len..].trim_start();
    let after_sep = after_keyword.strip_prefix("::")?.trim_start();
    let close = after_sep.find('>')?;

    let params_start = text.len() - after_sep.len();
    let params_end = params_start + close;
    Some(RawCommand {
        kind,
        params: &text[params_start..params_end],
        span: (open, params_end + 1),
    })
}

/// Remove every recognized command token from `text`.
pub fn strip_commands(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for raw in scan(text) {
        out.push_str(&text[last..raw.span.0]);
        last = raw.span.1;
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<CommandKind> {
        scan(text).map(|c| c.kind).collect()
    }

    #[test]
    fn finds_all_five_kinds_in_order() {
        let text = "<SET :: a :: 1> x <ADD :: b :: 2> <TIMED_SET :: c :: 3 :: r :: false :: 1>\
                    <RESPONSE_SUMMARY :: done> <CANCEL_SET :: r>";
        assert_eq!(
            kinds(text),
            vec![
                CommandKind::Set,
                CommandKind::Add,
                CommandKind::TimedSet,
                CommandKind::ResponseSummary,
                CommandKind::CancelSet,
            ]
        );
    }

    #[test]
    fn params_skip_leading_whitespace_and_stop_at_first_close() {
        let raw = scan("<SET   ::   hp :: 10 > trailing>").next().unwrap();
        assert_eq!(raw.params, "hp :: 10 ");
        assert_eq!(raw.kind, CommandKind::Set);
    }

    #[test]
    fn separator_may_touch_keyword() {
        let raw = scan("<ADD::gold::5>").next().unwrap();
        assert_eq!(raw.kind, CommandKind::Add);
        assert_eq!(raw.params, "gold::5");
    }

    #[test]
    fn unknown_and_malformed_brackets_are_ignored() {
        assert!(kinds("<b>bold</b> <SETX :: a :: 1> <set :: a :: 1> <SET a 1>").is_empty());
        assert!(kinds("<SET :: never closed").is_empty());
        assert_eq!(kinds("a < b <SET :: a :: 1>"), vec![CommandKind::Set]);
    }

    #[test]
    fn matches_do_not_overlap() {
        let text = "<SET :: a :: <ADD :: b :: 1>";
        let found: Vec<_> = scan(text).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, CommandKind::Set);
        assert_eq!(found[0].params, "a :: <ADD :: b :: 1");
    }

    #[test]
    fn scanner_is_lazy_and_restartable() {
        let text = "<SET :: a :: 1><SET :: b :: 2>";
        let mut scanner = scan(text);
        let first = scanner.next().unwrap();
        let resume = scanner.clone();
        assert_eq!(first.params, "a :: 1");
        assert_eq!(scanner.count(), 1);
        assert_eq!(resume.count(), 1);
        assert_eq!(scan(text).count(), 2);
    }

    #[test]
    fn spans_cover_the_whole_token() {
        let text = "Hi <SET :: hp :: 10>!";
        let raw = scan(text).next().unwrap();
        assert_eq!(&text[raw.span()], "<SET :: hp :: 10>");
    }

    #[test]
    fn strip_commands_leaves_narrative() {
        let text = "Hello <SET :: hp :: 10><ADD :: hp :: -3> world <i>!</i>";
        assert_eq!(strip_commands(text), "Hello  world <i>!</i>");
        assert_eq!(strip_commands("no commands"), "no commands");
    }

    #[test]
    fn handles_multibyte_text() {
        let text = "Ça va — <SET :: café :: ouvert> ✓";
        let raw = scan(text).next().unwrap();
        assert_eq!(raw.params, "café :: ouvert");
        assert_eq!(strip_commands(text), "Ça va —  ✓");
    }
}
