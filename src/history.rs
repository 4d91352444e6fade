//! Conversation history
//!
//! Ordered `{role, parts}` turns shared with the generation backend.
//! Appended after every successful exchange and read back at startup.
//! The on-disk format is a private line-oriented encoding, not a
//! product surface.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Stable name used in the history file
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Parse a stored role name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    /// Speaker
    pub role: Role,
    /// Ordered content parts (a reply may span several dialogue boxes)
    pub parts: Vec<String>,
}

impl ChatTurn {
    /// A single-part user turn
    pub fn user(text: &str) -> Self {
        Self {
            role: Role::User,
            parts: vec![text.to_string()],
        }
    }

    /// An assistant turn from reply parts
    pub fn assistant(parts: Vec<String>) -> Self {
        Self {
            role: Role::Assistant,
            parts,
        }
    }

    /// All parts joined for display or prompting
    pub fn text(&self) -> String {
        self.parts.join("\n")
    }
}

/// The persisted conversation
#[derive(Debug, Default)]
pub struct History {
    turns: Vec<ChatTurn>,
}

/// Separates parts within a stored turn line
const PART_SEP: char = '\u{1f}';

/// Escape one part for storage: backslash, newline, and the part
/// separator are the only characters with structural meaning.
fn encode_part(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            PART_SEP => out.push_str("\\s"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse `encode_part` in a single left-to-right scan, so escape
/// sequences never interact with the characters around them
fn decode_part(encoded: &str) -> String {
    let mut out = String::with_capacity(encoded.len());
    let mut chars = encoded.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('s') => out.push(PART_SEP),
            Some(other) => {
                // Unknown escape; keep it verbatim
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

impl History {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// All turns in order
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Number of turns
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether there are no turns
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append a turn
    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    /// Record one completed exchange: the user input (if the exchange
    /// was user-initiated) followed by the assistant reply.
    pub fn record_exchange(&mut self, user_input: Option<&str>, reply_parts: &[String]) {
        if let Some(input) = user_input {
            self.push(ChatTurn::user(input));
        }
        if !reply_parts.is_empty() {
            self.push(ChatTurn::assistant(reply_parts.to_vec()));
        }
    }

    /// Drop all turns
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Snapshot for handing to a background generation worker
    pub fn snapshot(&self) -> Vec<ChatTurn> {
        self.turns.clone()
    }

    /// Write the history to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        for turn in &self.turns {
            out.push_str(turn.role.as_str());
            out.push('\t');
            let encoded: Vec<String> = turn.parts.iter().map(|p| encode_part(p)).collect();
            out.push_str(&encoded.join(&PART_SEP.to_string()));
            out.push('\n');
        }
        fs::write(path, out).with_context(|| format!("writing history to {}", path.display()))
    }

    /// Read a history file, skipping malformed lines
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading history from {}", path.display()))?;
        let mut history = Self::new();
        for (lineno, line) in data.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let Some((role_name, rest)) = line.split_once('\t') else {
                log::warn!("history line {} has no role column, skipping", lineno + 1);
                continue;
            };
            let Some(role) = Role::parse(role_name) else {
                log::warn!("history line {} has unknown role '{}'", lineno + 1, role_name);
                continue;
            };
            let parts: Vec<String> = rest.split(PART_SEP).map(decode_part).collect();
            history.push(ChatTurn { role, parts });
        }
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_exchange_order() {
        let mut h = History::new();
        h.record_exchange(Some("hi"), &["hello!".to_string()]);
        h.record_exchange(None, &["self speak".to_string()]);

        assert_eq!(h.len(), 3);
        assert_eq!(h.turns()[0].role, Role::User);
        assert_eq!(h.turns()[1].role, Role::Assistant);
        assert_eq!(h.turns()[2].role, Role::Assistant);
    }

    #[test]
    fn test_turn_text_joins_parts() {
        let turn = ChatTurn::assistant(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(turn.text(), "a\nb");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.txt");

        let mut h = History::new();
        h.record_exchange(Some("line one\nline two"), &["reply".to_string()]);
        h.push(ChatTurn::assistant(vec![
            "part a".to_string(),
            "part b".to_string(),
        ]));
        h.save(&path).unwrap();

        let loaded = History::load(&path).unwrap();
        assert_eq!(loaded.turns(), h.turns());
    }

    #[test]
    fn test_backslash_n_sequence_survives_round_trip() {
        // A literal backslash followed by 'n' must not decode to a newline
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.txt");

        let mut h = History::new();
        h.push(ChatTurn::user("path is C:\\new\\table"));
        h.save(&path).unwrap();

        let loaded = History::load(&path).unwrap();
        assert_eq!(loaded.turns()[0].text(), "path is C:\\new\\table");
    }

    #[test]
    fn test_part_separator_character_survives_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.txt");

        let tricky = format!("before{}after", '\u{1f}');
        let mut h = History::new();
        h.push(ChatTurn::assistant(vec![tricky.clone(), "second".to_string()]));
        h.save(&path).unwrap();

        let loaded = History::load(&path).unwrap();
        assert_eq!(loaded.turns()[0].parts, vec![tricky, "second".to_string()]);
    }

    #[test]
    fn test_load_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.txt");
        fs::write(&path, "user\thello\ngarbage-no-tab\nwizard\tnope\nassistant\thi\n").unwrap();

        let loaded = History::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_load_missing_file_errors() {
        assert!(History::load(Path::new("/nonexistent/history.txt")).is_err());
    }
}
