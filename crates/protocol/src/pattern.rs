//! Command match rules.
//!
//! A command is recognised either by exact comparison with the whole line
//! or by comparing only the first `match_len` characters, which lets
//! commands such as `set timeout=5` carry arguments after the keyword.

use crate::error::{Result, SessionError};

/// The text a command is recognised by, plus how much of it must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPattern {
    text: String,
    match_len: usize,
}

impl CommandPattern {
    /// A pattern that only matches the whole line.
    pub fn exact(text: impl Into<String>) -> Result<Self> {
        Self::prefix(text, 0)
    }

    /// A pattern that compares the first `match_len` characters.
    ///
    /// A `match_len` of zero means exact match.
    pub fn prefix(text: impl Into<String>, match_len: usize) -> Result<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(SessionError::EmptyCommand);
        }
        Ok(Self { text, match_len })
    }

    /// The command text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of leading characters compared, zero for exact match.
    pub fn match_len(&self) -> usize {
        self.match_len
    }

    /// Whether `line` selects this command.
    ///
    /// Prefix comparison follows `strncmp`: both sides are cut to
    /// `match_len` characters and the remainders must be identical, so a
    /// line shorter than the prefix only matches if the command text ends
    /// at the same point. Comparison is case-sensitive.
    pub fn matches(&self, line: &[u8]) -> bool {
        let text = self.text.as_bytes();
        match self.match_len {
            0 => line == text,
            n => line[..n.min(line.len())] == text[..n.min(text.len())],
        }
    }
}
