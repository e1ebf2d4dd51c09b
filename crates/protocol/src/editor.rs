//! Per-session line editor.
//!
//! The editor consumes raw bytes one at a time and maintains the input
//! buffer, the single-entry history and the escape-sequence state. It never
//! touches a transport: echo bytes go into a caller-supplied buffer and
//! completed lines are returned to the caller for dispatch.
//!
//! Only three editing gestures exist: backspace, carriage return and a
//! single-step up arrow (`ESC [ A`) that restores the last submitted line.

/// Sentinel byte that forces an empty submission, used to print a prompt.
pub const KEY_REFRESH: u8 = 0x00;
/// Backspace.
pub const KEY_BACKSPACE: u8 = 0x08;
/// Horizontal tab.
pub const KEY_TAB: u8 = 0x09;
/// Line feed.
pub const KEY_LF: u8 = 0x0A;
/// Carriage return.
pub const KEY_CR: u8 = 0x0D;
/// Escape, first byte of the up-arrow sequence.
pub const KEY_ESC: u8 = 0x1B;
/// `[`, second byte of the up-arrow sequence.
pub const KEY_BRACKET: u8 = 0x5B;
/// `A`, final byte of the up-arrow sequence.
pub const KEY_UP: u8 = 0x41;
/// Byte value the editor treats as "ignored".
pub const KEY_IGNORED: u8 = 0xFF;

/// Prompt written after every completed line.
pub const PROMPT: &[u8] = b"\r>";

/// Echo for a backspace that removed a character.
const ERASE_ECHO: &[u8] = b" \x08";

/// Echo that redraws the prompt marker.
const PROMPT_MARK: &[u8] = b">";

/// Progress through the up-arrow escape sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscapeState {
    /// No sequence in progress.
    #[default]
    Normal,
    /// Got `ESC`.
    EscSeen,
    /// Got `ESC [`.
    BracketSeen,
}

/// Line input state machine for one session.
#[derive(Debug, Clone)]
pub struct LineEditor {
    /// Current line. Its length is the cursor offset.
    input: Vec<u8>,
    /// Last submitted non-empty line.
    history: Vec<u8>,
    /// Maximum number of characters on a line.
    capacity: usize,
    /// Escape sequence state.
    escape: EscapeState,
}

impl LineEditor {
    /// Create an editor for a receive buffer of `receive_buffer_len` bytes.
    ///
    /// One byte of the buffer is reserved, so a line holds at most
    /// `receive_buffer_len - 1` characters (never less than one).
    pub fn new(receive_buffer_len: usize) -> Self {
        let capacity = receive_buffer_len.saturating_sub(1).max(1);
        Self {
            input: Vec::with_capacity(capacity),
            history: Vec::with_capacity(capacity),
            capacity,
            escape: EscapeState::Normal,
        }
    }

    /// Maximum number of characters on a line.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current cursor offset into the line.
    pub fn cursor(&self) -> usize {
        self.input.len()
    }

    /// Current (incomplete) line.
    pub fn line(&self) -> &[u8] {
        &self.input
    }

    /// Last submitted line.
    pub fn history(&self) -> &[u8] {
        &self.history
    }

    /// Current escape sequence state.
    pub fn escape_state(&self) -> EscapeState {
        self.escape
    }

    /// Clear the line, the history and the escape state.
    pub fn reset(&mut self) {
        self.input.clear();
        self.history.clear();
        self.escape = EscapeState::Normal;
    }

    /// Process a single input byte.
    ///
    /// Echo and editing output is appended to `echo`. Returns the completed
    /// line when this byte finished one; the returned line may be empty
    /// (for [`KEY_REFRESH`]), in which case no command should be run.
    pub fn feed(&mut self, byte: u8, echo: &mut Vec<u8>) -> Option<Vec<u8>> {
        if self.consume_escape(byte, echo) {
            return None;
        }

        match byte {
            KEY_REFRESH => {
                self.input.clear();
                Some(self.submit())
            }
            KEY_BACKSPACE => {
                if self.input.pop().is_some() {
                    echo.extend_from_slice(ERASE_ECHO);
                } else {
                    echo.extend_from_slice(PROMPT_MARK);
                }
                None
            }
            KEY_CR => {
                if self.input.is_empty() {
                    echo.extend_from_slice(PROMPT_MARK);
                    None
                } else {
                    Some(self.submit())
                }
            }
            KEY_ESC | KEY_TAB | KEY_LF | KEY_IGNORED => None,
            _ => {
                if self.input.len() < self.capacity {
                    self.input.push(byte);
                }
                // Full buffer forces submission without a CR
                if self.input.len() == self.capacity {
                    Some(self.submit())
                } else {
                    None
                }
            }
        }
    }

    /// Advance the up-arrow recogniser. Returns true if the byte was part
    /// of the sequence and must not be classified further.
    fn consume_escape(&mut self, byte: u8, echo: &mut Vec<u8>) -> bool {
        match (byte, self.escape) {
            (KEY_ESC, _) => {
                self.escape = EscapeState::EscSeen;
                true
            }
            (KEY_BRACKET, EscapeState::EscSeen) => {
                self.escape = EscapeState::BracketSeen;
                true
            }
            (KEY_UP, EscapeState::BracketSeen) => {
                self.input.clear();
                self.input.extend_from_slice(&self.history);
                echo.extend_from_slice(PROMPT);
                echo.extend_from_slice(&self.input);
                self.escape = EscapeState::Normal;
                true
            }
            _ => {
                self.escape = EscapeState::Normal;
                false
            }
        }
    }

    /// Take the current line, remember it as history and start a new one.
    fn submit(&mut self) -> Vec<u8> {
        let line = std::mem::take(&mut self.input);
        if !line.is_empty() {
            self.history.clear();
            self.history.extend_from_slice(&line);
        }
        self.escape = EscapeState::Normal;
        line
    }
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new(crate::DEFAULT_RECEIVE_BUFFER_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(editor: &mut LineEditor, bytes: &[u8]) -> (Vec<Vec<u8>>, Vec<u8>) {
        let mut lines = Vec::new();
        let mut echo = Vec::new();
        for &b in bytes {
            if let Some(line) = editor.feed(b, &mut echo) {
                lines.push(line);
            }
        }
        (lines, echo)
    }

    #[test]
    fn test_new_reserves_terminator() {
        let editor = LineEditor::new(20);
        assert_eq!(editor.capacity(), 19);
        assert_eq!(editor.cursor(), 0);
        assert_eq!(editor.escape_state(), EscapeState::Normal);
    }

    #[test]
    fn test_capacity_never_zero() {
        assert_eq!(LineEditor::new(0).capacity(), 1);
        assert_eq!(LineEditor::new(1).capacity(), 1);
    }

    #[test]
    fn test_typing_does_not_echo() {
        let mut editor = LineEditor::new(20);
        let (lines, echo) = feed_all(&mut editor, b"help");
        assert!(lines.is_empty());
        assert!(echo.is_empty());
        assert_eq!(editor.line(), b"help");
        assert_eq!(editor.cursor(), 4);
    }

    #[test]
    fn test_cr_submits_line() {
        let mut editor = LineEditor::new(20);
        let (lines, _) = feed_all(&mut editor, b"help\r");
        assert_eq!(lines, vec![b"help".to_vec()]);
        assert_eq!(editor.cursor(), 0);
        assert_eq!(editor.history(), b"help");
    }

    #[test]
    fn test_cr_on_empty_line_redraws_prompt() {
        let mut editor = LineEditor::new(20);
        let (lines, echo) = feed_all(&mut editor, b"\r");
        assert!(lines.is_empty());
        assert_eq!(echo, b">");
    }

    #[test]
    fn test_refresh_sentinel_submits_empty_line() {
        let mut editor = LineEditor::new(20);
        let (lines, _) = feed_all(&mut editor, b"abc\x00");
        assert_eq!(lines, vec![Vec::<u8>::new()]);
        assert_eq!(editor.cursor(), 0);
    }

    #[test]
    fn test_refresh_keeps_history() {
        let mut editor = LineEditor::new(20);
        feed_all(&mut editor, b"info\r");
        feed_all(&mut editor, &[KEY_REFRESH]);
        assert_eq!(editor.history(), b"info");
    }

    #[test]
    fn test_backspace_removes_char() {
        let mut editor = LineEditor::new(20);
        let (_, echo) = feed_all(&mut editor, b"helpx\x08");
        assert_eq!(editor.line(), b"help");
        assert_eq!(echo, b" \x08");
    }

    #[test]
    fn test_backspace_on_empty_line() {
        let mut editor = LineEditor::new(20);
        let (lines, echo) = feed_all(&mut editor, b"\x08");
        assert!(lines.is_empty());
        assert_eq!(echo, b">");
        assert_eq!(editor.cursor(), 0);
        assert!(editor.line().is_empty());
    }

    #[test]
    fn test_discarded_bytes() {
        let mut editor = LineEditor::new(20);
        let (lines, echo) = feed_all(&mut editor, b"a\tb\nc\xFF");
        assert!(lines.is_empty());
        assert!(echo.is_empty());
        assert_eq!(editor.line(), b"abc");
    }

    #[test]
    fn test_overflow_forces_submission() {
        let mut editor = LineEditor::new(20);
        let input = vec![b'x'; 19];
        let (lines, _) = feed_all(&mut editor, &input);
        assert_eq!(lines, vec![input.clone()]);
        assert_eq!(editor.cursor(), 0);
        assert_eq!(editor.history(), input.as_slice());
    }

    #[test]
    fn test_overflow_one_short_does_not_submit() {
        let mut editor = LineEditor::new(20);
        let (lines, _) = feed_all(&mut editor, &[b'x'; 18]);
        assert!(lines.is_empty());
        assert_eq!(editor.cursor(), 18);
    }

    #[test]
    fn test_up_arrow_restores_last_line() {
        let mut editor = LineEditor::new(20);
        feed_all(&mut editor, b"sessions\r");
        let (lines, echo) = feed_all(&mut editor, &[KEY_ESC, KEY_BRACKET, KEY_UP]);
        assert!(lines.is_empty());
        assert_eq!(editor.line(), b"sessions");
        assert_eq!(editor.cursor(), 8);
        assert_eq!(echo, b"\r>sessions");
        assert_eq!(editor.escape_state(), EscapeState::Normal);

        let (lines, _) = feed_all(&mut editor, b"\r");
        assert_eq!(lines, vec![b"sessions".to_vec()]);
    }

    #[test]
    fn test_up_arrow_with_empty_history() {
        let mut editor = LineEditor::new(20);
        feed_all(&mut editor, b"ab");
        let (_, echo) = feed_all(&mut editor, &[KEY_ESC, KEY_BRACKET, KEY_UP]);
        assert!(editor.line().is_empty());
        assert_eq!(echo, b"\r>");
    }

    #[test]
    fn test_escape_states() {
        let mut editor = LineEditor::new(20);
        let mut echo = Vec::new();
        editor.feed(KEY_ESC, &mut echo);
        assert_eq!(editor.escape_state(), EscapeState::EscSeen);
        editor.feed(KEY_BRACKET, &mut echo);
        assert_eq!(editor.escape_state(), EscapeState::BracketSeen);
        editor.feed(KEY_UP, &mut echo);
        assert_eq!(editor.escape_state(), EscapeState::Normal);
    }

    #[test]
    fn test_broken_sequence_falls_through() {
        let mut editor = LineEditor::new(20);
        // ESC then 'x': the 'x' is classified normally
        feed_all(&mut editor, &[KEY_ESC, b'x']);
        assert_eq!(editor.line(), b"x");
        assert_eq!(editor.escape_state(), EscapeState::Normal);

        // ESC [ B (down arrow) leaves the 'B' as input
        feed_all(&mut editor, &[KEY_ESC, KEY_BRACKET, b'B']);
        assert_eq!(editor.line(), b"xB");
    }

    #[test]
    fn test_bracket_and_a_without_escape_are_data() {
        let mut editor = LineEditor::new(20);
        feed_all(&mut editor, b"[A");
        assert_eq!(editor.line(), b"[A");
    }

    #[test]
    fn test_escape_restarts_sequence() {
        let mut editor = LineEditor::new(20);
        feed_all(&mut editor, b"quit\r");
        feed_all(&mut editor, &[KEY_ESC, KEY_BRACKET, KEY_ESC, KEY_BRACKET, KEY_UP]);
        assert_eq!(editor.line(), b"quit");
    }

    #[test]
    fn test_restored_full_line_submits_on_next_char() {
        let mut editor = LineEditor::new(5);
        feed_all(&mut editor, b"abcd");
        assert_eq!(editor.history(), b"abcd");

        feed_all(&mut editor, &[KEY_ESC, KEY_BRACKET, KEY_UP]);
        let (lines, _) = feed_all(&mut editor, b"z");
        assert_eq!(lines, vec![b"abcd".to_vec()]);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut editor = LineEditor::new(20);
        feed_all(&mut editor, b"help\rin");
        editor.feed(KEY_ESC, &mut Vec::new());
        editor.reset();
        assert_eq!(editor.cursor(), 0);
        assert!(editor.history().is_empty());
        assert_eq!(editor.escape_state(), EscapeState::Normal);
    }

    mod proptests {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn cursor_tracks_line_length(
                bytes in prop::collection::vec(any::<u8>(), 0..256),
                len in 2usize..64,
            ) {
                let mut editor = LineEditor::new(len);
                let mut echo = Vec::new();
                for b in bytes {
                    let _ = editor.feed(b, &mut echo);
                    prop_assert_eq!(editor.line().len(), editor.cursor());
                    prop_assert!(editor.cursor() <= editor.capacity());
                }
            }

            #[test]
            fn submitted_lines_fit_capacity(
                bytes in prop::collection::vec(any::<u8>(), 0..256),
                len in 2usize..64,
            ) {
                let mut editor = LineEditor::new(len);
                let mut echo = Vec::new();
                for b in bytes {
                    if let Some(line) = editor.feed(b, &mut echo) {
                        prop_assert!(line.len() <= editor.capacity());
                        prop_assert!(!line.contains(&KEY_REFRESH));
                    }
                }
            }
        }
    }
}
