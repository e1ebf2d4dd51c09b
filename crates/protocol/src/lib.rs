//! # MenuShell Protocol Library
//!
//! Transport-independent pieces of the MenuShell session engine.
//!
//! ## Overview
//!
//! - **Line Editor**: per-session byte-stream parser with backspace,
//!   carriage return and single-step up-arrow history
//! - **Command Patterns**: exact and prefix match rules used by dispatch
//! - **Errors**: the session error taxonomy shared with the daemon
//!
//! Nothing in this crate performs I/O. Echo output is collected into byte
//! buffers and completed lines are handed back to the caller.
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{CommandPattern, LineEditor};
//!
//! let mut editor = LineEditor::new(20);
//! let mut echo = Vec::new();
//! let mut completed = None;
//! for &byte in b"set timeout=5\r" {
//!     if let Some(line) = editor.feed(byte, &mut echo) {
//!         completed = Some(line);
//!     }
//! }
//!
//! let set = CommandPattern::prefix("set", 3).unwrap();
//! assert!(set.matches(&completed.unwrap()));
//! ```
//!
//! ## Modules
//!
//! - [`editor`]: line editor state machine
//! - [`pattern`]: command match rules
//! - [`elapsed`]: uptime formatting
//! - [`ansi`]: colour escapes
//! - [`error`]: error types

pub mod ansi;
pub mod editor;
pub mod elapsed;
pub mod error;
pub mod pattern;

use std::time::Duration;

pub use editor::{EscapeState, LineEditor, PROMPT};
pub use elapsed::format_elapsed;
pub use error::{Result, SessionError};
pub use pattern::CommandPattern;

/// Slot index identifying a session. Stable for the life of a connection.
pub type SessionId = usize;

/// Default number of session slots.
pub const DEFAULT_MAX_SESSIONS: usize = 2;

/// Default receive buffer length; lines hold one byte less.
pub const DEFAULT_RECEIVE_BUFFER_LEN: usize = 20;

/// Default idle timeout for a new session.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Default lead time between the idle warning and the disconnect.
pub const DEFAULT_IDLE_WARNING: Duration = Duration::from_secs(5 * 60);
