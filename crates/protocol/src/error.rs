//! Error types for the protocol crate.

use thiserror::Error;

use crate::SessionId;

/// Session error type covering the failure modes of the session engine.
///
/// None of these are fatal to the server: every variant is contained to a
/// single session or a single rejected connection.
#[derive(Debug, Error)]
pub enum SessionError {
    // Admission errors
    /// Every slot is occupied; the connection was refused with a message.
    #[error("no free session slots: all {max} slots are in use")]
    AdmissionRejected {
        /// Number of slots in the pool.
        max: usize,
    },

    // Dispatch errors
    /// No registry entry matched the submitted line.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Attempted to register a command with empty text.
    #[error("command text must not be empty")]
    EmptyCommand,

    // Slot errors
    /// The slot index is outside the session pool.
    #[error("invalid session id: {0}")]
    InvalidSession(SessionId),

    /// The slot exists but holds no connection.
    #[error("session {0} is not connected")]
    NotConnected(SessionId),

    // Transport errors
    /// The underlying byte stream failed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
