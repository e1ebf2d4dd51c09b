//! A single session slot.
//!
//! A slot is reused across connections. It is occupied while it holds a
//! transport and becomes free again when the transport is closed, whether
//! by the session itself, by another session or by the idle policy.

use std::time::{Duration, Instant};

use protocol::{LineEditor, SessionError, SessionId};

use crate::network::Transport;

/// Per-slot connection state.
pub struct Session {
    id: SessionId,
    transport: Option<Box<dyn Transport>>,
    editor: LineEditor,
    last_activity: Instant,
    idle_timeout: Duration,
    warning_issued: bool,
    peer: String,
    connected_at: Instant,
}

impl Session {
    /// Creates an empty slot.
    pub fn new(id: SessionId, receive_buffer_len: usize, now: Instant) -> Self {
        Self {
            id,
            transport: None,
            editor: LineEditor::new(receive_buffer_len),
            last_activity: now,
            idle_timeout: Duration::ZERO,
            warning_issued: false,
            peer: String::new(),
            connected_at: now,
        }
    }

    /// Occupies the slot with a new connection and resets all state.
    pub fn attach(&mut self, transport: Box<dyn Transport>, idle_timeout: Duration, now: Instant) {
        self.peer = transport.peer();
        self.transport = Some(transport);
        self.editor.reset();
        self.last_activity = now;
        self.connected_at = now;
        self.idle_timeout = idle_timeout;
        self.warning_issued = false;
    }

    /// Slot index.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Whether the slot holds a live connection.
    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_connected())
    }

    /// Whether the slot holds a transport that the peer has closed.
    pub fn is_stale(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| !t.is_connected())
    }

    /// Whether the slot holds no transport at all.
    pub fn is_free(&self) -> bool {
        self.transport.is_none()
    }

    /// Reads the next input byte, if the peer sent one.
    pub fn poll_byte(&mut self) -> Option<u8> {
        let transport = self.transport.as_mut()?;
        if transport.is_available() {
            transport.read_byte()
        } else {
            None
        }
    }

    /// Records input activity and re-arms the idle warning.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
        self.warning_issued = false;
    }

    /// Queues output for the peer.
    pub fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        let transport = self
            .transport
            .as_mut()
            .ok_or(SessionError::NotConnected(self.id))?;
        transport.write(data)?;
        Ok(())
    }

    /// Pushes queued output towards the peer.
    pub fn flush(&mut self) -> Result<(), SessionError> {
        let transport = self
            .transport
            .as_mut()
            .ok_or(SessionError::NotConnected(self.id))?;
        transport.flush()?;
        Ok(())
    }

    /// Closes the connection and frees the slot.
    ///
    /// Returns false if the slot was already free.
    pub fn close(&mut self) -> bool {
        match self.transport.take() {
            Some(mut transport) => {
                transport.close();
                self.warning_issued = false;
                true
            }
            None => false,
        }
    }

    /// Line editor for this slot.
    pub fn editor_mut(&mut self) -> &mut LineEditor {
        &mut self.editor
    }

    /// Line editor for this slot.
    pub fn editor(&self) -> &LineEditor {
        &self.editor
    }

    /// Idle timeout, zero when disabled.
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Changes the idle timeout. Zero disables it.
    pub fn set_idle_timeout(&mut self, timeout: Duration) {
        self.idle_timeout = timeout;
    }

    /// Time since the last input byte.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Whether the idle warning was sent during the current idle period.
    pub fn warning_issued(&self) -> bool {
        self.warning_issued
    }

    /// Marks the idle warning as sent.
    pub fn mark_warned(&mut self) {
        self.warning_issued = true;
    }

    /// Remaining idle time in whole minutes, rounded to nearest.
    ///
    /// Returns 0 when the timeout is disabled or already exceeded.
    pub fn remaining_minutes(&self, now: Instant) -> u64 {
        if self.idle_timeout.is_zero() {
            return 0;
        }
        let remaining = self.idle_timeout.saturating_sub(self.idle_for(now));
        let millis = remaining.as_millis() as u64;
        (millis + 30_000) / 60_000
    }

    /// Address of the connected peer.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// When the current connection was admitted.
    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .field("peer", &self.peer)
            .field("idle_timeout", &self.idle_timeout)
            .field("warning_issued", &self.warning_issued)
            .finish()
    }
}
