//! What a command handler can see and do.

use std::time::{Duration, Instant};

use protocol::{SessionError, SessionId};

use super::registry::CommandRegistry;
use crate::session::{ServerInfo, SessionPool, SessionSummary};

/// Context handed to a command handler for one dispatched line.
///
/// Handlers run synchronously inside the supervisor tick. They may write to
/// any session, close sessions and change timeouts, but only see the command
/// registry through a shared reference.
pub struct CommandContext<'a> {
    session_id: SessionId,
    pool: &'a mut SessionPool,
    registry: &'a CommandRegistry,
    info: &'a ServerInfo,
    now: Instant,
}

impl<'a> CommandContext<'a> {
    /// Creates a context for a line submitted by `session_id`.
    pub fn new(
        session_id: SessionId,
        pool: &'a mut SessionPool,
        registry: &'a CommandRegistry,
        info: &'a ServerInfo,
        now: Instant,
    ) -> Self {
        Self {
            session_id,
            pool,
            registry,
            info,
            now,
        }
    }

    /// Session that submitted the line.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Writes text to the calling session.
    pub fn print(&mut self, text: &str) {
        self.pool.send(self.session_id, text.as_bytes());
    }

    /// Writes text to another session.
    pub fn print_to(&mut self, id: SessionId, text: &str) -> Result<(), SessionError> {
        self.pool.write(id, text.as_bytes())
    }

    /// Flushes and closes a session, freeing its slot.
    pub fn close(&mut self, id: SessionId) -> Result<(), SessionError> {
        if let Err(e) = self.pool.flush(id) {
            tracing::debug!(slot = id, error = %e, "Flush before close failed");
        }
        self.pool.close(id)
    }

    /// Whether slot `id` holds a live connection.
    pub fn is_connected(&self, id: SessionId) -> bool {
        self.pool.is_connected(id)
    }

    /// Number of slots.
    pub fn max_sessions(&self) -> usize {
        self.pool.capacity()
    }

    /// Number of connected sessions.
    pub fn active_count(&self) -> usize {
        self.pool.active_count()
    }

    /// Peer address of a session.
    pub fn peer(&self, id: SessionId) -> Result<&str, SessionError> {
        Ok(self.pool.get(id)?.peer())
    }

    /// Sets a session's idle timeout in minutes, zero disables it.
    pub fn set_timeout(&mut self, id: SessionId, minutes: u16) -> Result<(), SessionError> {
        self.pool.set_timeout(id, minutes)
    }

    /// Remaining idle time of a session in minutes.
    pub fn get_timeout(&self, id: SessionId) -> Result<u64, SessionError> {
        self.pool.get_timeout(id, self.now)
    }

    /// Connected sessions in slot order.
    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.pool.summaries(self.now)
    }

    /// Formatted help listing of the registry.
    pub fn help_lines(&self) -> String {
        self.registry.help_lines()
    }

    /// Server name and version.
    pub fn info(&self) -> &ServerInfo {
        self.info
    }

    /// Time since the server started.
    pub fn uptime(&self) -> Duration {
        self.now.saturating_duration_since(self.info.started_at)
    }
}
