//! Session supervisor.
//!
//! The supervisor owns the slot pool and the command registry and is driven
//! by repeated calls to [`SessionSupervisor::tick`]. Each tick runs three
//! passes in a fixed order:
//!
//! 1. admission: every pending connection gets the lowest free slot or is
//!    turned away with a message
//! 2. input pump: every byte a session sent goes through its line editor,
//!    and completed lines are dispatched
//! 3. idle supervision: sessions that sent nothing this tick are warned,
//!    then disconnected once their idle timeout is exceeded
//!
//! Nothing in a tick blocks. Handlers run synchronously inside the pump.

use std::time::Instant;

use protocol::editor::KEY_REFRESH;
use protocol::{SessionError, SessionId, PROMPT};
use tracing::{debug, info, trace, warn};

use super::pool::{SessionLimits, SessionPool};
use crate::commands::{CommandContext, CommandRegistry};
use crate::network::{Acceptor, Transport};

/// Written after a dispatched line when no command matched.
const UNKNOWN_COMMAND_REPLY: &[u8] = b">What?\r\n";

/// Written after a dispatched line when a command ran.
const COMMAND_DONE_REPLY: &[u8] = b"\r\n";

/// Name, version and start time shown to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Project name used in the banner.
    pub name: String,
    /// Version string used in the banner, e.g. `v0.2.1`.
    pub version: String,
    /// When the server started, for uptime reporting.
    pub started_at: Instant,
}

impl ServerInfo {
    /// Creates server information.
    pub fn new(name: impl Into<String>, version: impl Into<String>, started_at: Instant) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            started_at,
        }
    }
}

/// Drives every session slot.
pub struct SessionSupervisor {
    pool: SessionPool,
    registry: CommandRegistry,
    info: ServerInfo,
    acceptor: Box<dyn Acceptor>,
}

impl SessionSupervisor {
    /// Creates a supervisor with an empty command registry.
    pub fn new<A>(limits: SessionLimits, info: ServerInfo, acceptor: A) -> Self
    where
        A: Acceptor + 'static,
    {
        Self {
            pool: SessionPool::new(limits, info.started_at),
            registry: CommandRegistry::new(),
            info,
            acceptor: Box::new(acceptor),
        }
    }

    /// The command registry.
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// The command registry, for registering commands between ticks.
    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        &mut self.registry
    }

    /// The slot pool.
    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }

    /// Server name, version and start time.
    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Number of connected sessions.
    pub fn active_count(&self) -> usize {
        self.pool.active_count()
    }

    /// Whether slot `id` holds a live connection.
    pub fn is_connected(&self, id: SessionId) -> bool {
        self.pool.is_connected(id)
    }

    /// Sets a session's idle timeout in minutes. Zero disables it.
    pub fn set_timeout(&mut self, id: SessionId, minutes: u16) -> Result<(), SessionError> {
        self.pool.set_timeout(id, minutes)
    }

    /// Remaining idle time of a session in minutes, 0 when disabled.
    pub fn get_timeout(&self, id: SessionId, now: Instant) -> Result<u64, SessionError> {
        self.pool.get_timeout(id, now)
    }

    /// Runs one iteration at the current time.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Runs one iteration as if the current time were `now`.
    pub fn tick_at(&mut self, now: Instant) {
        while let Some(transport) = self.acceptor.poll_accept() {
            // Rejections are reported to the peer and logged by admit
            let _ = self.admit(transport, now);
        }

        let had_input = self.pump(now);
        self.supervise_idle(now, &had_input);
        self.pool.flush_all();
    }

    /// Admits a connection into the lowest free slot.
    ///
    /// The new session receives the banner, the help listing and a prompt.
    /// When every slot is taken the peer is told so and disconnected.
    pub fn admit(
        &mut self,
        transport: Box<dyn Transport>,
        now: Instant,
    ) -> Result<SessionId, SessionError> {
        let id = match self.pool.attach(transport, now) {
            Ok(id) => id,
            Err((err, transport)) => {
                self.reject(transport);
                return Err(err);
            }
        };

        let peer = self.pool.get(id)?.peer().to_string();
        info!(slot = id, peer = %peer, "Client connected");

        let banner = format!(
            "Welcome to {} {}, type 'quit' to exit\r\n",
            self.info.name, self.info.version
        );
        self.pool.send(id, banner.as_bytes());
        let help = self.registry.help_lines();
        self.pool.send(id, help.as_bytes());
        self.feed_byte(id, KEY_REFRESH, now)?;
        if let Err(e) = self.pool.flush(id) {
            debug!(slot = id, error = %e, "Flush after admission failed");
        }
        Ok(id)
    }

    /// Tells a peer no slot is free and hangs up.
    fn reject(&self, mut transport: Box<dyn Transport>) {
        let peer = transport.peer();
        warn!(
            peer = %peer,
            max = self.pool.capacity(),
            "No free session slot, rejecting connection"
        );

        let message = format!(
            "\r\nWelcome to {} {}, sorry no connections are available at the moment, please try again later...\r\n",
            self.info.name, self.info.version
        );
        if let Err(e) = transport.write(message.as_bytes()).and_then(|()| transport.flush()) {
            debug!(peer = %peer, error = %e, "Failed to send rejection");
        }
        transport.close();
    }

    /// Feeds every available byte of every session to its line editor.
    ///
    /// Returns, per slot, whether any input arrived this tick.
    fn pump(&mut self, now: Instant) -> Vec<bool> {
        let mut had_input = vec![false; self.pool.capacity()];

        for id in 0..self.pool.capacity() {
            let Ok(session) = self.pool.get_mut(id) else {
                continue;
            };
            if session.is_stale() {
                info!(slot = id, peer = %session.peer(), "Client disconnected");
                session.close();
                continue;
            }

            loop {
                let Ok(session) = self.pool.get_mut(id) else {
                    break;
                };
                // A handler may have closed this session mid-drain
                let Some(byte) = session.poll_byte() else {
                    break;
                };
                session.touch(now);
                had_input[id] = true;
                trace!(slot = id, byte, "Input byte");

                if let Err(e) = self.feed_byte(id, byte, now) {
                    debug!(slot = id, error = %e, "Input dropped");
                    break;
                }
            }
        }

        had_input
    }

    /// Runs one byte through a session's line editor.
    pub fn feed_byte(&mut self, id: SessionId, byte: u8, now: Instant) -> Result<(), SessionError> {
        let mut echo = Vec::new();
        let line = self.pool.get_mut(id)?.editor_mut().feed(byte, &mut echo);
        if !echo.is_empty() {
            self.pool.write(id, &echo)?;
        }
        if let Some(line) = line {
            self.complete_line(id, &line, now);
        }
        Ok(())
    }

    /// Dispatches a completed line and prints the next prompt.
    fn complete_line(&mut self, id: SessionId, line: &[u8], now: Instant) {
        self.pool.send(id, b"\r");

        if !line.is_empty() {
            let text = String::from_utf8_lossy(line);
            let mut ctx = CommandContext::new(id, &mut self.pool, &self.registry, &self.info, now);
            match self.registry.dispatch(&mut ctx, &text) {
                Ok(()) => self.pool.send(id, COMMAND_DONE_REPLY),
                Err(SessionError::UnknownCommand(_)) => {
                    debug!(slot = id, line = %text, "Unknown command");
                    self.pool.send(id, UNKNOWN_COMMAND_REPLY);
                }
                Err(e) => warn!(slot = id, error = %e, "Dispatch failed"),
            }
        }

        // The command may have ended the session
        if self.pool.is_connected(id) {
            self.pool.send(id, PROMPT);
        }
    }

    /// Applies the idle policy to sessions that were silent this tick.
    fn supervise_idle(&mut self, now: Instant, had_input: &[bool]) {
        let warning = self.pool.limits().idle_warning;

        for id in 0..self.pool.capacity() {
            if had_input.get(id).copied().unwrap_or(false) {
                continue;
            }
            let Ok(session) = self.pool.get_mut(id) else {
                continue;
            };
            let timeout = session.idle_timeout();
            if !session.is_connected() || timeout.is_zero() {
                continue;
            }

            let idle = session.idle_for(now);
            if idle > timeout.saturating_sub(warning) && !session.warning_issued() {
                let secs = warning.min(timeout).as_secs();
                info!(slot = id, remaining_secs = secs, "Idle warning");
                let notice = format!("Inactivity timeout in {} seconds\r\n", secs);
                if let Err(e) = session.write(notice.as_bytes()) {
                    debug!(slot = id, error = %e, "Failed to send idle warning");
                }
                session.mark_warned();
            }

            if idle > timeout {
                info!(slot = id, peer = %session.peer(), "Idle timeout, closing session");
                let notice = session
                    .write(b"Inactivity timeout, bye\r\n")
                    .and_then(|()| session.flush());
                if let Err(e) = notice {
                    debug!(slot = id, error = %e, "Failed to send idle notice");
                }
                session.close();
            }
        }
    }

    /// Says goodbye to every connected session and closes it.
    pub fn shutdown(&mut self) {
        for id in 0..self.pool.capacity() {
            if !self.pool.is_connected(id) {
                continue;
            }
            self.pool.send(id, b"\r\nServer shutting down, bye\r\n");
            if let Err(e) = self.pool.flush(id) {
                debug!(slot = id, error = %e, "Flush before shutdown failed");
            }
            if self.pool.close(id).is_ok() {
                info!(slot = id, "Session closed for shutdown");
            }
        }
    }
}
