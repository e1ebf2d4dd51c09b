//! Fixed-size pool of session slots.

use std::time::{Duration, Instant};

use protocol::{
    SessionError, SessionId, DEFAULT_IDLE_TIMEOUT, DEFAULT_IDLE_WARNING, DEFAULT_MAX_SESSIONS,
    DEFAULT_RECEIVE_BUFFER_LEN,
};
use tracing::{debug, info};

use super::slot::Session;
use crate::network::Transport;

/// Sizing and timing parameters for a session pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Number of concurrent sessions.
    pub max_sessions: usize,
    /// Receive buffer length per session; lines hold one byte less.
    pub receive_buffer_len: usize,
    /// Idle timeout given to every new session. Zero disables it.
    pub idle_timeout: Duration,
    /// How long before the disconnect the warning is sent.
    pub idle_warning: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            receive_buffer_len: DEFAULT_RECEIVE_BUFFER_LEN,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            idle_warning: DEFAULT_IDLE_WARNING,
        }
    }
}

/// Snapshot of a connected session, for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Slot index.
    pub id: SessionId,
    /// Peer address.
    pub peer: String,
    /// Remaining idle time in minutes, 0 when disabled.
    pub remaining_minutes: u64,
    /// Time since the connection was admitted.
    pub connected_for: Duration,
}

/// The session slots, indexed by [`SessionId`].
#[derive(Debug)]
pub struct SessionPool {
    slots: Vec<Session>,
    limits: SessionLimits,
}

impl SessionPool {
    /// Creates a pool of `limits.max_sessions` empty slots.
    pub fn new(limits: SessionLimits, now: Instant) -> Self {
        let slots = (0..limits.max_sessions)
            .map(|id| Session::new(id, limits.receive_buffer_len, now))
            .collect();
        Self { slots, limits }
    }

    /// Limits the pool was built with.
    pub fn limits(&self) -> &SessionLimits {
        &self.limits
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Borrows a slot.
    pub fn get(&self, id: SessionId) -> Result<&Session, SessionError> {
        self.slots.get(id).ok_or(SessionError::InvalidSession(id))
    }

    /// Mutably borrows a slot.
    pub fn get_mut(&mut self, id: SessionId) -> Result<&mut Session, SessionError> {
        self.slots.get_mut(id).ok_or(SessionError::InvalidSession(id))
    }

    /// Lowest-index slot without a live connection.
    ///
    /// A slot whose peer has hung up but has not been reaped yet counts as
    /// free.
    pub fn first_free(&self) -> Option<SessionId> {
        self.slots.iter().position(|s| !s.is_connected())
    }

    /// Places a transport in the first free slot.
    ///
    /// A stale transport still parked in that slot is closed first. On
    /// failure the transport is handed back so the caller can tell the peer
    /// why it is being turned away.
    pub fn attach(
        &mut self,
        transport: Box<dyn Transport>,
        now: Instant,
    ) -> Result<SessionId, (SessionError, Box<dyn Transport>)> {
        let Some(id) = self.first_free() else {
            let err = SessionError::AdmissionRejected {
                max: self.capacity(),
            };
            return Err((err, transport));
        };
        let idle_timeout = self.limits.idle_timeout;
        let session = &mut self.slots[id];
        if session.is_stale() {
            info!(slot = id, peer = %session.peer(), "Client disconnected");
            session.close();
        }
        session.attach(transport, idle_timeout, now);
        Ok(id)
    }

    /// Whether slot `id` holds a live connection.
    pub fn is_connected(&self, id: SessionId) -> bool {
        self.slots.get(id).is_some_and(Session::is_connected)
    }

    /// Number of live connections.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_connected()).count()
    }

    /// Writes to a session.
    pub fn write(&mut self, id: SessionId, data: &[u8]) -> Result<(), SessionError> {
        self.get_mut(id)?.write(data)
    }

    /// Writes to a session, logging rather than returning failures.
    ///
    /// A failed write means the peer is gone; the slot is reaped on the next
    /// tick.
    pub fn send(&mut self, id: SessionId, data: &[u8]) {
        if let Err(e) = self.write(id, data) {
            debug!(slot = id, error = %e, "Dropped session output");
        }
    }

    /// Flushes a session's output.
    pub fn flush(&mut self, id: SessionId) -> Result<(), SessionError> {
        self.get_mut(id)?.flush()
    }

    /// Flushes every occupied slot.
    pub fn flush_all(&mut self) {
        for session in self.slots.iter_mut().filter(|s| !s.is_free()) {
            if let Err(e) = session.flush() {
                debug!(slot = session.id(), error = %e, "Flush failed");
            }
        }
    }

    /// Closes a session and frees its slot.
    pub fn close(&mut self, id: SessionId) -> Result<(), SessionError> {
        let session = self.get_mut(id)?;
        if session.close() {
            Ok(())
        } else {
            Err(SessionError::NotConnected(id))
        }
    }

    /// Sets a session's idle timeout in minutes. Zero disables it.
    pub fn set_timeout(&mut self, id: SessionId, minutes: u16) -> Result<(), SessionError> {
        let session = self.get_mut(id)?;
        session.set_idle_timeout(Duration::from_secs(u64::from(minutes) * 60));
        Ok(())
    }

    /// Remaining idle time of a session in minutes.
    pub fn get_timeout(&self, id: SessionId, now: Instant) -> Result<u64, SessionError> {
        Ok(self.get(id)?.remaining_minutes(now))
    }

    /// Summaries of connected sessions in slot order.
    pub fn summaries(&self, now: Instant) -> Vec<SessionSummary> {
        self.slots
            .iter()
            .filter(|s| s.is_connected())
            .map(|s| SessionSummary {
                id: s.id(),
                peer: s.peer().to_string(),
                remaining_minutes: s.remaining_minutes(now),
                connected_for: now.saturating_duration_since(s.connected_at()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{MemoryPeer, MemoryTransport};

    fn limits(max_sessions: usize) -> SessionLimits {
        SessionLimits {
            max_sessions,
            ..SessionLimits::default()
        }
    }

    fn connect(pool: &mut SessionPool, name: &str, now: Instant) -> (SessionId, MemoryPeer) {
        let (transport, peer) = MemoryTransport::pair(name);
        let id = pool.attach(Box::new(transport), now).ok().unwrap();
        (id, peer)
    }

    #[test]
    fn test_default_limits() {
        let limits = SessionLimits::default();
        assert_eq!(limits.max_sessions, 2);
        assert_eq!(limits.receive_buffer_len, 20);
        assert_eq!(limits.idle_timeout, Duration::from_secs(3600));
        assert_eq!(limits.idle_warning, Duration::from_secs(300));
    }

    #[test]
    fn test_attach_fills_lowest_free_slot() {
        let now = Instant::now();
        let mut pool = SessionPool::new(limits(3), now);
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.first_free(), Some(0));

        let (a, _pa) = connect(&mut pool, "a", now);
        let (b, _pb) = connect(&mut pool, "b", now);
        assert_eq!((a, b), (0, 1));

        pool.close(0).unwrap();
        let (c, _pc) = connect(&mut pool, "c", now);
        assert_eq!(c, 0);
        assert_eq!(pool.active_count(), 2);
    }

    #[test]
    fn test_attach_rejects_when_full() {
        let now = Instant::now();
        let mut pool = SessionPool::new(limits(1), now);
        let (_id, _peer) = connect(&mut pool, "a", now);

        let (transport, _extra) = MemoryTransport::pair("b");
        let (err, returned) = pool.attach(Box::new(transport), now).err().unwrap();
        assert!(matches!(err, SessionError::AdmissionRejected { max: 1 }));
        assert_eq!(returned.peer(), "b");
        assert_eq!(pool.active_count(), 1);
    }

    #[test]
    fn test_invalid_and_idle_slots() {
        let now = Instant::now();
        let mut pool = SessionPool::new(limits(2), now);
        assert!(matches!(pool.write(5, b"x"), Err(SessionError::InvalidSession(5))));
        assert!(matches!(pool.close(1), Err(SessionError::NotConnected(1))));
        assert!(!pool.is_connected(7));
        pool.send(1, b"ignored");
    }

    #[test]
    fn test_timeouts() {
        let now = Instant::now();
        let mut pool = SessionPool::new(limits(1), now);
        let (id, _peer) = connect(&mut pool, "a", now);
        assert_eq!(pool.get_timeout(id, now).unwrap(), 60);

        pool.set_timeout(id, 5).unwrap();
        assert_eq!(pool.get(id).unwrap().idle_timeout(), Duration::from_secs(300));
        assert_eq!(pool.get_timeout(id, now + Duration::from_secs(60)).unwrap(), 4);

        pool.set_timeout(id, 0).unwrap();
        assert_eq!(pool.get_timeout(id, now).unwrap(), 0);
    }

    #[test]
    fn test_summaries_only_list_connected() {
        let now = Instant::now();
        let mut pool = SessionPool::new(limits(3), now);
        let (_a, _pa) = connect(&mut pool, "alpha", now);
        let (_b, pb) = connect(&mut pool, "beta", now);
        let (_c, _pc) = connect(&mut pool, "gamma", now);
        pb.disconnect();

        let summaries = pool.summaries(now);
        let peers: Vec<_> = summaries.iter().map(|s| s.peer.as_str()).collect();
        assert_eq!(peers, vec!["alpha", "gamma"]);
        assert_eq!(summaries[1].id, 2);
        assert_eq!(summaries[0].remaining_minutes, 60);
    }

    #[test]
    fn test_attach_reclaims_slot_after_peer_hangup() {
        let now = Instant::now();
        let mut pool = SessionPool::new(limits(1), now);
        let (_a, pa) = connect(&mut pool, "a", now);
        pa.disconnect();
        assert!(pool.get(0).unwrap().is_stale());
        assert_eq!(pool.first_free(), Some(0));

        let (b, _pb) = connect(&mut pool, "b", now);
        assert_eq!(b, 0);
        assert!(pa.is_closed());
        assert_eq!(pool.get(0).unwrap().peer(), "b");
        assert_eq!(pool.active_count(), 1);
    }

    #[test]
    fn test_summaries_report_connection_age() {
        let now = Instant::now();
        let mut pool = SessionPool::new(limits(2), now);
        let (_a, _pa) = connect(&mut pool, "early", now);
        let (_b, _pb) = connect(&mut pool, "late", now + Duration::from_secs(30));

        let summaries = pool.summaries(now + Duration::from_secs(90));
        assert_eq!(summaries[0].connected_for, Duration::from_secs(90));
        assert_eq!(summaries[1].connected_for, Duration::from_secs(60));
    }
}
