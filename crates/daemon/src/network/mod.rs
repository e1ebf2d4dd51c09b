//! Network module for session byte streams.
//!
//! The session engine never touches sockets directly. It talks to a
//! [`Transport`] per session and pulls new connections from an
//! [`Acceptor`]. Both are polled from the supervisor tick and must never
//! block.
//!
//! - [`tcp`]: tokio TCP streams fed by a background accept task
//! - [`memory`]: in-process pipes for tests and embedding

pub mod memory;
pub mod tcp;

use std::io;

/// A bidirectional raw byte stream for one session.
///
/// Reads are poll-then-read: callers check [`Transport::is_available`]
/// before [`Transport::read_byte`]. Writes may be buffered until the next
/// [`Transport::flush`].
pub trait Transport: Send {
    /// Returns true if at least one input byte can be read without blocking.
    fn is_available(&mut self) -> bool;

    /// Reads the next input byte, if any.
    fn read_byte(&mut self) -> Option<u8>;

    /// Queues bytes for the peer.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Pushes queued output towards the peer without blocking.
    fn flush(&mut self) -> io::Result<()>;

    /// Closes the stream. Output queued before the call is still delivered
    /// where the implementation can do so without blocking.
    fn close(&mut self);

    /// Returns whether the stream is still open in both directions.
    fn is_connected(&self) -> bool;

    /// Human-readable peer address, used in logs and session listings.
    fn peer(&self) -> String;
}

/// Source of newly accepted connections.
pub trait Acceptor: Send {
    /// Returns the next pending connection, if one is waiting.
    fn poll_accept(&mut self) -> Option<Box<dyn Transport>>;
}

/// An acceptor that never yields a connection.
///
/// Useful when sessions are admitted directly through
/// [`SessionSupervisor::admit`](crate::session::SessionSupervisor::admit).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAcceptor;

impl Acceptor for NoAcceptor {
    fn poll_accept(&mut self) -> Option<Box<dyn Transport>> {
        None
    }
}

// Re-export key types
pub use memory::{MemoryAcceptor, MemoryConnector, MemoryPeer, MemoryTransport};
pub use tcp::{bind, ChannelAcceptor, TcpTransport};
