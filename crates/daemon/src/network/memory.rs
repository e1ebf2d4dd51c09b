//! In-process transports.
//!
//! A [`MemoryTransport`] and its [`MemoryPeer`] share a pipe: whatever the
//! peer sends becomes session input, and everything the session writes is
//! collected for the peer to inspect. The supervisor side and the peer side
//! can live on different threads.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Acceptor, Transport};

#[derive(Debug, Default)]
struct Pipe {
    input: VecDeque<u8>,
    output: Vec<u8>,
    closed_by_server: bool,
    closed_by_peer: bool,
}

fn lock(pipe: &Mutex<Pipe>) -> MutexGuard<'_, Pipe> {
    pipe.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Server side of an in-memory connection.
#[derive(Debug)]
pub struct MemoryTransport {
    pipe: Arc<Mutex<Pipe>>,
    peer: String,
}

/// Client side of an in-memory connection.
#[derive(Debug, Clone)]
pub struct MemoryPeer {
    pipe: Arc<Mutex<Pipe>>,
}

impl MemoryTransport {
    /// Creates a connected transport/peer pair.
    pub fn pair(peer: impl Into<String>) -> (MemoryTransport, MemoryPeer) {
        let pipe = Arc::new(Mutex::new(Pipe::default()));
        let transport = MemoryTransport {
            pipe: Arc::clone(&pipe),
            peer: peer.into(),
        };
        (transport, MemoryPeer { pipe })
    }
}

impl Transport for MemoryTransport {
    fn is_available(&mut self) -> bool {
        let pipe = lock(&self.pipe);
        !pipe.closed_by_server && !pipe.input.is_empty()
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut pipe = lock(&self.pipe);
        if pipe.closed_by_server {
            return None;
        }
        pipe.input.pop_front()
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let mut pipe = lock(&self.pipe);
        if pipe.closed_by_server || pipe.closed_by_peer {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "memory pipe closed"));
        }
        pipe.output.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) {
        lock(&self.pipe).closed_by_server = true;
    }

    fn is_connected(&self) -> bool {
        let pipe = lock(&self.pipe);
        !pipe.closed_by_server && !pipe.closed_by_peer
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }
}

impl MemoryPeer {
    /// Queues bytes as session input.
    pub fn send(&self, data: &[u8]) {
        lock(&self.pipe).input.extend(data.iter().copied());
    }

    /// Takes everything the session has written so far.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut lock(&self.pipe).output)
    }

    /// Takes the session output as (lossy) text.
    pub fn take_text(&self) -> String {
        String::from_utf8_lossy(&self.take_output()).into_owned()
    }

    /// Returns true once the server closed the connection.
    pub fn is_closed(&self) -> bool {
        lock(&self.pipe).closed_by_server
    }

    /// Hangs up from the client side.
    pub fn disconnect(&self) {
        lock(&self.pipe).closed_by_peer = true;
    }
}

/// Acceptor fed by a [`MemoryConnector`].
#[derive(Debug)]
pub struct MemoryAcceptor {
    pending: Arc<Mutex<VecDeque<MemoryTransport>>>,
}

/// Opens in-memory connections towards a [`MemoryAcceptor`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    pending: Arc<Mutex<VecDeque<MemoryTransport>>>,
    next_id: Arc<AtomicUsize>,
}

impl MemoryAcceptor {
    /// Creates an acceptor and the connector that feeds it.
    pub fn new() -> (MemoryAcceptor, MemoryConnector) {
        let pending = Arc::new(Mutex::new(VecDeque::new()));
        let acceptor = MemoryAcceptor {
            pending: Arc::clone(&pending),
        };
        let connector = MemoryConnector {
            pending,
            next_id: Arc::new(AtomicUsize::new(1)),
        };
        (acceptor, connector)
    }
}

impl Acceptor for MemoryAcceptor {
    fn poll_accept(&mut self) -> Option<Box<dyn Transport>> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .map(|t| Box::new(t) as Box<dyn Transport>)
    }
}

impl MemoryConnector {
    /// Queues a new connection and returns its client side.
    pub fn connect(&self) -> MemoryPeer {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (transport, peer) = MemoryTransport::pair(format!("memory:{}", id));
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(transport);
        peer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_roundtrip() {
        let (mut transport, peer) = MemoryTransport::pair("memory:test");
        assert!(!transport.is_available());

        peer.send(b"hi");
        assert!(transport.is_available());
        assert_eq!(transport.read_byte(), Some(b'h'));
        assert_eq!(transport.read_byte(), Some(b'i'));
        assert!(!transport.is_available());

        transport.write(b"hello").unwrap();
        assert_eq!(peer.take_output(), b"hello");
        assert!(peer.take_output().is_empty());
    }

    #[test]
    fn test_server_close() {
        let (mut transport, peer) = MemoryTransport::pair("memory:test");
        transport.close();
        assert!(!transport.is_connected());
        assert!(peer.is_closed());
        assert!(transport.write(b"late").is_err());
    }

    #[test]
    fn test_peer_disconnect() {
        let (transport, peer) = MemoryTransport::pair("memory:test");
        peer.disconnect();
        assert!(!transport.is_connected());
        assert!(!peer.is_closed());
    }

    #[test]
    fn test_acceptor_yields_in_order() {
        let (mut acceptor, connector) = MemoryAcceptor::new();
        assert!(acceptor.poll_accept().is_none());

        let _a = connector.connect();
        let _b = connector.connect();

        let first = acceptor.poll_accept().unwrap();
        let second = acceptor.poll_accept().unwrap();
        assert_eq!(first.peer(), "memory:1");
        assert_eq!(second.peer(), "memory:2");
        assert!(acceptor.poll_accept().is_none());
    }
}
