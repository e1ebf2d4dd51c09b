//! TCP transport.
//!
//! A background task accepts connections and hands them to the supervisor
//! through a bounded channel. Each accepted stream is wrapped in a
//! [`TcpTransport`] that only uses tokio's non-blocking `try_read` and
//! `try_write`, so the supervisor tick never awaits.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{Acceptor, Transport};

/// Bytes read from the socket per `try_read`.
const READ_CHUNK_SIZE: usize = 512;

/// Queued output beyond which a session is considered stuck.
const MAX_PENDING_OUTPUT: usize = 64 * 1024;

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A session byte stream over a tokio TCP socket.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    peer: String,
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    eof: bool,
}

impl TcpTransport {
    /// Wraps an accepted stream.
    pub fn new(stream: TcpStream, no_delay: bool) -> Self {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        if no_delay {
            if let Err(e) = stream.set_nodelay(true) {
                debug!(peer = %peer, error = %e, "Failed to disable Nagle");
            }
        }

        Self {
            stream: Some(stream),
            peer,
            inbound: VecDeque::new(),
            outbound: Vec::new(),
            eof: false,
        }
    }

    /// Pulls whatever the socket has ready into the inbound queue.
    fn fill_inbound(&mut self) {
        let Some(stream) = self.stream.as_ref() else {
            return;
        };
        if self.eof {
            return;
        }

        let mut buf = [0u8; READ_CHUNK_SIZE];
        match stream.try_read(&mut buf) {
            Ok(0) => {
                debug!(peer = %self.peer, "Peer closed connection");
                self.eof = true;
            }
            Ok(n) => self.inbound.extend(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => {
                debug!(peer = %self.peer, error = %e, "Read failed");
                self.eof = true;
            }
        }
    }

    /// Writes as much queued output as the socket accepts right now.
    fn drain_outbound(&mut self) -> io::Result<()> {
        let Some(stream) = self.stream.as_ref() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "stream closed"));
        };

        while !self.outbound.is_empty() {
            match stream.try_write(&self.outbound) {
                Ok(0) => {
                    return Err(io::Error::new(io::ErrorKind::WriteZero, "socket accepted no data"));
                }
                Ok(n) => {
                    self.outbound.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl Transport for TcpTransport {
    fn is_available(&mut self) -> bool {
        if self.inbound.is_empty() {
            self.fill_inbound();
        }
        !self.inbound.is_empty()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.inbound.pop_front()
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        if self.stream.is_none() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "stream closed"));
        }
        if self.outbound.len() + data.len() > MAX_PENDING_OUTPUT {
            warn!(
                peer = %self.peer,
                pending = self.outbound.len(),
                "Output backlog full, dropping connection"
            );
            self.stream = None;
            return Err(io::Error::new(io::ErrorKind::WouldBlock, "output backlog full"));
        }
        self.outbound.extend_from_slice(data);
        self.drain_outbound()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain_outbound()
    }

    fn close(&mut self) {
        if self.stream.is_some() {
            if let Err(e) = self.drain_outbound() {
                debug!(peer = %self.peer, error = %e, "Flush before close failed");
            }
        }

        let Some(mut stream) = self.stream.take() else {
            return;
        };
        let pending = std::mem::take(&mut self.outbound);

        // Deliver the farewell text in the background rather than block the tick.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let peer = self.peer.clone();
                handle.spawn(async move {
                    if !pending.is_empty() {
                        if let Err(e) = stream.write_all(&pending).await {
                            debug!(peer = %peer, error = %e, "Failed to deliver final output");
                        }
                    }
                    let _ = stream.shutdown().await;
                });
            }
            Err(_) => drop(stream),
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some() && !(self.eof && self.inbound.is_empty())
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }
}

/// Acceptor that drains streams delivered by the accept task.
pub struct ChannelAcceptor {
    rx: mpsc::Receiver<TcpStream>,
    no_delay: bool,
}

impl ChannelAcceptor {
    /// Creates an acceptor over a channel of accepted streams.
    pub fn new(rx: mpsc::Receiver<TcpStream>, no_delay: bool) -> Self {
        Self { rx, no_delay }
    }
}

impl Acceptor for ChannelAcceptor {
    fn poll_accept(&mut self) -> Option<Box<dyn Transport>> {
        let stream = self.rx.try_recv().ok()?;
        Some(Box::new(TcpTransport::new(stream, self.no_delay)))
    }
}

/// Binds `addr` and starts the accept task.
///
/// Returns the acceptor for the supervisor, the task handle and the bound
/// local address (useful when binding port 0). The task exits when
/// `shutdown` is cancelled or the acceptor is dropped.
pub async fn bind(
    addr: &str,
    backlog: usize,
    no_delay: bool,
    shutdown: CancellationToken,
) -> io::Result<(ChannelAcceptor, JoinHandle<()>, SocketAddr)> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    let (tx, rx) = mpsc::channel(backlog.max(1));

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Accept loop cancelled");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "New connection detected");
                        if tx.send(stream).await.is_err() {
                            debug!("Acceptor dropped, stopping accept loop");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    }
                },
            }
        }
    });

    Ok((ChannelAcceptor::new(rx, no_delay), handle, local_addr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::time::{sleep, timeout};

    async fn accept_one() -> (TcpTransport, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (TcpTransport::new(server, true), client)
    }

    async fn wait_available(transport: &mut TcpTransport) -> bool {
        for _ in 0..100 {
            if transport.is_available() {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_tcp_read_bytes() {
        let (mut transport, mut client) = accept_one().await;
        assert!(transport.is_connected());
        assert!(transport.peer().starts_with("127.0.0.1:"));

        client.write_all(b"ok").await.unwrap();
        assert!(wait_available(&mut transport).await);
        assert_eq!(transport.read_byte(), Some(b'o'));
        if !transport.is_available() {
            assert!(wait_available(&mut transport).await);
        }
        assert_eq!(transport.read_byte(), Some(b'k'));
    }

    #[tokio::test]
    async fn test_tcp_write_reaches_client() {
        let (mut transport, mut client) = accept_one().await;

        transport.write(b"\r>").unwrap();
        for _ in 0..50 {
            transport.flush().unwrap();
            sleep(Duration::from_millis(5)).await;
        }

        let mut buf = [0u8; 2];
        timeout(Duration::from_secs(2), client.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf, b"\r>");
    }

    #[tokio::test]
    async fn test_tcp_detects_peer_close() {
        let (mut transport, client) = accept_one().await;
        drop(client);

        let mut closed = false;
        for _ in 0..100 {
            transport.is_available();
            if !transport.is_connected() {
                closed = true;
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert!(closed);
    }

    #[tokio::test]
    async fn test_tcp_close_delivers_pending_output() {
        let (mut transport, mut client) = accept_one().await;

        transport.write(b"bye\r\n").unwrap();
        transport.close();
        assert!(!transport.is_connected());
        assert!(transport.write(b"late").is_err());

        let mut received = Vec::new();
        timeout(Duration::from_secs(2), client.read_to_end(&mut received))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, b"bye\r\n");
    }

    #[tokio::test]
    async fn test_bind_delivers_connections() {
        let token = CancellationToken::new();
        let (mut acceptor, handle, addr) = bind("127.0.0.1:0", 4, true, token.clone())
            .await
            .unwrap();

        let _client = TcpStream::connect(addr).await.unwrap();

        let mut accepted = None;
        for _ in 0..100 {
            if let Some(t) = acceptor.poll_accept() {
                accepted = Some(t);
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert!(accepted.is_some());

        token.cancel();
        timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    }
}
