//! An in-memory [`NetworkBackend`] for integration tests: no real sockets,
//! writes are recorded verbatim, reads are served from a script the test
//! pre-loads. `start_tls` does not perform real cryptography: it just marks
//! the stream "upgraded" and reports whichever ALPN protocol the test
//! scripted, so pool/engine scheduling logic can be exercised without a
//! live TLS stack.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::error::Error;
use crate::net::{ExtraInfo, ExtraInfoKey, NetworkBackend, NetworkStream};

#[derive(Default)]
struct ConnState {
    writes: Vec<u8>,
    reads: VecDeque<Bytes>,
    closed: bool,
    /// Set by [`MockHandle::simulate_peer_reset`]: the next write on this
    /// connection fails, as a real socket would once the peer has already
    /// torn down the connection.
    peer_reset: bool,
}

#[derive(Default)]
struct Shared {
    connections: Vec<Arc<Mutex<ConnState>>>,
    tcp_connects: usize,
    tls_handshakes: usize,
    /// ALPN protocol the *next* `start_tls` call should report negotiated.
    next_alpn: Option<Vec<u8>>,
    /// Read scripts queued for upcoming `connect_tcp`/`connect_unix_socket`
    /// calls, consumed in order.
    queued_reads: VecDeque<Vec<Bytes>>,
}

/// The production-facing backend handle, given to a `ConnectionPool`.
#[derive(Clone)]
pub struct MockBackend {
    shared: Arc<Mutex<Shared>>,
}

/// The test-facing handle: scripts reads and inspects what was written.
#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<Mutex<Shared>>,
}

pub fn mock_backend() -> (MockBackend, MockHandle) {
    let shared = Arc::new(Mutex::new(Shared::default()));
    (
        MockBackend { shared: shared.clone() },
        MockHandle { shared },
    )
}

impl MockHandle {
    /// Queues the bytes the next new connection's reads will yield, in
    /// order, before EOF.
    pub fn queue_reads(&self, chunks: Vec<Bytes>) {
        self.shared.lock().unwrap().queued_reads.push_back(chunks);
    }

    /// Sets the ALPN protocol the next `start_tls` call will report.
    pub fn set_next_alpn(&self, proto: Option<&[u8]>) {
        self.shared.lock().unwrap().next_alpn = proto.map(|p| p.to_vec());
    }

    pub fn tcp_connect_count(&self) -> usize {
        self.shared.lock().unwrap().tcp_connects
    }

    pub fn tls_handshake_count(&self) -> usize {
        self.shared.lock().unwrap().tls_handshakes
    }

    /// All bytes written on connection `index` (0-based, in connect order).
    pub fn written(&self, index: usize) -> Vec<u8> {
        self.shared.lock().unwrap().connections[index]
            .lock()
            .unwrap()
            .writes
            .clone()
    }

    pub fn connection_count(&self) -> usize {
        self.shared.lock().unwrap().connections.len()
    }

    /// Makes the next write on connection `index` (0-based, in connect
    /// order) fail, simulating a peer that already closed the socket.
    pub fn simulate_peer_reset(&self, index: usize) {
        self.shared.lock().unwrap().connections[index].lock().unwrap().peer_reset = true;
    }
}

#[async_trait]
impl NetworkBackend for MockBackend {
    async fn connect_tcp(
        &self,
        _host: &str,
        _port: u16,
        _timeout: Option<Duration>,
        _local_address: Option<std::net::IpAddr>,
    ) -> Result<Box<dyn NetworkStream>, Error> {
        let mut shared = self.shared.lock().unwrap();
        shared.tcp_connects += 1;
        let reads = shared.queued_reads.pop_front().unwrap_or_default();
        let state = Arc::new(Mutex::new(ConnState {
            reads: reads.into_iter().collect(),
            ..Default::default()
        }));
        shared.connections.push(state.clone());
        Ok(Box::new(MockStream { state, alpn: None }))
    }

    async fn connect_unix_socket(
        &self,
        _path: &str,
        _timeout: Option<Duration>,
    ) -> Result<Box<dyn NetworkStream>, Error> {
        self.connect_tcp("", 0, None, None).await
    }

    async fn start_tls(
        &self,
        stream: Box<dyn NetworkStream>,
        _server_hostname: &str,
        _alpn_protocols: &[Vec<u8>],
        _timeout: Option<Duration>,
    ) -> Result<Box<dyn NetworkStream>, Error> {
        let mut shared = self.shared.lock().unwrap();
        shared.tls_handshakes += 1;
        let alpn = shared.next_alpn.take();
        drop(shared);
        // Re-home the same recorded state under the TLS-wrapped stream so
        // writes/reads after the handshake still land on the same log.
        let state = stream
            .as_any()
            .downcast_ref::<MockStream>()
            .expect("MockBackend::start_tls called with a foreign stream")
            .state
            .clone();
        Ok(Box::new(MockStream { state, alpn }))
    }
}

struct MockStream {
    state: Arc<Mutex<ConnState>>,
    alpn: Option<Vec<u8>>,
}

#[async_trait]
impl NetworkStream for MockStream {
    async fn close(&mut self) {
        self.state.lock().unwrap().closed = true;
    }

    fn get_extra_info(&self, key: ExtraInfoKey) -> ExtraInfo {
        match key {
            ExtraInfoKey::TlsObject => ExtraInfo::AlpnProtocol(self.alpn.clone()),
            _ => ExtraInfo::None,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl AsyncRead for MockStream {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let mut state = self.state.lock().unwrap();
        if let Some(chunk) = state.reads.pop_front() {
            let n = chunk.len().min(buf.remaining());
            buf.put_slice(&chunk[..n]);
            if n < chunk.len() {
                state.reads.push_front(chunk.slice(n..));
            }
        }
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        let mut state = self.state.lock().unwrap();
        if state.peer_reset {
            return Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "peer reset the connection")));
        }
        state.writes.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
