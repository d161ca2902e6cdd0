//! The network backend contract: how the engine dials and upgrades streams.
//!
//! This is the one collaborator treated as external: something that
//! opens TCP/Unix streams, performs a TLS upgrade, and exposes byte-level
//! read/write/close plus a few extra-info queries. The pool, connection, and
//! protocol engines are written entirely against [`NetworkBackend`] and
//! [`NetworkStream`] so the production `tokio` implementation and the
//! in-memory mock used by the test suite are interchangeable.

mod mock;
mod tcp;
mod tls;

pub use mock::{mock_backend, MockBackend, MockHandle};
pub use tcp::TokioBackend;
pub use tls::TlsConfig;

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Error;

/// Recognised keys for [`NetworkStream::get_extra_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraInfoKey {
    ClientAddr,
    ServerAddr,
    TlsObject,
    Socket,
}

/// The value returned for an [`ExtraInfoKey`] query.
#[derive(Debug, Clone)]
pub enum ExtraInfo {
    Addr(SocketAddr),
    /// Negotiated ALPN protocol, if any.
    AlpnProtocol(Option<Vec<u8>>),
    None,
}

/// A connected, byte-oriented transport: a TCP socket, a Unix socket, or
/// either wrapped in a TLS session.
///
/// Implementors must be both `AsyncRead` and `AsyncWrite` so the protocol
/// engines (which drive `httparse`/`h2` directly against the stream) can use
/// it without going through the extra `read`/`write` methods; those methods
/// exist for callers (the connect/TLS/proxy machinery) that need per-call
/// timeouts and don't want to thread a `tokio::time::timeout` through every
/// call site by hand.
#[async_trait]
pub trait NetworkStream: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static {
    async fn close(&mut self);

    fn get_extra_info(&self, key: ExtraInfoKey) -> ExtraInfo;

    /// Escape hatch for test doubles that need to recover their concrete
    /// state across a `start_tls` re-wrap (see `net::mock`).
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Opens transports and performs the TLS upgrade. The default production
/// implementation is [`TokioBackend`]; tests substitute [`MockBackend`].
#[async_trait]
pub trait NetworkBackend: Send + Sync {
    async fn connect_tcp(
        &self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
        local_address: Option<std::net::IpAddr>,
    ) -> Result<Box<dyn NetworkStream>, Error>;

    async fn connect_unix_socket(
        &self,
        path: &str,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn NetworkStream>, Error>;

    /// Upgrades `stream` to TLS, returning a new stream. `stream` must not
    /// be used again afterwards. `alpn_protocols` is offered in the
    /// `ClientHello`; the negotiated protocol is readable afterwards via
    /// `get_extra_info(ExtraInfoKey::TlsObject)`.
    async fn start_tls(
        &self,
        stream: Box<dyn NetworkStream>,
        server_hostname: &str,
        alpn_protocols: &[Vec<u8>],
        timeout: Option<Duration>,
    ) -> Result<Box<dyn NetworkStream>, Error>;
}

impl fmt::Debug for dyn NetworkBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn NetworkBackend")
    }
}

// `tokio_rustls` and the h1/h2 engines need to drive a boxed trait object
// directly as an `AsyncRead + AsyncWrite`; these forward to the concrete
// stream behind the box.
impl AsyncRead for Box<dyn NetworkStream> {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut **self.get_mut()).poll_read(cx, buf)
    }
}

impl AsyncWrite for Box<dyn NetworkStream> {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        std::pin::Pin::new(&mut **self.get_mut()).poll_write(cx, buf)
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut **self.get_mut()).poll_flush(cx)
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut **self.get_mut()).poll_shutdown(cx)
    }
}

/// Reads up to `max_bytes`, honoring `timeout`. An empty result means EOF.
pub(crate) async fn read_timeout<S: AsyncRead + Unpin + ?Sized>(
    stream: &mut S,
    buf: &mut [u8],
    timeout: Option<Duration>,
) -> Result<usize, Error> {
    use tokio::io::AsyncReadExt;
    let fut = stream.read(buf);
    let n = match timeout {
        Some(d) => tokio::time::timeout(d, fut)
            .await
            .map_err(|_| Error::read_timeout())??,
        None => fut.await?,
    };
    Ok(n)
}

/// Writes all of `buf`, honoring `timeout`.
pub(crate) async fn write_timeout<S: AsyncWrite + Unpin + ?Sized>(
    stream: &mut S,
    buf: &[u8],
    timeout: Option<Duration>,
) -> Result<(), Error> {
    use tokio::io::AsyncWriteExt;
    let fut = stream.write_all(buf);
    match timeout {
        Some(d) => tokio::time::timeout(d, fut)
            .await
            .map_err(|_| Error::write_timeout())?
            .map_err(Error::write)?,
        None => fut.await.map_err(Error::write)?,
    }
    Ok(())
}
