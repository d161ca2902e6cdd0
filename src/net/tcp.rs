use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpStream, UnixStream};

use crate::error::Error;
use crate::net::tls::TlsConfig;
use crate::net::{ExtraInfo, ExtraInfoKey, NetworkBackend, NetworkStream};

/// The default [`NetworkBackend`]: plain TCP/Unix sockets via `tokio`, TLS
/// via `tokio-rustls`.
pub struct TokioBackend {
    tls_config: Arc<TlsConfig>,
}

impl TokioBackend {
    pub fn new() -> TokioBackend {
        TokioBackend {
            tls_config: Arc::new(TlsConfig::with_webpki_roots()),
        }
    }

    pub fn with_tls_config(tls_config: TlsConfig) -> TokioBackend {
        TokioBackend {
            tls_config: Arc::new(tls_config),
        }
    }
}

impl Default for TokioBackend {
    fn default() -> Self {
        TokioBackend::new()
    }
}

#[async_trait]
impl NetworkBackend for TokioBackend {
    async fn connect_tcp(
        &self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
        local_address: Option<std::net::IpAddr>,
    ) -> Result<Box<dyn NetworkStream>, Error> {
        let connect = async {
            let addrs = tokio::net::lookup_host((host, port))
                .await
                .map_err(Error::connect)?;
            let mut last_err = None;
            for addr in addrs {
                let socket = match addr {
                    SocketAddr::V4(_) => tokio::net::TcpSocket::new_v4(),
                    SocketAddr::V6(_) => tokio::net::TcpSocket::new_v6(),
                }
                .map_err(Error::connect)?;
                if let Some(local) = local_address {
                    let bind_addr = SocketAddr::new(local, 0);
                    if socket.bind(bind_addr).is_err() {
                        continue;
                    }
                }
                match socket.connect(addr).await {
                    Ok(stream) => {
                        let _ = stream.set_nodelay(true);
                        return Ok(stream);
                    }
                    Err(e) => last_err = Some(e),
                }
            }
            Err(Error::connect(
                last_err.unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "no addresses resolved")),
            ))
        };
        let stream = match timeout {
            Some(d) => tokio::time::timeout(d, connect)
                .await
                .map_err(|_| Error::connect_timeout())??,
            None => connect.await?,
        };
        Ok(Box::new(TcpTransport { inner: stream }))
    }

    async fn connect_unix_socket(
        &self,
        path: &str,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn NetworkStream>, Error> {
        let connect = UnixStream::connect(path);
        let stream = match timeout {
            Some(d) => tokio::time::timeout(d, connect)
                .await
                .map_err(|_| Error::connect_timeout())?
                .map_err(Error::connect)?,
            None => connect.await.map_err(Error::connect)?,
        };
        Ok(Box::new(UnixTransport { inner: stream }))
    }

    async fn start_tls(
        &self,
        stream: Box<dyn NetworkStream>,
        server_hostname: &str,
        alpn_protocols: &[Vec<u8>],
        timeout: Option<Duration>,
    ) -> Result<Box<dyn NetworkStream>, Error> {
        let config = self.tls_config.client_config(alpn_protocols);
        let connector = tokio_rustls::TlsConnector::from(config);
        let server_name = rustls::ServerName::try_from(server_hostname)
            .map_err(|_| Error::local_protocol("invalid TLS server name"))?;
        let handshake = connector.connect(server_name, stream);
        let tls_stream = match timeout {
            Some(d) => tokio::time::timeout(d, handshake)
                .await
                .map_err(|_| Error::connect_timeout())?
                .map_err(Error::connect)?,
            None => handshake.await.map_err(Error::connect)?,
        };
        let alpn = tls_stream.get_ref().1.alpn_protocol().map(|p| p.to_vec());
        Ok(Box::new(TlsTransport {
            inner: tls_stream,
            alpn,
        }))
    }
}

struct TcpTransport {
    inner: TcpStream,
}

#[async_trait]
impl NetworkStream for TcpTransport {
    async fn close(&mut self) {
        let _ = self.inner.shutdown().await;
    }

    fn get_extra_info(&self, key: ExtraInfoKey) -> ExtraInfo {
        match key {
            ExtraInfoKey::ClientAddr => self
                .inner
                .local_addr()
                .map(ExtraInfo::Addr)
                .unwrap_or(ExtraInfo::None),
            ExtraInfoKey::ServerAddr => self
                .inner
                .peer_addr()
                .map(ExtraInfo::Addr)
                .unwrap_or(ExtraInfo::None),
            _ => ExtraInfo::None,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl AsyncRead for TcpTransport {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TcpTransport {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

struct UnixTransport {
    inner: UnixStream,
}

#[async_trait]
impl NetworkStream for UnixTransport {
    async fn close(&mut self) {
        let _ = self.inner.shutdown().await;
    }

    fn get_extra_info(&self, _key: ExtraInfoKey) -> ExtraInfo {
        ExtraInfo::None
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl AsyncRead for UnixTransport {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for UnixTransport {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

struct TlsTransport {
    inner: tokio_rustls::client::TlsStream<Box<dyn NetworkStream>>,
    alpn: Option<Vec<u8>>,
}

#[async_trait]
impl NetworkStream for TlsTransport {
    async fn close(&mut self) {
        let _ = tokio::io::AsyncWriteExt::shutdown(&mut self.inner).await;
    }

    fn get_extra_info(&self, key: ExtraInfoKey) -> ExtraInfo {
        match key {
            ExtraInfoKey::TlsObject => ExtraInfo::AlpnProtocol(self.alpn.clone()),
            other => self.inner.get_ref().0.get_extra_info(other),
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl AsyncRead for TlsTransport {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TlsTransport {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
