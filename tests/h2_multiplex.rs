//! HTTP/2 multiplexing: many concurrent requests to one origin share a
//! single connection.
//!
//! Unlike the other scenario tests, this one needs a real HTTP/2 peer (the
//! `h2` frame layer can't be faked with scripted bytes the way HTTP/1.1 can),
//! so it pairs this crate's client engine against `h2::server` over an
//! in-memory `tokio::io::duplex` instead of the usual mock backend.

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

use httpcore::{Error, ExtraInfo, ExtraInfoKey, NetworkBackend, NetworkStream, PoolConfig, Scheme};

struct DuplexBackend {
    connects: Arc<AtomicUsize>,
}

#[async_trait]
impl NetworkBackend for DuplexBackend {
    async fn connect_tcp(
        &self,
        _host: &str,
        _port: u16,
        _timeout: Option<Duration>,
        _local_address: Option<std::net::IpAddr>,
    ) -> Result<Box<dyn NetworkStream>, Error> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (client, server) = tokio::io::duplex(256 * 1024);
        tokio::spawn(serve_one_connection(server));
        Ok(Box::new(Adapter(client)))
    }

    async fn connect_unix_socket(
        &self,
        _path: &str,
        _timeout: Option<Duration>,
    ) -> Result<Box<dyn NetworkStream>, Error> {
        unreachable!("this test never dials a unix socket")
    }

    async fn start_tls(
        &self,
        _stream: Box<dyn NetworkStream>,
        _server_hostname: &str,
        _alpn_protocols: &[Vec<u8>],
        _timeout: Option<Duration>,
    ) -> Result<Box<dyn NetworkStream>, Error> {
        unreachable!("this test only exercises the plain-origin, prior-knowledge h2 path")
    }
}

struct Adapter(DuplexStream);

impl AsyncRead for Adapter {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_read(cx, buf)
    }
}

impl AsyncWrite for Adapter {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.get_mut().0).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_shutdown(cx)
    }
}

#[async_trait]
impl NetworkStream for Adapter {
    async fn close(&mut self) {}

    fn get_extra_info(&self, _key: ExtraInfoKey) -> ExtraInfo {
        ExtraInfo::None
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

async fn serve_one_connection(io: DuplexStream) {
    let mut connection = h2::server::handshake(io).await.expect("h2 server handshake");
    while let Some(result) = connection.accept().await {
        let (_request, mut respond) = result.expect("h2 server accept");
        tokio::spawn(async move {
            let response = http::Response::builder().status(200).body(()).unwrap();
            let mut send_stream = respond.send_response(response, false).expect("send response headers");
            send_stream.send_data(Bytes::from_static(b"ok"), true).expect("send response body");
        });
    }
}

#[tokio::test]
async fn ten_concurrent_requests_share_one_h2_connection() {
    let connects = Arc::new(AtomicUsize::new(0));
    let backend = Arc::new(DuplexBackend { connects: connects.clone() });
    let config = PoolConfig {
        // Forces the first-in request to win the only slot and establish
        // the connection; the rest queue behind it via `try_assign` and
        // then multiplex onto it once it exists, rather than each racing
        // to open their own.
        max_connections: 1,
        http1: false,
        http2: true,
        ..PoolConfig::default()
    };
    let pool = httpcore::ConnectionPool::new(config, backend);

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            let request = httpcore::Request::new("GET", httpcore::Url::new(Scheme::Http, "example.com", None, "/"));
            let response = pool.handle_request(request).await.unwrap();
            let body = httpcore::body::to_bytes(response.body).await.unwrap();
            assert_eq!(&body[..], b"ok");
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert_eq!(pool.connection_count().await, 1);
}
