//! `CONNECT`-tunnel proxying: one HTTP/1.1 request/response exchange with
//! the proxy, then the raw stream is handed back for the caller to drive
//! (optionally under TLS) as if it were a direct connection.

use std::time::Duration;

use bytes::{BufMut, BytesMut};

use crate::error::Error;
use crate::net::{write_timeout, NetworkBackend, NetworkStream};
use crate::origin::Origin;
use crate::proto::h1::parse_response_head;
use crate::request::ProxyAuth;

use super::ProxyConfig;

pub(crate) async fn connect(
    backend: &dyn NetworkBackend,
    proxy: &ProxyConfig,
    target: &Origin,
    connect_timeout: Option<Duration>,
    local_address: Option<std::net::IpAddr>,
    request_auth: Option<&ProxyAuth>,
) -> Result<Box<dyn NetworkStream>, Error> {
    let mut stream = backend
        .connect_tcp(&proxy.origin.host, proxy.origin.port, connect_timeout, local_address)
        .await?;

    // Unlike a `Host` header, the CONNECT authority must always carry an
    // explicit port (RFC 7231 §4.3.6): the proxy has no other way to know
    // which port to dial, even when it happens to be the scheme's default.
    let authority = format!("{}:{}", target.host, target.port);

    let mut head = BytesMut::with_capacity(256);
    head.put_slice(b"CONNECT ");
    head.put_slice(authority.as_bytes());
    head.put_slice(b" HTTP/1.1\r\n");
    head.put_slice(b"Host: ");
    head.put_slice(authority.as_bytes());
    head.put_slice(b"\r\n");
    for field in super::proxy_request_headers(proxy, request_auth).iter() {
        head.put_slice(&field.name);
        head.put_slice(b": ");
        head.put_slice(&field.value);
        head.put_slice(b"\r\n");
    }
    head.put_slice(b"\r\n");

    write_timeout(&mut *stream, &head, connect_timeout).await?;

    let mut buf = BytesMut::with_capacity(1024);
    let parsed = loop {
        if let Some(parsed) = parse_response_head(&mut buf)? {
            break parsed;
        }
        let mut chunk = [0u8; 1024];
        let n = crate::net::read_timeout(&mut *stream, &mut chunk, connect_timeout).await?;
        if n == 0 {
            return Err(Error::proxy("proxy closed the connection during CONNECT"));
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    if !(200..300).contains(&parsed.status) {
        return Err(Error::proxy(format!(
            "proxy CONNECT to {authority} failed with status {}",
            parsed.status
        )));
    }

    if !parsed.leftover.is_empty() {
        return Err(Error::proxy("proxy sent data before the tunnel was established"));
    }

    Ok(stream)
}
