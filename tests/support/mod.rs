//! Shared helpers for the integration tests: building raw HTTP/1.1 response
//! bytes and wiring a pool against the in-memory mock backend.
#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use httpcore::{mock_backend, ConnectionPool, MockHandle, PoolConfig, Request, Scheme, Url};

/// A `ConnectionPool` backed by [`httpcore::MockBackend`], plus the handle
/// used to script reads and inspect writes.
pub fn pool(config: PoolConfig) -> (ConnectionPool, MockHandle) {
    let (backend, handle) = mock_backend();
    (ConnectionPool::new(config, Arc::new(backend)), handle)
}

pub fn url(scheme: Scheme, host: &str, port: Option<u16>, target: &str) -> Url {
    Url::new(scheme, host, port, Bytes::copy_from_slice(target.as_bytes()))
}

pub fn get(scheme: Scheme, host: &str, target: &str) -> Request {
    Request::new("GET", url(scheme, host, None, target))
}

/// Renders a complete HTTP/1.1 response as the bytes a server would send.
pub fn response_bytes(status: u16, extra_headers: &[(&str, &str)], body: &[u8]) -> Bytes {
    let mut head = format!("HTTP/1.1 {status} OK\r\n");
    for (name, value) in extra_headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");
    let mut out = head.into_bytes();
    out.extend_from_slice(body);
    Bytes::from(out)
}

/// A `Content-Length`-framed response carrying `body` verbatim.
pub fn content_length_response(status: u16, body: &[u8]) -> Bytes {
    response_bytes(status, &[("Content-Length", &body.len().to_string())], body)
}

/// A `Transfer-Encoding: chunked` response, `body` split into `chunk_size`
/// pieces.
pub fn chunked_response(status: u16, body: &[u8], chunk_size: usize) -> Bytes {
    let mut payload = Vec::new();
    for chunk in body.chunks(chunk_size.max(1)) {
        payload.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        payload.extend_from_slice(chunk);
        payload.extend_from_slice(b"\r\n");
    }
    payload.extend_from_slice(b"0\r\n\r\n");
    response_bytes(status, &[("Transfer-Encoding", "chunked")], &payload)
}

/// A close-delimited response: no `Content-Length`/chunked framing, body
/// ends only when the connection closes (served by exactly one read here,
/// followed by the mock's scripted EOF).
pub fn close_delimited_response(status: u16, body: &[u8]) -> Bytes {
    response_bytes(status, &[], body)
}
