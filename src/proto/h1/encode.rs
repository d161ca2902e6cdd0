//! Request-line, header block, and body-framing serialization.

use bytes::{BufMut, Bytes, BytesMut};

use crate::headers::HeaderList;
use crate::request::Request;

/// How the request body will be framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Framing {
    Known(u64),
    Chunked,
}

/// Picks a framing for a request body given its declared size.
///
/// A known size emits `Content-Length`; an unknown one (streaming bodies
/// without a size hint) falls back to `Transfer-Encoding: chunked`, per
/// RFC 7230 §3.3.1.
pub(crate) fn framing_for(size_hint_exact: Option<u64>) -> Framing {
    match size_hint_exact {
        Some(n) => Framing::Known(n),
        None => Framing::Chunked,
    }
}

/// Writes the request line and header block (not the body) into `buf`.
///
/// `target` is the request-target to emit: origin-form (`/path?query`) for
/// direct and tunnel-proxied connections, absolute-form
/// (`http://host/path?query`) for plain forward-proxy connections.
/// `host_header_value` is the connection's origin host, used only if the
/// caller didn't already supply a `Host` header.
pub(crate) fn encode_head(
    buf: &mut BytesMut,
    request: &Request,
    target: &[u8],
    host_header_value: &str,
    extra_headers: &HeaderList,
    framing: Option<Framing>,
) {
    buf.put_slice(&request.method);
    buf.put_slice(b" ");
    buf.put_slice(target);
    buf.put_slice(b" HTTP/1.1\r\n");

    let mut wrote_host = false;
    let mut wrote_content_length = false;
    let mut wrote_transfer_encoding = false;

    for field in request.headers.iter() {
        if field.name.eq_ignore_ascii_case(b"host") {
            wrote_host = true;
        }
        if field.name.eq_ignore_ascii_case(b"content-length") {
            wrote_content_length = true;
        }
        if field.name.eq_ignore_ascii_case(b"transfer-encoding") {
            wrote_transfer_encoding = true;
        }
        write_header_line(buf, &field.name, &field.value);
    }

    if !wrote_host {
        write_header_line(buf, b"Host", host_header_value.as_bytes());
    }

    for field in extra_headers.iter() {
        write_header_line(buf, &field.name, &field.value);
    }

    if !wrote_content_length && !wrote_transfer_encoding {
        match framing {
            Some(Framing::Known(n)) => {
                write_header_line(buf, b"Content-Length", n.to_string().as_bytes());
            }
            Some(Framing::Chunked) => {
                write_header_line(buf, b"Transfer-Encoding", b"chunked");
            }
            None => {}
        }
    }

    buf.put_slice(b"\r\n");
}

fn write_header_line(buf: &mut BytesMut, name: &[u8], value: &[u8]) {
    buf.put_slice(name);
    buf.put_slice(b": ");
    buf.put_slice(value);
    buf.put_slice(b"\r\n");
}

/// Wraps one body chunk in its chunk-size line and trailing CRLF.
pub(crate) fn encode_chunk(data: &[u8]) -> Bytes {
    if data.is_empty() {
        return last_chunk();
    }
    let mut buf = BytesMut::with_capacity(data.len() + 16);
    buf.put_slice(format!("{:x}\r\n", data.len()).as_bytes());
    buf.put_slice(data);
    buf.put_slice(b"\r\n");
    buf.freeze()
}

pub(crate) fn last_chunk() -> Bytes {
    Bytes::from_static(b"0\r\n\r\n")
}
