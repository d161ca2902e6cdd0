//! The HTTP/1.1 engine: request/response framing over a single stream.
//!
//! Unlike the HTTP/2 engine, HTTP/1.1 has no multiplexing, so there's no
//! background dispatch task here; `send_request` and `read_response` just
//! drive the stream directly, one request at a time, which is all a single
//! HTTP/1.1 connection can ever do anyway.

mod body;
mod decode;
mod encode;
mod parse;
mod role;

pub(crate) use body::{Http1Body, ReleaseOutcome};
pub(crate) use parse::{parse_response_head, ParsedResponse};
pub(crate) use role::TargetForm;

use std::time::Duration;

use bytes::BytesMut;
use tokio::sync::oneshot;

use crate::body::{BoxBody, Body as _};
use crate::error::Error;
use crate::headers::HeaderList;
use crate::net::{read_timeout, write_timeout, NetworkStream};
use crate::request::Request;
use crate::response::{Response, ResponseBodyKind, ResponseMeta};
use crate::trace::{traced, TracePhase, Tracer};
use crate::version::HttpVersion;

const MAX_HEAD_SIZE: usize = 256 * 1024;

/// A `send_request` failure, tagged with whether it happened before any
/// request bytes (not even the head) reached the wire. That distinction is
/// what lets the pool decide whether an idle-reused connection the peer had
/// already closed is safe to transparently retry on a fresh connection.
pub(crate) struct SendError {
    pub(crate) error: Error,
    pub(crate) before_any_bytes: bool,
}

/// Writes the request line, headers, and (fully buffered or streamed) body
/// to `stream`.
pub(crate) async fn send_request(
    stream: &mut (dyn NetworkStream),
    request: &mut Request,
    target_form: TargetForm,
    proxy_headers: &HeaderList,
    host_header_value: &str,
    write_deadline: Option<Duration>,
    tracer: Option<&Tracer>,
) -> Result<(), SendError> {
    let target = role::request_target(request, target_form);
    let size_hint = request.body.size_hint();
    let is_end_stream = request.body.is_end_stream();
    let framing = if is_end_stream && size_hint.exact() != Some(0) {
        None
    } else {
        Some(encode::framing_for(size_hint.exact()))
    };

    let mut head = BytesMut::with_capacity(256);
    encode::encode_head(&mut head, request, &target, host_header_value, proxy_headers, framing);
    traced(tracer, TracePhase::SendRequestHeaders, false, write_timeout(stream, &head, write_deadline))
        .await
        .map_err(|error| SendError { error, before_any_bytes: true })?;

    if is_end_stream {
        return Ok(());
    }

    traced(
        tracer,
        TracePhase::SendRequestBody,
        false,
        write_body(stream, &mut request.body, framing, write_deadline),
    )
    .await
    .map_err(|error| SendError { error, before_any_bytes: false })
}

async fn read_head(stream: &mut (dyn NetworkStream), read_deadline: Option<Duration>) -> Result<ParsedResponse, Error> {
    let mut buf = BytesMut::with_capacity(4096);
    loop {
        if let Some(parsed) = parse::parse_response_head(&mut buf)? {
            return Ok(parsed);
        }
        if buf.len() >= MAX_HEAD_SIZE {
            return Err(Error::remote_protocol("response head too large"));
        }
        let mut chunk = [0u8; 4096];
        let n = read_timeout(stream, &mut chunk, read_deadline).await?;
        if n == 0 {
            return Err(Error::remote_protocol("connection closed before a response was received"));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

async fn write_body(
    stream: &mut (dyn NetworkStream),
    body: &mut BoxBody,
    framing: Option<encode::Framing>,
    write_deadline: Option<Duration>,
) -> Result<(), Error> {
    // `BoxBody` wraps a `Pin<Box<dyn Body>>`, so it is unconditionally
    // `Unpin` and can be polled straight out of a `&mut` borrow.
    loop {
        let chunk = std::future::poll_fn(|cx| std::pin::Pin::new(&mut *body).poll_data(cx)).await;
        match chunk {
            None => break,
            Some(Err(e)) => return Err(Error::local_protocol(e)),
            Some(Ok(data)) => {
                if data.is_empty() {
                    continue;
                }
                match framing {
                    Some(encode::Framing::Chunked) => {
                        let framed = encode::encode_chunk(&data);
                        write_timeout(stream, &framed, write_deadline).await?;
                    }
                    _ => {
                        write_timeout(stream, &data, write_deadline).await?;
                    }
                }
            }
        }
    }
    if let Some(encode::Framing::Chunked) = framing {
        write_timeout(stream, &encode::last_chunk(), write_deadline).await?;
    }
    Ok(())
}

/// Reads a full status line + header block, then the body (as a streaming
/// [`Http1Body`]), returning the assembled [`Response`] plus a receiver that
/// fires once the body finishes telling the caller whether the connection is
/// still reusable.
///
/// `connection_close_requested` is whether our own outgoing request declared
/// `Connection: close`; combined with the response's own framing and
/// `Connection` header, it decides whether the connection may be reused.
pub(crate) async fn read_response(
    mut stream: Box<dyn NetworkStream>,
    read_deadline: Option<Duration>,
    request_is_connect: bool,
    request_is_head: bool,
    connection_close_requested: bool,
    tracer: Option<&Tracer>,
) -> Result<(Response, oneshot::Receiver<ReleaseOutcome>), Error> {
    let parsed = traced(
        tracer,
        TracePhase::ReceiveResponseHeaders,
        false,
        read_head(&mut *stream, read_deadline),
    )
    .await?;

    let is_connect_success = request_is_connect && (200..300).contains(&parsed.status);
    let body_length =
        parse::response_body_length(parsed.status, &parsed.headers, request_is_head, request_is_connect)?;
    let force_close = connection_close_requested
        || matches!(body_length, decode::BodyLength::Close)
        || parse::response_wants_close(parsed.minor_version, &parsed.headers);

    let (tx, rx) = oneshot::channel();

    if is_connect_success {
        // The stream is handed to the caller verbatim; there is no HTTP body
        // and no reuse to report back to the pool.
        drop(tx);
        let meta = ResponseMeta {
            http_version: HttpVersion::Http11,
            reason_phrase: Some(parsed.reason),
            stream_id: None,
            body_kind: ResponseBodyKind::Upgraded(stream),
        };
        return Ok((
            Response {
                status: parsed.status,
                headers: parsed.headers,
                body: BoxBody::new(crate::body::Empty::new()),
                meta,
            },
            rx,
        ));
    }

    let decoder = decode::Decoder::new(body_length);
    let body = Http1Body::new(stream, parsed.leftover, decoder, read_deadline, tx, force_close, tracer.cloned());

    let meta = ResponseMeta {
        http_version: HttpVersion::Http11,
        reason_phrase: Some(parsed.reason),
        stream_id: None,
        body_kind: ResponseBodyKind::Http,
    };

    Ok((
        Response {
            status: parsed.status,
            headers: parsed.headers,
            body: BoxBody::new(body),
            meta,
        },
        rx,
    ))
}
