//! The response body type produced by [`super::read_response`].
//!
//! Unlike [`crate::body::Incoming`] (fed by a channel from a task that has
//! already detached from the connection) this body owns the connection's
//! stream directly and drives the socket itself on every `poll_data` call.
//! It's how the engine reports back to the connection whether the stream is
//! still reusable once the body finishes (or is dropped early).

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use http_body::{Body, SizeHint};
use tokio::sync::oneshot;

use crate::body::BoxError;
use crate::error::Error;
use crate::net::NetworkStream;
use crate::proto::h1::decode::Decoder;
use crate::trace::{TraceEvent, TraceOutcome, TracePhase, Tracer};

/// What the engine hands back to the connection once a response body
/// finishes draining (or is abandoned).
pub(crate) enum ReleaseOutcome {
    /// The body was read to a clean end (or never had one): the stream and
    /// any bytes already read past it can go back in the pool.
    Reusable {
        stream: Box<dyn NetworkStream>,
        leftover: BytesMut,
    },
    /// The body was dropped before completion, or hit an error: the
    /// connection's framing state is no longer known-good.
    Close,
}

type DecodeFuture =
    Pin<Box<dyn Future<Output = Result<(Box<dyn NetworkStream>, BytesMut, Decoder, Bytes), Error>> + Send>>;

enum State {
    Idle {
        stream: Box<dyn NetworkStream>,
        leftover: BytesMut,
        decoder: Decoder,
    },
    Polling(DecodeFuture),
    Done,
}

pub(crate) struct Http1Body {
    state: State,
    timeout: Option<std::time::Duration>,
    release: Option<oneshot::Sender<ReleaseOutcome>>,
    /// Set when the connection must close once this body finishes, no
    /// matter what the decoder's own EOF state says: a close-delimited body
    /// (its end IS the peer closing the connection), or either side having
    /// declared `Connection: close` / HTTP/1.0-without-keep-alive.
    force_close: bool,
    tracer: Option<Tracer>,
}

impl Http1Body {
    pub(crate) fn new(
        stream: Box<dyn NetworkStream>,
        leftover: BytesMut,
        decoder: Decoder,
        timeout: Option<std::time::Duration>,
        release: oneshot::Sender<ReleaseOutcome>,
        force_close: bool,
        tracer: Option<Tracer>,
    ) -> Http1Body {
        let force_close = force_close || decoder.is_close_delimited();
        if decoder.is_eof() {
            let outcome = if force_close {
                ReleaseOutcome::Close
            } else {
                ReleaseOutcome::Reusable { stream, leftover }
            };
            emit_response_closed(&tracer, Ok(()));
            let _ = release.send(outcome);
            return Http1Body {
                state: State::Done,
                timeout,
                release: None,
                force_close,
                tracer,
            };
        }
        Http1Body {
            state: State::Idle {
                stream,
                leftover,
                decoder,
            },
            timeout,
            release: Some(release),
            force_close,
            tracer,
        }
    }
}

async fn decode_one(
    mut stream: Box<dyn NetworkStream>,
    mut leftover: BytesMut,
    mut decoder: Decoder,
    timeout: Option<std::time::Duration>,
) -> Result<(Box<dyn NetworkStream>, BytesMut, Decoder, Bytes), Error> {
    let bytes = decoder.decode_next(&mut *stream, &mut leftover, timeout).await?;
    Ok((stream, leftover, decoder, bytes))
}

/// Runs [`decode_one`] wrapped in a `ReceiveResponseBody` trace span. Takes
/// `tracer` by value (cloning the `Arc`) so the returned future is `'static`
/// and can live in [`State::Polling`] across `poll_data` calls.
fn decode_one_traced(
    stream: Box<dyn NetworkStream>,
    leftover: BytesMut,
    decoder: Decoder,
    timeout: Option<std::time::Duration>,
    tracer: Option<Tracer>,
) -> impl Future<Output = Result<(Box<dyn NetworkStream>, BytesMut, Decoder, Bytes), Error>> + Send + 'static {
    async move {
        crate::trace::traced(
            tracer.as_ref(),
            TracePhase::ReceiveResponseBody,
            false,
            decode_one(stream, leftover, decoder, timeout),
        )
        .await
    }
}

fn emit_response_closed(tracer: &Option<Tracer>, outcome: Result<(), &Error>) {
    if let Some(tracer) = tracer {
        let outcome = match outcome {
            Ok(()) => TraceOutcome::Complete,
            Err(e) => TraceOutcome::Failed(e),
        };
        tracer(&TraceEvent {
            phase: TracePhase::ResponseClosed,
            http2: false,
            outcome,
        });
    }
}

impl Body for Http1Body {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_data(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Bytes, BoxError>>> {
        let this = self.get_mut();
        loop {
            match std::mem::replace(&mut this.state, State::Done) {
                State::Done => return Poll::Ready(None),
                State::Idle { stream, leftover, decoder } => {
                    this.state = State::Polling(Box::pin(decode_one_traced(
                        stream,
                        leftover,
                        decoder,
                        this.timeout,
                        this.tracer.clone(),
                    )));
                }
                State::Polling(mut fut) => match fut.as_mut().poll(cx) {
                    Poll::Pending => {
                        this.state = State::Polling(fut);
                        return Poll::Pending;
                    }
                    Poll::Ready(Err(e)) => {
                        emit_response_closed(&this.tracer, Err(&e));
                        if let Some(tx) = this.release.take() {
                            let _ = tx.send(ReleaseOutcome::Close);
                        }
                        return Poll::Ready(Some(Err(Box::new(e))));
                    }
                    Poll::Ready(Ok((stream, leftover, decoder, bytes))) => {
                        if bytes.is_empty() {
                            emit_response_closed(&this.tracer, Ok(()));
                            if let Some(tx) = this.release.take() {
                                let outcome = if decoder.is_eof() && !this.force_close {
                                    ReleaseOutcome::Reusable { stream, leftover }
                                } else {
                                    ReleaseOutcome::Close
                                };
                                let _ = tx.send(outcome);
                            }
                            return Poll::Ready(None);
                        }
                        this.state = State::Idle { stream, leftover, decoder };
                        return Poll::Ready(Some(Ok(bytes)));
                    }
                },
            }
        }
    }

    fn poll_trailers(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<http::HeaderMap>, BoxError>> {
        Poll::Ready(Ok(None))
    }

    fn is_end_stream(&self) -> bool {
        matches!(self.state, State::Done)
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::default()
    }
}

impl Drop for Http1Body {
    fn drop(&mut self) {
        if let Some(tx) = self.release.take() {
            let _ = tx.send(ReleaseOutcome::Close);
        }
    }
}
