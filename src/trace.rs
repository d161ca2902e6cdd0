//! The typed trace-event contract: a per-request observability hook.
//!
//! This is distinct from the `tracing`-backed `debug!`/`trace!` macros in
//! `macros.rs`: those are for operators with a subscriber installed, this is
//! a public, stable, per-request hook a caller attaches via
//! [`crate::request::RequestOptions::trace`].

use std::fmt;
use std::sync::Arc;

use crate::error::Error;

/// One step of a connection or request lifecycle, paired as `started` /
/// `complete` / `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracePhase {
    ConnectTcp,
    StartTls,
    SendRequestHeaders,
    SendRequestBody,
    ReceiveResponseHeaders,
    ReceiveResponseBody,
    ResponseClosed,
    SendConnectionInit,
}

impl TracePhase {
    fn engine_prefix(self, http2: bool) -> &'static str {
        match (self, http2) {
            (TracePhase::ConnectTcp, _) => "connection.connect_tcp",
            (TracePhase::StartTls, _) => "connection.start_tls",
            (TracePhase::SendConnectionInit, _) => "http2.send_connection_init",
            (TracePhase::SendRequestHeaders, false) => "http11.send_request_headers",
            (TracePhase::SendRequestHeaders, true) => "http2.send_request_headers",
            (TracePhase::SendRequestBody, false) => "http11.send_request_body",
            (TracePhase::SendRequestBody, true) => "http2.send_request_body",
            (TracePhase::ReceiveResponseHeaders, false) => "http11.receive_response_headers",
            (TracePhase::ReceiveResponseHeaders, true) => "http2.receive_response_headers",
            (TracePhase::ReceiveResponseBody, false) => "http11.receive_response_body",
            (TracePhase::ReceiveResponseBody, true) => "http2.receive_response_body",
            (TracePhase::ResponseClosed, false) => "http11.response_closed",
            (TracePhase::ResponseClosed, true) => "http2.response_closed",
        }
    }
}

/// The outcome half of a traced step.
pub enum TraceOutcome<'a> {
    Started,
    Complete,
    Failed(&'a Error),
}

/// A single event handed to a [`Tracer`].
pub struct TraceEvent<'a> {
    pub phase: TracePhase,
    pub http2: bool,
    pub outcome: TraceOutcome<'a>,
}

impl<'a> TraceEvent<'a> {
    /// The dotted event name, e.g. `connection.connect_tcp.started`.
    pub fn name(&self) -> String {
        let suffix = match self.outcome {
            TraceOutcome::Started => "started",
            TraceOutcome::Complete => "complete",
            TraceOutcome::Failed(_) => "failed",
        };
        format!("{}.{}", self.phase.engine_prefix(self.http2), suffix)
    }
}

impl<'a> fmt::Debug for TraceEvent<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceEvent").field("name", &self.name()).finish()
    }
}

/// A per-request trace callback, as attached via `RequestOptions::trace`.
pub type Tracer = Arc<dyn Fn(&TraceEvent<'_>) + Send + Sync>;

/// Emits `.started`, running `f`, and emitting `.complete`/`.failed` with the
/// result, returning it unchanged. Used at every suspension point a caller
/// might want visibility into: DNS, connect, TLS handshake, request write,
/// response read.
pub(crate) async fn traced<T, F>(
    tracer: Option<&Tracer>,
    phase: TracePhase,
    http2: bool,
    f: F,
) -> Result<T, Error>
where
    F: std::future::Future<Output = Result<T, Error>>,
{
    if let Some(tracer) = tracer {
        tracer(&TraceEvent {
            phase,
            http2,
            outcome: TraceOutcome::Started,
        });
    }
    match f.await {
        Ok(value) => {
            if let Some(tracer) = tracer {
                tracer(&TraceEvent {
                    phase,
                    http2,
                    outcome: TraceOutcome::Complete,
                });
            }
            Ok(value)
        }
        Err(err) => {
            if let Some(tracer) = tracer {
                tracer(&TraceEvent {
                    phase,
                    http2,
                    outcome: TraceOutcome::Failed(&err),
                });
            }
            Err(err)
        }
    }
}
