//! A single pooled connection: one transport stream, one protocol engine,
//! and the lifecycle bookkeeping the pool needs to schedule around it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::common::{now, Exec};
use crate::error::Error;
use crate::net::{ExtraInfo, ExtraInfoKey, NetworkBackend};
use crate::origin::Origin;
use crate::proto::h1::{self, TargetForm};
use crate::proto::h2::Http2Connection;
use crate::proxy::{ProxyConfig, ProxyMode};
use crate::request::{ProxyAuth, Request};
use crate::response::Response;
use crate::trace::{traced, TracePhase, Tracer};

/// Per-request overrides and observability a connect attempt needs, kept out
/// of [`ConnectContext`] (which is pool-wide) so it doesn't grow a field for
/// every per-request knob.
pub(crate) struct ConnectRequestContext<'a> {
    pub(crate) sni_override: Option<&'a str>,
    pub(crate) proxy_auth_override: Option<&'a ProxyAuth>,
    pub(crate) tracer: Option<&'a Tracer>,
}

impl<'a> ConnectRequestContext<'a> {
    pub(crate) fn from_request(request: &'a Request) -> ConnectRequestContext<'a> {
        ConnectRequestContext {
            sni_override: request
                .options
                .sni_hostname
                .as_deref()
                .and_then(|b| std::str::from_utf8(b).ok()),
            proxy_auth_override: request.options.proxy_auth.as_ref(),
            tracer: request.options.trace.as_ref(),
        }
    }
}

/// Everything about pool configuration a connection needs at connect time,
/// collected so `Connection::connect` doesn't grow an unbounded argument
/// list as more knobs are added.
pub(crate) struct ConnectContext<'a> {
    pub(crate) backend: &'a dyn NetworkBackend,
    pub(crate) tls_config: &'a crate::net::TlsConfig,
    pub(crate) proxy: Option<&'a ProxyConfig>,
    pub(crate) http1_enabled: bool,
    pub(crate) http2_enabled: bool,
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) local_address: Option<std::net::IpAddr>,
    pub(crate) exec: Exec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Active,
    Idle,
    Closing,
    Closed,
}

enum Engine {
    Http1 { stream: Option<Box<dyn crate::net::NetworkStream>> },
    Http2(Http2Connection),
}

/// What the request dispatch returns in addition to the response: a signal
/// the pool awaits (outside the scheduling lock) to learn when the
/// connection is reusable again.
pub(crate) enum ReleaseSignal {
    Http1(oneshot::Receiver<h1::ReleaseOutcome>),
    Http2(oneshot::Receiver<()>),
}

pub(crate) struct Connection {
    origin: Origin,
    /// The origin actually dialed: equal to `origin` unless a forward proxy
    /// is in use, in which case this is the proxy's origin.
    dial_origin: Origin,
    forward_proxy_headers: Option<crate::headers::HeaderList>,
    engine: Engine,
    state: State,
    idle_since: Option<Instant>,
    in_flight: Arc<AtomicUsize>,
    max_concurrent_streams: usize,
}

impl Connection {
    pub(crate) async fn connect(
        origin: Origin,
        cx: &ConnectContext<'_>,
        req_cx: &ConnectRequestContext<'_>,
    ) -> Result<Connection, Error> {
        let (dial_origin, forward_proxy_headers) = match cx.proxy {
            Some(proxy) if proxy.mode == ProxyMode::Forward => {
                if origin.scheme.is_tls() {
                    return Err(Error::unsupported_protocol("forward proxy mode only supports http:// destinations"));
                }
                (
                    proxy.origin.clone(),
                    Some(crate::proxy::proxy_request_headers(proxy, req_cx.proxy_auth_override)),
                )
            }
            _ => (origin.clone(), None),
        };

        let tracer = req_cx.tracer;
        let stream = match cx.proxy {
            Some(proxy) if proxy.mode == ProxyMode::Tunnel => {
                traced(
                    tracer,
                    TracePhase::ConnectTcp,
                    false,
                    crate::proxy::connect_tunnel(
                        cx.backend,
                        proxy,
                        &origin,
                        cx.connect_timeout,
                        cx.local_address,
                        req_cx.proxy_auth_override,
                    ),
                )
                .await?
            }
            Some(proxy) if proxy.mode == ProxyMode::Socks5 => {
                traced(
                    tracer,
                    TracePhase::ConnectTcp,
                    false,
                    crate::proxy::connect_socks5(
                        cx.backend,
                        proxy,
                        &origin,
                        cx.connect_timeout,
                        cx.local_address,
                        req_cx.proxy_auth_override,
                    ),
                )
                .await?
            }
            _ => {
                traced(
                    tracer,
                    TracePhase::ConnectTcp,
                    false,
                    cx.backend
                        .connect_tcp(&dial_origin.host, dial_origin.port, cx.connect_timeout, cx.local_address),
                )
                .await?
            }
        };

        let (stream, negotiated_h2) = if origin.scheme.is_tls() && forward_proxy_headers.is_none() {
            let alpn: Vec<Vec<u8>> = match (cx.http1_enabled, cx.http2_enabled) {
                (true, true) => vec![b"h2".to_vec(), b"http/1.1".to_vec()],
                (false, true) => vec![b"h2".to_vec()],
                _ => Vec::new(),
            };
            let sni_host = req_cx.sni_override.unwrap_or(&origin.host);
            let tls_stream = traced(
                tracer,
                TracePhase::StartTls,
                false,
                cx.backend.start_tls(stream, sni_host, &alpn, cx.connect_timeout),
            )
            .await?;
            let negotiated_h2 = matches!(
                tls_stream.get_extra_info(ExtraInfoKey::TlsObject),
                ExtraInfo::AlpnProtocol(Some(ref p)) if p == b"h2"
            );
            (tls_stream, negotiated_h2)
        } else {
            // Plain origin: HTTP/2 only via prior knowledge, when http1 is
            // disabled outright.
            (stream, !cx.http1_enabled && cx.http2_enabled)
        };

        let (engine, max_concurrent_streams) = if negotiated_h2 {
            let h2 = traced(
                tracer,
                TracePhase::SendConnectionInit,
                true,
                Http2Connection::handshake(stream, &cx.exec),
            )
            .await?;
            (Engine::Http2(h2), 100)
        } else {
            (Engine::Http1 { stream: Some(stream) }, 1)
        };

        Ok(Connection {
            origin,
            dial_origin,
            forward_proxy_headers,
            engine,
            state: State::Idle,
            idle_since: Some(now()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_concurrent_streams,
        })
    }

    pub(crate) fn origin(&self) -> &Origin {
        &self.origin
    }

    pub(crate) fn state(&self) -> State {
        self.state
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub(crate) fn can_handle_request(&self, origin: &Origin) -> bool {
        &self.origin == origin && !matches!(self.state, State::Closing | State::Closed)
    }

    pub(crate) fn is_available(&self) -> bool {
        match &self.engine {
            Engine::Http1 { .. } => matches!(self.state, State::Idle),
            Engine::Http2(_) => {
                matches!(self.state, State::Active | State::Idle) && self.in_flight() < self.max_concurrent_streams
            }
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    /// When this connection last became idle, for the pool's oldest-idle
    /// eviction tie-break. `None` if it has never been idle or is not idle
    /// now.
    pub(crate) fn idle_since(&self) -> Option<Instant> {
        if self.is_idle() {
            self.idle_since
        } else {
            None
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    pub(crate) fn has_expired(&self, keepalive_expiry: Duration) -> bool {
        match (self.state, self.idle_since) {
            (State::Idle, Some(since)) => now().saturating_duration_since(since) >= keepalive_expiry,
            _ => false,
        }
    }

    pub(crate) fn mark_closing(&mut self) {
        if !matches!(self.state, State::Closed) {
            self.state = State::Closing;
        }
    }

    pub(crate) async fn close(&mut self) {
        if matches!(self.state, State::Closed) {
            return;
        }
        if let Engine::Http1 { stream: Some(ref mut s) } = self.engine {
            s.close().await;
        }
        self.state = State::Closed;
    }

    /// Marks the connection idle again (HTTP/1.1) or decrements the
    /// in-flight count (HTTP/2), called once a `ReleaseSignal` fires.
    pub(crate) fn on_released(&mut self, outcome: ReleaseOutcome) {
        match outcome {
            ReleaseOutcome::Http1Reusable { stream } => {
                if let Engine::Http1 { stream: slot } = &mut self.engine {
                    *slot = Some(stream);
                }
                self.state = State::Idle;
                self.idle_since = Some(now());
            }
            ReleaseOutcome::Http1Close => {
                self.state = State::Closing;
            }
            ReleaseOutcome::Http2StreamDone => {
                self.in_flight.fetch_sub(1, Ordering::AcqRel);
                if self.in_flight() == 0 {
                    self.idle_since = Some(now());
                }
            }
        }
    }

    pub(crate) async fn handle_request(
        &mut self,
        request: &mut Request,
        proxy_mode: Option<ProxyMode>,
    ) -> Result<(Response, ReleaseSignal), RequestError> {
        self.state = State::Active;
        self.idle_since = None;
        let tracer = request.options.trace.clone();

        match &mut self.engine {
            Engine::Http1 { stream } => {
                let mut owned_stream = stream.take().ok_or_else(Error::closed).map_err(RequestError::fatal)?;
                let target_form = if proxy_mode == Some(ProxyMode::Forward) {
                    TargetForm::Absolute
                } else {
                    TargetForm::Origin
                };
                let host_header_value = self.origin.host_header_value();
                let empty_headers = crate::headers::HeaderList::new();
                let extra_headers = self.forward_proxy_headers.as_ref().unwrap_or(&empty_headers);

                let write_deadline = request.options.timeouts.write;
                let read_deadline = request.options.timeouts.read;
                let connection_close_requested = crate::headers::has_close_token(&request.headers);

                let send_result = h1::send_request(
                    &mut *owned_stream,
                    request,
                    target_form,
                    extra_headers,
                    &host_header_value,
                    write_deadline,
                    tracer.as_ref(),
                )
                .await;
                if let Err(e) = send_result {
                    self.state = State::Closing;
                    return Err(RequestError {
                        error: e.error,
                        retry_with_fresh_connection: e.before_any_bytes,
                    });
                }

                let is_connect = request.is_connect();
                let is_head = request.method.eq_ignore_ascii_case(b"HEAD");
                match h1::read_response(
                    owned_stream,
                    read_deadline,
                    is_connect,
                    is_head,
                    connection_close_requested,
                    tracer.as_ref(),
                )
                .await
                {
                    Ok((response, rx)) => {
                        self.in_flight.store(1, Ordering::Release);
                        Ok((response, ReleaseSignal::Http1(rx)))
                    }
                    Err(e) => {
                        self.state = State::Closing;
                        Err(RequestError::fatal(e))
                    }
                }
            }
            Engine::Http2(conn) => {
                conn.ready().await.map_err(RequestError::fatal)?;
                self.in_flight.fetch_add(1, Ordering::AcqRel);
                let host_header_value = self.origin.host_header_value();
                match conn.send_request(request, &host_header_value).await {
                    Ok((response, rx)) => Ok((response, ReleaseSignal::Http2(rx))),
                    Err(e) => {
                        self.in_flight.fetch_sub(1, Ordering::AcqRel);
                        Err(RequestError::fatal(e))
                    }
                }
            }
        }
    }
}

/// A [`Connection::handle_request`] failure, tagged with whether the pool may
/// transparently resend it once on a fresh connection. Only set when this
/// was a reused idle HTTP/1.1 connection and the failure happened before any
/// request bytes reached the wire: the race where the peer closed the
/// connection just as it was chosen for reuse.
pub(crate) struct RequestError {
    pub(crate) error: Error,
    pub(crate) retry_with_fresh_connection: bool,
}

impl RequestError {
    fn fatal(error: Error) -> RequestError {
        RequestError {
            error,
            retry_with_fresh_connection: false,
        }
    }
}

/// The resolved outcome a `ReleaseSignal` carries back to [`Connection::on_released`].
pub(crate) enum ReleaseOutcome {
    Http1Reusable { stream: Box<dyn crate::net::NetworkStream> },
    Http1Close,
    Http2StreamDone,
}

impl From<h1::ReleaseOutcome> for ReleaseOutcome {
    fn from(outcome: h1::ReleaseOutcome) -> ReleaseOutcome {
        match outcome {
            h1::ReleaseOutcome::Reusable { stream, leftover } => {
                debug_assert!(leftover.is_empty(), "http/1.1 connections must not pipeline");
                ReleaseOutcome::Http1Reusable { stream }
            }
            h1::ReleaseOutcome::Close => ReleaseOutcome::Http1Close,
        }
    }
}
