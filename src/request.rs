//! The request type and its out-of-band options.
//!
//! Timeouts, the trace callback, and the SNI override are modeled as a
//! plain, explicit `RequestOptions` struct rather than a dynamic mapping:
//! every field is enumerable at compile time and costs nothing when unused.

use std::time::Duration;

use bytes::Bytes;

use crate::body::BoxBody;
use crate::headers::HeaderList;
use crate::trace::Tracer;
use crate::url::Url;

/// Per-phase timeouts, one per suspension point in the request lifecycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timeouts {
    /// Time allowed waiting for pool capacity before `Error::pool_timeout`.
    pub pool: Option<Duration>,
    /// Time allowed for TCP connect + TLS handshake.
    pub connect: Option<Duration>,
    /// Time allowed for any single read.
    pub read: Option<Duration>,
    /// Time allowed for any single write.
    pub write: Option<Duration>,
}

/// Caller-supplied `(username, password)` for a proxy's `Proxy-Authorization`
/// header, or raw verbatim headers to attach instead.
#[derive(Debug, Clone)]
pub enum ProxyAuth {
    Basic { username: String, password: String },
    Headers(HeaderList),
}

/// Out-of-band request options: timeouts, tracing, and connection-level
/// overrides that don't belong on the request line or headers.
#[derive(Default, Clone)]
pub struct RequestOptions {
    pub timeouts: Timeouts,
    pub trace: Option<Tracer>,
    /// Overrides the hostname sent in the TLS `ClientHello` SNI extension,
    /// independent of the connection's pooling origin.
    pub sni_hostname: Option<Bytes>,
    pub proxy_auth: Option<ProxyAuth>,
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("timeouts", &self.timeouts)
            .field("sni_hostname", &self.sni_hostname)
            .field("proxy_auth", &self.proxy_auth)
            .finish()
    }
}

/// An immutable outgoing request.
pub struct Request {
    pub method: Bytes,
    pub url: Url,
    pub headers: HeaderList,
    pub body: BoxBody,
    pub options: RequestOptions,
}

impl Request {
    pub fn new(method: impl Into<Bytes>, url: Url) -> Request {
        Request {
            method: method.into(),
            url,
            headers: HeaderList::new(),
            body: BoxBody::new(crate::body::Empty::new()),
            options: RequestOptions::default(),
        }
    }

    pub fn with_body(mut self, body: BoxBody) -> Request {
        self.body = body;
        self
    }

    pub fn with_headers(mut self, headers: HeaderList) -> Request {
        self.headers = headers;
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Request {
        self.options = options;
        self
    }

    pub fn is_connect(&self) -> bool {
        self.method.eq_ignore_ascii_case(b"CONNECT")
    }
}
