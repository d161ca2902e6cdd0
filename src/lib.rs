//! `httpcore`: a minimal, low-level HTTP/1.1 and HTTP/2 client transport
//! core: connection pooling, protocol engines, and proxying, with no
//! opinions about redirects, cookies, or retries beyond the connect phase.
//!
//! The crate is organized around four layers:
//!
//! - [`pool`]: [`ConnectionPool`], the thing applications hold onto. Matches
//!   requests to connections under capacity and keep-alive constraints.
//! - [`connection`]: one pooled connection, a transport stream plus
//!   whichever protocol engine (`proto::h1` or `proto::h2`) its negotiated
//!   version picked.
//! - `proto`: wire-level framing for each protocol version.
//! - [`net`]: the transport abstraction ([`NetworkBackend`]/`NetworkStream`)
//!   that lets the pool and engines run against either real sockets
//!   ([`TokioBackend`]) or an in-memory mock.
//!
//! [`request::Request`] and [`response::Response`] carry bodies as
//! [`body::BoxBody`], a type-erased `http_body::Body`.

#[macro_use]
mod macros;

#[cfg(feature = "blocking")]
pub mod blocking;
pub mod body;
mod connection;
pub mod error;
pub mod headers;
mod net;
mod origin;
mod proto;
pub mod pool;
mod proxy;
pub mod request;
pub mod response;
pub mod trace;
pub mod url;
pub mod version;

pub use common::Executor;
pub use error::{Error, Result};
pub use headers::{HeaderField, HeaderList};
pub use net::{mock_backend, ExtraInfo, ExtraInfoKey, MockBackend, MockHandle, NetworkBackend, NetworkStream, TlsConfig, TokioBackend};
pub use origin::{Origin, Scheme};
pub use pool::{ConnectionPool, PoolConfig};
pub use proxy::{ProxyConfig, ProxyMode};
pub use request::{ProxyAuth, Request, RequestOptions, Timeouts};
pub use response::{Response, ResponseBodyKind, ResponseMeta};
pub use trace::{TraceEvent, TraceOutcome, TracePhase, Tracer};
pub use url::Url;
pub use version::HttpVersion;

mod common;
