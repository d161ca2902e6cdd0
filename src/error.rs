//! Error and Result module.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Result type often returned from methods that can have `httpcore` `Error`s.
pub type Result<T> = std::result::Result<T, Error>;

type Cause = Box<dyn StdError + Send + Sync>;

/// The single error type surfaced across the crate's public API.
///
/// The internal representation is boxed and opaque; callers inspect the
/// failure through [`Error::is_timeout`], [`Error::is_connect`], etc., or by
/// walking the [`std::error::Error::source`] chain down to the underlying
/// I/O, TLS, or protocol cause.
pub struct Error {
    inner: Box<ErrorImpl>,
}

struct ErrorImpl {
    kind: Kind,
    cause: Option<Cause>,
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// Timeout family: pool queue wait, connect, read, write.
    Timeout(TimeoutKind),
    /// Network family: TCP/TLS connect, read, write at the transport level.
    Network(NetworkKind),
    /// Protocol family: we violated HTTP, or the peer did.
    Protocol(ProtocolKind),
    /// Any proxy-layer failure (CONNECT rejected, SOCKS5 negotiation failed).
    Proxy,
    /// Scheme other than http/https, or HTTP/2 requested without capability.
    UnsupportedProtocol,
    /// The pool (or a connection taken from it) was already closed.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimeoutKind {
    Pool,
    Connect,
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NetworkKind {
    Connect,
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProtocolKind {
    Local,
    Remote,
}

impl Error {
    pub(crate) fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(ErrorImpl { kind, cause: None }),
        }
    }

    pub(crate) fn with(mut self, cause: impl Into<Cause>) -> Error {
        self.inner.cause = Some(cause.into());
        self
    }

    pub(crate) fn pool_timeout() -> Error {
        Error::new(Kind::Timeout(TimeoutKind::Pool))
    }

    pub(crate) fn connect_timeout() -> Error {
        Error::new(Kind::Timeout(TimeoutKind::Connect))
    }

    pub(crate) fn read_timeout() -> Error {
        Error::new(Kind::Timeout(TimeoutKind::Read))
    }

    pub(crate) fn write_timeout() -> Error {
        Error::new(Kind::Timeout(TimeoutKind::Write))
    }

    pub(crate) fn connect(cause: impl Into<Cause>) -> Error {
        Error::new(Kind::Network(NetworkKind::Connect)).with(cause)
    }

    pub(crate) fn read(cause: impl Into<Cause>) -> Error {
        Error::new(Kind::Network(NetworkKind::Read)).with(cause)
    }

    pub(crate) fn write(cause: impl Into<Cause>) -> Error {
        Error::new(Kind::Network(NetworkKind::Write)).with(cause)
    }

    pub(crate) fn local_protocol(msg: impl Into<Cause>) -> Error {
        Error::new(Kind::Protocol(ProtocolKind::Local)).with(msg)
    }

    pub(crate) fn remote_protocol(msg: impl Into<Cause>) -> Error {
        Error::new(Kind::Protocol(ProtocolKind::Remote)).with(msg)
    }

    pub(crate) fn proxy(msg: impl Into<Cause>) -> Error {
        Error::new(Kind::Proxy).with(msg)
    }

    pub(crate) fn unsupported_protocol(msg: impl Into<Cause>) -> Error {
        Error::new(Kind::UnsupportedProtocol).with(msg)
    }

    pub(crate) fn closed() -> Error {
        Error::new(Kind::Closed)
    }

    /// True if this is any of the `{Pool,Connect,Read,Write}Timeout` variants.
    pub fn is_timeout(&self) -> bool {
        matches!(self.inner.kind, Kind::Timeout(_))
    }

    /// True if the failure happened during connection establishment (and is
    /// thus subject to the pool's `retries` policy).
    pub fn is_connect(&self) -> bool {
        matches!(self.inner.kind, Kind::Network(NetworkKind::Connect))
            || matches!(self.inner.kind, Kind::Timeout(TimeoutKind::Connect))
    }

    /// True if the remote peer violated the protocol (as opposed to us).
    pub fn is_remote_protocol_error(&self) -> bool {
        matches!(self.inner.kind, Kind::Protocol(ProtocolKind::Remote))
    }

    /// True if this came from the proxy layer (CONNECT, SOCKS5).
    pub fn is_proxy_error(&self) -> bool {
        matches!(self.inner.kind, Kind::Proxy)
    }

    /// True if the pool (or a connection drawn from it) was already closed.
    pub fn is_closed(&self) -> bool {
        matches!(self.inner.kind, Kind::Closed)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_tuple("httpcore::Error");
        builder.field(&self.inner.kind);
        if let Some(ref cause) = self.inner.cause {
            builder.field(cause);
        }
        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            Kind::Timeout(TimeoutKind::Pool) => f.write_str("timed out waiting for a pool connection"),
            Kind::Timeout(TimeoutKind::Connect) => f.write_str("timed out connecting"),
            Kind::Timeout(TimeoutKind::Read) => f.write_str("timed out reading"),
            Kind::Timeout(TimeoutKind::Write) => f.write_str("timed out writing"),
            Kind::Network(NetworkKind::Connect) => f.write_str("error connecting"),
            Kind::Network(NetworkKind::Read) => f.write_str("error reading from network"),
            Kind::Network(NetworkKind::Write) => f.write_str("error writing to network"),
            Kind::Protocol(ProtocolKind::Local) => f.write_str("local protocol violation"),
            Kind::Protocol(ProtocolKind::Remote) => f.write_str("remote protocol violation"),
            Kind::Proxy => f.write_str("proxy error"),
            Kind::UnsupportedProtocol => f.write_str("unsupported protocol"),
            Kind::Closed => f.write_str("connection pool is closed"),
        }?;
        if let Some(ref cause) = self.inner.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.cause.as_ref().map(|c| &**c as &(dyn StdError + 'static))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::read(err)
    }
}
