use bytes::Bytes;

use crate::origin::{Origin, Scheme};

/// `(scheme, host, port, target)`, decomposed by the caller. Parsing a raw
/// URL string into this shape is explicitly out of scope for this crate:
/// callers that have one should split it themselves before constructing a
/// request.
#[derive(Debug, Clone)]
pub struct Url {
    pub scheme: Scheme,
    pub host: String,
    pub port: Option<u16>,
    /// The request-target: path plus optional query, as raw bytes.
    pub target: Bytes,
}

impl Url {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: Option<u16>, target: impl Into<Bytes>) -> Url {
        Url {
            scheme,
            host: host.into(),
            port,
            target: target.into(),
        }
    }

    /// The origin this URL would be pooled under.
    pub fn origin(&self) -> Origin {
        Origin::new(self.scheme, self.host.clone(), self.port)
    }

    /// Absolute-form rendering used by forward proxies:
    /// `http://host:port/path?query`.
    pub fn absolute_form(&self) -> Bytes {
        let origin = self.origin();
        let mut out = Vec::with_capacity(origin.host.len() + self.target.len() + 16);
        out.extend_from_slice(origin.scheme.as_str().as_bytes());
        out.extend_from_slice(b"://");
        out.extend_from_slice(origin.host_header_value().as_bytes());
        out.extend_from_slice(&self.target);
        Bytes::from(out)
    }
}
