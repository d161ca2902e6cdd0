//! An ordered, duplicate-preserving header list.
//!
//! `http::HeaderMap` is a fine choice for the server-response side of a
//! proxy, but it does not promise to preserve the caller's exact insertion
//! order across distinct names, and an exact wire round-trip of the caller's
//! header list (plus a single synthesized `Host` if absent) is required
//! here. A plain `Vec` of pairs is the simplest thing that satisfies that.

use bytes::Bytes;

/// One `(name, value)` pair as it will appear on the wire.
#[derive(Debug, Clone)]
pub struct HeaderField {
    pub name: Bytes,
    pub value: Bytes,
}

/// An ordered sequence of header fields. Duplicates are allowed; insertion
/// order is preserved.
#[derive(Debug, Clone, Default)]
pub struct HeaderList {
    fields: Vec<HeaderField>,
}

impl HeaderList {
    pub fn new() -> HeaderList {
        HeaderList { fields: Vec::new() }
    }

    pub fn push(&mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.fields.push(HeaderField {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Case-insensitive lookup of the first value for `name`.
    pub fn get(&self, name: &str) -> Option<&Bytes> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name.as_bytes()))
            .map(|f| &f.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All values for `name`, in order, case-insensitive.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Bytes> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.name.eq_ignore_ascii_case(name.as_bytes()))
            .map(|f| &f.value)
    }

    /// Removes every field named `name` (case-insensitive). Used to strip
    /// hop-by-hop headers before forwarding over HTTP/2.
    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|f| !f.name.eq_ignore_ascii_case(name.as_bytes()));
    }

    /// Ensures a `Host` header is present, deriving it from `origin` if the
    /// caller didn't supply one. No-op if already present: an explicit
    /// caller-supplied value always wins.
    pub fn ensure_host(&mut self, host_value: &str) {
        if !self.contains("host") {
            self.fields.insert(
                0,
                HeaderField {
                    name: Bytes::from_static(b"Host"),
                    value: Bytes::copy_from_slice(host_value.as_bytes()),
                },
            );
        }
    }
}

impl<'a> IntoIterator for &'a HeaderList {
    type Item = &'a HeaderField;
    type IntoIter = std::slice::Iter<'a, HeaderField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Header names that must never be forwarded verbatim by the HTTP/2 engine
/// (they are reconstructed as pseudo-headers or don't apply to a
/// multiplexed connection at all).
pub(crate) const HOP_BY_HOP: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
];

pub(crate) fn is_hop_by_hop(name: &[u8]) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h.as_bytes()))
}

/// True if any `Connection` header field contains the `close` token
/// (comma-separated, case-insensitive, per RFC 7230 §6.1).
pub(crate) fn has_close_token(headers: &HeaderList) -> bool {
    has_connection_token(headers, "close")
}

/// True if any `Connection` header field contains the `keep-alive` token.
pub(crate) fn has_keepalive_token(headers: &HeaderList) -> bool {
    has_connection_token(headers, "keep-alive")
}

fn has_connection_token(headers: &HeaderList, token: &str) -> bool {
    headers.get_all("connection").any(|value| {
        String::from_utf8_lossy(value)
            .split(',')
            .any(|part| part.trim().eq_ignore_ascii_case(token))
    })
}
