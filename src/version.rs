use std::fmt;

/// The HTTP version negotiated on a connection, surfaced on
/// [`crate::response::ResponseMeta::http_version`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVersion {
    Http10,
    Http11,
    H2,
}

impl HttpVersion {
    /// The conventional wire-form bytes for each version (`b"HTTP/1.0"`,
    /// `b"HTTP/1.1"`, `b"HTTP/2"`).
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            HttpVersion::Http10 => b"HTTP/1.0",
            HttpVersion::Http11 => b"HTTP/1.1",
            HttpVersion::H2 => b"HTTP/2",
        }
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HttpVersion::Http10 => "HTTP/1.0",
            HttpVersion::Http11 => "HTTP/1.1",
            HttpVersion::H2 => "HTTP/2",
        })
    }
}
