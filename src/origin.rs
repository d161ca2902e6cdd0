use std::fmt;

/// The URL scheme of an [`Origin`]. Only `http` and `https` are in scope;
/// anything else is rejected with `Error::unsupported_protocol` at the pool
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn is_tls(self) -> bool {
        matches!(self, Scheme::Https)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn parse(s: &str) -> Option<Scheme> {
        if s.eq_ignore_ascii_case("http") {
            Some(Scheme::Http)
        } else if s.eq_ignore_ascii_case("https") {
            Some(Scheme::Https)
        } else {
            None
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `(scheme, host, port)` triple used as the connection pooling key.
///
/// Two origins are equal iff all three components match byte-for-byte; host
/// comparison is case-insensitive ASCII (the scheme enum is already
/// normalized, and the port is a plain integer).
#[derive(Debug, Clone)]
pub struct Origin {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl Origin {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: Option<u16>) -> Origin {
        Origin {
            scheme,
            host: host.into(),
            port: port.unwrap_or_else(|| scheme.default_port()),
        }
    }

    /// The `host:port` pair as it would appear in a `Host` header or an
    /// absolute-form request line, omitting the port when it is the
    /// scheme's default (matching common browser/client behavior).
    pub fn host_header_value(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl PartialEq for Origin {
    fn eq(&self, other: &Origin) -> bool {
        self.scheme == other.scheme
            && self.port == other.port
            && self.host.eq_ignore_ascii_case(&other.host)
    }
}

impl Eq for Origin {}

impl std::hash::Hash for Origin {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.scheme.hash(state);
        self.port.hash(state);
        for b in self.host.bytes() {
            b.to_ascii_lowercase().hash(state);
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host_header_value())
    }
}
