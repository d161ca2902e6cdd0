//! Proxy machinery: forward (absolute-form), tunnel (CONNECT), and SOCKS5.
//!
//! Each variant is a different way of producing the stream a `Connection`
//! then drives normally; tunneling and SOCKS5 hand back a plain TCP stream
//! connected (transitively) to the true destination, ready for an optional
//! TLS handshake; forwarding doesn't touch the stream at all; it only
//! changes how the HTTP/1.1 engine writes the request line.

mod socks5;
mod tunnel;

use base64::Engine as _;

use crate::headers::HeaderList;
use crate::origin::Origin;
use crate::request::ProxyAuth;

pub(crate) use socks5::connect as connect_socks5;
pub(crate) use tunnel::connect as connect_tunnel;

/// How a pool-wide proxy is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    /// Absolute-form request lines sent straight to the proxy; `http://`
    /// destinations only.
    Forward,
    /// `CONNECT` tunnel, then TLS (if the destination is `https://`) through
    /// the tunnel as usual.
    Tunnel,
    /// SOCKS5 (RFC 1928/1929) negotiation, then proceed as `Tunnel`.
    Socks5,
}

/// Pool-wide proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub origin: Origin,
    pub mode: ProxyMode,
    pub auth: Option<ProxyAuth>,
    /// Verbatim headers added to every CONNECT (tunnel mode) or every
    /// forwarded request (forward mode), in addition to any derived from
    /// `auth`.
    pub headers: HeaderList,
}

impl ProxyConfig {
    pub fn new(origin: Origin, mode: ProxyMode) -> ProxyConfig {
        ProxyConfig {
            origin,
            mode,
            auth: None,
            headers: HeaderList::new(),
        }
    }

    pub fn with_auth(mut self, auth: ProxyAuth) -> ProxyConfig {
        self.auth = Some(auth);
        self
    }

    pub fn with_headers(mut self, headers: HeaderList) -> ProxyConfig {
        self.headers = headers;
        self
    }
}

/// Builds the header list to attach to a CONNECT request or every forwarded
/// request: the caller's verbatim `headers`, plus a derived
/// `Proxy-Authorization: Basic <base64>` if `auth` is a username/password
/// pair (a caller-supplied `ProxyAuth::Headers` is expected to already
/// include whatever authorization header it needs).
///
/// `request_auth`, when set, overrides `config.auth` for this one request
/// (`RequestOptions::proxy_auth`).
pub(crate) fn proxy_request_headers(config: &ProxyConfig, request_auth: Option<&ProxyAuth>) -> HeaderList {
    let mut headers = config.headers.clone();
    match request_auth.or(config.auth.as_ref()) {
        Some(ProxyAuth::Basic { username, password }) => {
            let credentials = format!("{username}:{password}");
            let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
            headers.push("Proxy-Authorization", format!("Basic {encoded}"));
        }
        Some(ProxyAuth::Headers(extra)) => {
            for field in extra.iter() {
                headers.push(field.name.clone(), field.value.clone());
            }
        }
        None => {}
    }
    headers
}
