//! The protocol engines: wire-level framing for one connection.
//!
//! Both modules are always compiled: the tunnel-proxy handshake is always
//! HTTP/1.1-shaped regardless of which protocol(s) a given `PoolConfig`
//! enables for ordinary requests, and the `h2` engine is small enough not to
//! be worth conditional compilation. The `http1`/`http2` Cargo features
//! instead gate the public `PoolConfig` knobs in `pool`.

pub(crate) mod h1;
pub(crate) mod h2;
