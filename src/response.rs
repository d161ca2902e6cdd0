use bytes::Bytes;

use crate::body::BoxBody;
use crate::headers::HeaderList;
use crate::net::NetworkStream;
use crate::version::HttpVersion;

/// Typed, strongly-structured response metadata: `http_version` and
/// `reason_phrase`/`stream_id` are always present where applicable;
/// `body_kind` carries the one genuine escape hatch (an upgraded or
/// CONNECT-tunneled stream) as a sum-type variant rather than a loosely
/// typed "network_stream" slot.
pub struct ResponseMeta {
    pub http_version: HttpVersion,
    /// HTTP/1.x only.
    pub reason_phrase: Option<Bytes>,
    /// HTTP/2 only.
    pub stream_id: Option<u32>,
    pub body_kind: ResponseBodyKind,
}

/// Whether the response body is an ordinary HTTP body, or the connection
/// has been handed over to the caller as a raw duplex stream (CONNECT,
/// protocol upgrade).
pub enum ResponseBodyKind {
    Http,
    Upgraded(Box<dyn NetworkStream>),
}

pub struct Response {
    pub status: u16,
    pub headers: HeaderList,
    pub body: BoxBody,
    pub meta: ResponseMeta,
}

impl Response {
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.status)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
