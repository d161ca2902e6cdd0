use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, SizeHint};

/// A body backed by a single in-memory buffer with a known length. The
/// common case, and the one that lets the HTTP/1.1 engine emit
/// `Content-Length` instead of falling back to chunked framing.
#[derive(Debug, Clone)]
pub struct Full {
    data: Option<Bytes>,
}

impl Full {
    pub fn new(data: Bytes) -> Full {
        Full {
            data: if data.is_empty() { None } else { Some(data) },
        }
    }
}

impl From<Bytes> for Full {
    fn from(data: Bytes) -> Full {
        Full::new(data)
    }
}

impl From<Vec<u8>> for Full {
    fn from(data: Vec<u8>) -> Full {
        Full::new(Bytes::from(data))
    }
}

impl From<&'static str> for Full {
    fn from(data: &'static str) -> Full {
        Full::new(Bytes::from_static(data.as_bytes()))
    }
}

impl Body for Full {
    type Data = Bytes;
    type Error = std::convert::Infallible;

    fn poll_data(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Self::Data, Self::Error>>> {
        Poll::Ready(self.data.take().map(Ok))
    }

    fn poll_trailers(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<http::HeaderMap>, Self::Error>> {
        Poll::Ready(Ok(None))
    }

    fn is_end_stream(&self) -> bool {
        self.data.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.data.as_ref().map_or(0, |b| b.len() as u64))
    }
}
