use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, SizeHint};

/// A body that is immediately at end-of-stream. Used for GET/HEAD requests
/// and any response the engines determine carries no body.
#[derive(Debug, Clone, Copy, Default)]
pub struct Empty {
    _priv: (),
}

impl Empty {
    pub fn new() -> Empty {
        Empty { _priv: () }
    }
}

impl Body for Empty {
    type Data = Bytes;
    type Error = std::convert::Infallible;

    fn poll_data(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Self::Data, Self::Error>>> {
        Poll::Ready(None)
    }

    fn poll_trailers(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<http::HeaderMap>, Self::Error>> {
        Poll::Ready(Ok(None))
    }

    fn is_end_stream(&self) -> bool {
        true
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(0)
    }
}
