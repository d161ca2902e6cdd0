//! Request and response bodies.
//!
//! Bodies are pull-based streams of byte chunks (`http_body::Body`), not a
//! bespoke iterator: this crate already depends on `http-body` for its
//! `http::Request`/`http::Response` plumbing, so reusing its `Body` trait
//! keeps one vocabulary across the whole stack instead of inventing a
//! second one for "the client version". Streams are finite and not
//! restartable: resending a request requires a fresh body value.

mod empty;
mod full;
mod incoming;
mod to_bytes;

pub use empty::Empty;
pub use full::Full;
pub use incoming::{channel, Incoming, Sender};
pub use to_bytes::to_bytes;

pub use http_body::Body;
pub use http_body::SizeHint;

use bytes::Bytes;
use std::error::Error as StdError;

/// The error type every body implementation in this crate surfaces.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// A type-erased body, used wherever the engines need "some body" without
/// caring about its concrete producer (an in-memory buffer, a streaming
/// channel, an upgraded stream's leftovers, ...).
pub struct BoxBody {
    inner: std::pin::Pin<Box<dyn Body<Data = Bytes, Error = BoxError> + Send + Sync>>,
}

impl BoxBody {
    pub fn new<B>(body: B) -> BoxBody
    where
        B: Body<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        BoxBody {
            inner: Box::pin(MapErr { inner: body }),
        }
    }
}

impl Body for BoxBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_data(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Result<Self::Data, Self::Error>>> {
        self.get_mut().inner.as_mut().poll_data(cx)
    }

    fn poll_trailers(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<Option<http::HeaderMap>, Self::Error>> {
        self.get_mut().inner.as_mut().poll_trailers(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

pin_project_lite::pin_project! {
    struct MapErr<B> {
        #[pin]
        inner: B,
    }
}

impl<B> Body for MapErr<B>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_data(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Result<Self::Data, Self::Error>>> {
        let this = self.project();
        this.inner.poll_data(cx).map(|opt| opt.map(|res| res.map_err(Into::into)))
    }

    fn poll_trailers(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<Option<http::HeaderMap>, Self::Error>> {
        let this = self.project();
        this.inner.poll_trailers(cx).map_err(Into::into)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
