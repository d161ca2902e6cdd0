//! Wraps an `h2::RecvStream` as an `http_body::Body`, releasing flow-control
//! capacity back to the peer as the caller reads each chunk.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, SizeHint};
use tokio::sync::oneshot;

use crate::body::BoxError;

/// A stream's occupancy of the connection's concurrent-stream budget. Fires
/// once the response body reaches a clean end or is dropped early, so the
/// connection can update its in-flight count for availability accounting.
pub(crate) struct Http2Body {
    recv: h2::RecvStream,
    done: Option<oneshot::Sender<()>>,
}

impl Http2Body {
    pub(crate) fn new(recv: h2::RecvStream, done: oneshot::Sender<()>) -> Http2Body {
        Http2Body { recv, done: Some(done) }
    }

    fn finish(&mut self) {
        if let Some(tx) = self.done.take() {
            let _ = tx.send(());
        }
    }
}

impl Body for Http2Body {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_data(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Bytes, BoxError>>> {
        let this = self.get_mut();
        match this.recv.poll_data(cx) {
            Poll::Ready(Some(Ok(data))) => {
                let len = data.len();
                // h2 defaults to manual flow control; without releasing
                // capacity the peer's send window never refills.
                if let Err(e) = this.recv.flow_control().release_capacity(len) {
                    this.finish();
                    return Poll::Ready(Some(Err(Box::new(e))));
                }
                Poll::Ready(Some(Ok(data)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finish();
                Poll::Ready(Some(Err(Box::new(e))))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_trailers(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Option<http::HeaderMap>, BoxError>> {
        let this = self.get_mut();
        this.recv.poll_trailers(cx).map_err(|e| Box::new(e) as BoxError)
    }

    fn is_end_stream(&self) -> bool {
        self.recv.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        let h2_hint = self.recv.size_hint();
        let mut hint = SizeHint::default();
        if let Some(len) = h2_hint.exact() {
            hint.set_exact(len);
        } else {
            hint.set_lower(h2_hint.lower());
            if let Some(upper) = h2_hint.upper() {
                hint.set_upper(upper);
            }
        }
        hint
    }
}

impl Drop for Http2Body {
    fn drop(&mut self) {
        self.finish();
    }
}
