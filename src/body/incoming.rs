use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, SizeHint};
use tokio::sync::mpsc;

use crate::body::BoxError;

/// A streaming body fed by a channel, used for response bodies the engines
/// produce incrementally (HTTP/1.1 dechunking, HTTP/2 `RecvStream`), and for
/// request bodies a caller wants to stream without buffering in full first.
pub struct Incoming {
    rx: mpsc::Receiver<Result<Bytes, BoxError>>,
    size_hint: SizeHint,
}

/// The producer half of an [`Incoming`] body.
#[derive(Clone)]
pub struct Sender {
    tx: mpsc::Sender<Result<Bytes, BoxError>>,
}

/// Creates a bounded channel-backed body. `buffer` is the number of chunks
/// (not bytes) the channel will hold before `Sender::send` backpressures.
pub fn channel(buffer: usize) -> (Sender, Incoming) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (
        Sender { tx },
        Incoming {
            rx,
            size_hint: SizeHint::default(),
        },
    )
}

impl Incoming {
    pub(crate) fn with_size_hint(buffer: usize, size_hint: SizeHint) -> (Sender, Incoming) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Sender { tx }, Incoming { rx, size_hint })
    }
}

impl Sender {
    pub async fn send_data(&self, chunk: Bytes) -> Result<(), BoxError> {
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| "body receiver dropped".into())
    }

    pub async fn send_error(&self, err: BoxError) {
        let _ = self.tx.send(Err(err)).await;
    }
}

impl Body for Incoming {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_data(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Self::Data, Self::Error>>> {
        self.rx.poll_recv(cx)
    }

    fn poll_trailers(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<http::HeaderMap>, Self::Error>> {
        Poll::Ready(Ok(None))
    }

    fn size_hint(&self) -> SizeHint {
        self.size_hint.clone()
    }
}
