use bytes::{Bytes, BytesMut};
use http_body::Body;

/// Buffers an entire body into one contiguous [`Bytes`]. Convenient for
/// tests and small bodies; streaming callers should poll the body directly
/// instead.
pub async fn to_bytes<B>(mut body: B) -> Result<Bytes, B::Error>
where
    B: Body<Data = Bytes> + Unpin,
{
    let mut buf = BytesMut::new();
    while let Some(chunk) = futures_util::future::poll_fn(|cx| {
        std::pin::Pin::new(&mut body).poll_data(cx)
    })
    .await
    {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}
