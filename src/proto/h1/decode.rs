//! Response (and request, for upgraded reads) body decoding: `Content-Length`,
//! `Transfer-Encoding: chunked`, and close-delimited framing (RFC 7230 §3.3.3).

use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};

use crate::error::Error;
use crate::net::{read_timeout, NetworkStream};

/// The body-length determination for one response, per RFC 7230 §3.3.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyLength {
    /// HEAD, 1xx, 204, 304: no body at all.
    None,
    Known(u64),
    Chunked,
    /// Neither `Content-Length` nor chunked: read until the connection
    /// closes. The connection is not reusable afterwards.
    Close,
}

pub(crate) struct Decoder {
    kind: Kind,
}

enum Kind {
    Length(u64),
    Chunked { size: u64, started: bool, done: bool },
    Close(bool),
}

impl Decoder {
    pub(crate) fn new(length: BodyLength) -> Decoder {
        let kind = match length {
            BodyLength::None => Kind::Length(0),
            BodyLength::Known(n) => Kind::Length(n),
            BodyLength::Chunked => Kind::Chunked {
                size: 0,
                started: false,
                done: false,
            },
            BodyLength::Close => Kind::Close(false),
        };
        Decoder { kind }
    }

    pub(crate) fn is_eof(&self) -> bool {
        match self.kind {
            Kind::Length(0) => true,
            Kind::Chunked { done, .. } => done,
            Kind::Close(done) => done,
            _ => false,
        }
    }

    /// True for a close-delimited body (RFC 7230 §3.3.3): reaching its end
    /// means the peer closed the connection, so it can never be reused,
    /// regardless of what [`Decoder::is_eof`] reports.
    pub(crate) fn is_close_delimited(&self) -> bool {
        matches!(self.kind, Kind::Close(_))
    }

    /// Reads the next body chunk, pulling first from `leftover` (bytes read
    /// past the header block during response parsing) and then the stream.
    /// An empty result means end of body.
    pub(crate) async fn decode_next(
        &mut self,
        stream: &mut (dyn NetworkStream),
        leftover: &mut BytesMut,
        timeout: Option<Duration>,
    ) -> Result<Bytes, Error> {
        match &mut self.kind {
            Kind::Length(remaining) => {
                if *remaining == 0 {
                    return Ok(Bytes::new());
                }
                let want = (*remaining).min(64 * 1024) as usize;
                let chunk = read_some(stream, leftover, timeout, want).await?;
                if chunk.is_empty() {
                    return Err(Error::remote_protocol(
                        "connection closed before Content-Length bytes were received",
                    ));
                }
                *remaining -= chunk.len() as u64;
                Ok(chunk)
            }
            Kind::Chunked { size, started, done } => {
                if *done {
                    return Ok(Bytes::new());
                }
                if *started && *size == 0 {
                    // Just finished a chunk's data; consume its trailing CRLF.
                    read_crlf(stream, leftover, timeout).await?;
                    *started = false;
                }
                if !*started {
                    let line = read_line(stream, leftover, timeout).await?;
                    *size = parse_chunk_size(&line)?;
                    *started = true;
                    if *size == 0 {
                        // Trailer section: zero or more header lines, then a
                        // blank line. Trailers aren't surfaced by this engine.
                        loop {
                            let trailer_line = read_line(stream, leftover, timeout).await?;
                            if trailer_line.is_empty() {
                                break;
                            }
                        }
                        *done = true;
                        return Ok(Bytes::new());
                    }
                }
                let want = (*size).min(64 * 1024) as usize;
                let chunk = read_exact(stream, leftover, timeout, want).await?;
                *size -= chunk.len() as u64;
                Ok(chunk)
            }
            Kind::Close(done) => {
                if *done {
                    return Ok(Bytes::new());
                }
                let chunk = read_some(stream, leftover, timeout, 64 * 1024).await?;
                if chunk.is_empty() {
                    *done = true;
                }
                Ok(chunk)
            }
        }
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<u64, Error> {
    let line = match line.iter().position(|&b| b == b';') {
        Some(idx) => &line[..idx],
        None => line,
    };
    if line.is_empty() {
        return Err(Error::remote_protocol("empty chunk size line"));
    }
    let mut size: u64 = 0;
    for &b in line {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => return Err(Error::remote_protocol("invalid chunk size digit")),
        };
        size = size
            .checked_mul(16)
            .and_then(|s| s.checked_add(digit as u64))
            .ok_or_else(|| Error::remote_protocol("chunk size overflow"))?;
    }
    Ok(size)
}

/// Ensures `leftover` holds at least `want` bytes, reading from `stream` as
/// needed. Returns `true` if EOF was reached first.
async fn fill(
    stream: &mut (dyn NetworkStream),
    leftover: &mut BytesMut,
    timeout: Option<Duration>,
    want: usize,
) -> Result<bool, Error> {
    let mut buf = [0u8; 4096];
    while leftover.len() < want {
        let n = read_timeout(stream, &mut buf, timeout).await?;
        if n == 0 {
            return Ok(true);
        }
        leftover.extend_from_slice(&buf[..n]);
    }
    Ok(false)
}

/// Up to `max` bytes: whatever is already buffered, else one read from the
/// stream.
async fn read_some(
    stream: &mut (dyn NetworkStream),
    leftover: &mut BytesMut,
    timeout: Option<Duration>,
    max: usize,
) -> Result<Bytes, Error> {
    if leftover.is_empty() {
        let mut buf = vec![0u8; max];
        let n = read_timeout(stream, &mut buf, timeout).await?;
        buf.truncate(n);
        return Ok(Bytes::from(buf));
    }
    let n = leftover.len().min(max);
    Ok(leftover.split_to(n).freeze())
}

/// Exactly `want` bytes, or a remote-protocol error on early EOF.
async fn read_exact(
    stream: &mut (dyn NetworkStream),
    leftover: &mut BytesMut,
    timeout: Option<Duration>,
    want: usize,
) -> Result<Bytes, Error> {
    let eof = fill(stream, leftover, timeout, want).await?;
    if eof {
        return Err(Error::remote_protocol("connection closed mid-chunk"));
    }
    Ok(leftover.split_to(want).freeze())
}

async fn read_crlf(
    stream: &mut (dyn NetworkStream),
    leftover: &mut BytesMut,
    timeout: Option<Duration>,
) -> Result<(), Error> {
    let crlf = read_exact(stream, leftover, timeout, 2).await?;
    if &crlf[..] != b"\r\n" {
        return Err(Error::remote_protocol("missing chunk CRLF terminator"));
    }
    Ok(())
}

/// One line, up to but excluding `\r\n`.
async fn read_line(
    stream: &mut (dyn NetworkStream),
    leftover: &mut BytesMut,
    timeout: Option<Duration>,
) -> Result<Bytes, Error> {
    loop {
        if let Some(idx) = find_crlf(leftover) {
            let line = leftover.split_to(idx).freeze();
            leftover.advance(2);
            return Ok(line);
        }
        let eof = fill(stream, leftover, timeout, leftover.len() + 1).await?;
        if eof {
            return Err(Error::remote_protocol("connection closed mid-line"));
        }
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chunk_size_reads_hex_and_ignores_extensions() {
        assert_eq!(parse_chunk_size(b"1a").unwrap(), 0x1a);
        assert_eq!(parse_chunk_size(b"1A;foo=bar").unwrap(), 0x1a);
        assert_eq!(parse_chunk_size(b"0").unwrap(), 0);
    }

    #[test]
    fn parse_chunk_size_rejects_garbage() {
        assert!(parse_chunk_size(b"").is_err());
        assert!(parse_chunk_size(b"xyz").is_err());
    }

    #[tokio::test]
    async fn known_length_decoder_stops_at_zero_remaining() {
        let mut decoder = Decoder::new(BodyLength::Known(0));
        assert!(decoder.is_eof());
        let mut leftover = BytesMut::new();
        let chunk = decoder
            .decode_next(&mut NullStream, &mut leftover, None)
            .await
            .unwrap();
        assert!(chunk.is_empty());
    }

    #[tokio::test]
    async fn chunked_decoder_reads_entirely_from_leftover() {
        let mut decoder = Decoder::new(BodyLength::Chunked);
        let mut leftover = BytesMut::from(&b"5\r\nhello\r\n0\r\n\r\n"[..]);

        let first = decoder.decode_next(&mut NullStream, &mut leftover, None).await.unwrap();
        assert_eq!(&first[..], b"hello");
        assert!(!decoder.is_eof());

        let second = decoder.decode_next(&mut NullStream, &mut leftover, None).await.unwrap();
        assert!(second.is_empty());
        assert!(decoder.is_eof());
    }

    struct NullStream;

    #[async_trait::async_trait]
    impl crate::net::NetworkStream for NullStream {
        async fn close(&mut self) {}

        fn get_extra_info(&self, _key: crate::net::ExtraInfoKey) -> crate::net::ExtraInfo {
            crate::net::ExtraInfo::None
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    impl tokio::io::AsyncRead for NullStream {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    impl tokio::io::AsyncWrite for NullStream {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: std::pin::Pin<&mut Self>, _cx: &mut std::task::Context<'_>) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: std::pin::Pin<&mut Self>, _cx: &mut std::task::Context<'_>) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }
}
