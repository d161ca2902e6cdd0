//! Status-line and header-block parsing, via `httparse`.

use bytes::{Bytes, BytesMut};

use crate::error::Error;
use crate::headers::HeaderList;
use crate::proto::h1::decode::BodyLength;

pub(crate) const MAX_HEADERS: usize = 128;

pub(crate) struct ParsedResponse {
    pub(crate) status: u16,
    pub(crate) reason: Bytes,
    pub(crate) minor_version: u8,
    pub(crate) headers: HeaderList,
    /// Bytes after the header block's terminating CRLFCRLF, already read
    /// into the buffer httparse was given.
    pub(crate) leftover: BytesMut,
}

/// Parses a complete status line + header block out of `buf`. Returns `Ok(None)`
/// if the buffer doesn't yet contain a complete header block (caller should
/// read more and retry).
pub(crate) fn parse_response_head(buf: &mut BytesMut) -> Result<Option<ParsedResponse>, Error> {
    let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut response = httparse::Response::new(&mut header_storage);

    let status = match response
        .parse(buf)
        .map_err(|e| Error::remote_protocol(format!("invalid status line or headers: {e}")))?
    {
        httparse::Status::Complete(n) => n,
        httparse::Status::Partial => return Ok(None),
    };

    let code = response.code.ok_or_else(|| Error::remote_protocol("missing status code"))?;
    let reason = response.reason.unwrap_or("").as_bytes().to_vec();
    let minor_version = response.version.unwrap_or(1);

    let mut headers = HeaderList::new();
    for h in response.headers.iter() {
        headers.push(Bytes::copy_from_slice(h.name.as_bytes()), Bytes::copy_from_slice(h.value));
    }

    let leftover = buf.split_off(n);

    Ok(Some(ParsedResponse {
        status: code,
        reason: Bytes::from(reason),
        minor_version,
        headers,
        leftover,
    }))
}

/// RFC 7230 §3.3.3 body-length determination for a response.
///
/// `is_head` and `request_is_connect` let the caller apply the "no body
/// regardless of headers" rules for HEAD responses and successful CONNECT
/// responses.
pub(crate) fn response_body_length(
    status: u16,
    headers: &HeaderList,
    is_head: bool,
    request_is_connect: bool,
) -> Result<BodyLength, Error> {
    if is_head || (100..200).contains(&status) || status == 204 || status == 304 {
        return Ok(BodyLength::None);
    }
    if request_is_connect && (200..300).contains(&status) {
        return Ok(BodyLength::None);
    }

    if let Some(te) = headers.get("transfer-encoding") {
        let te = String::from_utf8_lossy(te);
        if te.rsplit(',').next().map(|s| s.trim().eq_ignore_ascii_case("chunked")).unwrap_or(false) {
            return Ok(BodyLength::Chunked);
        }
    }

    let values: Vec<_> = headers.get_all("content-length").collect();
    if !values.is_empty() {
        let first = String::from_utf8_lossy(values[0]);
        let len: u64 = first
            .trim()
            .parse()
            .map_err(|_| Error::remote_protocol("invalid Content-Length"))?;
        for other in &values[1..] {
            let other_len: u64 = String::from_utf8_lossy(other)
                .trim()
                .parse()
                .map_err(|_| Error::remote_protocol("invalid Content-Length"))?;
            if other_len != len {
                return Err(Error::remote_protocol("conflicting Content-Length headers"));
            }
        }
        return Ok(BodyLength::Known(len));
    }

    Ok(BodyLength::Close)
}

/// Whether the response side alone requires closing the connection after
/// this exchange, per RFC 7230 §6.1/§6.3: an explicit `Connection: close`
/// token, or an HTTP/1.0 peer that didn't opt in with `Connection:
/// keep-alive`. Does not account for the close-delimited-body case
/// (`BodyLength::Close`); callers combine both.
pub(crate) fn response_wants_close(minor_version: u8, headers: &HeaderList) -> bool {
    if crate::headers::has_close_token(headers) {
        return true;
    }
    minor_version < 1 && !crate::headers::has_keepalive_token(headers)
}
