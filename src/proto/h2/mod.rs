//! The HTTP/2 engine: one multiplexed connection on top of the `h2` crate.
//!
//! `h2` already implements the frame layer (SETTINGS, flow control, PING,
//! GOAWAY); this module is the adapter between that and this crate's
//! `Request`/`Response`/`HeaderList` types, plus the one client-side policy
//! decision `h2` leaves to its caller: server push is declined outright by
//! disabling `SETTINGS_ENABLE_PUSH` during the handshake, so a push-happy
//! peer gets the whole exchange rejected at the settings level rather than
//! stream-by-stream.

mod body;

pub(crate) use body::Http2Body;

use bytes::Bytes;
use http_body::Body as _;

use crate::body::BoxBody;
use crate::common::Exec;
use crate::error::Error;
use crate::headers::{is_hop_by_hop, HeaderList};
use crate::net::NetworkStream;
use crate::request::Request;
use crate::response::{Response, ResponseBodyKind, ResponseMeta};
use crate::version::HttpVersion;

/// One live HTTP/2 connection. Multiple requests can be in flight on it at
/// once, up to the peer's advertised `SETTINGS_MAX_CONCURRENT_STREAMS`;
/// `h2::client::SendRequest` itself enforces that via `poll_ready`.
pub(crate) struct Http2Connection {
    send_request: h2::client::SendRequest<Bytes>,
}

impl Http2Connection {
    pub(crate) async fn handshake(stream: Box<dyn NetworkStream>, exec: &Exec) -> Result<Http2Connection, Error> {
        let (send_request, connection) = h2::client::Builder::new()
            .enable_push(false)
            .handshake(stream)
            .await
            .map_err(|e| Error::remote_protocol(e))?;

        exec.execute(async move {
            if let Err(e) = connection.await {
                debug!("http/2 connection driver exited: {}", e);
            }
        });

        Ok(Http2Connection { send_request })
    }

    /// Resolves once the connection has capacity for another request
    /// (`SETTINGS_MAX_CONCURRENT_STREAMS` not yet exhausted) or the
    /// connection is going away.
    pub(crate) async fn ready(&mut self) -> Result<(), Error> {
        futures_util::future::poll_fn(|cx| self.send_request.poll_ready(cx))
            .await
            .map_err(|e| Error::remote_protocol(e))
    }

    /// Sends one request and returns the response plus a receiver that
    /// fires once this stream's response body has been fully read (or
    /// abandoned), so the caller can decrement its in-flight stream count.
    pub(crate) async fn send_request(
        &mut self,
        request: &mut Request,
        host_header_value: &str,
    ) -> Result<(Response, tokio::sync::oneshot::Receiver<()>), Error> {
        let authority = request
            .headers
            .get("host")
            .map(|h| String::from_utf8_lossy(h).into_owned())
            .unwrap_or_else(|| host_header_value.to_string());

        let path_and_query = if request.url.target.is_empty() {
            Bytes::from_static(b"/")
        } else {
            request.url.target.clone()
        };

        let uri = http::Uri::builder()
            .scheme(request.url.scheme.as_str())
            .authority(authority)
            .path_and_query(http::uri::PathAndQuery::try_from(&path_and_query[..]).map_err(Error::local_protocol)?)
            .build()
            .map_err(Error::local_protocol)?;

        let mut builder = http::Request::builder().method(&request.method[..]).uri(uri);
        {
            let header_map = builder.headers_mut().expect("fresh request builder");
            for field in request.headers.iter() {
                if is_hop_by_hop(&field.name) {
                    continue;
                }
                let name = http::header::HeaderName::from_bytes(&field.name).map_err(Error::local_protocol)?;
                let value = http::HeaderValue::from_bytes(&field.value).map_err(Error::local_protocol)?;
                header_map.append(name, value);
            }
        }

        let no_body = request.body.is_end_stream() && request.body.size_hint().exact() == Some(0);
        let http_request = builder.body(()).map_err(Error::local_protocol)?;

        let (response_fut, mut send_stream) = self
            .send_request
            .send_request(http_request, no_body)
            .map_err(|e| Error::local_protocol(e))?;

        if !no_body {
            loop {
                let chunk = futures_util::future::poll_fn(|cx| std::pin::Pin::new(&mut request.body).poll_data(cx)).await;
                match chunk {
                    None => break,
                    Some(Err(e)) => return Err(Error::local_protocol(e)),
                    Some(Ok(data)) => {
                        if data.is_empty() {
                            continue;
                        }
                        send_stream.reserve_capacity(data.len());
                        send_stream.send_data(data, false).map_err(|e| Error::local_protocol(e))?;
                    }
                }
            }
            send_stream.send_data(Bytes::new(), true).map_err(|e| Error::local_protocol(e))?;
        }

        let response = response_fut.await.map_err(|e| Error::remote_protocol(e))?;
        let (parts, recv) = response.into_parts();

        let mut headers = HeaderList::new();
        for (name, value) in parts.headers.iter() {
            headers.push(Bytes::copy_from_slice(name.as_str().as_bytes()), Bytes::copy_from_slice(value.as_bytes()));
        }

        let meta = ResponseMeta {
            http_version: HttpVersion::H2,
            reason_phrase: None,
            stream_id: None,
            body_kind: ResponseBodyKind::Http,
        };

        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let response = Response {
            status: parts.status.as_u16(),
            headers,
            body: BoxBody::new(Http2Body::new(recv, done_tx)),
            meta,
        };
        Ok((response, done_rx))
    }
}
