//! Request/response body framing: chunked, content-length, and close-delimited.

mod support;

use bytes::Bytes;
use httpcore::{PoolConfig, Request, Scheme};

/// A raw HTTP response head the test constructs by hand, for cases
/// `support::response_bytes` can't express (a non-1.1 status line).
fn raw_response(status_line: &str, extra_headers: &[(&str, &str)], body: &[u8]) -> Bytes {
    let mut head = format!("{status_line}\r\n");
    for (name, value) in extra_headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");
    let mut out = head.into_bytes();
    out.extend_from_slice(body);
    Bytes::from(out)
}

#[tokio::test]
async fn chunked_request_body_is_framed_correctly() {
    let (pool, handle) = support::pool(PoolConfig::default());
    handle.queue_reads(vec![support::content_length_response(200, b"")]);

    let (sender, body) = httpcore::body::channel(4);
    let request = Request::new("POST", support::url(Scheme::Https, "example.com", None, "/upload"))
        .with_body(httpcore::body::BoxBody::new(body));

    let send_task = tokio::spawn(async move {
        sender.send_data(Bytes::from_static(b"hello ")).await.unwrap();
        sender.send_data(Bytes::from_static(b"world")).await.unwrap();
        drop(sender);
    });

    let response = pool.handle_request(request).await.unwrap();
    httpcore::body::to_bytes(response.body).await.unwrap();
    send_task.await.unwrap();

    let written = handle.written(0);
    let written = String::from_utf8_lossy(&written);
    assert!(written.contains("Transfer-Encoding: chunked\r\n"), "{written}");
    assert!(written.contains("\r\n\r\n6\r\nhello \r\n5\r\nworld\r\n0\r\n\r\n"), "{written}");
}

#[tokio::test]
async fn content_length_framed_body_round_trips() {
    let (pool, handle) = support::pool(PoolConfig::default());
    let payload = b"hello, world!";
    assert_eq!(payload.len(), 13);
    handle.queue_reads(vec![support::content_length_response(200, payload)]);

    let response = pool.handle_request(support::get(Scheme::Https, "example.com", "/")).await.unwrap();
    let body = httpcore::body::to_bytes(response.body).await.unwrap();
    assert_eq!(&body[..], payload);
    // The connection is known-good and reusable: a second request on it
    // should not need a fresh TCP connect.
    handle.queue_reads(vec![support::content_length_response(200, b"")]);
    pool.handle_request(support::get(Scheme::Https, "example.com", "/")).await.unwrap();
    assert_eq!(handle.tcp_connect_count(), 1);
}

#[tokio::test]
async fn chunked_framed_body_round_trips() {
    let (pool, handle) = support::pool(PoolConfig::default());
    let payload = b"hello, world!";
    handle.queue_reads(vec![support::chunked_response(200, payload, 5)]);

    let response = pool.handle_request(support::get(Scheme::Https, "example.com", "/")).await.unwrap();
    let body = httpcore::body::to_bytes(response.body).await.unwrap();
    assert_eq!(&body[..], payload);
}

#[tokio::test]
async fn close_delimited_body_round_trips_and_is_not_reused() {
    let (pool, handle) = support::pool(PoolConfig::default());
    let payload = b"hello, world!";
    handle.queue_reads(vec![support::close_delimited_response(200, payload)]);
    handle.queue_reads(vec![support::content_length_response(200, b"")]);

    let response = pool.handle_request(support::get(Scheme::Https, "example.com", "/")).await.unwrap();
    let body = httpcore::body::to_bytes(response.body).await.unwrap();
    assert_eq!(&body[..], payload);

    // Close-delimited framing leaves the connection non-reusable: the next
    // request must open a fresh one.
    pool.handle_request(support::get(Scheme::Https, "example.com", "/")).await.unwrap();
    assert_eq!(handle.tcp_connect_count(), 2);
}

#[tokio::test]
async fn connection_close_header_forces_a_fresh_connection() {
    let (pool, handle) = support::pool(PoolConfig::default());
    // Content-Length framed, so the body alone would be reusable; the
    // `Connection: close` header must override that.
    handle.queue_reads(vec![raw_response(
        "HTTP/1.1 200 OK",
        &[("Content-Length", "5"), ("Connection", "close")],
        b"hello",
    )]);
    handle.queue_reads(vec![support::content_length_response(200, b"")]);

    let response = pool.handle_request(support::get(Scheme::Https, "example.com", "/")).await.unwrap();
    let body = httpcore::body::to_bytes(response.body).await.unwrap();
    assert_eq!(&body[..], b"hello");

    pool.handle_request(support::get(Scheme::Https, "example.com", "/")).await.unwrap();
    assert_eq!(handle.tcp_connect_count(), 2);
}

#[tokio::test]
async fn http_1_0_response_without_keepalive_forces_a_fresh_connection() {
    let (pool, handle) = support::pool(PoolConfig::default());
    handle.queue_reads(vec![raw_response("HTTP/1.0 200 OK", &[("Content-Length", "5")], b"hello")]);
    handle.queue_reads(vec![support::content_length_response(200, b"")]);

    let response = pool.handle_request(support::get(Scheme::Https, "example.com", "/")).await.unwrap();
    let body = httpcore::body::to_bytes(response.body).await.unwrap();
    assert_eq!(&body[..], b"hello");

    pool.handle_request(support::get(Scheme::Https, "example.com", "/")).await.unwrap();
    assert_eq!(handle.tcp_connect_count(), 2);
}

#[tokio::test]
async fn http_1_0_response_with_keepalive_token_is_reused() {
    let (pool, handle) = support::pool(PoolConfig::default());
    handle.queue_reads(vec![raw_response(
        "HTTP/1.0 200 OK",
        &[("Content-Length", "5"), ("Connection", "keep-alive")],
        b"hello",
    )]);
    handle.queue_reads(vec![support::content_length_response(200, b"")]);

    let response = pool.handle_request(support::get(Scheme::Https, "example.com", "/")).await.unwrap();
    let body = httpcore::body::to_bytes(response.body).await.unwrap();
    assert_eq!(&body[..], b"hello");

    pool.handle_request(support::get(Scheme::Https, "example.com", "/")).await.unwrap();
    assert_eq!(handle.tcp_connect_count(), 1);
}
