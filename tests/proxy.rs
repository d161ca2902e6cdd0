//! Proxy scenarios: tunnel CONNECT, forward-proxy absolute-form, SOCKS5
//! negotiation, and proxy authentication.

mod support;

use bytes::Bytes;

use httpcore::{Origin, PoolConfig, ProxyAuth, ProxyConfig, ProxyMode, Scheme};

#[tokio::test]
async fn tunnel_proxy_sends_connect_before_the_tls_handshake() {
    let proxy_origin = Origin::new(Scheme::Http, "proxy.internal", Some(8080));
    let proxy = ProxyConfig::new(proxy_origin, ProxyMode::Tunnel);
    let config = PoolConfig {
        proxy: Some(proxy),
        ..PoolConfig::default()
    };
    let (pool, handle) = support::pool(config);

    let connect_ok = support::response_bytes(200, &[], b"");
    let get_response = support::content_length_response(200, b"ok");
    let mut script = connect_ok.to_vec();
    script.extend_from_slice(&get_response);
    handle.queue_reads(vec![Bytes::from(script)]);

    let response = pool.handle_request(support::get(Scheme::Https, "example.com", "/")).await.unwrap();
    let body = httpcore::body::to_bytes(response.body).await.unwrap();
    assert_eq!(&body[..], b"ok");

    assert_eq!(handle.tcp_connect_count(), 1);
    assert_eq!(handle.tls_handshake_count(), 1);

    let written = handle.written(0);
    let written = String::from_utf8_lossy(&written);
    assert!(
        written.starts_with("CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\n\r\n"),
        "{written}"
    );
}

#[tokio::test]
async fn forward_proxy_sends_absolute_form_request_line() {
    let proxy_origin = Origin::new(Scheme::Http, "proxy.internal", Some(8080));
    let proxy = ProxyConfig::new(proxy_origin, ProxyMode::Forward);
    let config = PoolConfig {
        proxy: Some(proxy),
        ..PoolConfig::default()
    };
    let (pool, handle) = support::pool(config);
    handle.queue_reads(vec![support::content_length_response(200, b"")]);

    pool.handle_request(support::get(Scheme::Http, "example.com", "/x")).await.unwrap();

    assert_eq!(handle.tls_handshake_count(), 0, "forward proxying never touches TLS");
    let written = handle.written(0);
    let written = String::from_utf8_lossy(&written);
    assert!(written.starts_with("GET http://example.com/x HTTP/1.1\r\n"), "{written}");
}

#[tokio::test]
async fn socks5_negotiates_username_password_auth_before_connecting() {
    let proxy_origin = Origin::new(Scheme::Http, "proxy.internal", Some(1080));
    let proxy = ProxyConfig::new(proxy_origin, ProxyMode::Socks5).with_auth(ProxyAuth::Basic {
        username: "alice".into(),
        password: "secret".into(),
    });
    let config = PoolConfig {
        proxy: Some(proxy),
        ..PoolConfig::default()
    };
    let (pool, handle) = support::pool(config);

    let mut script = vec![
        0x05, 0x02, // method-selection reply: version 5, chosen method 0x02 (user/pass)
        0x01, 0x00, // auth reply: version 1, success
        0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0, // CONNECT reply: success, IPv4 0.0.0.0:0
    ];
    script.extend_from_slice(&support::content_length_response(200, b"ok"));
    handle.queue_reads(vec![Bytes::from(script)]);

    let response = pool.handle_request(support::get(Scheme::Http, "example.com", "/")).await.unwrap();
    let body = httpcore::body::to_bytes(response.body).await.unwrap();
    assert_eq!(&body[..], b"ok");

    let mut expected = vec![0x05, 0x02, 0x00, 0x02]; // method select: offer no-auth + user/pass
    expected.push(0x01); // auth sub-negotiation version
    expected.push(5);
    expected.extend_from_slice(b"alice");
    expected.push(6);
    expected.extend_from_slice(b"secret");
    expected.extend_from_slice(&[0x05, 0x01, 0x00, 0x03, 11]); // CONNECT, domain name, len 11
    expected.extend_from_slice(b"example.com");
    expected.extend_from_slice(&80u16.to_be_bytes());

    let written = handle.written(0);
    assert_eq!(&written[..expected.len()], &expected[..]);
}

#[tokio::test]
async fn proxy_auth_is_base64_encoded_on_the_connect_request() {
    let proxy_origin = Origin::new(Scheme::Http, "proxy.internal", Some(8080));
    let proxy = ProxyConfig::new(proxy_origin, ProxyMode::Tunnel).with_auth(ProxyAuth::Basic {
        username: "alice".into(),
        password: "secret".into(),
    });
    let config = PoolConfig {
        proxy: Some(proxy),
        ..PoolConfig::default()
    };
    let (pool, handle) = support::pool(config);

    let mut script = support::response_bytes(200, &[], b"").to_vec();
    script.extend_from_slice(&support::content_length_response(200, b""));
    handle.queue_reads(vec![Bytes::from(script)]);

    pool.handle_request(support::get(Scheme::Https, "example.com", "/")).await.unwrap();

    let written = handle.written(0);
    let written = String::from_utf8_lossy(&written);
    assert!(
        written.contains("Proxy-Authorization: Basic YWxpY2U6c2VjcmV0\r\n"),
        "{written}"
    );
}

