//! SOCKS5 client negotiation (RFC 1928) with optional username/password
//! authentication (RFC 1929), followed by a CONNECT command for the true
//! destination. Not present in any example repo this crate was grounded on;
//! the wire constants below are the protocol's, not borrowed code.

use std::time::Duration;

use crate::error::Error;
use crate::net::{read_timeout, write_timeout, NetworkBackend, NetworkStream};
use crate::origin::Origin;
use crate::request::ProxyAuth;

use super::ProxyConfig;

const VERSION: u8 = 0x05;
const METHOD_NO_AUTH: u8 = 0x00;
const METHOD_USER_PASS: u8 = 0x02;
const METHOD_NO_ACCEPTABLE: u8 = 0xFF;
const CMD_CONNECT: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const REPLY_SUCCEEDED: u8 = 0x00;

pub(crate) async fn connect(
    backend: &dyn NetworkBackend,
    proxy: &ProxyConfig,
    target: &Origin,
    connect_timeout: Option<Duration>,
    local_address: Option<std::net::IpAddr>,
    request_auth: Option<&ProxyAuth>,
) -> Result<Box<dyn NetworkStream>, Error> {
    let mut stream = backend
        .connect_tcp(&proxy.origin.host, proxy.origin.port, connect_timeout, local_address)
        .await?;

    let credentials = match request_auth.or(proxy.auth.as_ref()) {
        Some(ProxyAuth::Basic { username, password }) => Some((username.clone(), password.clone())),
        _ => None,
    };

    negotiate_method(&mut *stream, credentials.is_some(), connect_timeout).await?;
    if let Some((username, password)) = credentials {
        authenticate(&mut *stream, &username, &password, connect_timeout).await?;
    }
    connect_command(&mut *stream, &target.host, target.port, connect_timeout).await?;

    Ok(stream)
}

async fn negotiate_method(
    stream: &mut (dyn NetworkStream),
    offer_user_pass: bool,
    timeout: Option<Duration>,
) -> Result<(), Error> {
    let methods: &[u8] = if offer_user_pass {
        &[METHOD_NO_AUTH, METHOD_USER_PASS]
    } else {
        &[METHOD_NO_AUTH]
    };
    let mut request = vec![VERSION, methods.len() as u8];
    request.extend_from_slice(methods);
    write_timeout(stream, &request, timeout).await?;

    let mut reply = [0u8; 2];
    read_exact(stream, &mut reply, timeout).await?;
    if reply[0] != VERSION {
        return Err(Error::proxy("SOCKS5 proxy replied with an unexpected version"));
    }
    match reply[1] {
        METHOD_NO_AUTH => Ok(()),
        METHOD_USER_PASS if offer_user_pass => Ok(()),
        METHOD_NO_ACCEPTABLE => Err(Error::proxy("SOCKS5 proxy rejected all offered auth methods")),
        other => Err(Error::proxy(format!("SOCKS5 proxy selected unsupported method {other:#x}"))),
    }
}

async fn authenticate(
    stream: &mut (dyn NetworkStream),
    username: &str,
    password: &str,
    timeout: Option<Duration>,
) -> Result<(), Error> {
    if username.len() > 255 || password.len() > 255 {
        return Err(Error::proxy("SOCKS5 username/password must each be at most 255 bytes"));
    }
    let mut request = vec![0x01u8, username.len() as u8];
    request.extend_from_slice(username.as_bytes());
    request.push(password.len() as u8);
    request.extend_from_slice(password.as_bytes());
    write_timeout(stream, &request, timeout).await?;

    let mut reply = [0u8; 2];
    read_exact(stream, &mut reply, timeout).await?;
    if reply[1] != REPLY_SUCCEEDED {
        return Err(Error::proxy("SOCKS5 username/password authentication failed"));
    }
    Ok(())
}

async fn connect_command(
    stream: &mut (dyn NetworkStream),
    host: &str,
    port: u16,
    timeout: Option<Duration>,
) -> Result<(), Error> {
    if host.len() > 255 {
        return Err(Error::proxy("SOCKS5 destination hostname is too long"));
    }
    let mut request = vec![VERSION, CMD_CONNECT, 0x00, ATYP_DOMAIN, host.len() as u8];
    request.extend_from_slice(host.as_bytes());
    request.extend_from_slice(&port.to_be_bytes());
    write_timeout(stream, &request, timeout).await?;

    let mut head = [0u8; 4];
    read_exact(stream, &mut head, timeout).await?;
    if head[0] != VERSION {
        return Err(Error::proxy("SOCKS5 proxy replied with an unexpected version"));
    }
    if head[1] != REPLY_SUCCEEDED {
        return Err(Error::proxy(format!("SOCKS5 CONNECT failed with reply code {:#x}", head[1])));
    }

    // BND.ADDR + BND.PORT follow; their length depends on ATYP. We don't use
    // the bound address, but must still drain it to leave the stream
    // positioned at the first byte of the tunneled protocol.
    let addr_len = match head[3] {
        0x01 => 4,                                       // IPv4
        0x04 => 16,                                       // IPv6
        0x03 => {
            let mut len_byte = [0u8; 1];
            read_exact(stream, &mut len_byte, timeout).await?;
            len_byte[0] as usize
        }
        other => return Err(Error::proxy(format!("SOCKS5 proxy used unknown address type {other:#x}"))),
    };
    let mut rest = vec![0u8; addr_len + 2];
    read_exact(stream, &mut rest, timeout).await?;

    Ok(())
}

async fn read_exact(stream: &mut (dyn NetworkStream), buf: &mut [u8], timeout: Option<Duration>) -> Result<(), Error> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = read_timeout(stream, &mut buf[filled..], timeout).await?;
        if n == 0 {
            return Err(Error::proxy("SOCKS5 proxy closed the connection unexpectedly"));
        }
        filled += n;
    }
    Ok(())
}
