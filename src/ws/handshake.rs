//! The RFC 6455 §4.2 opening handshake: read the client's upgrade request, validate it, and
//! reply with the `101 Switching Protocols` response carrying the computed `Sec-WebSocket-Accept`.

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

use crate::error::Error;
use crate::primitives::{base64_encode, sha1};

const HANDSHAKE_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REQUEST_SIZE: usize = 16 * 1024;
const MAX_HEADERS: usize = 64;

/// Reads and validates the opening HTTP request off `stream`, then writes the `101` response.
/// Returns the client's `Sec-WebSocket-Key`-derived accept value, mostly useful for logging.
pub async fn perform_server_handshake(stream: &mut TcpStream) -> Result<String, Error> {
    let request = timeout(HANDSHAKE_TIMEOUT, read_request(stream))
        .await
        .map_err(|_| Error::HandshakeTimeout)??;

    let key = validate_request(&request)?;
    let accept = base64_encode(&sha1(format!("{key}{HANDSHAKE_GUID}").as_bytes()));

    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\
         \r\n"
    );
    stream.write_all(response.as_bytes()).await?;
    Ok(accept)
}

/// Reads off `stream` until the header-terminating blank line, growing the buffer as needed up
/// to [`MAX_REQUEST_SIZE`].
async fn read_request(stream: &mut TcpStream) -> Result<Vec<u8>, Error> {
    let mut buf = BytesMut::with_capacity(4096);
    let mut chunk = [0u8; 4096];

    loop {
        if let Some(end) = find_header_terminator(&buf) {
            buf.truncate(end);
            return Ok(buf.to_vec());
        }
        if buf.len() >= MAX_REQUEST_SIZE {
            return Err(Error::HandshakeTooLarge);
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(Error::HandshakeTooLarge);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn find_header_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

/// Parses `request` with `httparse` and checks the handful of headers RFC 6455 requires of a
/// client's opening request, returning the raw `Sec-WebSocket-Key` value.
fn validate_request(request: &[u8]) -> Result<String, Error> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut headers);
    parsed.parse(request)?;

    if !matches!(parsed.method, Some(method) if method.eq_ignore_ascii_case("GET")) {
        return Err(Error::NotAGetRequest);
    }

    let header_eq = |name: &str, needle: &str| -> bool {
        parsed
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| {
                std::str::from_utf8(h.value)
                    .unwrap_or("")
                    .split(',')
                    .any(|token| token.trim().eq_ignore_ascii_case(needle))
            })
            .unwrap_or(false)
    };

    if !header_eq("Upgrade", "websocket") {
        return Err(Error::NoUpgradeHeader);
    }
    if !header_eq("Connection", "Upgrade") {
        return Err(Error::NoConnectionHeader);
    }

    parsed
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("Sec-WebSocket-Key"))
        .map(|h| String::from_utf8_lossy(h.value).trim().to_string())
        .ok_or(Error::NoSecWebSocketKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_the_rfc6455_example_accept_value() {
        // The exact key/accept pair from RFC 6455 §1.3.
        let key = "dGhlIHNhbXBsZSBub25jZQ==";
        let accept = base64_encode(&sha1(format!("{key}{HANDSHAKE_GUID}").as_bytes()));
        assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn validates_a_well_formed_request() {
        let request = b"GET /chat HTTP/1.1\r\n\
            Host: example.com\r\n\
            Upgrade: websocket\r\n\
            Connection: Upgrade\r\n\
            Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
            Sec-WebSocket-Version: 13\r\n\r\n";
        let key = validate_request(request).unwrap();
        assert_eq!(key, "dGhlIHNhbXBsZSBub25jZQ==");
    }

    #[test]
    fn rejects_a_request_missing_the_key() {
        let request = b"GET /chat HTTP/1.1\r\n\
            Host: example.com\r\n\
            Upgrade: websocket\r\n\
            Connection: Upgrade\r\n\r\n";
        assert!(matches!(
            validate_request(request),
            Err(Error::NoSecWebSocketKey)
        ));
    }

    #[test]
    fn rejects_a_non_get_request() {
        let request = b"POST /chat HTTP/1.1\r\nHost: example.com\r\n\r\n";
        assert!(matches!(validate_request(request), Err(Error::NotAGetRequest)));
    }

    #[test]
    fn finds_the_header_terminator() {
        assert_eq!(find_header_terminator(b"GET / HTTP/1.1\r\n\r\n"), Some(18));
        assert_eq!(find_header_terminator(b"GET / HTTP/1.1\r\n"), None);
    }
}
