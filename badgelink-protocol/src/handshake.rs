//! HTTP/1.1 websocket upgrade (RFC 6455, section 4)
//!
//! Only the subset of HTTP needed to validate one upgrade request is
//! understood: the request line, and the `Upgrade`, `Connection`,
//! `Sec-WebSocket-Key` and `Sec-WebSocket-Version` headers. Everything else
//! is skipped.

use core::fmt::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use heapless::String;
use sha1::{Digest, Sha1};

/// Fixed GUID appended to the client key before hashing
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// A request whose headers do not end within this many bytes is rejected
pub const MAX_REQUEST_SIZE: usize = 1024;

/// Length of a base64-encoded 16-byte `Sec-WebSocket-Key`
pub const CLIENT_KEY_LEN: usize = 24;

/// Length of a base64-encoded SHA-1 digest
pub const ACCEPT_KEY_LEN: usize = 28;

/// Capacity of a formatted handshake response
pub const RESPONSE_CAPACITY: usize = 192;

/// A formatted HTTP response head
pub type Response = String<RESPONSE_CAPACITY>;

/// Reasons an upgrade is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandshakeError {
    /// Request line or header syntax is broken
    Malformed,
    /// Method other than GET
    MethodNotAllowed,
    /// Target differs from the websocket path
    NotFound,
    /// `Upgrade: websocket` or `Connection: upgrade` missing
    NotUpgrade,
    /// `Sec-WebSocket-Version` is missing or not 13
    UnsupportedVersion,
    /// `Sec-WebSocket-Key` missing or not 16 base64-encoded bytes
    InvalidKey,
    /// Headers did not fit in the receive buffer
    HeadersTooLarge,
    /// A session already owns the slot
    Busy,
    /// The request did not arrive in time
    Timeout,
}

impl HandshakeError {
    /// HTTP status line sent back for this error
    pub fn status_line(&self) -> &'static str {
        match self {
            HandshakeError::Malformed | HandshakeError::InvalidKey => "400 Bad Request",
            HandshakeError::NotFound => "404 Not Found",
            HandshakeError::MethodNotAllowed => "405 Method Not Allowed",
            HandshakeError::Timeout => "408 Request Timeout",
            HandshakeError::NotUpgrade | HandshakeError::UnsupportedVersion => {
                "426 Upgrade Required"
            }
            HandshakeError::HeadersTooLarge => "431 Request Header Fields Too Large",
            HandshakeError::Busy => "503 Service Unavailable",
        }
    }
}

/// A validated upgrade request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    /// The client's `Sec-WebSocket-Key`, verbatim
    pub key: String<CLIENT_KEY_LEN>,
}

impl UpgradeRequest {
    /// `Sec-WebSocket-Accept` value for this request
    pub fn accept_key(&self) -> String<ACCEPT_KEY_LEN> {
        accept_key(&self.key)
    }
}

/// Derive `Sec-WebSocket-Accept` from a client key
pub fn accept_key(key: &str) -> String<ACCEPT_KEY_LEN> {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    let digest = hasher.finalize();

    let mut encoded = [0u8; ACCEPT_KEY_LEN];
    let mut accept = String::new();
    // 20 digest bytes always encode to exactly 28 characters
    if let Ok(len) = STANDARD.encode_slice(digest, &mut encoded) {
        for &byte in &encoded[..len] {
            let _ = accept.push(byte as char);
        }
    }
    accept
}

/// Parse an upgrade request from the start of `buffer`
///
/// Returns `Ok(None)` until the blank line ending the headers has arrived,
/// then the validated request and the number of bytes it occupied.
pub fn parse_upgrade_request(
    buffer: &[u8],
    path: &str,
) -> Result<Option<(UpgradeRequest, usize)>, HandshakeError> {
    let Some(end) = find_header_end(buffer) else {
        if buffer.len() >= MAX_REQUEST_SIZE {
            return Err(HandshakeError::HeadersTooLarge);
        }
        return Ok(None);
    };
    if end > MAX_REQUEST_SIZE {
        return Err(HandshakeError::HeadersTooLarge);
    }

    let head = core::str::from_utf8(&buffer[..end - 4]).map_err(|_| HandshakeError::Malformed)?;
    let mut lines = head.split("\r\n");

    let request_line = lines.next().ok_or(HandshakeError::Malformed)?;
    let mut parts = request_line.split(' ');
    let method = parts.next().ok_or(HandshakeError::Malformed)?;
    let target = parts.next().ok_or(HandshakeError::Malformed)?;
    let version = parts.next().ok_or(HandshakeError::Malformed)?;
    if parts.next().is_some() || version != "HTTP/1.1" {
        return Err(HandshakeError::Malformed);
    }
    if method != "GET" {
        return Err(HandshakeError::MethodNotAllowed);
    }
    let target_path = target.split('?').next().unwrap_or(target);
    if target_path != path {
        return Err(HandshakeError::NotFound);
    }

    let mut upgrade = false;
    let mut connection = false;
    let mut ws_version = None;
    let mut key = None;

    for line in lines {
        let (name, value) = line.split_once(':').ok_or(HandshakeError::Malformed)?;
        let name = name.trim();
        let value = value.trim();

        if name.eq_ignore_ascii_case("Upgrade") {
            upgrade = has_token(value, "websocket");
        } else if name.eq_ignore_ascii_case("Connection") {
            connection = has_token(value, "upgrade");
        } else if name.eq_ignore_ascii_case("Sec-WebSocket-Version") {
            ws_version = Some(value);
        } else if name.eq_ignore_ascii_case("Sec-WebSocket-Key") {
            key = Some(value);
        }
    }

    if !upgrade || !connection {
        return Err(HandshakeError::NotUpgrade);
    }
    if ws_version != Some("13") {
        return Err(HandshakeError::UnsupportedVersion);
    }
    let key = key.ok_or(HandshakeError::InvalidKey)?;
    validate_key(key)?;

    let mut owned = String::new();
    owned
        .push_str(key)
        .map_err(|_| HandshakeError::InvalidKey)?;

    Ok(Some((UpgradeRequest { key: owned }, end)))
}

/// `101 Switching Protocols` response completing the upgrade
pub fn accept_response(request: &UpgradeRequest) -> Result<Response, core::fmt::Error> {
    let mut response = Response::new();
    core::write!(
        &mut response,
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\
         \r\n",
        request.accept_key(),
    )?;
    Ok(response)
}

/// Error response sent before closing a refused connection
pub fn error_response(error: HandshakeError) -> Result<Response, core::fmt::Error> {
    let mut response = Response::new();
    core::write!(&mut response, "HTTP/1.1 {}\r\n", error.status_line())?;
    if matches!(
        error,
        HandshakeError::NotUpgrade | HandshakeError::UnsupportedVersion
    ) {
        response.push_str("Sec-WebSocket-Version: 13\r\n").map_err(|_| core::fmt::Error)?;
    }
    response
        .push_str("Connection: close\r\nContent-Length: 0\r\n\r\n")
        .map_err(|_| core::fmt::Error)?;
    Ok(response)
}

/// Offset just past the `\r\n\r\n` terminating the header block
fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}

/// Comma-separated header value contains `token` (case-insensitive)
fn has_token(value: &str, token: &str) -> bool {
    value
        .split(',')
        .any(|item| item.trim().eq_ignore_ascii_case(token))
}

fn validate_key(key: &str) -> Result<(), HandshakeError> {
    if key.len() != CLIENT_KEY_LEN {
        return Err(HandshakeError::InvalidKey);
    }
    let mut decoded = [0u8; CLIENT_KEY_LEN];
    match STANDARD.decode_slice(key, &mut decoded) {
        Ok(16) => Ok(()),
        _ => Err(HandshakeError::InvalidKey),
    }
}
