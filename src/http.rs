//! HTTP/1.1 framing for the ippusb tunnel: request parsing, response
//! serialization, and chunked transfer decoding.
//!
//! Only the slice of HTTP that rides the bulk endpoints is implemented.
//! Requests arrive split across arbitrary URB boundaries, so the parser
//! operates on an accumulation [`Buffer`] and consumes exactly what it
//! understands, leaving any body bytes in place.

use crate::buffer::Buffer;
use std::collections::BTreeMap;

/// Header map with deterministic (sorted) serialization order.
/// Lookup is case-sensitive; duplicate headers overwrite.
pub type Headers = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub uri: String,
    pub headers: Headers,
}

impl HttpRequest {
    /// Attempts to parse a request preamble (request line plus headers,
    /// terminated by an empty line) from the start of `message`.
    ///
    /// On success the preamble is erased from `message`, leaving only
    /// whatever body bytes followed it. On failure `message` is left
    /// untouched and `None` is returned; a missing end-of-header marker,
    /// a malformed request line, and a header without a colon all fail.
    pub fn deserialize(message: &mut Buffer) -> Option<HttpRequest> {
        let end = message.find(b"\r\n\r\n", 0)?;
        let preamble = std::str::from_utf8(&message.data()[..end]).ok()?;

        let mut lines = preamble.split("\r\n");
        let request_line = lines.next()?;
        let mut parts = request_line.split(' ');
        let method = parts.next()?.to_string();
        let uri = parts.next()?.to_string();
        if parts.next() != Some("HTTP/1.1") || parts.next().is_some() {
            return None;
        }

        let mut headers = Headers::new();
        for line in lines {
            let (name, value) = line.split_once(':')?;
            if name.is_empty() {
                return None;
            }
            headers.insert(name.to_string(), value.trim().to_string());
        }

        message.erase(0, end + 4);
        Some(HttpRequest {
            method,
            uri,
            headers,
        })
    }

    /// True if the request declares `Transfer-Encoding: chunked`.
    pub fn is_chunked(&self) -> bool {
        self.headers.get("Transfer-Encoding").map(String::as_str) == Some("chunked")
    }

    /// The declared `Content-Length`, or 0 when absent or unparseable.
    pub fn content_length(&self) -> usize {
        self.headers
            .get("Content-Length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// Status line tail, e.g. `200 OK`.
    pub status: String,
    pub headers: Headers,
    pub body: Buffer,
}

impl HttpResponse {
    pub fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            ..Self::default()
        }
    }

    pub fn ok() -> Self {
        Self::new("200 OK")
    }

    pub fn created() -> Self {
        Self::new("201 Created")
    }

    pub fn bad_request() -> Self {
        Self::new("400 Bad Request")
    }

    pub fn not_found() -> Self {
        Self::new("404 Not Found")
    }

    pub fn unsupported_media_type() -> Self {
        Self::new("415 Unsupported Media Type")
    }

    /// Appends the serialized response to `buf`.
    ///
    /// `Connection`, `Content-Length` and `Server` headers are filled in
    /// automatically; headers emit in sorted order.
    pub fn serialize(&self, buf: &mut Buffer) {
        let mut headers = self.headers.clone();
        headers.insert("Connection".to_string(), "close".to_string());
        headers.insert("Content-Length".to_string(), self.body.len().to_string());
        headers.insert("Server".to_string(), "localhost:0".to_string());

        buf.add_bytes(format!("HTTP/1.1 {}\r\n", self.status).as_bytes());
        for (name, value) in &headers {
            buf.add_bytes(format!("{}: {}\r\n", name, value).as_bytes());
        }
        buf.add_bytes(b"\r\n");
        buf.add(&self.body);
    }
}

/// True if `message` ends in the terminating `0\r\n\r\n` chunk, i.e. the
/// first occurrence of that marker sits exactly 5 bytes before the end.
pub fn contains_final_chunk(message: &Buffer) -> bool {
    match message.find(b"0\r\n\r\n", 0) {
        Some(i) => i > 0 && i + 5 == message.len(),
        None => false,
    }
}

/// Decodes one chunk (`HEXLEN CRLF payload CRLF`) from the front of
/// `message`, erasing what was consumed. Returns an empty buffer, and
/// consumes nothing further, when no complete chunk is present or the
/// length prefix is not valid hex.
pub fn parse_chunk(message: &mut Buffer) -> Buffer {
    // A leftover CRLF from the previous chunk's trailer may still lead.
    if message.starts_with(b"\r\n") {
        message.erase(0, 2);
    }
    let Some(len_end) = message.find(b"\r\n", 0) else {
        return Buffer::new();
    };
    let Some(chunk_size) = std::str::from_utf8(&message.data()[..len_end])
        .ok()
        .and_then(|s| usize::from_str_radix(s, 16).ok())
    else {
        return Buffer::new();
    };
    if len_end + 2 + chunk_size > message.len() {
        return Buffer::new();
    }
    let mut chunk = Buffer::with_capacity(chunk_size);
    chunk.add_window(message, len_end + 2, chunk_size);
    message.erase(0, len_end + 2 + chunk_size);
    if message.starts_with(b"\r\n") {
        message.erase(0, 2);
    }
    chunk
}

/// Decodes every chunk in `message` and concatenates the payloads.
/// `message` is consumed; decoding stops early if a malformed chunk
/// makes no progress.
pub fn merge_chunks(message: &mut Buffer) -> Buffer {
    let mut merged = Buffer::new();
    while !message.is_empty() {
        let before = message.len();
        let chunk = parse_chunk(message);
        merged.add(&chunk);
        if message.len() == before {
            log::warn!("malformed chunk; discarding {} trailing bytes", before);
            break;
        }
    }
    merged
}

#[cfg(test)]
#[path = "tests/http.rs"]
mod tests;
