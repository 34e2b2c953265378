//! HTTP/1.1 response parsing using the [`httparse`] crate.
//!
//! [`Response::parse`] is a push parser: the transport calls it after every
//! read with everything buffered so far, and it answers either with a complete
//! response or with [`ResponseError::Incomplete`] to ask for more bytes.

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Status};

/// Maximum size of a complete HTTP response we will buffer or decode (16 MiB).
pub const MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

/// Errors that can occur while parsing an HTTP/1.1 response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("invalid chunk size line in chunked body")]
    InvalidChunkSize,

    #[error("chunk of {size} bytes exceeds maximum response size of {max_bytes} bytes")]
    ChunkTooLarge { size: u64, max_bytes: usize },

    #[error("connection closed before response headers were complete")]
    HeadersTruncated,

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("connection closed after {received} of {expected} body bytes")]
    Truncated { expected: usize, received: usize },
}

/// A fully received HTTP/1.1 response.
///
/// # Examples
///
/// ```
/// use taxocache::http::Response;
///
/// let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 9\r\n\r\n{\"id\":42}";
/// let response = Response::parse(raw, false).unwrap();
///
/// assert!(response.status().is_success());
/// assert_eq!(response.body().as_ref(), b"{\"id\":42}");
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: Status,
    headers: Headers,
    body: Bytes,
}

impl Response {
    /// Maximum number of headers we accept per response.
    const MAX_HEADERS: usize = 64;

    /// Creates a response directly, without going through the wire format.
    pub fn new(status: Status, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Parses a response from everything received so far.
    ///
    /// `eof` tells the parser whether the peer has closed the connection, which
    /// is what delimits a body that has neither `Content-Length` nor chunked
    /// framing. Interim `1xx` responses are skipped.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::Incomplete`]: more data is needed and the peer is still open.
    /// - [`ResponseError::Truncated`]: the peer closed before the declared body arrived.
    /// - [`ResponseError::HeadersTruncated`]: the peer closed mid-headers.
    /// - [`ResponseError::Parse`] / [`ResponseError::InvalidChunkSize`]: malformed data.
    /// - [`ResponseError::ChunkTooLarge`]: a chunk larger than [`MAX_RESPONSE_SIZE`].
    pub fn parse(buf: &[u8], eof: bool) -> Result<Self, ResponseError> {
        let mut buf = buf;
        loop {
            let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
            let mut raw = httparse::Response::new(&mut headers);

            let body_offset = match raw.parse(buf) {
                Ok(httparse::Status::Complete(offset)) => offset,
                Ok(httparse::Status::Partial) if eof => return Err(ResponseError::HeadersTruncated),
                Ok(httparse::Status::Partial) => return Err(ResponseError::Incomplete),
                Err(e) => return Err(e.into()),
            };

            let code = raw.code.ok_or(ResponseError::MissingField { field: "status" })?;
            let status = Status::new(code, raw.reason.unwrap_or_default());

            let mut header_map = Headers::new();
            for header in raw.headers.iter() {
                if let Ok(value) = std::str::from_utf8(header.value) {
                    header_map.append(header.name, value);
                }
            }

            let rest = &buf[body_offset..];

            if (100..=199).contains(&code) {
                buf = rest;
                continue;
            }

            let body = if code == 204 || code == 304 {
                Bytes::new()
            } else if header_map.is_chunked() {
                decode_chunked(rest, eof)?
            } else if let Some(len) = header_map.content_length() {
                if rest.len() < len {
                    return Err(incomplete(eof, len, rest.len()));
                }
                Bytes::copy_from_slice(&rest[..len])
            } else if eof {
                Bytes::copy_from_slice(rest)
            } else {
                return Err(ResponseError::Incomplete);
            };

            return Ok(Self {
                status,
                headers: header_map,
                body,
            });
        }
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the (de-chunked) body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}

fn incomplete(eof: bool, expected: usize, received: usize) -> ResponseError {
    if eof {
        ResponseError::Truncated { expected, received }
    } else {
        ResponseError::Incomplete
    }
}

// RFC 9112 §7.1. Trailer fields are read past and discarded.
fn decode_chunked(mut buf: &[u8], eof: bool) -> Result<Bytes, ResponseError> {
    let mut body = Vec::new();

    loop {
        let (offset, size) = match httparse::parse_chunk_size(buf) {
            Ok(httparse::Status::Complete(pair)) => pair,
            Ok(httparse::Status::Partial) => return Err(incomplete(eof, 0, body.len())),
            Err(_) => return Err(ResponseError::InvalidChunkSize),
        };
        buf = &buf[offset..];

        if size == 0 {
            skip_trailers(buf, eof)?;
            return Ok(Bytes::from(body));
        }

        let size = usize::try_from(size)
            .ok()
            .filter(|size| body.len().saturating_add(*size) <= MAX_RESPONSE_SIZE)
            .ok_or(ResponseError::ChunkTooLarge {
                size,
                max_bytes: MAX_RESPONSE_SIZE,
            })?;
        let framed = size.checked_add(2).ok_or(ResponseError::InvalidChunkSize)?;
        if buf.len() < framed {
            return Err(incomplete(eof, body.len() + size, body.len()));
        }
        body.extend_from_slice(&buf[..size]);
        if &buf[size..framed] != b"\r\n" {
            return Err(ResponseError::InvalidChunkSize);
        }
        buf = &buf[framed..];
    }
}

fn skip_trailers(mut buf: &[u8], eof: bool) -> Result<(), ResponseError> {
    loop {
        match buf.windows(2).position(|w| w == b"\r\n") {
            Some(0) => return Ok(()),
            Some(pos) => buf = &buf[pos + 2..],
            // Tolerate peers that close right after the last-chunk line.
            None if eof => return Ok(()),
            None => return Err(ResponseError::Incomplete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length_body() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n[]";
        let res = Response::parse(raw, false).unwrap();
        assert_eq!(res.status().code(), 200);
        assert_eq!(res.status().reason(), "OK");
        assert_eq!(res.headers().get("content-type"), Some("application/json"));
        assert_eq!(res.body().as_ref(), b"[]");
    }

    #[test]
    fn partial_headers_are_incomplete() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Le";
        assert!(matches!(Response::parse(raw, false), Err(ResponseError::Incomplete)));
    }

    #[test]
    fn short_body_waits_then_truncates_at_eof() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n{\"a\"";
        assert!(matches!(Response::parse(raw, false), Err(ResponseError::Incomplete)));
        assert!(matches!(
            Response::parse(raw, true),
            Err(ResponseError::Truncated { expected: 10, received: 4 })
        ));
    }

    #[test]
    fn close_delimited_body() {
        let raw = b"HTTP/1.0 200 OK\r\n\r\n{\"id\":1}";
        assert!(matches!(Response::parse(raw, false), Err(ResponseError::Incomplete)));
        let res = Response::parse(raw, true).unwrap();
        assert_eq!(res.body().as_ref(), b"{\"id\":1}");
    }

    #[test]
    fn chunked_body() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
                    4\r\n{\"id\r\n6;ext=1\r\n\":42}\n\r\n0\r\nX-Trailer: yes\r\n\r\n";
        let res = Response::parse(raw, false).unwrap();
        assert_eq!(res.body().as_ref(), b"{\"id\":42}\n");
    }

    #[test]
    fn chunked_body_missing_terminator_is_incomplete() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nabcd\r\n";
        assert!(matches!(Response::parse(raw, false), Err(ResponseError::Incomplete)));
    }

    #[test]
    fn oversized_chunk_is_rejected() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
                    ffffffffffffffff\r\nabcd\r\n0\r\n\r\n";
        assert!(matches!(
            Response::parse(raw, true),
            Err(ResponseError::ChunkTooLarge { size: u64::MAX, .. })
        ));
        assert!(matches!(
            Response::parse(raw, false),
            Err(ResponseError::ChunkTooLarge { .. })
        ));
    }

    #[test]
    fn chunks_summing_past_limit_are_rejected() {
        let raw = format!(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nabcd\r\n{:x}\r\n",
            MAX_RESPONSE_SIZE
        );
        assert!(matches!(
            Response::parse(raw.as_bytes(), false),
            Err(ResponseError::ChunkTooLarge { .. })
        ));
    }

    #[test]
    fn closed_mid_headers_is_headers_truncated() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Le";
        let err = Response::parse(raw, true).unwrap_err();
        assert!(matches!(err, ResponseError::HeadersTruncated));
        assert_eq!(err.to_string(), "connection closed before response headers were complete");
    }

    #[test]
    fn bad_chunk_size() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\nabcd\r\n0\r\n\r\n";
        assert!(matches!(Response::parse(raw, false), Err(ResponseError::InvalidChunkSize)));
    }

    #[test]
    fn interim_continue_is_skipped() {
        let raw = b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";
        let res = Response::parse(raw, false).unwrap();
        assert_eq!(res.status().code(), 404);
        assert!(res.body().is_empty());
    }

    #[test]
    fn no_content_has_empty_body() {
        let raw = b"HTTP/1.1 204 No Content\r\n\r\n";
        let res = Response::parse(raw, false).unwrap();
        assert!(res.body().is_empty());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            Response::parse(b"NOT-HTTP garbage\r\n\r\n", true),
            Err(ResponseError::Parse(_))
        ));
    }
}
