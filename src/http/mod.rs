//! HTTP/1.1 client-side protocol types.
//!
//! This module provides the primitives the transport speaks:
//! [`Status`], [`Headers`], the outgoing [`Request`], and the parsed [`Response`].

use std::fmt;

pub mod headers;
pub mod request;
pub mod response;

pub use headers::Headers;
pub use request::Request;
pub use response::{Response, ResponseError};

/// The status line of a received HTTP response.
///
/// Unlike a closed enum, any three-digit code a server sends is representable;
/// the reason phrase is kept exactly as it appeared on the wire.
///
/// # Examples
///
/// ```
/// use taxocache::http::Status;
///
/// let status = Status::new(404, "Not Found");
/// assert_eq!(status.code(), 404);
/// assert_eq!(status.reason(), "Not Found");
/// assert!(!status.is_success());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Status {
    code: u16,
    reason: String,
}

impl Status {
    /// Creates a status from a numeric code and reason phrase.
    ///
    /// An empty reason is replaced with the canonical phrase for `code`, when
    /// one is known. HTTP/1.1 permits servers to omit it.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        let mut reason = reason.into();
        if reason.is_empty() {
            if let Some(canonical) = canonical_reason(code) {
                reason = canonical.to_owned();
            }
        }
        Self { code, reason }
    }

    /// Returns the numeric status code.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Returns the reason phrase (status text).
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Returns `true` for any 2xx code.
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.code)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason)
    }
}

/// Returns the canonical reason phrase for a status code, if it is a common one.
pub fn canonical_reason(code: u16) -> Option<&'static str> {
    let reason = match code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        409 => "Conflict",
        410 => "Gone",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => return None,
    };
    Some(reason)
}
