//! Outgoing HTTP/1.1 `GET` request builder.
//!
//! The fetcher only ever issues JSON `GET`s, so the request type is narrow:
//! a target derived from a [`Url`], a header list, and wire serialization
//! into a [`BytesMut`] buffer.

use bytes::{BufMut, BytesMut};
use url::Url;

use super::Headers;

/// Media type sent in the `Accept` header of every request.
pub const ACCEPT_JSON: &str = "application/json";

/// Value of the `User-Agent` header.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// An HTTP/1.1 `GET` request, ready to be serialized and written to a socket.
///
/// # Examples
///
/// ```
/// use taxocache::http::Request;
/// use url::Url;
///
/// let url = Url::parse("http://localhost:5000/api/species/42?lang=en").unwrap();
/// let request = Request::get(&url);
///
/// let bytes = request.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("GET /api/species/42?lang=en HTTP/1.1\r\n"));
/// assert!(text.contains("Host: localhost:5000\r\n"));
/// assert!(text.contains("Accept: application/json\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    target: String,
    headers: Headers,
}

impl Request {
    /// Builds a `GET` for `url` with the default header set:
    /// `Host`, `Accept: application/json`, `User-Agent`, `Connection: close`.
    pub fn get(url: &Url) -> Self {
        let mut target = url.path().to_owned();
        if target.is_empty() {
            target.push('/');
        }
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }

        let mut headers = Headers::new();
        headers.append("Host", host_header(url));
        headers.append("Accept", ACCEPT_JSON);
        headers.append("User-Agent", USER_AGENT);
        headers.append("Connection", "close");

        Self { target, headers }
    }

    /// Replaces a header value. Intended for callers that need to override a default.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Returns the request target (path plus optional query).
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Serializes the request line and headers using HTTP/1.1 wire format.
    pub fn into_bytes(self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(64 + self.target.len() + self.headers.len() * 48);

        buf.put(format!("GET {} HTTP/1.1\r\n", self.target).as_bytes());
        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }
        buf.put(&b"\r\n"[..]);

        buf
    }
}

// `Host` carries the port only when it differs from the scheme default.
fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn root_target() {
        let url = Url::parse("http://example.com").unwrap();
        let req = Request::get(&url);
        assert_eq!(req.target(), "/");
        assert_eq!(req.headers().get("host"), Some("example.com"));
    }

    #[test]
    fn default_port_omitted_from_host() {
        let url = Url::parse("http://example.com:80/x").unwrap();
        assert_eq!(Request::get(&url).headers().get("host"), Some("example.com"));
    }

    #[test]
    fn fragment_is_not_sent() {
        let url = Url::parse("http://example.com/taxa/9606#lineage").unwrap();
        assert_eq!(Request::get(&url).target(), "/taxa/9606");
    }

    #[test]
    fn header_override() {
        let url = Url::parse("http://example.com/").unwrap();
        let s = to_string(Request::get(&url).header("accept", "application/ld+json").into_bytes());
        assert!(s.contains("accept: application/ld+json\r\n"));
        assert!(!s.contains("Accept: application/json\r\n"));
    }

    #[test]
    fn ends_with_blank_line() {
        let url = Url::parse("http://127.0.0.1:8080/api/search?q=panthera").unwrap();
        let s = to_string(Request::get(&url).into_bytes());
        assert!(s.starts_with("GET /api/search?q=panthera HTTP/1.1\r\n"));
        assert!(s.contains("Connection: close\r\n"));
        assert!(s.ends_with("\r\n\r\n"));
    }
}
