//! The network boundary: issuing a `GET` and receiving a full response.
//!
//! [`Transport`] is the seam between the caching logic and the wire. The
//! crate ships [`TcpTransport`], a plain HTTP/1.1 client over Tokio TCP, and,
//! with the `https` feature, [`HttpsTransport`] backed by reqwest + rustls.
//! [`DefaultTransport`] picks between them by URL scheme. Tests and embedders
//! can supply their own implementation.

use std::future::Future;
use std::pin::Pin;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};
use url::Url;

use crate::error::TransportError;
use crate::http::response::MAX_RESPONSE_SIZE;
use crate::http::{Request, Response, ResponseError};

#[cfg(feature = "https")]
mod https;

#[cfg(feature = "https")]
pub use https::HttpsTransport;

/// Heap-allocated, `Send` future returned by [`Transport::get`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 8192;

/// Issues HTTP `GET` requests with `Accept: application/json`.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync`; one transport is shared by every
///   clone of a [`CachingFetcher`](crate::CachingFetcher).
/// - Any received response is `Ok`, whatever its status. Status handling belongs
///   to the caller.
/// - There is no timeout; dropping the returned future abandons the request.
///
/// # Examples
///
/// ```rust
/// use taxocache::http::{Headers, Response, Status};
/// use taxocache::transport::{BoxFuture, Transport};
/// use taxocache::TransportError;
/// use url::Url;
///
/// struct Canned;
///
/// impl Transport for Canned {
///     fn get<'a>(&'a self, _url: &'a Url) -> BoxFuture<'a, Result<Response, TransportError>> {
///         Box::pin(async { Ok(Response::new(Status::new(200, "OK"), Headers::new(), "{}")) })
///     }
/// }
/// ```
pub trait Transport: Send + Sync {
    /// Performs one `GET` round trip to `url`.
    fn get<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Response, TransportError>>;
}

/// HTTP/1.1 over plain Tokio TCP, one connection per request.
///
/// Every request is sent with `Connection: close`, so the response body may be
/// delimited by `Content-Length`, chunked encoding, or the peer closing the socket.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    _priv: (),
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn round_trip(&self, url: &Url) -> Result<Response, TransportError> {
        if url.scheme() != "http" {
            return Err(TransportError::UnsupportedScheme {
                scheme: url.scheme().to_owned(),
            });
        }
        let host = url.host_str().ok_or_else(|| TransportError::MissingHost {
            url: url.to_string(),
        })?;
        let port = url.port_or_known_default().unwrap_or(80);
        let addr = format!("{host}:{port}");
        // IPv6 literals come back bracketed from `host_str`.
        let host = host.trim_start_matches('[').trim_end_matches(']');

        let mut stream =
            TcpStream::connect((host, port))
                .await
                .map_err(|e| TransportError::Connect {
                    addr: addr.clone(),
                    source: e.into(),
                })?;
        debug!(%addr, %url, "connected");

        let request = Request::get(url);
        stream.write_all(&request.into_bytes()).await?;
        stream.flush().await?;

        read_response(&mut stream).await
    }
}

impl Transport for TcpTransport {
    fn get<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Response, TransportError>> {
        Box::pin(self.round_trip(url))
    }
}

/// Routes `http` URLs to [`TcpTransport`] and `https` URLs to [`HttpsTransport`].
///
/// Without the `https` feature, or if the TLS client could not be built,
/// `https` URLs fail with [`TransportError::UnsupportedScheme`].
#[derive(Debug, Clone)]
pub struct DefaultTransport {
    plain: TcpTransport,
    #[cfg(feature = "https")]
    tls: Option<HttpsTransport>,
}

impl DefaultTransport {
    pub fn new() -> Self {
        Self {
            plain: TcpTransport::new(),
            #[cfg(feature = "https")]
            tls: HttpsTransport::new()
                .inspect_err(|e| tracing::warn!(error = %e, "TLS client unavailable, https disabled"))
                .ok(),
        }
    }
}

impl Default for DefaultTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for DefaultTransport {
    fn get<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Response, TransportError>> {
        match url.scheme() {
            #[cfg(feature = "https")]
            "https" => match &self.tls {
                Some(tls) => tls.get(url),
                None => Box::pin(async move {
                    Err(TransportError::UnsupportedScheme {
                        scheme: url.scheme().to_owned(),
                    })
                }),
            },
            _ => self.plain.get(url),
        }
    }
}

// Reads until the buffered bytes form a complete response or the peer closes.
async fn read_response(stream: &mut TcpStream) -> Result<Response, TransportError> {
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        let bytes_read = stream.read_buf(&mut buf).await?;
        let eof = bytes_read == 0;
        trace!(bytes_read, buffered = buf.len(), "read from peer");

        if buf.len() > MAX_RESPONSE_SIZE {
            return Err(TransportError::ResponseTooLarge {
                max_bytes: MAX_RESPONSE_SIZE,
            });
        }

        match Response::parse(&buf, eof) {
            Ok(response) => return Ok(response),
            Err(ResponseError::Incomplete) if !eof => continue,
            Err(e) => return Err(e.into()),
        }
    }
}
