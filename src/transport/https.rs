//! TLS-capable transport backed by [`reqwest`] with rustls.

use reqwest::header::{ACCEPT, CONTENT_LENGTH};
use tracing::debug;
use url::Url;

use super::{BoxFuture, Transport};
use crate::error::TransportError;
use crate::http::request::{ACCEPT_JSON, USER_AGENT};
use crate::http::response::MAX_RESPONSE_SIZE;
use crate::http::{Headers, Response, Status};

/// `GET` over reqwest, for `https` (and, if asked, `http`) URLs.
///
/// Responses are converted into the crate's own [`Response`], with the same
/// size cap as [`TcpTransport`](super::TcpTransport).
#[derive(Debug, Clone)]
pub struct HttpsTransport {
    client: reqwest::Client,
}

impl HttpsTransport {
    /// Builds the underlying client.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Client`] if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    async fn round_trip(&self, url: &Url) -> Result<Response, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, ACCEPT_JSON)
            .send()
            .await?;

        let declared = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<usize>().ok());
        if declared.is_some_and(|len| len > MAX_RESPONSE_SIZE) {
            return Err(TransportError::ResponseTooLarge {
                max_bytes: MAX_RESPONSE_SIZE,
            });
        }

        let code = response.status().as_u16();
        let status = Status::new(code, response.status().canonical_reason().unwrap_or_default());

        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.append(name.as_str(), value);
            }
        }

        let mut response = response;
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > MAX_RESPONSE_SIZE {
                return Err(TransportError::ResponseTooLarge {
                    max_bytes: MAX_RESPONSE_SIZE,
                });
            }
            body.extend_from_slice(&chunk);
        }
        debug!(%url, status = code, bytes = body.len(), "received");

        Ok(Response::new(status, headers, body))
    }
}

impl Transport for HttpsTransport {
    fn get<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Response, TransportError>> {
        Box::pin(self.round_trip(url))
    }
}
