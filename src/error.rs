//! Error taxonomy for fetching and configuration.

use std::sync::Arc;

use thiserror::Error;

use crate::http::ResponseError;

/// Errors produced while fetching a JSON document.
///
/// `FetchError` is `Clone` so that a single outcome can be delivered to every
/// caller waiting on the same in-flight request; non-`Clone` sources are held
/// behind an [`Arc`].
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The server answered with a non-2xx status.
    #[error("API request failed: {status} {status_text}")]
    RequestFailed { status: u16, status_text: String },

    /// The body of a 2xx response was not valid JSON, or did not match the requested type.
    #[error("failed to decode JSON response: {0}")]
    Decode(#[source] Arc<serde_json::Error>),

    /// The request never produced a usable response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl FetchError {
    /// Returns the HTTP status code for [`FetchError::RequestFailed`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(Arc::new(err))
    }
}

/// Network-level failures: connecting, writing, reading, or framing.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("malformed HTTP response: {0}")]
    Malformed(String),

    #[error("response exceeds maximum allowed size of {max_bytes} bytes")]
    ResponseTooLarge { max_bytes: usize },

    #[error("unsupported URL scheme {scheme:?}")]
    UnsupportedScheme { scheme: String },

    #[error("URL has no host: {url}")]
    MissingHost { url: String },

    #[cfg(feature = "https")]
    #[error("HTTP client error: {0}")]
    Client(#[source] Arc<reqwest::Error>),
}

#[cfg(feature = "https")]
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Client(Arc::new(err))
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<ResponseError> for TransportError {
    fn from(err: ResponseError) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Errors produced while building a [`FetcherConfig`](crate::config::FetcherConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown profile {0:?} (expected \"development\" or \"production\")")]
    UnknownProfile(String),

    #[error("invalid API base {value:?}: {source}")]
    InvalidApiBase {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("API base {0:?} cannot be used as a base URL")]
    NotABase(String),

    #[error("invalid TTL {value:?}: {source}")]
    InvalidTtl {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}
