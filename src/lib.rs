//! # taxocache
//!
//! An async JSON fetcher with a per-URL response cache, written for the
//! taxonomy browser's API client.
//!
//! Every successful `GET` is memoized under its exact URL string; failures are
//! never memoized. Concurrent requests for the same uncached URL share one
//! network round trip.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use taxocache::CachingFetcher;
//! use taxocache::config::FetcherConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = CachingFetcher::new(FetcherConfig::from_env()?);
//!     let lineage = fetcher.fetch_cached("/api/lineage/9606").await?;
//!     println!("{lineage}");
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod transport;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheEntry, ResponseCache};
pub use config::{FetcherConfig, Profile};
pub use error::{ConfigError, FetchError, TransportError};
pub use fetcher::{CacheStats, CachingFetcher};
pub use transport::{DefaultTransport, TcpTransport, Transport};

#[cfg(feature = "https")]
pub use transport::HttpsTransport;
