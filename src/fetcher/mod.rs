//! The caching JSON fetcher.
//!
//! [`CachingFetcher::fetch_cached`] is a check-then-fetch-then-store operation:
//!
//! 1. A fresh cache entry for the exact URL string is returned as-is, with no
//!    network access.
//! 2. If another caller is already fetching the same URL, the call waits for that
//!    fetch and shares its outcome, success or failure.
//! 3. Otherwise the call becomes the *leader*: it resolves the URL against the
//!    configured API base, issues a `GET` with `Accept: application/json`, and
//!    decodes the body. Only a 2xx response with a valid JSON body is stored.
//!
//! The in-flight record is removed when the leader finishes, so failures are
//! never sticky. If the leader is cancelled, a waiting caller takes over.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};
use url::Url;

use crate::cache::ResponseCache;
use crate::config::FetcherConfig;
use crate::error::FetchError;
use crate::transport::{DefaultTransport, Transport};

type Outcome = Result<Arc<Value>, FetchError>;

// `None` until the leader publishes its outcome.
type Flight = watch::Receiver<Option<Outcome>>;

struct State {
    cache: ResponseCache,
    in_flight: HashMap<String, Flight>,
}

impl State {
    // Drops records whose leader was cancelled before publishing.
    fn prune_abandoned(&mut self) -> usize {
        let before = self.in_flight.len();
        self.in_flight.retain(|_, flight| flight.has_changed().is_ok());
        before - self.in_flight.len()
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    coalesced: AtomicU64,
    failures: AtomicU64,
}

/// A point-in-time snapshot of fetcher activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Calls answered from the cache.
    pub hits: u64,
    /// Calls that found no cache entry.
    pub misses: u64,
    /// Network requests actually started.
    pub fetches: u64,
    /// Calls that waited on another caller's in-flight request.
    pub coalesced: u64,
    /// Leader fetches that ended in an error.
    pub failures: u64,
}

struct Inner {
    config: FetcherConfig,
    transport: Arc<dyn Transport>,
    state: Mutex<State>,
    counters: Counters,
}

/// Deduplicating, caching `GET` client for JSON endpoints.
///
/// Cloning is cheap; clones share one cache and one set of in-flight requests.
///
/// # Examples
///
/// ```rust,no_run
/// use taxocache::CachingFetcher;
/// use taxocache::config::{FetcherConfig, Profile};
///
/// # async fn example() -> Result<(), taxocache::FetchError> {
/// let fetcher = CachingFetcher::new(FetcherConfig::for_profile(Profile::Development));
///
/// let species = fetcher.fetch_cached("/api/species/42").await?;
/// println!("{}", species["name"]);
///
/// // Answered from the cache; no network access.
/// let again = fetcher.fetch_cached("/api/species/42").await?;
/// assert_eq!(species, again);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CachingFetcher {
    inner: Arc<Inner>,
}

impl CachingFetcher {
    /// Creates a fetcher over [`DefaultTransport`]: plain TCP for `http` URLs,
    /// and the TLS client for `https` URLs when the `https` feature is enabled.
    pub fn new(config: FetcherConfig) -> Self {
        Self::with_transport(config, DefaultTransport::new())
    }

    /// Creates a fetcher over a caller-supplied [`Transport`].
    pub fn with_transport(config: FetcherConfig, transport: impl Transport + 'static) -> Self {
        let cache = match config.cache_ttl() {
            Some(ttl) => ResponseCache::with_ttl(ttl),
            None => ResponseCache::new(),
        };
        Self {
            inner: Arc::new(Inner {
                config,
                transport: Arc::new(transport),
                state: Mutex::new(State {
                    cache,
                    in_flight: HashMap::new(),
                }),
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.inner.config
    }

    /// Returns the decoded JSON document for `url`, fetching it only if it is
    /// not already cached.
    ///
    /// `url` is the cache key, compared exactly. Relative URLs are resolved
    /// against the configured API base before the request is sent.
    ///
    /// # Errors
    ///
    /// - [`FetchError::RequestFailed`]: non-2xx status.
    /// - [`FetchError::Decode`]: 2xx response whose body is not JSON.
    /// - [`FetchError::Transport`]: connection or framing failure.
    /// - [`FetchError::InvalidUrl`]: `url` is empty, malformed, or relative with no API base.
    ///
    /// None of these are cached.
    pub async fn fetch_cached(&self, url: &str) -> Result<Arc<Value>, FetchError> {
        let counters = &self.inner.counters;
        let mut counted_miss = false;
        let mut counted_wait = false;

        loop {
            let mut flight = {
                let mut state = self.inner.state.lock().await;

                if let Some(doc) = state.cache.get(url) {
                    counters.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(url, "cache hit");
                    return Ok(doc);
                }
                if !counted_miss {
                    counters.misses.fetch_add(1, Ordering::Relaxed);
                    counted_miss = true;
                }

                // A closed sender with the entry still present means the leader was dropped.
                let pending = state
                    .in_flight
                    .get(url)
                    .filter(|flight| flight.has_changed().is_ok())
                    .cloned();
                match pending {
                    Some(flight) => flight,
                    None => {
                        state.prune_abandoned();
                        let (tx, rx) = watch::channel(None);
                        state.in_flight.insert(url.to_owned(), rx);
                        drop(state);
                        return self.lead(url, tx).await;
                    }
                }
            };

            if !counted_wait {
                counters.coalesced.fetch_add(1, Ordering::Relaxed);
                counted_wait = true;
            }
            debug!(url, "waiting on in-flight request");

            // `Err` means the leader went away without publishing; start over.
            let published = match flight.wait_for(Option::is_some).await {
                Ok(outcome) => (*outcome).clone(),
                Err(_) => None,
            };
            if let Some(outcome) = published {
                return outcome;
            }
            debug!(url, "in-flight request abandoned, retrying");
        }
    }

    /// As [`fetch_cached`](Self::fetch_cached), then deserializes the document into `T`.
    ///
    /// A document that does not match `T` is a [`FetchError::Decode`]; the raw
    /// document stays cached.
    pub async fn fetch_as<T>(&self, url: &str) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        let doc = self.fetch_cached(url).await?;
        Ok(T::deserialize(doc.as_ref())?)
    }

    /// Drops the cached document for `url`. Returns `true` if one was present.
    pub async fn invalidate(&self, url: &str) -> bool {
        let mut state = self.inner.state.lock().await;
        state.prune_abandoned();
        let removed = state.cache.remove(url);
        if removed {
            debug!(url, "cache entry invalidated");
        }
        removed
    }

    /// Drops every cached document. In-flight requests are unaffected.
    pub async fn clear(&self) {
        let mut state = self.inner.state.lock().await;
        let pruned = state.prune_abandoned();
        state.cache.clear();
        debug!(pruned, "cache cleared");
    }

    /// Returns `true` if a fresh document is cached for `url`.
    pub async fn is_cached(&self, url: &str) -> bool {
        self.inner.state.lock().await.cache.contains(url)
    }

    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.cache.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.state.lock().await.cache.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            fetches: c.fetches.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
        }
    }

    // Performs the fetch, stores a success, retires the flight, then publishes.
    async fn lead(&self, url: &str, tx: watch::Sender<Option<Outcome>>) -> Outcome {
        let outcome = self.fetch_uncached(url).await;

        {
            let mut state = self.inner.state.lock().await;
            if let Ok(doc) = &outcome {
                state.cache.insert(url, Arc::clone(doc));
            }
            state.in_flight.remove(url);
            state.prune_abandoned();
        }

        if let Err(e) = &outcome {
            self.inner.counters.failures.fetch_add(1, Ordering::Relaxed);
            warn!(url, error = %e, "fetch failed");
        }

        tx.send_replace(Some(outcome.clone()));
        outcome
    }

    async fn fetch_uncached(&self, url: &str) -> Outcome {
        let target = self.resolve(url)?;

        self.inner.counters.fetches.fetch_add(1, Ordering::Relaxed);
        debug!(url, resolved = %target, "fetching");

        let response = self.inner.transport.get(&target).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::RequestFailed {
                status: status.code(),
                status_text: status.reason().to_owned(),
            });
        }

        let doc: Value = serde_json::from_slice(response.body())?;
        debug!(url, status = status.code(), "fetched");
        Ok(Arc::new(doc))
    }

    fn resolve(&self, url: &str) -> Result<Url, FetchError> {
        let invalid = |reason: String| FetchError::InvalidUrl {
            url: url.to_owned(),
            reason,
        };

        if url.trim().is_empty() {
            return Err(invalid("empty URL".to_owned()));
        }
        match Url::parse(url) {
            Ok(absolute) => Ok(absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) => match self.inner.config.base() {
                Some(base) => base.join(url).map_err(|e| invalid(e.to_string())),
                None => Err(invalid("relative URL and no API base configured".to_owned())),
            },
            Err(e) => Err(invalid(e.to_string())),
        }
    }
}

impl Default for CachingFetcher {
    fn default() -> Self {
        Self::new(FetcherConfig::default())
    }
}

impl fmt::Debug for CachingFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingFetcher")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
