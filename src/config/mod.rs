//! Fetcher configuration: API base origin and cache lifetime.
//!
//! | Profile       | API base                 |
//! |---------------|--------------------------|
//! | `development` | `http://localhost:5000`  |
//! | `production`  | *(none, same origin)*    |
//!
//! With no API base, callers must pass absolute URLs; relative ones are
//! rejected at fetch time. A configured base resolves relative URLs such as
//! `/api/species/42` against it.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;

/// Origin of the local backend used during development.
pub const DEVELOPMENT_API_BASE: &str = "http://localhost:5000";

/// Environment variable selecting the [`Profile`].
pub const ENV_PROFILE: &str = "TAXOCACHE_PROFILE";
/// Environment variable overriding the profile's API base.
pub const ENV_API_BASE: &str = "TAXOCACHE_API_BASE";
/// Environment variable setting the cache TTL in whole seconds.
pub const ENV_TTL_SECS: &str = "TAXOCACHE_TTL_SECS";

/// Deployment profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Development,
    #[default]
    Production,
}

impl Profile {
    /// The API base a profile uses when none is set explicitly.
    pub fn default_api_base(self) -> Option<Url> {
        match self {
            Self::Development => Url::parse(DEVELOPMENT_API_BASE).ok(),
            Self::Production => None,
        }
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ConfigError::UnknownProfile(s.to_owned())),
        }
    }
}

/// Settings for a [`CachingFetcher`](crate::CachingFetcher).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use taxocache::config::{FetcherConfig, Profile};
///
/// let config = FetcherConfig::for_profile(Profile::Development).ttl(Duration::from_secs(300));
/// assert_eq!(config.base().unwrap().as_str(), "http://localhost:5000/");
/// assert_eq!(config.cache_ttl(), Some(Duration::from_secs(300)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetcherConfig {
    api_base: Option<Url>,
    ttl: Option<Duration>,
}

impl FetcherConfig {
    /// No API base, no TTL.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_profile(profile: Profile) -> Self {
        Self {
            api_base: profile.default_api_base(),
            ttl: None,
        }
    }

    /// Builds a config from [`ENV_PROFILE`], [`ENV_API_BASE`] and [`ENV_TTL_SECS`].
    ///
    /// Unset variables fall back to the production profile defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    // Split out so tests need not mutate the process environment.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let profile = match lookup(ENV_PROFILE) {
            Some(value) => value.parse()?,
            None => Profile::default(),
        };
        let mut config = Self::for_profile(profile);

        if let Some(value) = lookup(ENV_API_BASE) {
            config.api_base = parse_api_base(&value)?;
        }
        if let Some(value) = lookup(ENV_TTL_SECS) {
            let secs: u64 = value
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidTtl {
                    value: value.clone(),
                    source,
                })?;
            config.ttl = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Sets the origin that relative URLs are resolved against.
    #[must_use]
    pub fn api_base(mut self, base: Url) -> Self {
        self.api_base = Some(base);
        self
    }

    /// Sets the cache time-to-live.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn base(&self) -> Option<&Url> {
        self.api_base.as_ref()
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.ttl
    }
}

// An empty value means "same origin", i.e. no base.
fn parse_api_base(value: &str) -> Result<Option<Url>, ConfigError> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    let url = Url::parse(value).map_err(|source| ConfigError::InvalidApiBase {
        value: value.to_owned(),
        source,
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::NotABase(value.to_owned()));
    }
    Ok(Some(url))
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    profile: Profile,
    #[serde(default)]
    api_base: Option<String>,
    #[serde(default)]
    ttl_secs: Option<u64>,
}

impl<'de> Deserialize<'de> for FetcherConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawConfig::deserialize(deserializer)?;
        let mut config = Self::for_profile(raw.profile);
        if let Some(base) = raw.api_base {
            config.api_base = parse_api_base(&base).map_err(<D::Error as serde::de::Error>::custom)?;
        }
        config.ttl = raw.ttl_secs.map(Duration::from_secs);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<FetcherConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        FetcherConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn profile_defaults() {
        let dev = FetcherConfig::for_profile(Profile::Development);
        assert_eq!(dev.base().map(Url::as_str), Some("http://localhost:5000/"));
        assert!(FetcherConfig::for_profile(Profile::Production).base().is_none());
    }

    #[test]
    fn profile_parsing() {
        assert_eq!("Development".parse::<Profile>().unwrap(), Profile::Development);
        assert_eq!("prod".parse::<Profile>().unwrap(), Profile::Production);
        assert!(matches!(
            "staging".parse::<Profile>(),
            Err(ConfigError::UnknownProfile(_))
        ));
    }

    #[test]
    fn env_defaults_to_production() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config, FetcherConfig::new());
    }

    #[test]
    fn env_overrides() {
        let config = from_pairs(&[
            (ENV_PROFILE, "development"),
            (ENV_API_BASE, "http://10.0.0.5:8000"),
            (ENV_TTL_SECS, "120"),
        ])
        .unwrap();
        assert_eq!(config.base().unwrap().as_str(), "http://10.0.0.5:8000/");
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn empty_api_base_clears_profile_base() {
        let config = from_pairs(&[(ENV_PROFILE, "dev"), (ENV_API_BASE, "")]).unwrap();
        assert!(config.base().is_none());
    }

    #[test]
    fn env_rejects_bad_values() {
        assert!(matches!(
            from_pairs(&[(ENV_API_BASE, "not a url")]),
            Err(ConfigError::InvalidApiBase { .. })
        ));
        assert!(matches!(
            from_pairs(&[(ENV_API_BASE, "mailto:someone@example.com")]),
            Err(ConfigError::NotABase(_))
        ));
        assert!(matches!(
            from_pairs(&[(ENV_TTL_SECS, "soon")]),
            Err(ConfigError::InvalidTtl { .. })
        ));
    }

    #[test]
    fn deserialize_from_json() {
        let config: FetcherConfig =
            serde_json::from_str(r#"{"profile":"development","ttl_secs":30}"#).unwrap();
        assert_eq!(config.base().unwrap().as_str(), "http://localhost:5000/");
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(30)));

        let config: FetcherConfig = serde_json::from_str(r#"{"api_base":null}"#).unwrap();
        assert_eq!(config, FetcherConfig::new());
    }
}
