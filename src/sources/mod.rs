//! Source adapters for NASA data
//!
//! Every adapter follows the same path: look the query up in the shared
//! cache, otherwise fetch through the [`Fetcher`] (retry per attempt, proxy
//! fallback), normalize, cache, and return. When the network is exhausted
//! the bundled static dataset is pushed through the same normalizer. The
//! tier that produced the data travels with it as [`Tier`].

pub mod exoplanets;
pub mod missions;
pub mod satellites;

pub use exoplanets::{Exoplanet, ExoplanetClient, ExoplanetMode, ExoplanetQuery, ExoplanetStats, PlanetType};
pub use missions::{Mission, MissionClient};
pub use satellites::{Satellite, SatelliteClient, SatelliteQuery};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::config::ExplorerConfig;
use crate::error::ServiceError;
use crate::fallback::StaticData;
use crate::http::{FetchError, Fetcher, HttpTransport, RetryPolicy, Transport};

/// Upstream data families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Exoplanets,
    Missions,
    Satellites,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Exoplanets, Source::Missions, Source::Satellites];

    pub fn as_str(self) -> &'static str {
        match self {
            Source::Exoplanets => "exoplanets",
            Source::Missions => "missions",
            Source::Satellites => "satellites",
        }
    }

    /// How long a normalized response stays fresh in the cache
    pub fn cache_ttl(self) -> Duration {
        match self {
            Source::Exoplanets => Duration::from_secs(10 * 60),
            Source::Missions | Source::Satellites => Duration::from_secs(30 * 60),
        }
    }

    /// File name of the static dataset
    pub fn static_file(self) -> &'static str {
        match self {
            Source::Exoplanets => "exoplanets.json",
            Source::Missions => "missions.json",
            Source::Satellites => "satellites.json",
        }
    }

    pub fn retry_policy(self) -> RetryPolicy {
        RetryPolicy::for_source(self)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tier produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Fresh from the upstream API
    Network,
    /// A fresh cache entry from an earlier network fetch
    Cache,
    /// The bundled static dataset
    Static,
}

impl Tier {
    pub fn is_offline(self) -> bool {
        self == Tier::Static
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::Network => "network",
            Tier::Cache => "cache",
            Tier::Static => "static",
        })
    }
}

/// Normalized records plus the tier they came from
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub data: Vec<T>,
    pub tier: Tier,
}

impl<T> Fetched<T> {
    /// Keeps only records matching `predicate`, preserving the tier
    pub fn filter(self, predicate: impl Fn(&T) -> bool) -> Self {
        Self {
            data: self.data.into_iter().filter(|item| predicate(item)).collect(),
            tier: self.tier,
        }
    }
}

/// Everything an adapter needs, shared across adapters
///
/// The cache is injected rather than global so tests can control the
/// clock and observe hits.
#[derive(Clone)]
pub struct SourceContext {
    config: Arc<ExplorerConfig>,
    fetcher: Fetcher,
    cache: Arc<TtlCache>,
    static_data: StaticData,
    /// Replaces every source's own retry policy when set
    retry: Option<RetryPolicy>,
}

impl fmt::Debug for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceContext")
            .field("fetcher", &self.fetcher)
            .field("cache", &self.cache)
            .field("static_data", &self.static_data)
            .field("retry", &self.retry)
            .finish()
    }
}

impl SourceContext {
    /// Builds a context over a real HTTP transport
    pub fn from_config(config: ExplorerConfig) -> Result<Self, FetchError> {
        let transport = HttpTransport::new(config.timeout)?;
        let mut cache = TtlCache::new();
        if let Some(max) = config.cache_max_entries {
            cache = cache.with_max_entries(max);
        }
        Ok(Self::new(config, Arc::new(transport), Arc::new(cache)))
    }

    /// Builds a context over any transport and cache
    pub fn new(config: ExplorerConfig, transport: Arc<dyn Transport>, cache: Arc<TtlCache>) -> Self {
        let fetcher = Fetcher::new(transport, config.proxy_prefix.clone(), config.proxy_mode);
        let static_data = match config.static_dir {
            Some(ref dir) => StaticData::with_dir(dir.clone()),
            None => StaticData::bundled(),
        };
        Self {
            config: Arc::new(config),
            fetcher,
            cache,
            static_data,
            retry: None,
        }
    }

    /// Uses `policy` for every source instead of the per-source defaults
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Retry policy in effect for `source`
    pub fn retry_policy(&self, source: Source) -> RetryPolicy {
        self.retry.clone().unwrap_or_else(|| source.retry_policy())
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Serves the static dataset for `source` through `normalize`
    ///
    /// A broken static file yields an empty list rather than an error.
    pub(crate) fn serve_static<T, N>(&self, source: Source, normalize: N) -> Fetched<T>
    where
        N: FnOnce(Vec<Value>) -> Vec<T>,
    {
        let data = match self.static_data.records(source) {
            Ok(records) => normalize(records),
            Err(err) => {
                tracing::error!(%source, error = %err, "static data unavailable");
                Vec::new()
            }
        };
        Fetched {
            data,
            tier: Tier::Static,
        }
    }

    /// Resolves a listing through fresh cache, then network, then static data
    ///
    /// `fetch` performs the network request and returns normalized records;
    /// `from_static` normalizes and filters the bundled records the same way.
    /// A rate limit is the only failure returned to the caller.
    pub(crate) async fn load_cached<T, F, Fut, N>(
        &self,
        source: Source,
        key: &str,
        fetch: F,
        from_static: N,
    ) -> Result<Fetched<T>, ServiceError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, FetchError>>,
        N: FnOnce(Vec<Value>) -> Vec<T>,
    {
        if self.config.mock_api {
            tracing::debug!(%source, "mock mode, serving static data");
            return Ok(self.serve_static(source, from_static));
        }

        if let Some(data) = self.cache.get::<Vec<T>>(key) {
            tracing::debug!(%source, key, "cache hit");
            return Ok(Fetched {
                data,
                tier: Tier::Cache,
            });
        }

        match fetch().await {
            Ok(data) => {
                tracing::info!(%source, count = data.len(), "fetched from network");
                if let Err(err) = self.cache.set(key, &data, source.cache_ttl()) {
                    tracing::warn!(%source, error = %err, "failed to cache response");
                }
                Ok(Fetched {
                    data,
                    tier: Tier::Network,
                })
            }
            Err(FetchError::RateLimited { retry_after_secs }) => {
                tracing::warn!(%source, retry_after_secs, "rate limited by upstream");
                Err(ServiceError::RateLimited {
                    upstream: source,
                    retry_after_secs,
                })
            }
            Err(err) => {
                tracing::warn!(
                    %source,
                    error = %err,
                    "NASA API unavailable, serving static data"
                );
                Ok(self.serve_static(source, from_static))
            }
        }
    }
}

/// Deserializes each raw record, skipping ones that don't fit the shape
pub(crate) fn decode_records<R: DeserializeOwned>(source: Source, records: Vec<Value>) -> Vec<R> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record) {
            Ok(raw) => Some(raw),
            Err(err) => {
                tracing::debug!(%source, error = %err, "skipping malformed record");
                None
            }
        })
        .collect()
}

/// Lowercase, dash-separated identifier derived from a display name
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
