//! Runtime configuration
//!
//! Settings come from environment variables with defaults that work against
//! the public NASA endpoints. The `VITE_*` names used by the web dashboard
//! are accepted as aliases so one `.env` file can drive both.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::http::ProxyMode;

/// Public demo key; works without registration but is tightly rate limited
pub const DEMO_API_KEY: &str = "DEMO_KEY";

const DEFAULT_API_BASE: &str = "https://api.nasa.gov";
const DEFAULT_EXOPLANET_BASE: &str = "https://exoplanetarchive.ipac.caltech.edu";
const DEFAULT_TLE_BASE: &str = "https://tle.ivanstanojevic.me";
const DEFAULT_PROXY_PREFIX: &str = "https://api.allorigins.win/raw?url=";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors for malformed configuration values
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set to a value that could not be parsed
    #[error("invalid value for {name}: '{value}' ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Configuration shared by every source adapter
#[derive(Debug, Clone, PartialEq)]
pub struct ExplorerConfig {
    /// api.nasa.gov key
    pub api_key: String,
    /// Serve bundled static data only, never touching the network
    pub mock_api: bool,
    /// Base URL for api.nasa.gov endpoints (Mars rovers, EPIC)
    pub api_base: String,
    /// Base URL for the Exoplanet Archive
    pub exoplanet_base: String,
    /// Base URL for the TLE API
    pub tle_base: String,
    /// Prefix prepended to the encoded target URL for proxied requests
    pub proxy_prefix: String,
    /// Route order for the CORS fallback fetcher
    pub proxy_mode: ProxyMode,
    /// Timeout for each individual HTTP attempt
    pub timeout: Duration,
    /// Directory holding replacement static JSON files
    pub static_dir: Option<PathBuf>,
    /// Optional bound on cached entries
    pub cache_max_entries: Option<usize>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            api_key: DEMO_API_KEY.to_string(),
            mock_api: false,
            api_base: DEFAULT_API_BASE.to_string(),
            exoplanet_base: DEFAULT_EXOPLANET_BASE.to_string(),
            tle_base: DEFAULT_TLE_BASE.to_string(),
            proxy_prefix: DEFAULT_PROXY_PREFIX.to_string(),
            proxy_mode: ProxyMode::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            static_dir: None,
            cache_max_entries: None,
        }
    }
}

impl ExplorerConfig {
    /// Reads configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through an arbitrary variable lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(*name))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(key) = get(&["NASA_API_KEY", "VITE_NASA_API_KEY"]) {
            config.api_key = key;
        }
        if let Some(raw) = get(&["NASA_MOCK_API", "VITE_MOCK_API"]) {
            config.mock_api = parse_bool("NASA_MOCK_API", &raw)?;
        }
        if let Some(base) = get(&["NASA_API_BASE", "VITE_API_BASE"]) {
            config.api_base = trim_base(base);
        }
        if let Some(base) = get(&["NASA_EXOPLANET_BASE"]) {
            config.exoplanet_base = trim_base(base);
        }
        if let Some(base) = get(&["NASA_TLE_BASE"]) {
            config.tle_base = trim_base(base);
        }
        if let Some(prefix) = get(&["NASA_CORS_PROXY"]) {
            config.proxy_prefix = prefix;
        }
        if let Some(raw) = get(&["NASA_PROXY_MODE"]) {
            config.proxy_mode = raw.parse().map_err(|reason| ConfigError::InvalidValue {
                name: "NASA_PROXY_MODE",
                value: raw.clone(),
                reason,
            })?;
        }
        if let Some(raw) = get(&["NASA_HTTP_TIMEOUT_SECS"]) {
            let secs = parse_positive("NASA_HTTP_TIMEOUT_SECS", &raw)?;
            config.timeout = Duration::from_secs(secs as u64);
        }
        if let Some(dir) = get(&["NASA_STATIC_DIR"]) {
            config.static_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = get(&["NASA_CACHE_MAX_ENTRIES"]) {
            config.cache_max_entries = Some(parse_positive("NASA_CACHE_MAX_ENTRIES", &raw)?);
        }

        Ok(config)
    }

    /// Whether requests go out with the shared demo key
    pub fn uses_demo_key(&self) -> bool {
        self.api_key == DEMO_API_KEY
    }
}

fn trim_base(base: String) -> String {
    base.trim_end_matches('/').to_string()
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn parse_positive(name: &'static str, raw: &str) -> Result<usize, ConfigError> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
            reason: "expected a positive integer".to_string(),
        }),
    }
}
