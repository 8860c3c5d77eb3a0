//! Command-line interface parsing for NASA Explorer
//!
//! Arguments are parsed with clap, then validated into a [`RunConfig`] that
//! holds typed queries for the aggregator and the overrides to apply on top
//! of the environment configuration.

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::ExplorerConfig;
use crate::http::ProxyMode;
use crate::service::DataSource;
use crate::sources::exoplanets::DEFAULT_LIMIT as EXOPLANET_LIMIT;
use crate::sources::missions::MissionQuery;
use crate::sources::satellites::DEFAULT_LIMIT as SATELLITE_LIMIT;
use crate::sources::{ExoplanetQuery, SatelliteQuery};

/// Error types for CLI argument parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    /// The specified exoplanet data source is not recognized
    #[error("Invalid data source: '{0}'. Valid sources: habitable, recent, all")]
    InvalidDataSource(String),

    /// The specified proxy mode is not recognized
    #[error("Invalid proxy mode: '{0}'. Valid modes: direct-first, proxy-first, direct-only, proxy-only")]
    InvalidProxyMode(String),

    /// A limit of zero would always return nothing
    #[error("Invalid limit: must be at least 1")]
    InvalidLimit,
}

/// NASA Explorer - missions, exoplanets and satellites from NASA open data
#[derive(Parser, Debug)]
#[command(name = "nasa-explorer")]
#[command(about = "Browse NASA missions, exoplanets and satellites with offline fallback")]
#[command(version)]
pub struct Cli {
    /// Serve bundled static data only, without touching the network
    #[arg(long, global = true)]
    pub offline: bool,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Route order for requests: direct-first, proxy-first, direct-only, proxy-only
    #[arg(long, value_name = "MODE", global = true)]
    pub proxy_mode: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Log errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List NASA missions
    Missions {
        /// Only missions with this status (Active, Completed)
        #[arg(long)]
        status: Option<String>,

        /// Only missions whose name contains this text
        #[arg(long)]
        search: Option<String>,
    },

    /// List confirmed exoplanets from the NASA Exoplanet Archive
    ///
    /// Examples:
    ///   nasa-explorer exoplanets                     # habitable candidates
    ///   nasa-explorer exoplanets --source recent     # discovered in the last few years
    ///   nasa-explorer exoplanets --search trappist   # by name
    Exoplanets {
        /// Which listing to fetch: habitable, recent, all
        #[arg(long, default_value = "habitable")]
        source: String,

        /// First discovery year for --source recent
        #[arg(long, value_name = "YEAR")]
        since: Option<i32>,

        /// Only planets whose name contains this text (overrides --source)
        #[arg(long)]
        search: Option<String>,

        #[arg(long, default_value_t = EXOPLANET_LIMIT)]
        limit: usize,
    },

    /// List Earth-orbiting satellites from current element sets
    Satellites {
        /// Only satellites whose name contains this text
        #[arg(long)]
        search: Option<String>,

        #[arg(long, default_value_t = SATELLITE_LIMIT)]
        limit: usize,
    },

    /// Show headline counts across all data
    Stats,
}

/// A validated request for the aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Missions(MissionQuery),
    Exoplanets(ExoplanetQuery),
    Satellites(SatelliteQuery),
    Stats,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub request: Request,
    pub offline: bool,
    pub json: bool,
    pub proxy_mode: Option<ProxyMode>,
    /// Default log filter when `NASA_EXPLORER_LOG` is unset
    pub log_level: &'static str,
}

/// Parses a data source argument
///
/// # Returns
/// * `Ok(DataSource)` if the string names a valid source
/// * `Err(CliError::InvalidDataSource)` otherwise
pub fn parse_source_arg(s: &str) -> Result<DataSource, CliError> {
    s.parse()
        .map_err(|_| CliError::InvalidDataSource(s.to_string()))
}

/// Parses a proxy mode argument
pub fn parse_proxy_mode_arg(s: &str) -> Result<ProxyMode, CliError> {
    s.parse()
        .map_err(|_| CliError::InvalidProxyMode(s.to_string()))
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl RunConfig {
    /// Creates a RunConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(RunConfig)` with typed queries
    /// * `Err(CliError)` if a data source, proxy mode or limit is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let request = match &cli.command {
            Command::Missions { status, search } => Request::Missions(MissionQuery {
                status: non_empty(status),
                search: non_empty(search),
            }),
            Command::Exoplanets {
                source,
                since,
                search,
                limit,
            } => {
                if *limit == 0 {
                    return Err(CliError::InvalidLimit);
                }
                // Validate even when --search takes over
                let source = parse_source_arg(source)?;
                let query = match non_empty(search) {
                    Some(name) => ExoplanetQuery::search(name, *limit),
                    None => source.query(*since, *limit),
                };
                Request::Exoplanets(query)
            }
            Command::Satellites { search, limit } => {
                if *limit == 0 {
                    return Err(CliError::InvalidLimit);
                }
                Request::Satellites(SatelliteQuery {
                    search: non_empty(search),
                    limit: *limit,
                })
            }
            Command::Stats => Request::Stats,
        };

        let proxy_mode = cli
            .proxy_mode
            .as_deref()
            .map(parse_proxy_mode_arg)
            .transpose()?;

        let log_level = if cli.quiet {
            "error"
        } else if cli.verbose {
            "debug"
        } else {
            "warn"
        };

        Ok(RunConfig {
            request,
            offline: cli.offline,
            json: cli.json,
            proxy_mode,
            log_level,
        })
    }

    /// Applies command-line overrides on top of the environment configuration
    pub fn apply_to(&self, config: &mut ExplorerConfig) {
        if self.offline {
            config.mock_api = true;
        }
        if let Some(mode) = self.proxy_mode {
            config.proxy_mode = mode;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::ExoplanetMode;

    fn run_config(args: &[&str]) -> Result<RunConfig, CliError> {
        let cli = Cli::parse_from(args);
        RunConfig::from_cli(&cli)
    }

    #[test]
    fn test_parse_source_arg() {
        assert_eq!(parse_source_arg("habitable").unwrap(), DataSource::Habitable);
        assert_eq!(parse_source_arg("Recent").unwrap(), DataSource::Recent);
        assert_eq!(parse_source_arg("all").unwrap(), DataSource::All);
    }

    #[test]
    fn test_parse_source_arg_invalid() {
        let err = parse_source_arg("nearby").unwrap_err();
        assert!(err.to_string().contains("Invalid data source"));
        assert!(err.to_string().contains("nearby"));
    }

    #[test]
    fn test_parse_proxy_mode_arg() {
        assert_eq!(parse_proxy_mode_arg("proxy-only").unwrap(), ProxyMode::ProxyOnly);
        assert_eq!(
            parse_proxy_mode_arg("sideways").unwrap_err(),
            CliError::InvalidProxyMode("sideways".to_string())
        );
    }

    #[test]
    fn test_missions_command() {
        let config = run_config(&["nasa-explorer", "missions", "--status", "Active"]).unwrap();
        assert_eq!(
            config.request,
            Request::Missions(MissionQuery {
                status: Some("Active".to_string()),
                search: None,
            })
        );
        assert!(!config.offline);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_exoplanets_defaults_to_habitable() {
        let config = run_config(&["nasa-explorer", "exoplanets"]).unwrap();
        assert_eq!(
            config.request,
            Request::Exoplanets(ExoplanetQuery::habitable(EXOPLANET_LIMIT))
        );
    }

    #[test]
    fn test_exoplanets_recent_with_year() {
        let config = run_config(&[
            "nasa-explorer",
            "exoplanets",
            "--source",
            "recent",
            "--since",
            "2021",
            "--limit",
            "5",
        ])
        .unwrap();
        assert_eq!(
            config.request,
            Request::Exoplanets(ExoplanetQuery::recent(2021, 5))
        );
    }

    #[test]
    fn test_exoplanets_search_overrides_source() {
        let config = run_config(&["nasa-explorer", "exoplanets", "--search", "trappist"]).unwrap();
        match config.request {
            Request::Exoplanets(query) => {
                assert_eq!(query.mode, ExoplanetMode::Search("trappist".to_string()))
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_invalid_source_is_rejected() {
        let err = run_config(&["nasa-explorer", "exoplanets", "--source", "nearby"]).unwrap_err();
        assert_eq!(err, CliError::InvalidDataSource("nearby".to_string()));
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        let err = run_config(&["nasa-explorer", "satellites", "--limit", "0"]).unwrap_err();
        assert_eq!(err, CliError::InvalidLimit);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let config = run_config(&[
            "nasa-explorer",
            "stats",
            "--offline",
            "--json",
            "--proxy-mode",
            "direct-only",
            "--verbose",
        ])
        .unwrap();
        assert_eq!(config.request, Request::Stats);
        assert!(config.offline);
        assert!(config.json);
        assert_eq!(config.proxy_mode, Some(ProxyMode::DirectOnly));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let config = run_config(&["nasa-explorer", "--offline", "--proxy-mode", "proxy-first", "stats"])
            .unwrap();
        let mut explorer = ExplorerConfig::default();
        config.apply_to(&mut explorer);
        assert!(explorer.mock_api);
        assert_eq!(explorer.proxy_mode, ProxyMode::ProxyFirst);
    }

    #[test]
    fn test_no_overrides_keep_environment() {
        let config = run_config(&["nasa-explorer", "--quiet", "missions"]).unwrap();
        let mut explorer = ExplorerConfig {
            mock_api: true,
            ..ExplorerConfig::default()
        };
        config.apply_to(&mut explorer);
        assert!(explorer.mock_api);
        assert_eq!(explorer.proxy_mode, ProxyMode::DirectFirst);
        assert_eq!(config.log_level, "error");
    }

    #[test]
    fn test_empty_search_is_ignored() {
        let config = run_config(&["nasa-explorer", "satellites", "--search", "  "]).unwrap();
        assert_eq!(config.request, Request::Satellites(SatelliteQuery::default()));
    }
}
