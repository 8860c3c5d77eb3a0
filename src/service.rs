//! Aggregator over the source adapters
//!
//! [`ApiService`] is the single entry point the CLI (or any other front end)
//! talks to. Every listing comes back as an [`ApiResponse`] tagged with the
//! tier that served it, so callers can show a soft offline notice instead of
//! an error when static data was used.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::config::ExplorerConfig;
use crate::error::ServiceError;
use crate::http::FetchError;
use crate::sources::exoplanets::DEFAULT_LIMIT as EXOPLANET_LIMIT;
use crate::sources::missions::MissionQuery;
use crate::sources::{
    Exoplanet, ExoplanetClient, ExoplanetMode, ExoplanetQuery, Fetched, Mission, MissionClient,
    Satellite, SatelliteClient, SatelliteQuery, SourceContext, Tier,
};

/// Banner shown when any data came from the bundled static datasets
pub const OFFLINE_NOTICE: &str =
    "Using offline data. Live NASA data is unavailable right now, showing a bundled snapshot.";

/// Whether a tier means the user is looking at offline data
pub fn is_offline(tier: Tier) -> bool {
    tier.is_offline()
}

/// Which exoplanet listing to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataSource {
    #[default]
    Habitable,
    Recent,
    All,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DataSource::Habitable => "habitable",
            DataSource::Recent => "recent",
            DataSource::All => "all",
        }
    }

    /// Builds the adapter query for this source
    ///
    /// `since_year` only applies to [`DataSource::Recent`] and defaults to a
    /// few years back.
    pub fn query(self, since_year: Option<i32>, limit: usize) -> ExoplanetQuery {
        match self {
            DataSource::Habitable => ExoplanetQuery::habitable(limit),
            DataSource::Recent => ExoplanetQuery::recent(
                since_year.unwrap_or_else(ExoplanetQuery::default_recent_year),
                limit,
            ),
            DataSource::All => ExoplanetQuery::all(limit),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "habitable" => Ok(DataSource::Habitable),
            "recent" => Ok(DataSource::Recent),
            "all" => Ok(DataSource::All),
            other => Err(format!(
                "unknown data source '{}', expected habitable, recent or all",
                other
            )),
        }
    }
}

/// Uniform response from the aggregator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub data: Vec<T>,
    pub served_from: Tier,
}

impl<T> ApiResponse<T> {
    /// Soft banner text when the data is an offline snapshot
    pub fn notice(&self) -> Option<&'static str> {
        is_offline(self.served_from).then_some(OFFLINE_NOTICE)
    }
}

impl<T> From<Fetched<T>> for ApiResponse<T> {
    fn from(fetched: Fetched<T>) -> Self {
        Self {
            data: fetched.data,
            served_from: fetched.tier,
        }
    }
}

/// Headline counts for the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_missions: usize,
    pub active_missions: usize,
    pub total_exoplanets: usize,
    pub habitable_exoplanets: usize,
    pub total_satellites: usize,
    /// Any count came from static data or could not be fetched
    pub offline: bool,
}

/// Entry point for all NASA data
#[derive(Debug, Clone)]
pub struct ApiService {
    missions: MissionClient,
    exoplanets: ExoplanetClient,
    satellites: SatelliteClient,
}

impl ApiService {
    /// Builds the service over real HTTP
    pub fn from_config(config: ExplorerConfig) -> Result<Self, FetchError> {
        Ok(Self::new(SourceContext::from_config(config)?))
    }

    /// Builds the service over a prepared context, sharing its cache
    pub fn new(ctx: SourceContext) -> Self {
        Self {
            missions: MissionClient::new(ctx.clone()),
            exoplanets: ExoplanetClient::new(ctx.clone()),
            satellites: SatelliteClient::new(ctx),
        }
    }

    pub async fn get_missions(
        &self,
        query: &MissionQuery,
    ) -> Result<ApiResponse<Mission>, ServiceError> {
        let fetched = match (&query.status, &query.search) {
            (Some(status), None) => self.missions.by_status(status).await?,
            (None, Some(name)) => self.missions.search(name).await?,
            (None, None) => self.missions.get_all().await?,
            _ => self.missions.query(query).await?,
        };
        Ok(fetched.into())
    }

    /// Exoplanets, dispatched to the matching adapter specialization
    pub async fn get_exoplanets(
        &self,
        query: &ExoplanetQuery,
    ) -> Result<ApiResponse<Exoplanet>, ServiceError> {
        let client = &self.exoplanets;
        let fetched = match &query.mode {
            ExoplanetMode::Habitable => client.habitable(query.limit).await?,
            ExoplanetMode::Recent { since_year } => client.recent(*since_year, query.limit).await?,
            ExoplanetMode::Search(name) => client.search(name, query.limit).await?,
            ExoplanetMode::All => client.get_all(query).await?,
        };
        Ok(fetched.into())
    }

    /// Exoplanets for a named data source
    pub async fn get_exoplanets_from(
        &self,
        source: DataSource,
    ) -> Result<ApiResponse<Exoplanet>, ServiceError> {
        self.get_exoplanets(&source.query(None, EXOPLANET_LIMIT)).await
    }

    pub async fn get_satellites(
        &self,
        query: &SatelliteQuery,
    ) -> Result<ApiResponse<Satellite>, ServiceError> {
        Ok(self.satellites.get_all(query).await?.into())
    }

    /// Counts across all three entity types, fetched concurrently
    ///
    /// Never fails; a rate-limited branch counts as zero and marks the
    /// result offline.
    pub async fn dashboard_stats(&self) -> DashboardStats {
        let satellite_query = SatelliteQuery::default();
        let (missions, planets, satellites) = tokio::join!(
            self.missions.get_all(),
            self.exoplanets.statistics(),
            self.satellites.get_all(&satellite_query),
        );

        let mut stats = DashboardStats {
            total_exoplanets: planets.total,
            habitable_exoplanets: planets.habitable,
            offline: planets.served_from.map_or(true, is_offline),
            ..DashboardStats::default()
        };

        match missions {
            Ok(fetched) => {
                stats.total_missions = fetched.data.len();
                stats.active_missions = fetched.data.iter().filter(|m| m.is_active()).count();
                stats.offline |= is_offline(fetched.tier);
            }
            Err(err) => {
                tracing::warn!(error = %err, "mission counts unavailable");
                stats.offline = true;
            }
        }

        match satellites {
            Ok(fetched) => {
                stats.total_satellites = fetched.data.len();
                stats.offline |= is_offline(fetched.tier);
            }
            Err(err) => {
                tracing::warn!(error = %err, "satellite counts unavailable");
                stats.offline = true;
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::http::Transport;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Transport that counts calls and always fails
    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicUsize,
    }

    impl Transport for CountingTransport {
        fn get<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, Result<String, FetchError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(FetchError::Network("connection refused".to_string())) })
        }
    }

    fn mock_service() -> (ApiService, Arc<CountingTransport>) {
        let transport = Arc::new(CountingTransport::default());
        let config = ExplorerConfig {
            mock_api: true,
            ..ExplorerConfig::default()
        };
        let ctx = SourceContext::new(config, transport.clone(), Arc::new(TtlCache::new()));
        (ApiService::new(ctx), transport)
    }

    #[test]
    fn test_data_source_parsing() {
        assert_eq!("habitable".parse::<DataSource>(), Ok(DataSource::Habitable));
        assert_eq!(" Recent ".parse::<DataSource>(), Ok(DataSource::Recent));
        assert_eq!("ALL".parse::<DataSource>(), Ok(DataSource::All));
        assert!("nearby".parse::<DataSource>().is_err());
    }

    #[test]
    fn test_data_source_query() {
        assert_eq!(DataSource::All.query(None, 7), ExoplanetQuery::all(7));
        assert_eq!(
            DataSource::Recent.query(Some(2020), 5),
            ExoplanetQuery::recent(2020, 5)
        );
        let default_recent = DataSource::Recent.query(None, 5);
        assert_eq!(
            default_recent.mode,
            ExoplanetMode::Recent {
                since_year: ExoplanetQuery::default_recent_year()
            }
        );
    }

    #[test]
    fn test_notice_only_for_static_tier() {
        let offline = ApiResponse::<u8> {
            data: vec![],
            served_from: Tier::Static,
        };
        assert_eq!(offline.notice(), Some(OFFLINE_NOTICE));

        let live = ApiResponse::<u8> {
            data: vec![],
            served_from: Tier::Network,
        };
        assert!(live.notice().is_none());
    }

    #[test]
    fn test_response_serializes_served_from() {
        let response = ApiResponse {
            data: vec![1, 2],
            served_from: Tier::Cache,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["servedFrom"], "cache");
        assert_eq!(json["data"], serde_json::json!([1, 2]));
    }

    #[tokio::test]
    async fn test_mock_mode_never_touches_network() {
        let (service, transport) = mock_service();

        let missions = service.get_missions(&MissionQuery::default()).await.unwrap();
        let planets = service
            .get_exoplanets(&ExoplanetQuery::habitable(50))
            .await
            .unwrap();
        let satellites = service
            .get_satellites(&SatelliteQuery::default())
            .await
            .unwrap();

        assert_eq!(missions.served_from, Tier::Static);
        assert!(!missions.data.is_empty());
        assert!(planets.data.iter().all(|p| p.habitable));
        assert!(!planets.data.is_empty());
        assert!(!satellites.data.is_empty());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mission_filters_in_mock_mode() {
        let (service, _) = mock_service();

        let completed = service
            .get_missions(&MissionQuery {
                status: Some("completed".to_string()),
                search: None,
            })
            .await
            .unwrap();
        let names: Vec<&str> = completed.data.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Opportunity Rover", "Spirit Rover"]);

        let dscovr = service
            .get_missions(&MissionQuery {
                status: Some("Active".to_string()),
                search: Some("epic".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(dscovr.data.len(), 1);
        assert_eq!(dscovr.data[0].id, "dscovr");
    }

    #[tokio::test]
    async fn test_get_exoplanets_from_named_source() {
        let (service, _) = mock_service();
        let all = service.get_exoplanets_from(DataSource::All).await.unwrap();
        let habitable = service
            .get_exoplanets_from(DataSource::Habitable)
            .await
            .unwrap();
        assert!(all.data.len() > habitable.data.len());
        assert!(habitable.data.iter().all(|p| p.habitable));
    }

    #[tokio::test]
    async fn test_dashboard_stats_in_mock_mode() {
        let (service, _) = mock_service();
        let stats = service.dashboard_stats().await;

        assert!(stats.offline);
        assert!(stats.total_missions > 0);
        assert!(stats.active_missions <= stats.total_missions);
        assert!(stats.total_exoplanets > 0);
        assert!(stats.habitable_exoplanets <= stats.total_exoplanets);
        assert!(stats.total_satellites > 0);
    }
}
