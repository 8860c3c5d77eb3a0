//! NASA Exoplanet Archive client
//!
//! Queries the archive's TAP sync endpoint with ADQL against the Planetary
//! Systems (`ps`) table and maps rows to [`Exoplanet`] records. Planet type
//! and habitability are derived here, never taken from upstream.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::{decode_records, slugify, Fetched, Source, SourceContext, Tier};
use crate::error::ServiceError;
use crate::http::FetchError;

/// Columns requested from the `ps` table
const TAP_COLUMNS: &str =
    "pl_name,hostname,pl_rade,pl_bmasse,sy_dist,pl_eqt,pl_orbper,disc_year,discoverymethod";

const PARSECS_TO_LIGHT_YEARS: f64 = 3.26156;

/// Default number of rows requested per query
pub const DEFAULT_LIMIT: usize = 100;

/// Rows sampled when computing statistics
const STATS_LIMIT: usize = 500;

/// How many years back "recent" reaches when no year is given
const RECENT_YEARS: i32 = 3;

/// Habitable-zone bounds in Earth radii and Kelvin
const HABITABLE_RADIUS: (f64, f64) = (0.5, 2.0);
const HABITABLE_TEMPERATURE: (f64, f64) = (180.0, 320.0);

/// Size class derived from planetary radius
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanetType {
    Terrestrial,
    #[serde(rename = "Super Earth")]
    SuperEarth,
    #[serde(rename = "Mini-Neptune")]
    MiniNeptune,
    #[serde(rename = "Gas Giant")]
    GasGiant,
    #[serde(rename = "Super Jupiter")]
    SuperJupiter,
    Unknown,
}

impl PlanetType {
    /// Classifies a planet by radius in Earth radii
    ///
    /// Boundaries:
    /// - < 1.5: Terrestrial
    /// - < 4: Super Earth
    /// - < 8: Mini-Neptune
    /// - < 14: Gas Giant
    /// - otherwise: Super Jupiter
    pub fn from_radius(radius: Option<f64>) -> Self {
        match radius {
            Some(r) if r.is_nan() => PlanetType::Unknown,
            Some(r) if r < 1.5 => PlanetType::Terrestrial,
            Some(r) if r < 4.0 => PlanetType::SuperEarth,
            Some(r) if r < 8.0 => PlanetType::MiniNeptune,
            Some(r) if r < 14.0 => PlanetType::GasGiant,
            Some(_) => PlanetType::SuperJupiter,
            None => PlanetType::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlanetType::Terrestrial => "Terrestrial",
            PlanetType::SuperEarth => "Super Earth",
            PlanetType::MiniNeptune => "Mini-Neptune",
            PlanetType::GasGiant => "Gas Giant",
            PlanetType::SuperJupiter => "Super Jupiter",
            PlanetType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for PlanetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether a planet falls inside the habitable bounds
///
/// True iff `0.5 <= radius <= 2.0` (Earth radii) and
/// `180 <= temperature <= 320` (Kelvin). Missing values are not habitable.
pub fn is_habitable(radius: Option<f64>, temperature: Option<f64>) -> bool {
    match (radius, temperature) {
        (Some(r), Some(t)) => {
            (HABITABLE_RADIUS.0..=HABITABLE_RADIUS.1).contains(&r)
                && (HABITABLE_TEMPERATURE.0..=HABITABLE_TEMPERATURE.1).contains(&t)
        }
        _ => false,
    }
}

/// A confirmed exoplanet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exoplanet {
    pub id: String,
    pub name: String,
    pub host_star: String,
    #[serde(rename = "type")]
    pub planet_type: PlanetType,
    /// Earth masses
    pub mass: Option<f64>,
    /// Earth radii
    pub radius: Option<f64>,
    /// Light-years
    pub distance: Option<f64>,
    /// Equilibrium temperature in Kelvin
    pub temperature: Option<f64>,
    /// Days
    pub orbital_period: Option<f64>,
    pub discovery_year: Option<i32>,
    pub discovery_method: String,
    pub habitable: bool,
}

/// A row from the TAP `ps` table
#[derive(Debug, Deserialize)]
struct RawExoplanet {
    pl_name: Option<String>,
    hostname: Option<String>,
    pl_rade: Option<f64>,
    pl_bmasse: Option<f64>,
    /// Parsecs
    sy_dist: Option<f64>,
    pl_eqt: Option<f64>,
    pl_orbper: Option<f64>,
    disc_year: Option<i32>,
    discoverymethod: Option<String>,
}

impl RawExoplanet {
    fn into_exoplanet(self) -> Option<Exoplanet> {
        let name = self.pl_name?.trim().to_string();
        if name.is_empty() {
            return None;
        }
        Some(Exoplanet {
            id: slugify(&name),
            host_star: self
                .hostname
                .unwrap_or_else(|| "Unknown".to_string()),
            planet_type: PlanetType::from_radius(self.pl_rade),
            mass: self.pl_bmasse,
            radius: self.pl_rade,
            distance: self.sy_dist.map(|pc| pc * PARSECS_TO_LIGHT_YEARS),
            temperature: self.pl_eqt,
            orbital_period: self.pl_orbper,
            discovery_year: self.disc_year,
            discovery_method: self
                .discoverymethod
                .unwrap_or_else(|| "Unknown".to_string()),
            habitable: is_habitable(self.pl_rade, self.pl_eqt),
            name,
        })
    }
}

/// Maps raw archive rows to exoplanets, dropping rows without a name
pub fn normalize(records: Vec<Value>) -> Vec<Exoplanet> {
    decode_records::<RawExoplanet>(Source::Exoplanets, records)
        .into_iter()
        .filter_map(RawExoplanet::into_exoplanet)
        .collect()
}

/// Which subset of the archive to request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExoplanetMode {
    All,
    Habitable,
    /// Discovered in or after `since_year`
    Recent { since_year: i32 },
    /// Name contains the term, case-insensitive
    Search(String),
}

/// An exoplanet listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExoplanetQuery {
    pub mode: ExoplanetMode,
    pub limit: usize,
}

impl Default for ExoplanetQuery {
    fn default() -> Self {
        Self::all(DEFAULT_LIMIT)
    }
}

impl ExoplanetQuery {
    pub fn all(limit: usize) -> Self {
        Self {
            mode: ExoplanetMode::All,
            limit,
        }
    }

    pub fn habitable(limit: usize) -> Self {
        Self {
            mode: ExoplanetMode::Habitable,
            limit,
        }
    }

    pub fn recent(since_year: i32, limit: usize) -> Self {
        Self {
            mode: ExoplanetMode::Recent { since_year },
            limit,
        }
    }

    pub fn search(name: impl Into<String>, limit: usize) -> Self {
        Self {
            mode: ExoplanetMode::Search(name.into()),
            limit,
        }
    }

    /// Default cut-off year for recent discoveries
    pub fn default_recent_year() -> i32 {
        Utc::now().year() - RECENT_YEARS
    }

    /// ADQL sent to the TAP sync endpoint
    pub fn adql(&self) -> String {
        let mut query = format!(
            "select top {} {} from ps where default_flag=1",
            self.limit.max(1),
            TAP_COLUMNS
        );
        match &self.mode {
            ExoplanetMode::All => {}
            ExoplanetMode::Habitable => query.push_str(&format!(
                " and pl_rade between {} and {} and pl_eqt between {} and {}",
                HABITABLE_RADIUS.0, HABITABLE_RADIUS.1, HABITABLE_TEMPERATURE.0, HABITABLE_TEMPERATURE.1
            )),
            ExoplanetMode::Recent { since_year } => {
                query.push_str(&format!(" and disc_year >= {}", since_year))
            }
            ExoplanetMode::Search(term) => query.push_str(&format!(
                " and lower(pl_name) like '%{}%'",
                like_fragment(term)
            )),
        }
        query.push_str(" order by disc_year desc");
        query
    }

    /// Cache key; identical queries share an entry
    pub fn cache_key(&self) -> String {
        format!("{}:{}", Source::Exoplanets, self.adql())
    }

    /// Local form of the upstream filter, applied to every result
    pub fn matches(&self, planet: &Exoplanet) -> bool {
        match &self.mode {
            ExoplanetMode::All => true,
            ExoplanetMode::Habitable => planet.habitable,
            ExoplanetMode::Recent { since_year } => {
                planet.discovery_year.is_some_and(|year| year >= *since_year)
            }
            ExoplanetMode::Search(term) => planet
                .name
                .to_lowercase()
                .contains(&term.trim().to_lowercase()),
        }
    }

    fn apply(&self, planets: Vec<Exoplanet>) -> Vec<Exoplanet> {
        planets
            .into_iter()
            .filter(|p| self.matches(p))
            .take(self.limit)
            .collect()
    }
}

/// Search term as a quoted ADQL `like` fragment
///
/// ADQL has no portable escape clause, so `%` is narrowed to the
/// single-character `_`. Rows matched only through a wildcard are then
/// dropped by [`ExoplanetQuery::matches`], which compares literally.
fn like_fragment(term: &str) -> String {
    term.trim()
        .to_lowercase()
        .replace('\'', "''")
        .replace('%', "_")
}

/// Summary counts across a sample of the archive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExoplanetStats {
    pub total: usize,
    pub habitable: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_method: BTreeMap<String, usize>,
    /// Tier the sample came from; `None` when no data could be obtained
    pub served_from: Option<Tier>,
}

impl ExoplanetStats {
    pub fn from_planets(planets: &[Exoplanet]) -> Self {
        let mut stats = Self {
            total: planets.len(),
            ..Self::default()
        };
        for planet in planets {
            if planet.habitable {
                stats.habitable += 1;
            }
            *stats
                .by_type
                .entry(planet.planet_type.label().to_string())
                .or_default() += 1;
            *stats
                .by_method
                .entry(planet.discovery_method.clone())
                .or_default() += 1;
        }
        stats
    }
}

/// Client for the Exoplanet Archive
#[derive(Debug, Clone)]
pub struct ExoplanetClient {
    ctx: SourceContext,
}

impl ExoplanetClient {
    pub fn new(ctx: SourceContext) -> Self {
        Self { ctx }
    }

    /// TAP sync URL for a query
    pub fn tap_url(&self, query: &ExoplanetQuery) -> String {
        format!(
            "{}/TAP/sync?query={}&format=json",
            self.ctx.config().exoplanet_base,
            urlencoding::encode(&query.adql())
        )
    }

    /// Lists exoplanets for a query
    ///
    /// # Returns
    /// * `Ok(Fetched)` from cache, network, or static data
    /// * `Err(ServiceError::RateLimited)` if the archive throttled every route
    pub async fn get_all(&self, query: &ExoplanetQuery) -> Result<Fetched<Exoplanet>, ServiceError> {
        let url = self.tap_url(query);
        let policy = self.ctx.retry_policy(Source::Exoplanets);
        let fetcher = self.ctx.fetcher();

        self.ctx
            .load_cached(
                Source::Exoplanets,
                &query.cache_key(),
                || async {
                    let records = fetcher.fetch_records(&url, &policy).await?;
                    Ok::<_, FetchError>(query.apply(normalize(records)))
                },
                |records| query.apply(normalize(records)),
            )
            .await
    }

    /// Planets inside the habitable bounds
    pub async fn habitable(&self, limit: usize) -> Result<Fetched<Exoplanet>, ServiceError> {
        self.get_all(&ExoplanetQuery::habitable(limit)).await
    }

    /// Planets discovered in or after `since_year`
    pub async fn recent(
        &self,
        since_year: i32,
        limit: usize,
    ) -> Result<Fetched<Exoplanet>, ServiceError> {
        self.get_all(&ExoplanetQuery::recent(since_year, limit)).await
    }

    /// Planets whose name contains `name`
    pub async fn search(&self, name: &str, limit: usize) -> Result<Fetched<Exoplanet>, ServiceError> {
        self.get_all(&ExoplanetQuery::search(name, limit)).await
    }

    /// Counts by type and discovery method over a sample of the archive
    ///
    /// Never fails: a rate limit yields empty statistics and a warning.
    pub async fn statistics(&self) -> ExoplanetStats {
        match self.get_all(&ExoplanetQuery::all(STATS_LIMIT)).await {
            Ok(fetched) => ExoplanetStats {
                served_from: Some(fetched.tier),
                ..ExoplanetStats::from_planets(&fetched.data)
            },
            Err(err) => {
                tracing::warn!(error = %err, "exoplanet statistics unavailable");
                ExoplanetStats::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Sample rows as returned by the TAP sync endpoint
    const TAP_RESPONSE: &str = r#"[
        {"pl_name": "TRAPPIST-1 e", "hostname": "TRAPPIST-1", "pl_rade": 0.92, "pl_bmasse": 0.692,
         "sy_dist": 12.4299, "pl_eqt": 250, "pl_orbper": 6.101013, "disc_year": 2017,
         "discoverymethod": "Transit"},
        {"pl_name": "HD 209458 b", "hostname": "HD 209458", "pl_rade": 15.6, "pl_bmasse": 232.0,
         "sy_dist": 48.3016, "pl_eqt": 1449, "pl_orbper": 3.52474859, "disc_year": 1999,
         "discoverymethod": "Transit"},
        {"pl_name": "Proxima Cen b", "hostname": "Proxima Cen", "pl_rade": null, "pl_bmasse": 1.07,
         "sy_dist": 1.30119, "pl_eqt": 234, "pl_orbper": 11.18427, "disc_year": 2016,
         "discoverymethod": "Radial Velocity"}
    ]"#;

    fn sample() -> Vec<Exoplanet> {
        let records: Vec<Value> = serde_json::from_str(TAP_RESPONSE).unwrap();
        normalize(records)
    }

    #[test]
    fn test_normalize_tap_rows() {
        let planets = sample();
        assert_eq!(planets.len(), 3);

        let trappist = &planets[0];
        assert_eq!(trappist.id, "trappist-1-e");
        assert_eq!(trappist.host_star, "TRAPPIST-1");
        assert_eq!(trappist.planet_type, PlanetType::Terrestrial);
        assert!(trappist.habitable);
        assert_eq!(trappist.discovery_year, Some(2017));
        let distance = trappist.distance.unwrap();
        assert!((distance - 12.4299 * 3.26156).abs() < 1e-9);

        assert_eq!(planets[1].planet_type, PlanetType::SuperJupiter);
        assert!(!planets[1].habitable);

        assert_eq!(planets[2].planet_type, PlanetType::Unknown);
        assert!(!planets[2].habitable, "Missing radius is never habitable");
    }

    #[test]
    fn test_rows_without_name_are_dropped() {
        let planets = normalize(vec![
            json!({"pl_name": null, "pl_rade": 1.0}),
            json!({"pl_name": "  "}),
            json!({"pl_name": "Kepler-22 b", "pl_rade": "not a number"}),
            json!({"pl_name": "Kepler-22 b", "pl_rade": 2.1}),
        ]);
        assert_eq!(planets.len(), 1);
        assert_eq!(planets[0].planet_type, PlanetType::SuperEarth);
        assert_eq!(planets[0].discovery_method, "Unknown");
    }

    #[test]
    fn test_planet_type_boundaries() {
        assert_eq!(PlanetType::from_radius(Some(1.2)), PlanetType::Terrestrial);
        assert_eq!(PlanetType::from_radius(Some(1.5)), PlanetType::SuperEarth);
        assert_eq!(PlanetType::from_radius(Some(3.99)), PlanetType::SuperEarth);
        assert_eq!(PlanetType::from_radius(Some(4.0)), PlanetType::MiniNeptune);
        assert_eq!(PlanetType::from_radius(Some(6.0)), PlanetType::MiniNeptune);
        assert_eq!(PlanetType::from_radius(Some(8.0)), PlanetType::GasGiant);
        assert_eq!(PlanetType::from_radius(Some(14.0)), PlanetType::SuperJupiter);
        assert_eq!(PlanetType::from_radius(None), PlanetType::Unknown);
    }

    #[test]
    fn test_habitability_bounds_are_inclusive() {
        assert!(is_habitable(Some(1.0), Some(250.0)));
        assert!(!is_habitable(Some(5.0), Some(250.0)));
        assert!(is_habitable(Some(0.5), Some(180.0)));
        assert!(is_habitable(Some(2.0), Some(320.0)));
        assert!(!is_habitable(Some(0.49), Some(250.0)));
        assert!(!is_habitable(Some(1.0), Some(320.1)));
        assert!(!is_habitable(Some(1.0), None));
        assert!(!is_habitable(None, Some(250.0)));
    }

    #[test]
    fn test_type_serializes_with_display_label() {
        let planets = sample();
        let json = serde_json::to_value(&planets[0]).unwrap();
        assert_eq!(json["type"], "Terrestrial");
        assert_eq!(json["hostStar"], "TRAPPIST-1");
        assert_eq!(json["orbitalPeriod"], 6.101013);
        assert_eq!(
            serde_json::to_value(PlanetType::MiniNeptune).unwrap(),
            "Mini-Neptune"
        );
    }

    #[test]
    fn test_adql_per_mode() {
        let all = ExoplanetQuery::all(50).adql();
        assert!(all.starts_with("select top 50 pl_name,"));
        assert!(all.contains("from ps where default_flag=1"));
        assert!(all.ends_with("order by disc_year desc"));

        let habitable = ExoplanetQuery::habitable(10).adql();
        assert!(habitable.contains("pl_rade between 0.5 and 2 and pl_eqt between 180 and 320"));

        let recent = ExoplanetQuery::recent(2021, 10).adql();
        assert!(recent.contains("disc_year >= 2021"));

        let search = ExoplanetQuery::search("O'Brien B", 10).adql();
        assert!(search.contains("lower(pl_name) like '%o''brien b%'"));
    }

    #[test]
    fn test_search_wildcards_stay_literal() {
        let adql = ExoplanetQuery::search("50%", 10).adql();
        assert!(adql.contains("like '%50_%'"), "adql was: {}", adql);

        // Upstream may return every row for a bare wildcard; none contain it
        assert!(ExoplanetQuery::search("_", 10).apply(sample()).is_empty());
        assert!(ExoplanetQuery::search("%", 10).apply(sample()).is_empty());
        assert_eq!(
            ExoplanetQuery::search("trappist-1", 10).apply(sample()).len(),
            1
        );
    }

    #[test]
    fn test_distinct_queries_have_distinct_cache_keys() {
        let a = ExoplanetQuery::habitable(10).cache_key();
        let b = ExoplanetQuery::habitable(20).cache_key();
        let c = ExoplanetQuery::all(10).cache_key();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("exoplanets:"));
        assert_eq!(a, ExoplanetQuery::habitable(10).cache_key());
    }

    #[test]
    fn test_query_matches_and_limit() {
        let planets = sample();
        let habitable = ExoplanetQuery::habitable(10).apply(planets.clone());
        assert_eq!(habitable.len(), 1);

        let recent = ExoplanetQuery::recent(2016, 10).apply(planets.clone());
        assert_eq!(recent.len(), 2);

        let search = ExoplanetQuery::search("proxima", 10).apply(planets.clone());
        assert_eq!(search.len(), 1);

        let limited = ExoplanetQuery::all(2).apply(planets);
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_statistics_from_planets() {
        let stats = ExoplanetStats::from_planets(&sample());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.habitable, 1);
        assert_eq!(stats.by_type.get("Terrestrial"), Some(&1));
        assert_eq!(stats.by_type.get("Unknown"), Some(&1));
        assert_eq!(stats.by_method.get("Transit"), Some(&2));
        assert_eq!(stats.by_method.get("Radial Velocity"), Some(&1));
        assert!(stats.served_from.is_none());
    }
}
