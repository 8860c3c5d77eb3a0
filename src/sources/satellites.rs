//! Earth-orbiting satellites from two-line element sets
//!
//! The TLE API returns raw element sets; orbit class, period, altitude and an
//! approximate sub-satellite point at epoch are derived locally. Descriptive
//! fields (agency, purpose, sensors) come from a small keyword catalogue.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;
use thiserror::Error;

use super::{decode_records, Fetched, Source, SourceContext};
use crate::error::ServiceError;
use crate::http::FetchError;

/// Default number of satellites per request
pub const DEFAULT_LIMIT: usize = 20;

/// Earth's gravitational parameter, km³/s²
const EARTH_MU: f64 = 398_600.4418;

/// Equatorial radius, km
const EARTH_RADIUS_KM: f64 = 6378.137;

const MINUTES_PER_DAY: f64 = 1440.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Altitude thresholds in km
const LEO_CEILING_KM: f64 = 2_000.0;
const GEO_FLOOR_KM: f64 = 35_586.0;
const GEO_CEILING_KM: f64 = 35_986.0;

/// Orbit class by altitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrbitClass {
    Leo,
    Meo,
    Geo,
    Heo,
}

impl OrbitClass {
    /// Classifies by altitude in km
    ///
    /// - < 2,000: LEO
    /// - < 35,586: MEO
    /// - <= 35,986: GEO
    /// - otherwise: HEO
    pub fn from_altitude(altitude_km: f64) -> Self {
        if altitude_km < LEO_CEILING_KM {
            OrbitClass::Leo
        } else if altitude_km < GEO_FLOOR_KM {
            OrbitClass::Meo
        } else if altitude_km <= GEO_CEILING_KM {
            OrbitClass::Geo
        } else {
            OrbitClass::Heo
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrbitClass::Leo => "LEO",
            OrbitClass::Meo => "MEO",
            OrbitClass::Geo => "GEO",
            OrbitClass::Heo => "HEO",
        }
    }
}

impl fmt::Display for OrbitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-satellite point at the element set epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Degrees, north positive
    pub latitude: f64,
    /// Degrees in [-180, 180), east positive
    pub longitude: f64,
    /// km above the equatorial radius
    pub altitude: f64,
}

/// An Earth-orbiting satellite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Satellite {
    /// NORAD catalogue number
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub orbit_class: OrbitClass,
    pub status: String,
    /// Mean altitude in km
    pub altitude: f64,
    /// Minutes
    pub orbital_period: f64,
    pub agency: String,
    pub purpose: String,
    pub applications: Vec<String>,
    pub sensors: Vec<String>,
    pub specifications: BTreeMap<String, String>,
    pub position: Position,
}

/// Errors parsing a two-line element set
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TleError {
    #[error("line {line} is {len} characters, expected 69")]
    TooShort { line: u8, len: usize },

    #[error("invalid {field}: '{value}'")]
    Field { field: &'static str, value: String },
}

/// Orbital elements read from a TLE
#[derive(Debug, Clone, PartialEq)]
pub struct TwoLineElements {
    pub norad_id: u32,
    pub epoch: DateTime<Utc>,
    /// Degrees
    pub inclination: f64,
    /// Right ascension of the ascending node, degrees
    pub raan: f64,
    pub eccentricity: f64,
    /// Argument of perigee, degrees
    pub arg_perigee: f64,
    /// Degrees
    pub mean_anomaly: f64,
    /// Revolutions per day
    pub mean_motion: f64,
}

const TLE_LINE_LEN: usize = 69;

fn column<'a>(line: &'a str, range: std::ops::Range<usize>) -> &'a str {
    line.get(range).unwrap_or("").trim()
}

fn number(field: &'static str, raw: &str) -> Result<f64, TleError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| TleError::Field {
            field,
            value: raw.to_string(),
        })
}

/// Converts a TLE epoch (`YYDDD.DDDDDDDD`) to UTC
///
/// Two-digit years below 57 are in the 2000s.
pub fn parse_epoch(raw: &str) -> Result<DateTime<Utc>, TleError> {
    let invalid = || TleError::Field {
        field: "epoch",
        value: raw.to_string(),
    };
    let yy: i32 = raw.get(..2).and_then(|y| y.parse().ok()).ok_or_else(invalid)?;
    let day: f64 = raw
        .get(2..)
        .and_then(|d| d.parse().ok())
        .filter(|d: &f64| (1.0..367.0).contains(d))
        .ok_or_else(invalid)?;
    let year = if yy < 57 { 2000 + yy } else { 1900 + yy };

    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(invalid)?
        .and_utc();
    let offset_ms = ((day - 1.0) * SECONDS_PER_DAY * 1000.0).round() as i64;
    Ok(start + ChronoDuration::milliseconds(offset_ms))
}

impl TwoLineElements {
    pub fn parse(line1: &str, line2: &str) -> Result<Self, TleError> {
        let line1 = line1.trim_end();
        let line2 = line2.trim_end();
        if line1.len() < TLE_LINE_LEN {
            return Err(TleError::TooShort {
                line: 1,
                len: line1.len(),
            });
        }
        if line2.len() < TLE_LINE_LEN {
            return Err(TleError::TooShort {
                line: 2,
                len: line2.len(),
            });
        }

        let norad = column(line2, 2..7);
        let norad_id = norad.parse().map_err(|_| TleError::Field {
            field: "catalogue number",
            value: norad.to_string(),
        })?;

        let ecc = column(line2, 26..33);
        let eccentricity = number("eccentricity", &format!("0.{}", ecc))?;

        let mean_motion = number("mean motion", column(line2, 52..63))?;
        if mean_motion <= 0.0 {
            return Err(TleError::Field {
                field: "mean motion",
                value: mean_motion.to_string(),
            });
        }

        Ok(Self {
            norad_id,
            epoch: parse_epoch(column(line1, 18..32))?,
            inclination: number("inclination", column(line2, 8..16))?,
            raan: number("RAAN", column(line2, 17..25))?,
            eccentricity,
            arg_perigee: number("argument of perigee", column(line2, 34..42))?,
            mean_anomaly: number("mean anomaly", column(line2, 43..51))?,
            mean_motion,
        })
    }

    /// Minutes per revolution
    pub fn period_minutes(&self) -> f64 {
        MINUTES_PER_DAY / self.mean_motion
    }

    /// Semi-major axis in km from Kepler's third law
    pub fn semi_major_axis(&self) -> f64 {
        let n = self.mean_motion * 2.0 * PI / SECONDS_PER_DAY;
        (EARTH_MU / (n * n)).cbrt()
    }

    /// Mean altitude in km
    pub fn altitude(&self) -> f64 {
        self.semi_major_axis() - EARTH_RADIUS_KM
    }

    /// Approximate sub-satellite point at epoch
    ///
    /// Two-body only; no perturbations are applied.
    pub fn position(&self) -> Position {
        let e = self.eccentricity;
        let m = self.mean_anomaly.to_radians();
        let big_e = eccentric_anomaly(m, e);

        let true_anomaly = 2.0
            * ((1.0 + e).sqrt() * (big_e / 2.0).sin())
                .atan2((1.0 - e).sqrt() * (big_e / 2.0).cos());
        let u = self.arg_perigee.to_radians() + true_anomaly;
        let inc = self.inclination.to_radians();

        let latitude = (inc.sin() * u.sin()).asin().to_degrees();
        let right_ascension =
            self.raan + (inc.cos() * u.sin()).atan2(u.cos()).to_degrees();
        let longitude = wrap_longitude(right_ascension - gmst_degrees(self.epoch));
        let radius = self.semi_major_axis() * (1.0 - e * big_e.cos());

        Position {
            latitude,
            longitude,
            altitude: radius - EARTH_RADIUS_KM,
        }
    }
}

/// Solves Kepler's equation `M = E - e sin E` by Newton iteration
fn eccentric_anomaly(mean_anomaly: f64, e: f64) -> f64 {
    let mut big_e = if e < 0.8 { mean_anomaly } else { PI };
    for _ in 0..20 {
        let delta = (big_e - e * big_e.sin() - mean_anomaly) / (1.0 - e * big_e.cos());
        big_e -= delta;
        if delta.abs() < 1e-12 {
            break;
        }
    }
    big_e
}

/// Greenwich mean sidereal time in degrees
fn gmst_degrees(at: DateTime<Utc>) -> f64 {
    let julian_date = at.timestamp_millis() as f64 / 1000.0 / SECONDS_PER_DAY + 2_440_587.5;
    (280.460_618_37 + 360.985_647_366_29 * (julian_date - 2_451_545.0)).rem_euclid(360.0)
}

fn wrap_longitude(degrees: f64) -> f64 {
    (degrees + 180.0).rem_euclid(360.0) - 180.0
}

/// Descriptive details keyed by words in the satellite name
struct Profile {
    keywords: &'static [&'static str],
    agency: &'static str,
    purpose: &'static str,
    applications: &'static [&'static str],
    sensors: &'static [&'static str],
}

const CATALOGUE: &[Profile] = &[
    Profile {
        keywords: &["ISS", "ZARYA"],
        agency: "NASA/Roscosmos/ESA/JAXA/CSA",
        purpose: "Crewed orbital laboratory",
        applications: &["Microgravity research", "Earth observation", "Technology demonstration"],
        sensors: &["ECOSTRESS", "EMIT", "Cupola cameras"],
    },
    Profile {
        keywords: &["HST", "HUBBLE"],
        agency: "NASA/ESA",
        purpose: "Space telescope",
        applications: &["Astrophysics", "Cosmology", "Planetary science"],
        sensors: &["WFC3", "ACS", "COS", "STIS"],
    },
    Profile {
        keywords: &["LANDSAT"],
        agency: "NASA/USGS",
        purpose: "Land imaging",
        applications: &["Land use mapping", "Agriculture", "Forestry"],
        sensors: &["OLI", "TIRS"],
    },
    Profile {
        keywords: &["TERRA"],
        agency: "NASA",
        purpose: "Earth observation",
        applications: &["Climate monitoring", "Atmospheric chemistry", "Land cover"],
        sensors: &["MODIS", "ASTER", "CERES", "MISR", "MOPITT"],
    },
    Profile {
        keywords: &["AQUA"],
        agency: "NASA",
        purpose: "Water cycle observation",
        applications: &["Precipitation", "Sea surface temperature", "Sea ice"],
        sensors: &["MODIS", "AIRS", "AMSU-A", "CERES"],
    },
    Profile {
        keywords: &["NOAA"],
        agency: "NOAA",
        purpose: "Polar weather",
        applications: &["Weather forecasting", "Search and rescue"],
        sensors: &["AVHRR", "AMSU-A", "MHS"],
    },
    Profile {
        keywords: &["GOES"],
        agency: "NOAA/NASA",
        purpose: "Geostationary weather",
        applications: &["Severe storm tracking", "Lightning mapping", "Space weather"],
        sensors: &["ABI", "GLM", "SUVI"],
    },
    Profile {
        keywords: &["GPS", "NAVSTAR"],
        agency: "US Space Force",
        purpose: "Navigation",
        applications: &["Positioning", "Timing"],
        sensors: &["L-band navigation payload"],
    },
    Profile {
        keywords: &["JASON"],
        agency: "NASA/NOAA/CNES/EUMETSAT",
        purpose: "Ocean altimetry",
        applications: &["Sea level rise", "Ocean circulation"],
        sensors: &["Poseidon-3B", "AMR-2"],
    },
    Profile {
        keywords: &["TDRS"],
        agency: "NASA",
        purpose: "Data relay",
        applications: &["Spacecraft communications"],
        sensors: &["S-band and Ku-band antennas"],
    },
];

fn profile_for(name: &str) -> Option<&'static Profile> {
    let upper = name.to_uppercase();
    let tokens: Vec<&str> = upper
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    CATALOGUE
        .iter()
        .find(|p| p.keywords.iter().any(|k| tokens.contains(k)))
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// A record from the TLE API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTle {
    name: String,
    line1: String,
    line2: String,
}

impl RawTle {
    fn into_satellite(self) -> Result<Satellite, TleError> {
        let elements = TwoLineElements::parse(&self.line1, &self.line2)?;
        let altitude = elements.altitude();
        let name = self.name.trim().to_string();

        let mut specifications = BTreeMap::new();
        specifications.insert("noradId".to_string(), elements.norad_id.to_string());
        specifications.insert("epoch".to_string(), elements.epoch.to_rfc3339());
        specifications.insert("inclination".to_string(), format!("{:.4}°", elements.inclination));
        specifications.insert("eccentricity".to_string(), format!("{:.7}", elements.eccentricity));
        specifications.insert("meanMotion".to_string(), format!("{:.8} rev/day", elements.mean_motion));

        let (agency, purpose, applications, sensors) = match profile_for(&name) {
            Some(p) => (
                p.agency.to_string(),
                p.purpose.to_string(),
                strings(p.applications),
                strings(p.sensors),
            ),
            None => ("Unknown".to_string(), "Unknown".to_string(), Vec::new(), Vec::new()),
        };

        Ok(Satellite {
            id: elements.norad_id.to_string(),
            name,
            orbit_class: OrbitClass::from_altitude(altitude),
            status: "Active".to_string(),
            altitude,
            orbital_period: elements.period_minutes(),
            agency,
            purpose,
            applications,
            sensors,
            specifications,
            position: elements.position(),
        })
    }
}

/// Maps TLE API records to satellites, dropping unparseable element sets
pub fn normalize(records: Vec<Value>) -> Vec<Satellite> {
    decode_records::<RawTle>(Source::Satellites, records)
        .into_iter()
        .filter_map(|raw| {
            let name = raw.name.clone();
            match raw.into_satellite() {
                Ok(satellite) => Some(satellite),
                Err(err) => {
                    tracing::debug!(%name, error = %err, "skipping invalid element set");
                    None
                }
            }
        })
        .collect()
}

/// A satellite listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SatelliteQuery {
    /// Substring of the satellite name, case-insensitive
    pub search: Option<String>,
    pub limit: usize,
}

impl Default for SatelliteQuery {
    fn default() -> Self {
        Self {
            search: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl SatelliteQuery {
    fn term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
    }

    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}",
            Source::Satellites,
            self.term().unwrap_or_default(),
            self.limit
        )
    }

    pub fn matches(&self, satellite: &Satellite) -> bool {
        match self.term() {
            Some(term) => satellite.name.to_lowercase().contains(&term),
            None => true,
        }
    }

    fn apply(&self, satellites: Vec<Satellite>) -> Vec<Satellite> {
        satellites
            .into_iter()
            .filter(|s| self.matches(s))
            .take(self.limit)
            .collect()
    }
}

/// Client for the TLE API
#[derive(Debug, Clone)]
pub struct SatelliteClient {
    ctx: SourceContext,
}

impl SatelliteClient {
    pub fn new(ctx: SourceContext) -> Self {
        Self { ctx }
    }

    pub fn tle_url(&self, query: &SatelliteQuery) -> String {
        format!(
            "{}/api/tle?search={}&page-size={}",
            self.ctx.config().tle_base,
            urlencoding::encode(&query.term().unwrap_or_default()),
            query.limit.max(1)
        )
    }

    /// Lists satellites for a query
    pub async fn get_all(&self, query: &SatelliteQuery) -> Result<Fetched<Satellite>, ServiceError> {
        let url = self.tle_url(query);
        let policy = self.ctx.retry_policy(Source::Satellites);
        let fetcher = self.ctx.fetcher();

        self.ctx
            .load_cached(
                Source::Satellites,
                &query.cache_key(),
                || async {
                    let records = fetcher.fetch_records(&url, &policy).await?;
                    Ok::<_, FetchError>(query.apply(normalize(records)))
                },
                |records| query.apply(normalize(records)),
            )
            .await
    }

    /// Satellites whose name contains `name`
    pub async fn search(&self, name: &str) -> Result<Fetched<Satellite>, ServiceError> {
        self.get_all(&SatelliteQuery {
            search: Some(name.to_string()),
            limit: DEFAULT_LIMIT,
        })
        .await
    }
}
