//! NASA mission data
//!
//! Missions are assembled from several independent api.nasa.gov endpoints:
//! one Mars Rover Photos manifest per rover plus the EPIC image feed for
//! DSCOVR. All branches are requested concurrently and joined with an
//! all-settled join, so one failing endpoint never hides the others. Only
//! when every branch fails does the listing fall back to the bundled
//! snapshot of those same responses.

use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::{decode_records, slugify, Fetched, Source, SourceContext};
use crate::error::ServiceError;
use crate::http::FetchError;

/// Cache key for the merged mission listing
const MISSIONS_CACHE_KEY: &str = "missions:all";

/// Base URL for EPIC image archive
const EPIC_ARCHIVE_URL: &str = "https://epic.gsfc.nasa.gov/archive/natural";

/// A NASA mission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Mission {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub mission_type: String,
    /// Free-text label such as Active, Completed or Planned
    pub status: String,
    pub launch_year: Option<i32>,
    pub agency: String,
    pub cost: Option<String>,
    pub description: String,
    pub objectives: Vec<String>,
    pub achievements: Vec<String>,
    pub instruments: Vec<String>,
    pub image_url: Option<String>,
}

impl Mission {
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

/// Normalizes a snapshot of raw branch responses
///
/// Rover manifests (`photo_manifest` objects) go through the same parser as
/// live manifests and the remaining records are treated as EPIC images, so
/// the result has the shape and ordering of a successful fan-out.
pub fn normalize_snapshot(records: Vec<Value>) -> Vec<Mission> {
    let (manifests, images): (Vec<Value>, Vec<Value>) = records
        .into_iter()
        .partition(|record| record.get("photo_manifest").is_some());

    let mut missions: Vec<Mission> = manifests
        .into_iter()
        .filter_map(|record| match parse_manifest(record) {
            Ok(mission) => Some(mission),
            Err(err) => {
                tracing::debug!(error = %err, "skipping malformed rover manifest");
                None
            }
        })
        .collect();

    if !images.is_empty() {
        match epic_mission(images) {
            Ok(mission) => missions.push(mission),
            Err(err) => tracing::debug!(error = %err, "skipping EPIC snapshot"),
        }
    }
    missions
}

/// Filter applied to the merged mission listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissionQuery {
    /// Status label, case-insensitive
    pub status: Option<String>,
    /// Substring of the mission name, case-insensitive
    pub search: Option<String>,
}

impl MissionQuery {
    pub fn matches(&self, mission: &Mission) -> bool {
        let status_ok = self
            .status
            .as_deref()
            .map_or(true, |s| mission.status.eq_ignore_ascii_case(s.trim()));
        let search_ok = self.search.as_deref().map_or(true, |term| {
            mission
                .name
                .to_lowercase()
                .contains(&term.trim().to_lowercase())
        });
        status_ok && search_ok
    }
}

/// One independent upstream request in the mission fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionBranch {
    Curiosity,
    Perseverance,
    Opportunity,
    Spirit,
    Epic,
}

impl MissionBranch {
    pub const ALL: [MissionBranch; 5] = [
        MissionBranch::Curiosity,
        MissionBranch::Perseverance,
        MissionBranch::Opportunity,
        MissionBranch::Spirit,
        MissionBranch::Epic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MissionBranch::Curiosity => "curiosity",
            MissionBranch::Perseverance => "perseverance",
            MissionBranch::Opportunity => "opportunity",
            MissionBranch::Spirit => "spirit",
            MissionBranch::Epic => "epic",
        }
    }
}

impl fmt::Display for MissionBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static details the rover manifest doesn't carry
struct RoverProfile {
    cost: &'static str,
    objectives: &'static [&'static str],
    instruments: &'static [&'static str],
}

fn rover_profile(rover: &str) -> RoverProfile {
    match rover.to_lowercase().as_str() {
        "curiosity" => RoverProfile {
            cost: "$2.5 billion",
            objectives: &[
                "Assess past habitability of Gale Crater",
                "Characterize Martian climate and geology",
            ],
            instruments: &["Mastcam", "ChemCam", "MAHLI", "SAM", "CheMin"],
        },
        "perseverance" => RoverProfile {
            cost: "$2.7 billion",
            objectives: &[
                "Seek signs of ancient microbial life",
                "Collect and cache samples for return to Earth",
            ],
            instruments: &["Mastcam-Z", "SuperCam", "PIXL", "SHERLOC", "MOXIE"],
        },
        _ => RoverProfile {
            cost: "$410 million",
            objectives: &["Search for evidence of past water activity"],
            instruments: &["Pancam", "Mini-TES", "APXS", "Microscopic Imager"],
        },
    }
}

/// `photo_manifest` object from the Mars Rover Photos API
#[derive(Debug, Deserialize)]
struct RoverManifest {
    name: String,
    landing_date: Option<String>,
    launch_date: Option<String>,
    status: Option<String>,
    max_sol: Option<u32>,
    max_date: Option<String>,
    total_photos: Option<u64>,
}

/// Maps a manifest status to the dashboard's status labels
fn rover_status(status: Option<&str>) -> String {
    match status.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("active") => "Active".to_string(),
        Some("complete") | Some("completed") => "Completed".to_string(),
        Some("") | None => "Unknown".to_string(),
        Some(other) => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => "Unknown".to_string(),
            }
        }
    }
}

fn year_of(date: Option<&str>) -> Option<i32> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

fn rover_mission(manifest: RoverManifest) -> Mission {
    let profile = rover_profile(&manifest.name);

    let mut achievements = Vec::new();
    if let Some(photos) = manifest.total_photos {
        achievements.push(format!("{} photos returned", photos));
    }
    if let Some(sol) = manifest.max_sol {
        achievements.push(format!("Operated through sol {}", sol));
    }

    let description = match (&manifest.landing_date, &manifest.max_date) {
        (Some(landed), Some(last)) => format!(
            "Mars rover that landed on {} with imagery through {}.",
            landed, last
        ),
        (Some(landed), None) => format!("Mars rover that landed on {}.", landed),
        _ => "Mars rover.".to_string(),
    };

    Mission {
        id: slugify(&manifest.name),
        name: format!("{} Rover", manifest.name),
        mission_type: "Mars Rover".to_string(),
        status: rover_status(manifest.status.as_deref()),
        launch_year: year_of(manifest.launch_date.as_deref()),
        agency: "NASA".to_string(),
        cost: Some(profile.cost.to_string()),
        description,
        objectives: profile.objectives.iter().map(|s| s.to_string()).collect(),
        achievements,
        instruments: profile.instruments.iter().map(|s| s.to_string()).collect(),
        image_url: None,
    }
}

/// Parses a rover manifest response body
fn parse_manifest(value: Value) -> Result<Mission, FetchError> {
    let manifest = value
        .get("photo_manifest")
        .cloned()
        .ok_or_else(|| FetchError::Parse("missing photo_manifest".to_string()))?;
    let manifest: RoverManifest = serde_json::from_value(manifest)?;
    Ok(rover_mission(manifest))
}

/// Image metadata from the EPIC natural-color feed
#[derive(Debug, Deserialize)]
struct EpicImage {
    image: String,
    caption: Option<String>,
    /// "YYYY-MM-DD HH:MM:SS"
    date: String,
}

/// Archive URL of the PNG for an EPIC image
fn epic_image_url(image: &EpicImage) -> Option<String> {
    let day = image.date.get(..10)?;
    let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?;
    Some(format!(
        "{}/{}/png/{}.png",
        EPIC_ARCHIVE_URL,
        date.format("%Y/%m/%d"),
        image.image
    ))
}

/// Builds the DSCOVR mission from the latest EPIC images
fn epic_mission(records: Vec<Value>) -> Result<Mission, FetchError> {
    let images: Vec<EpicImage> = decode_records(Source::Missions, records);
    let latest = images
        .iter()
        .max_by(|a, b| a.date.cmp(&b.date))
        .ok_or_else(|| FetchError::Parse("EPIC returned no images".to_string()))?;
    let day = latest.date.get(..10).unwrap_or(latest.date.as_str());

    Ok(Mission {
        id: "dscovr".to_string(),
        name: "DSCOVR EPIC".to_string(),
        mission_type: "Earth Observation".to_string(),
        status: "Active".to_string(),
        launch_year: Some(2015),
        agency: "NASA/NOAA".to_string(),
        cost: Some("$340 million".to_string()),
        description: latest
            .caption
            .clone()
            .unwrap_or_else(|| "Full-disc Earth imagery from the Sun-Earth L1 point.".to_string()),
        objectives: vec![
            "Image the full sunlit Earth several times a day".to_string(),
            "Monitor ozone, aerosols, clouds and vegetation".to_string(),
        ],
        achievements: vec![format!(
            "{} natural color images published for {}",
            images.len(),
            day
        )],
        instruments: vec!["EPIC".to_string(), "NISTAR".to_string()],
        image_url: epic_image_url(latest),
    })
}

/// Merges fan-out results, keeping every successful branch
///
/// Failed branches are logged. If no branch succeeded the error returned is
/// a rate limit when any branch was rate limited, otherwise the last error.
pub fn merge_branches(
    results: Vec<(MissionBranch, Result<Mission, FetchError>)>,
) -> Result<Vec<Mission>, FetchError> {
    let mut missions = Vec::new();
    let mut rate_limit = None;
    let mut last_error = None;

    for (branch, result) in results {
        match result {
            Ok(mission) => missions.push(mission),
            Err(err) => {
                tracing::warn!(%branch, error = %err, "mission source failed");
                if err.is_rate_limit() && rate_limit.is_none() {
                    rate_limit = Some(err.clone());
                }
                last_error = Some(err);
            }
        }
    }

    if !missions.is_empty() {
        return Ok(missions);
    }
    Err(rate_limit
        .or(last_error)
        .unwrap_or_else(|| FetchError::Parse("no mission sources configured".to_string())))
}

/// Client for mission data
#[derive(Debug, Clone)]
pub struct MissionClient {
    ctx: SourceContext,
}

impl MissionClient {
    pub fn new(ctx: SourceContext) -> Self {
        Self { ctx }
    }

    /// Upstream URL for a fan-out branch
    pub fn branch_url(&self, branch: MissionBranch) -> String {
        let config = self.ctx.config();
        match branch {
            MissionBranch::Epic => format!(
                "{}/EPIC/api/natural?api_key={}",
                config.api_base,
                urlencoding::encode(&config.api_key)
            ),
            rover => format!(
                "{}/mars-photos/api/v1/manifests/{}?api_key={}",
                config.api_base,
                rover.name(),
                urlencoding::encode(&config.api_key)
            ),
        }
    }

    async fn fetch_branch(&self, branch: MissionBranch) -> Result<Mission, FetchError> {
        let url = self.branch_url(branch);
        let policy = self.ctx.retry_policy(Source::Missions);
        let fetcher = self.ctx.fetcher();
        match branch {
            MissionBranch::Epic => epic_mission(fetcher.fetch_records(&url, &policy).await?),
            _ => parse_manifest(fetcher.fetch_json(&url, &policy).await?),
        }
    }

    async fn fetch_all_branches(&self) -> Result<Vec<Mission>, FetchError> {
        let requests = MissionBranch::ALL.iter().map(|&branch| async move {
            (branch, self.fetch_branch(branch).await)
        });
        merge_branches(join_all(requests).await)
    }

    /// Lists all missions
    pub async fn get_all(&self) -> Result<Fetched<Mission>, ServiceError> {
        self.ctx
            .load_cached(
                Source::Missions,
                MISSIONS_CACHE_KEY,
                || self.fetch_all_branches(),
                normalize_snapshot,
            )
            .await
    }

    /// Missions whose status matches, case-insensitive
    pub async fn by_status(&self, status: &str) -> Result<Fetched<Mission>, ServiceError> {
        self.query(&MissionQuery {
            status: Some(status.to_string()),
            search: None,
        })
        .await
    }

    /// Missions whose name contains `name`
    pub async fn search(&self, name: &str) -> Result<Fetched<Mission>, ServiceError> {
        self.query(&MissionQuery {
            status: None,
            search: Some(name.to_string()),
        })
        .await
    }

    /// All missions filtered by `query`
    pub async fn query(&self, query: &MissionQuery) -> Result<Fetched<Mission>, ServiceError> {
        Ok(self.get_all().await?.filter(|m| query.matches(m)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURIOSITY_MANIFEST: &str = r#"{
        "photo_manifest": {
            "name": "Curiosity",
            "landing_date": "2012-08-06",
            "launch_date": "2011-11-26",
            "status": "active",
            "max_sol": 4102,
            "max_date": "2024-02-19",
            "total_photos": 695670,
            "photos": [{"sol": 0, "earth_date": "2012-08-06", "total_photos": 3702, "cameras": ["CHEMCAM"]}]
        }
    }"#;

    const EPIC_RESPONSE: &str = r#"[
        {"identifier": "20240219001304", "caption": "This image was taken by NASA's EPIC camera onboard the NOAA DSCOVR spacecraft",
         "image": "epic_1b_20240219001304", "version": "03", "date": "2024-02-19 00:08:15"},
        {"identifier": "20240219011831", "caption": "This image was taken by NASA's EPIC camera onboard the NOAA DSCOVR spacecraft",
         "image": "epic_1b_20240219011831", "version": "03", "date": "2024-02-19 01:13:42"}
    ]"#;

    #[test]
    fn test_parse_rover_manifest() {
        let value: Value = serde_json::from_str(CURIOSITY_MANIFEST).unwrap();
        let mission = parse_manifest(value).expect("Failed to parse manifest");

        assert_eq!(mission.id, "curiosity");
        assert_eq!(mission.name, "Curiosity Rover");
        assert_eq!(mission.status, "Active");
        assert_eq!(mission.launch_year, Some(2011));
        assert!(mission.is_active());
        assert_eq!(
            mission.achievements,
            vec!["695670 photos returned", "Operated through sol 4102"]
        );
        assert!(mission.instruments.contains(&"ChemCam".to_string()));
        assert!(mission.description.contains("2012-08-06"));
    }

    #[test]
    fn test_manifest_without_envelope_is_parse_error() {
        let err = parse_manifest(serde_json::json!({"errors": "No such rover"})).unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[test]
    fn test_rover_status_labels() {
        assert_eq!(rover_status(Some("active")), "Active");
        assert_eq!(rover_status(Some("complete")), "Completed");
        assert_eq!(rover_status(Some("hibernating")), "Hibernating");
        assert_eq!(rover_status(None), "Unknown");
    }

    #[test]
    fn test_epic_mission_uses_latest_image() {
        let records: Vec<Value> = serde_json::from_str(EPIC_RESPONSE).unwrap();
        let mission = epic_mission(records).unwrap();

        assert_eq!(mission.id, "dscovr");
        assert_eq!(
            mission.image_url.as_deref(),
            Some("https://epic.gsfc.nasa.gov/archive/natural/2024/02/19/png/epic_1b_20240219011831.png")
        );
        assert_eq!(
            mission.achievements,
            vec!["2 natural color images published for 2024-02-19"]
        );
    }

    #[test]
    fn test_epic_without_images_is_error() {
        assert!(epic_mission(Vec::new()).is_err());
    }

    #[test]
    fn test_snapshot_uses_live_parsers() {
        let mut records: Vec<Value> = serde_json::from_str(EPIC_RESPONSE).unwrap();
        records.insert(0, serde_json::from_str(CURIOSITY_MANIFEST).unwrap());
        records.insert(1, serde_json::json!({"photo_manifest": {"status": "active"}}));

        let missions = normalize_snapshot(records);

        let ids: Vec<&str> = missions.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["curiosity", "dscovr"]);
        assert_eq!(missions[1].achievements, vec!["2 natural color images published for 2024-02-19"]);
    }

    #[test]
    fn test_bundled_snapshot_matches_fan_out_branches() {
        let records = crate::fallback::StaticData::bundled()
            .records(Source::Missions)
            .unwrap();
        let missions = normalize_snapshot(records);

        let ids: Vec<&str> = missions.iter().map(|m| m.id.as_str()).collect();
        let branches: Vec<&str> = MissionBranch::ALL
            .iter()
            .map(|b| match b {
                MissionBranch::Epic => "dscovr",
                rover => rover.name(),
            })
            .collect();
        assert_eq!(ids, branches);
    }

    #[test]
    fn test_merge_keeps_successful_branches() {
        let ok = |name: &str| Mission {
            id: name.to_string(),
            name: name.to_string(),
            ..Mission::default()
        };
        let merged = merge_branches(vec![
            (MissionBranch::Curiosity, Ok(ok("curiosity"))),
            (
                MissionBranch::Spirit,
                Err(FetchError::Status {
                    status: 500,
                    message: String::new(),
                }),
            ),
            (MissionBranch::Epic, Ok(ok("dscovr"))),
        ])
        .unwrap();

        let ids: Vec<&str> = merged.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["curiosity", "dscovr"]);
    }

    #[test]
    fn test_merge_prefers_rate_limit_when_all_fail() {
        let err = merge_branches(vec![
            (MissionBranch::Curiosity, Err(FetchError::Timeout("t".into()))),
            (
                MissionBranch::Epic,
                Err(FetchError::RateLimited {
                    retry_after_secs: 30,
                }),
            ),
            (MissionBranch::Spirit, Err(FetchError::Network("n".into()))),
        ])
        .unwrap_err();

        assert!(err.is_rate_limit());
    }

    #[test]
    fn test_mission_query_matches() {
        let mission = Mission {
            name: "Perseverance Rover".to_string(),
            status: "Active".to_string(),
            ..Mission::default()
        };
        assert!(MissionQuery::default().matches(&mission));
        assert!(MissionQuery {
            status: Some("ACTIVE".to_string()),
            search: Some("perse".to_string()),
        }
        .matches(&mission));
        assert!(!MissionQuery {
            status: Some("Completed".to_string()),
            search: None,
        }
        .matches(&mission));
    }

    #[test]
    fn test_mission_serializes_camel_case() {
        let json = serde_json::to_value(Mission {
            id: "x".to_string(),
            mission_type: "Probe".to_string(),
            launch_year: Some(1977),
            image_url: Some("https://img".to_string()),
            ..Mission::default()
        })
        .unwrap();
        assert_eq!(json["type"], "Probe");
        assert_eq!(json["launchYear"], 1977);
        assert_eq!(json["imageUrl"], "https://img");
    }
}
