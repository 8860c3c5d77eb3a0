//! Bundled static datasets served when upstreams are unavailable
//!
//! Each source ships a JSON file compiled into the binary. The files hold raw
//! records in the same shape the adapter's normalizer consumes for live data,
//! so static and network results go through identical transformations.
//! A directory override lets a deployment swap in fresher snapshots without
//! rebuilding.

use serde_json::Value;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::http::records::extract_records;
use crate::sources::Source;

const BUNDLED_EXOPLANETS: &str = include_str!("../data/exoplanets.json");
const BUNDLED_MISSIONS: &str = include_str!("../data/missions.json");
const BUNDLED_SATELLITES: &str = include_str!("../data/satellites.json");

/// Errors that can occur when loading static data
#[derive(Debug, Error)]
pub enum FallbackError {
    /// The override file exists but could not be read
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not a JSON record array
    #[error("invalid static data in {file}: {message}")]
    Parse { file: String, message: String },
}

/// Source of static fallback records
#[derive(Debug, Clone, Default)]
pub struct StaticData {
    /// Directory checked before the bundled copy
    dir: Option<PathBuf>,
}

impl StaticData {
    /// Uses only the datasets compiled into the binary
    pub fn bundled() -> Self {
        Self { dir: None }
    }

    /// Prefers `<dir>/<source>.json`, falling back to the bundled copy when
    /// the file does not exist
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Loads the raw records for a source
    pub fn records(&self, source: Source) -> Result<Vec<Value>, FallbackError> {
        let file = source.static_file();

        if let Some(ref dir) = self.dir {
            let path = dir.join(file);
            match fs::read_to_string(&path) {
                Ok(content) => return parse(file, &content),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "no static override, using bundled data");
                }
                Err(err) => return Err(FallbackError::Io { path, source: err }),
            }
        }

        parse(file, bundled(source))
    }
}

fn bundled(source: Source) -> &'static str {
    match source {
        Source::Exoplanets => BUNDLED_EXOPLANETS,
        Source::Missions => BUNDLED_MISSIONS,
        Source::Satellites => BUNDLED_SATELLITES,
    }
}

fn parse(file: &str, content: &str) -> Result<Vec<Value>, FallbackError> {
    let value: Value = serde_json::from_str(content).map_err(|e| FallbackError::Parse {
        file: file.to_string(),
        message: e.to_string(),
    })?;
    extract_records(value).map_err(|e| FallbackError::Parse {
        file: file.to_string(),
        message: e.to_string(),
    })
}
