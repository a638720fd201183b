//! Track folder housekeeping: recovery of interrupted recordings and the
//! per-file summaries a track list shows.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::codec::TrackFormat;
use crate::config::RecorderConfig;
use crate::error::{Result, TrackError};
use crate::point::LightPoint;
use crate::recorder::{TempFileName, TrackRecorder};
use crate::stat_parser::{StatEntry, parse_all_statistics};
use crate::thumbnail::{POINTS_LIMIT, decimate};

/// A temporary file the recovery sweep could not turn into a final file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscardedTrack {
    pub file_name: String,
    pub reason: String,
}

impl DiscardedTrack {
    /// Text shown to the user for the deleted file.
    pub fn notice(&self) -> String {
        format!("{} couldn't be reconstructed and was deleted", self.file_name)
    }
}

/// A temporary file left in place because its final file could not be
/// written (name collision, I/O failure).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedTrack {
    pub file_name: String,
    pub reason: String,
}

impl SkippedTrack {
    pub fn notice(&self) -> String {
        format!("{} couldn't be finalized and was kept", self.file_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecoveryReport {
    pub recovered: Vec<PathBuf>,
    pub discarded: Vec<DiscardedTrack>,
    pub skipped: Vec<SkippedTrack>,
}

/// Finalize every temporary file in `folder` left by an interrupted
/// recording. Files whose name or content cannot be parsed are deleted and
/// reported; files that fail for any other reason stay on disk for a later
/// sweep. The sweep continues with the rest either way.
pub fn recover_all(folder: &Path, base: &RecorderConfig) -> Result<RecoveryReport> {
    let mut report = RecoveryReport::default();

    for (file_name, path) in list_files(folder)? {
        if !TempFileName::is_candidate(&file_name) {
            continue;
        }

        match TrackRecorder::recover(&path, base) {
            Ok(output) => {
                log::info!("Recovered {} into {}", file_name, output.display());
                report.recovered.push(output);
            }
            Err(e) if !is_unrecoverable(&e) => {
                log::warn!("Kept {file_name}: {e}");
                report.skipped.push(SkippedTrack {
                    file_name,
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                log::warn!("Could not reconstruct {file_name}: {e}");
                if let Err(remove) = fs::remove_file(&path) {
                    log::warn!("Failed to delete {}: {remove}", path.display());
                } else {
                    log::warn!("Deleted {}", path.display());
                }
                report.discarded.push(DiscardedTrack {
                    file_name,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

/// Whether a recovery failure comes from the temp file itself, so retrying
/// can never succeed.
fn is_unrecoverable(error: &TrackError) -> bool {
    matches!(
        error,
        TrackError::Decode(_) | TrackError::InvalidTempName(_) | TrackError::InvalidOutputName(_)
    )
}

/// Finished `.gpx` and `.csv` files in `folder`, sorted by name.
pub fn scan_tracks(folder: &Path) -> Result<Vec<PathBuf>> {
    Ok(list_files(folder)?
        .into_iter()
        .filter(|(name, _)| {
            let lower = name.to_ascii_lowercase();
            lower.ends_with(".gpx") || lower.ends_with(".csv")
        })
        .map(|(_, path)| path)
        .collect())
}

/// Regular files of `folder` with UTF-8 names, sorted by name.
fn list_files(folder: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = fs::read_dir(folder).map_err(TrackError::io(folder))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(TrackError::io(folder))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            files.push((name, entry.path()));
        }
    }
    files.sort();
    Ok(files)
}

/// Listing record of one finished track file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSummary {
    pub file_name: String,
    pub format: TrackFormat,
    pub version: Option<String>,
    pub units: Option<String>,
    pub points: Option<u64>,
    pub duration: Option<String>,
    pub distance: Option<StatEntry>,
    pub net_elevation_change: Option<StatEntry>,
    pub speed_max: Option<StatEntry>,
    pub speed_avg: Option<StatEntry>,
    /// Last modification time, milliseconds since the epoch.
    pub modified_ms: Option<i64>,
    /// Coordinates for a map thumbnail, at most [`POINTS_LIMIT`].
    pub points_to_show: Vec<LightPoint>,
}

impl TrackSummary {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(TrackError::io(path))?;
        let file_name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut summary = Self::from_content(file_name, &content)?;
        summary.modified_ms = fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(|t| DateTime::<Utc>::from(t).timestamp_millis());
        Ok(summary)
    }

    pub fn from_content(file_name: String, content: &str) -> Result<Self> {
        let format = TrackFormat::detect(content);
        let stats = parse_all_statistics(content);
        let points = format.decode_light(content)?;

        Ok(Self {
            file_name,
            format,
            version: stats.text("version").map(str::to_string),
            units: stats.text("units").map(str::to_string),
            points: stats.count("track_points"),
            duration: stats.text("duration").map(str::to_string),
            distance: stats.get("distance").cloned(),
            net_elevation_change: stats.get("net_elevation_change").cloned(),
            speed_max: stats.get("speed_max").cloned(),
            speed_avg: stats.get("speed_avg").cloned(),
            modified_ms: None,
            points_to_show: decimate(&points, POINTS_LIMIT),
        })
    }
}
