use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::codec::TrackFormat;
use crate::error::{Result, TrackError};
use crate::units::UnitSystem;

/// Settings a recorder reads once at construction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderConfig {
    /// Output format (default: GPX 1.0)
    #[serde(default)]
    pub format: TrackFormat,

    /// Unit system of the statistics header (default: metric)
    #[serde(default)]
    pub units: UnitSystem,

    /// Final file name inside `work_path`; generated from the start time when absent
    #[serde(default)]
    pub output_file: Option<String>,

    /// Folder holding temporary and final files (default: "tracks")
    #[serde(default = "default_work_path")]
    pub work_path: PathBuf,

    #[serde(default = "default_creator")]
    pub creator: String,

    /// Activity label written to the header (default: none)
    #[serde(default)]
    pub activity: Option<String>,

    /// Namespace URI of the GPX 1.0 `custom` extensions
    #[serde(default = "default_link")]
    pub link: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            format: TrackFormat::default(),
            units: UnitSystem::default(),
            output_file: None,
            work_path: default_work_path(),
            creator: default_creator(),
            activity: None,
            link: default_link(),
        }
    }
}

impl RecorderConfig {
    pub fn new(work_path: impl Into<PathBuf>) -> Self {
        Self {
            work_path: work_path.into(),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply format and units from a settings store shaped like
    /// `{"format": {"value": "GPX 1.1"}, "units": {"value": "imperial"}}`.
    /// Keys the recorder does not use are ignored.
    pub fn with_settings_json(mut self, json: &str) -> Result<Self> {
        let settings: SettingsStore = serde_json::from_str(json)?;
        if let Some(format) = settings.format {
            self.format = format.value;
        }
        if let Some(units) = settings.units {
            self.units = units.value;
        }
        Ok(self)
    }

    /// The final file name with its extension matched to `format`, or `None`
    /// when the name is to be generated.
    ///
    /// Only bare `.gpx`/`.csv` file names are accepted.
    pub fn output_file_name(&self) -> Result<Option<String>> {
        let Some(name) = self.output_file.as_deref() else {
            return Ok(None);
        };
        let invalid = || TrackError::InvalidOutputName(name.to_string());

        let path = Path::new(name);
        if path.file_name().and_then(|f| f.to_str()) != Some(name) {
            return Err(invalid());
        }
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(invalid)?;
        if extension != "gpx" && extension != "csv" {
            return Err(invalid());
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(invalid)?;

        Ok(Some(format!("{stem}.{}", self.format.extension())))
    }

    pub fn validate(&self) -> Result<()> {
        self.output_file_name().map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
struct SettingValue<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct SettingsStore {
    #[serde(default)]
    format: Option<SettingValue<TrackFormat>>,
    #[serde(default)]
    units: Option<SettingValue<UnitSystem>>,
}

fn default_work_path() -> PathBuf {
    PathBuf::from("tracks")
}

fn default_creator() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

fn default_link() -> String {
    "urn:track-recorder:custom".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = RecorderConfig::from_json("{}").unwrap();
        assert_eq!(config, RecorderConfig::default());
        assert_eq!(config.format, TrackFormat::Gpx10);
        assert_eq!(config.units, UnitSystem::Metric);
        assert!(config.creator.starts_with("track-recorder "));
    }

    #[test]
    fn test_from_json() {
        let config = RecorderConfig::from_json(
            r#"{"format": "CSV", "units": "imperial", "outputFile": "walk.csv", "workPath": "/tmp/t", "activity": "Walking"}"#,
        )
        .unwrap();
        assert_eq!(config.format, TrackFormat::Csv);
        assert_eq!(config.units, UnitSystem::Imperial);
        assert_eq!(config.output_file.as_deref(), Some("walk.csv"));
        assert_eq!(config.work_path, PathBuf::from("/tmp/t"));
        assert_eq!(config.activity.as_deref(), Some("Walking"));
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = RecorderConfig::from_json(r#"{"format": "KML"}"#).unwrap_err();
        assert!(matches!(err, TrackError::Config(_)));
    }

    #[test]
    fn test_settings_store_layout() {
        let settings = r#"{
            "app_state": {"value": 0},
            "interval": {"value": 1},
            "units": {"value": "imperial"},
            "format": {"value": "GPX 1.1"},
            "theme": {"value": "dark"}
        }"#;
        let config = RecorderConfig::new("out").with_settings_json(settings).unwrap();
        assert_eq!(config.format, TrackFormat::Gpx11);
        assert_eq!(config.units, UnitSystem::Imperial);
        assert_eq!(config.work_path, PathBuf::from("out"));
    }

    #[test]
    fn test_output_name_extension_follows_format() {
        let mut config = RecorderConfig {
            output_file: Some("ride.gpx".to_string()),
            format: TrackFormat::Csv,
            ..Default::default()
        };
        assert_eq!(config.output_file_name().unwrap().as_deref(), Some("ride.csv"));

        config.format = TrackFormat::Gpx11;
        config.output_file = Some("my.ride.CSV".to_string());
        assert_eq!(config.output_file_name().unwrap().as_deref(), Some("my.ride.gpx"));
    }

    #[test]
    fn test_output_name_rejects_bad_names() {
        for name in ["ride.kml", "ride", ".gpx", "sub/ride.gpx", "../ride.gpx"] {
            let config = RecorderConfig {
                output_file: Some(name.to_string()),
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(TrackError::InvalidOutputName(_))),
                "{name}"
            );
        }
    }
}
