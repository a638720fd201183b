use serde::{Deserialize, Serialize};

/// Provider tag assigned to points decoded from stored track data.
pub const PROVIDER_STORED: &str = "stored";

/// A single GPS fix.
///
/// Latitude and longitude are either both present or both absent; every
/// other field is optional and is stored as a blank placeholder when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_m: Option<f64>,
    pub time_ms_utc: Option<i64>,
    pub speed_mps: Option<f64>,
    pub accuracy_m: Option<f64>,
    pub satellites_used_in_fix: Option<u32>,
    /// Source of the fix ("gps", "last", "test", ...). Never written to files.
    #[serde(default)]
    pub provider: String,
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Default::default()
        }
    }

    /// The coordinate pair, if both halves are present.
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    pub fn light(&self) -> Option<LightPoint> {
        self.position().map(|(lat, lon)| LightPoint { lat, lon })
    }
}

/// Coordinates only, as used by map thumbnails.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Points read back from a track, either full fixes or coordinates only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TrackPoints {
    Full(Vec<Point>),
    Light(Vec<LightPoint>),
}

impl TrackPoints {
    pub fn len(&self) -> usize {
        match self {
            Self::Full(points) => points.len(),
            Self::Light(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
