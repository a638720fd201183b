use std::path::PathBuf;

use thiserror::Error;
use wasm_bindgen::JsValue;

pub type Result<T> = std::result::Result<T, TrackError>;

/// Errors raised while recording, finalizing or reading back a track.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The final file already exists and was not overwritten.
    #[error("Output file already exists: {}", .0.display())]
    Collision(PathBuf),

    #[error("Failed to decode track data: {0}")]
    Decode(#[from] DecodeError),

    #[error("Invalid output file name '{0}': allowed extensions are .csv, .gpx")]
    InvalidOutputName(String),

    #[error("Invalid temporary file name '{0}'")]
    InvalidTempName(String),

    #[error("No active temporary file")]
    NoActiveTempFile,

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl TrackError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Errors raised while decoding stored point data.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Point {index} has no latitude/longitude")]
    MissingCoordinates { index: usize },

    #[error("Invalid value '{value}' for field '{field}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Invalid time '{0}', expected YYYY-MM-DDTHH:MM:SSZ")]
    InvalidTime(String),

    #[error("Line {line} has {found} columns, expected 7")]
    ColumnCount { line: usize, found: usize },

    #[error("Point data ends inside an element")]
    Truncated,

    #[error("Unexpected column header '{0}'")]
    UnexpectedHeader(String),

    #[error("No track points found")]
    Empty,
}

impl From<TrackError> for JsValue {
    fn from(e: TrackError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
