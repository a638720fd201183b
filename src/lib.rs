//! Crash-safe GPS track recording to GPX 1.0, GPX 1.1 and CSV files.
//!
//! A [`TrackRecorder`] streams points into a temporary file and writes the
//! final file, with a statistics header, when the recording stops. Files
//! left behind by an interrupted recording are finalized by
//! [`catalog::recover_all`].

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod geo;
pub mod point;
pub mod recorder;
pub mod stat_parser;
pub mod statistics;
pub mod thumbnail;
pub mod units;

use serde::Serialize;
use wasm_bindgen::prelude::*;

pub use crate::codec::{TrackFormat, TrackMetadata};
pub use crate::config::RecorderConfig;
pub use crate::error::{DecodeError, Result, TrackError};
pub use crate::point::{LightPoint, Point, TrackPoints};
pub use crate::recorder::{RecordingState, TempFileName, TrackRecorder};
pub use crate::statistics::TripStatistics;
pub use crate::units::UnitSystem;

/// Header statistics of a finished track file, returned as a JS object.
#[wasm_bindgen(js_name = parseTrackStatistics)]
pub fn parse_track_statistics(content: &str) -> std::result::Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let stats = stat_parser::parse_all_statistics(content);
    to_js_object(&stats)
}

/// Points of a track file, returned as a JS array. Full points when
/// `reconstruct` is set, `{lat, lon}` pairs otherwise.
#[wasm_bindgen(js_name = parseTrackPoints)]
pub fn parse_track_points(content: &str, reconstruct: bool) -> std::result::Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let points = stat_parser::parse_track_points(content, reconstruct).map_err(TrackError::from)?;
    to_js_object(&points)
}

/// Thumbnail GeoJSON of a track file, returned as a JSON string.
#[wasm_bindgen(js_name = trackToGeoJsonString)]
pub fn track_to_geojson_string(content: &str, limit: Option<u32>) -> std::result::Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let limit = limit.map(|l| l as usize);
    let fc = thumbnail::track_to_feature_collection(content, limit).map_err(TrackError::from)?;
    serde_json::to_string(&fc).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Serialize maps as plain JS objects rather than `Map`s.
fn to_js_object<T: Serialize>(value: &T) -> std::result::Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}
