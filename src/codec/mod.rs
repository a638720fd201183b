//! Per-format point encoding, decoding and header rendering.
//!
//! Each [`TrackFormat`] variant owns one implementation table: the GPX
//! variants live in [`gpx`], CSV in [`csv`]. The format is picked once per
//! recorder and never changes while a track is being recorded.

pub mod csv;
pub mod gpx;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::point::{LightPoint, Point, PROVIDER_STORED, TrackPoints};
use crate::statistics::TripStatistics;
use crate::units::{UnitSystem, gpx_time_to_utc_ms, utc_ms_to_gpx_time};

/// Placeholder written for every absent field.
pub const BLANK: &str = " ";

/// Output format of a track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackFormat {
    #[default]
    #[serde(rename = "GPX 1.0")]
    Gpx10,
    #[serde(rename = "GPX 1.1")]
    Gpx11,
    #[serde(rename = "CSV")]
    Csv,
}

impl TrackFormat {
    pub const ALL: [TrackFormat; 3] = [Self::Gpx10, Self::Gpx11, Self::Csv];

    pub fn label(self) -> &'static str {
        match self {
            Self::Gpx10 => "GPX 1.0",
            Self::Gpx11 => "GPX 1.1",
            Self::Csv => "CSV",
        }
    }

    /// Tag used in temporary file names.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Gpx10 => "gpx10",
            Self::Gpx11 => "gpx11",
            Self::Csv => "csv",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.tag() == tag)
    }

    /// File extension of the final file, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Gpx10 | Self::Gpx11 => "gpx",
            Self::Csv => "csv",
        }
    }

    pub fn is_gpx(self) -> bool {
        matches!(self, Self::Gpx10 | Self::Gpx11)
    }

    /// Guess the format of finished or temporary track content from its
    /// first non-blank line: markup means GPX, anything else CSV.
    pub fn detect(content: &str) -> Self {
        if content.trim_start().starts_with('<') {
            if content.contains("version=\"1.1\"") || content.contains("<gpxtpx:") {
                Self::Gpx11
            } else {
                Self::Gpx10
            }
        } else {
            Self::Csv
        }
    }

    /// Encode one point as a single line without trailing newline.
    pub fn encode_point(self, point: &Point) -> String {
        match self {
            Self::Gpx10 | Self::Gpx11 => gpx::encode_point(self, point),
            Self::Csv => csv::encode_point(point),
        }
    }

    /// Decode every point with all stored fields.
    pub fn decode_points(self, content: &str) -> Result<Vec<Point>, DecodeError> {
        self.raw_points(content)?
            .into_iter()
            .enumerate()
            .map(|(index, raw)| raw.into_point(index))
            .collect()
    }

    /// Decode coordinates only, skipping points without a usable position.
    pub fn decode_light(self, content: &str) -> Result<Vec<LightPoint>, DecodeError> {
        Ok(self
            .raw_points(content)?
            .iter()
            .filter_map(RawPoint::light)
            .collect())
    }

    pub fn decode(self, content: &str, reconstruct: bool) -> Result<TrackPoints, DecodeError> {
        if reconstruct {
            self.decode_points(content).map(TrackPoints::Full)
        } else {
            self.decode_light(content).map(TrackPoints::Light)
        }
    }

    fn raw_points(self, content: &str) -> Result<Vec<RawPoint>, DecodeError> {
        match self {
            Self::Gpx10 | Self::Gpx11 => gpx::raw_points(content),
            Self::Csv => csv::raw_points(content),
        }
    }

    /// Everything that precedes the first point line of a final file.
    pub fn render_header(self, stats: &TripStatistics, meta: &TrackMetadata) -> String {
        match self {
            Self::Gpx10 | Self::Gpx11 => gpx::render_header(self, stats, meta),
            Self::Csv => csv::render_header(stats, meta),
        }
    }

    pub fn render_footer(self) -> &'static str {
        match self {
            Self::Gpx10 | Self::Gpx11 => gpx::FOOTER,
            Self::Csv => "",
        }
    }

    /// Header, one body line per encoded point, then footer.
    pub fn render_document(
        self,
        stats: &TripStatistics,
        meta: &TrackMetadata,
        lines: &[&str],
    ) -> String {
        let indent = if self.is_gpx() { "  " } else { "" };
        let mut document = self.render_header(stats, meta);
        for line in lines {
            document.push_str(indent);
            document.push_str(line);
            document.push('\n');
        }
        document.push_str(self.render_footer());
        document
    }
}

impl fmt::Display for TrackFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TrackFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.label() == s)
            .ok_or_else(|| format!("unknown track format '{s}'"))
    }
}

/// Descriptive fields written into a final file's header.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetadata {
    pub creator: String,
    pub units: UnitSystem,
    pub activity: Option<String>,
    pub track_name: String,
    pub start_time_ms: Option<i64>,
    /// Namespace URI of the GPX 1.0 custom extensions.
    pub link: String,
}

/// Fields of one stored point as text, `None` when blank.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RawPoint {
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub ele: Option<String>,
    pub time: Option<String>,
    pub speed: Option<String>,
    pub sat: Option<String>,
    pub accuracy: Option<String>,
}

impl RawPoint {
    fn into_point(self, index: usize) -> Result<Point, DecodeError> {
        let latitude = parse_field("lat", self.lat)?;
        let longitude = parse_field("lon", self.lon)?;
        if latitude.is_none() || longitude.is_none() {
            return Err(DecodeError::MissingCoordinates { index });
        }

        let time_ms_utc = self
            .time
            .map(|t| gpx_time_to_utc_ms(&t).map_err(|_| DecodeError::InvalidTime(t)))
            .transpose()?;

        Ok(Point {
            latitude,
            longitude,
            altitude_m: parse_field("ele", self.ele)?,
            time_ms_utc,
            speed_mps: parse_field("speed", self.speed)?,
            accuracy_m: parse_field("accuracy", self.accuracy)?,
            satellites_used_in_fix: parse_field("sat", self.sat)?,
            provider: PROVIDER_STORED.to_string(),
        })
    }

    fn light(&self) -> Option<LightPoint> {
        let lat = self.lat.as_deref()?.parse::<f64>().ok()?;
        let lon = self.lon.as_deref()?.parse::<f64>().ok()?;
        Some(LightPoint { lat, lon })
    }
}

fn parse_field<T: FromStr>(field: &'static str, value: Option<String>) -> Result<Option<T>, DecodeError> {
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| DecodeError::InvalidNumber { field, value: v })
        })
        .transpose()
}

/// Trimmed text, or `None` for the blank placeholder.
pub(crate) fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Fixed-point text used for every stored real number.
pub(crate) fn fixed(value: f64) -> String {
    format!("{value:.16}")
}

pub(crate) fn encode_time(time_ms_utc: Option<i64>) -> Option<String> {
    time_ms_utc.and_then(utc_ms_to_gpx_time)
}

/// Header text lines shared by every format: creator, version, units,
/// point count, statistics block and activity.
pub(crate) fn summary_lines(
    version: Option<&str>,
    stats: &TripStatistics,
    meta: &TrackMetadata,
) -> Vec<String> {
    let units = meta.units;
    let (distance, distance_unit) = units.distance(stats.total_distance_m);
    let (gain, elevation_unit) = units.elevation(stats.elevation_gain_m);
    let (loss, _) = units.elevation(stats.elevation_loss_m);
    let (speed_max, speed_unit) = units.speed(stats.speed_max_mps);
    let (speed_avg, _) = units.speed(stats.speed_avg_mps);

    let mut lines = vec![format!("Created with {}", single_line(&meta.creator))];
    if let Some(version) = version {
        lines.push(format!("GPX Version = {version}"));
    }
    lines.extend([
        format!("Units = {units}"),
        format!("Track = {} TrackPoints", stats.points_count),
        "Track Statistics:".to_string(),
        format!("Distance = {distance:.0} {distance_unit}"),
        format!("Duration = {}", stats.duration_formatted),
        format!("Elevation Gain = {gain:.0} {elevation_unit}"),
        format!("Elevation Loss = {loss:.0} {elevation_unit}"),
        format!("Max Speed = {speed_max:.0} {speed_unit}"),
        format!("Avg Speed = {speed_avg:.0} {speed_unit}"),
    ]);
    if let Some(activity) = meta.activity.as_deref().filter(|a| !a.is_empty()) {
        lines.push(format!("Activity = {}", single_line(activity)));
    }
    lines
}

/// Collapse line breaks so free text cannot escape its header line.
pub(crate) fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_point() -> Point {
        Point {
            altitude_m: Some(123.25),
            time_ms_utc: Some(1_700_000_000_000),
            speed_mps: Some(4.5),
            accuracy_m: Some(3.75),
            satellites_used_in_fix: Some(9),
            provider: "gps".to_string(),
            ..Point::new(48.8583701, 2.2944813)
        }
    }

    #[test]
    fn test_round_trip_every_format() {
        let point = sample_point();
        for format in TrackFormat::ALL {
            let line = format.encode_point(&point);
            let decoded = format.decode_points(&line).unwrap();
            assert_eq!(decoded.len(), 1, "{format}");
            let p = &decoded[0];
            assert_eq!(p.latitude, point.latitude, "{format}");
            assert_eq!(p.longitude, point.longitude, "{format}");
            assert_eq!(p.altitude_m, point.altitude_m, "{format}");
            assert_eq!(p.time_ms_utc, point.time_ms_utc, "{format}");
            assert_eq!(p.speed_mps, point.speed_mps, "{format}");
            assert_eq!(p.accuracy_m, point.accuracy_m, "{format}");
            assert_eq!(p.satellites_used_in_fix, point.satellites_used_in_fix, "{format}");
            assert_eq!(p.provider, PROVIDER_STORED);
        }
    }

    #[test]
    fn test_absent_fields_round_trip_as_absent() {
        let point = Point::new(50.0, 8.0);
        for format in TrackFormat::ALL {
            let line = format.encode_point(&point);
            let decoded = format.decode_points(&line).unwrap();
            assert_eq!(decoded[0].altitude_m, None, "{format}");
            assert_eq!(decoded[0].time_ms_utc, None, "{format}");
            assert_eq!(decoded[0].speed_mps, None, "{format}");
            assert_eq!(decoded[0].accuracy_m, None, "{format}");
            assert_eq!(decoded[0].satellites_used_in_fix, None, "{format}");
        }
    }

    #[test]
    fn test_light_decode_skips_unpositioned_points() {
        for format in TrackFormat::ALL {
            let content = [
                format.encode_point(&Point::new(50.0, 8.0)),
                format.encode_point(&Point::default()),
                format.encode_point(&Point::new(50.5, 8.5)),
            ]
            .join("\n");
            let light = format.decode_light(&content).unwrap();
            assert_eq!(
                light,
                vec![
                    LightPoint { lat: 50.0, lon: 8.0 },
                    LightPoint { lat: 50.5, lon: 8.5 }
                ],
                "{format}"
            );
        }
    }

    #[test]
    fn test_full_decode_requires_coordinates() {
        for format in TrackFormat::ALL {
            let content = [
                format.encode_point(&Point::new(50.0, 8.0)),
                format.encode_point(&Point::default()),
            ]
            .join("\n");
            let err = format.decode_points(&content).unwrap_err();
            assert!(
                matches!(err, DecodeError::MissingCoordinates { index: 1 }),
                "{format}: {err}"
            );
        }
    }

    #[test]
    fn test_decode_dispatch() {
        let line = TrackFormat::Csv.encode_point(&sample_point());
        assert!(matches!(
            TrackFormat::Csv.decode(&line, true).unwrap(),
            TrackPoints::Full(_)
        ));
        assert!(matches!(
            TrackFormat::Csv.decode(&line, false).unwrap(),
            TrackPoints::Light(_)
        ));
    }

    #[test]
    fn test_tags_and_extensions() {
        for format in TrackFormat::ALL {
            assert_eq!(TrackFormat::from_tag(format.tag()), Some(format));
            assert_eq!(format.label().parse::<TrackFormat>(), Ok(format));
        }
        assert_eq!(TrackFormat::from_tag("kml"), None);
        assert_eq!(TrackFormat::Gpx11.extension(), "gpx");
        assert_eq!(TrackFormat::Csv.extension(), "csv");
    }

    #[test]
    fn test_detect() {
        assert_eq!(
            TrackFormat::detect("<?xml version=\"1.0\"?>\n<gpx version=\"1.1\"></gpx>"),
            TrackFormat::Gpx11
        );
        assert_eq!(
            TrackFormat::detect("<?xml version=\"1.0\"?>\n<gpx version=\"1.0\"></gpx>"),
            TrackFormat::Gpx10
        );
        assert_eq!(TrackFormat::detect("# Units = metric\n"), TrackFormat::Csv);
    }

    #[test]
    fn test_detect_ignores_markup_in_csv_comments() {
        let csv = "# Track Name = export <gpx> test\n# Activity = <gpx version=\"1.1\">\n#\n\
                   lat,lon,ele,time,speed,sat,accuracy\n50.0,8.0, , , , , \n";
        assert_eq!(TrackFormat::detect(csv), TrackFormat::Csv);
        assert_eq!(TrackFormat::detect(csv).decode_light(csv).unwrap().len(), 1);
        assert_eq!(TrackFormat::detect("\n\n  <trkpt lat=\"1\" lon=\"2\"></trkpt>"), TrackFormat::Gpx10);
    }

    #[test]
    fn test_serde_labels() {
        let format: TrackFormat = serde_json::from_str("\"GPX 1.1\"").unwrap();
        assert_eq!(format, TrackFormat::Gpx11);
        assert_eq!(serde_json::to_string(&TrackFormat::Csv).unwrap(), "\"CSV\"");
    }
}
