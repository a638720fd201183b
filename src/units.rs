use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time pattern used for every stored timestamp.
pub const GPX_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Distances below this many meters are shown in the small unit (m or ft).
pub const DISTANCE_THRESHOLD_M: f64 = 1000.0;

/// Unit system used for human-readable statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }

    /// Track distance in display units, switching to km/mi at the threshold.
    pub fn distance(self, meters: f64) -> (f64, &'static str) {
        let small = meters < DISTANCE_THRESHOLD_M;
        match (self, small) {
            (Self::Metric, true) => (meters, "m"),
            (Self::Metric, false) => (meters_to_km(meters), "km"),
            (Self::Imperial, true) => (meters_to_feet(meters), "ft"),
            (Self::Imperial, false) => (meters_to_miles(meters), "mi"),
        }
    }

    /// Elevation in display units. No threshold applies.
    pub fn elevation(self, meters: f64) -> (f64, &'static str) {
        match self {
            Self::Metric => (meters, "m"),
            Self::Imperial => (meters_to_feet(meters), "ft"),
        }
    }

    pub fn speed(self, mps: f64) -> (f64, &'static str) {
        match self {
            Self::Metric => (mps_to_kph(mps), "km/h"),
            Self::Imperial => (mps_to_miph(mps), "mi/h"),
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            other => Err(format!("unknown unit system '{other}'")),
        }
    }
}

pub fn mps_to_kph(mps: f64) -> f64 {
    mps * 3.6
}

pub fn mps_to_miph(mps: f64) -> f64 {
    mps * 2.237
}

pub fn meters_to_feet(meters: f64) -> f64 {
    meters * 3.281
}

pub fn meters_to_km(meters: f64) -> f64 {
    meters / 1000.0
}

pub fn meters_to_miles(meters: f64) -> f64 {
    meters / 1609.0
}

/// Format epoch milliseconds as `YYYY-MM-DDTHH:MM:SSZ`.
/// Returns `None` for timestamps chrono cannot represent.
pub fn utc_ms_to_gpx_time(time_ms_utc: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(time_ms_utc)
        .map(|dt| dt.format(GPX_TIME_FORMAT).to_string())
}

/// Parse a `YYYY-MM-DDTHH:MM:SSZ` timestamp into epoch milliseconds.
pub fn gpx_time_to_utc_ms(text: &str) -> Result<i64, chrono::ParseError> {
    NaiveDateTime::parse_from_str(text, GPX_TIME_FORMAT).map(|dt| dt.and_utc().timestamp_millis())
}

pub fn utc_ms_now() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format a duration in seconds as zero-padded `HH:MM:SS`. Hours are unbounded.
pub fn format_duration(total_seconds: f64) -> String {
    let total = total_seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Degrees, minutes, seconds and hemisphere letter of a coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dms {
    pub degrees: u32,
    pub minutes: u32,
    pub seconds: f64,
    pub direction: char,
}

impl fmt::Display for Dms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}°{:02}'{:05.2}\"{}",
            self.degrees, self.minutes, self.seconds, self.direction
        )
    }
}

fn dd_to_dms(decimal_degrees: f64, positive: char, negative: char) -> Dms {
    let direction = if decimal_degrees >= 0.0 { positive } else { negative };
    let abs = decimal_degrees.abs();
    let degrees = abs.trunc();
    let minutes_float = (abs - degrees) * 60.0;
    let minutes = minutes_float.trunc();
    Dms {
        degrees: degrees as u32,
        minutes: minutes as u32,
        seconds: (minutes_float - minutes) * 60.0,
        direction,
    }
}

pub fn latitude_to_dms(latitude: f64) -> Dms {
    dd_to_dms(latitude, 'N', 'S')
}

pub fn longitude_to_dms(longitude: f64) -> Dms {
    dd_to_dms(longitude, 'E', 'W')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_threshold() {
        assert_eq!(UnitSystem::Metric.distance(999.0), (999.0, "m"));
        assert_eq!(UnitSystem::Metric.distance(1500.0), (1.5, "km"));

        let (ft, unit) = UnitSystem::Imperial.distance(100.0);
        assert!((ft - 328.1).abs() < 1e-9);
        assert_eq!(unit, "ft");

        let (mi, unit) = UnitSystem::Imperial.distance(3218.0);
        assert!((mi - 2.0).abs() < 1e-9);
        assert_eq!(unit, "mi");
    }

    #[test]
    fn test_elevation_and_speed_have_fixed_units() {
        assert_eq!(UnitSystem::Metric.elevation(5000.0), (5000.0, "m"));
        assert_eq!(UnitSystem::Imperial.elevation(5000.0).1, "ft");
        let (kph, unit) = UnitSystem::Metric.speed(10.0);
        assert!((kph - 36.0).abs() < 1e-9);
        assert_eq!(unit, "km/h");
        assert_eq!(UnitSystem::Imperial.speed(10.0).1, "mi/h");
    }

    #[test]
    fn test_unit_system_parse() {
        assert_eq!("metric".parse::<UnitSystem>(), Ok(UnitSystem::Metric));
        assert_eq!("imperial".parse::<UnitSystem>(), Ok(UnitSystem::Imperial));
        assert!("nautical".parse::<UnitSystem>().is_err());
        assert_eq!(UnitSystem::Imperial.to_string(), "imperial");
    }

    #[test]
    fn test_gpx_time_round_trip() {
        let text = utc_ms_to_gpx_time(1_700_000_000_000).unwrap();
        assert_eq!(text, "2023-11-14T22:13:20Z");
        assert_eq!(gpx_time_to_utc_ms(&text).unwrap(), 1_700_000_000_000);
    }

    #[test]
    fn test_gpx_time_drops_milliseconds() {
        let text = utc_ms_to_gpx_time(1_500).unwrap();
        assert_eq!(text, "1970-01-01T00:00:01Z");
    }

    #[test]
    fn test_gpx_time_rejects_other_patterns() {
        assert!(gpx_time_to_utc_ms("2023-11-14 22:13:20").is_err());
        assert!(gpx_time_to_utc_ms("2023-11-14T22:13:20.000Z").is_err());
        assert!(gpx_time_to_utc_ms("2023-11-14T22:13:20+00:00").is_err());
        assert!(gpx_time_to_utc_ms("").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "00:00:00");
        assert_eq!(format_duration(1.0), "00:00:01");
        assert_eq!(format_duration(3661.9), "01:01:01");
        assert_eq!(format_duration(120.0 * 3600.0 + 5.0 * 60.0 + 30.0), "120:05:30");
    }

    #[test]
    fn test_dms() {
        let dms = latitude_to_dms(-33.5);
        assert_eq!(dms.degrees, 33);
        assert_eq!(dms.minutes, 30);
        assert!(dms.seconds.abs() < 1e-9);
        assert_eq!(dms.direction, 'S');
        assert_eq!(dms.to_string(), "33°30'00.00\"S");

        let dms = longitude_to_dms(8.25);
        assert_eq!(dms.direction, 'E');
        assert_eq!(dms.minutes, 15);
    }
}
