//! Statistics and points of finished track files, as read by track lists.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::codec::TrackFormat;
use crate::error::DecodeError;
use crate::point::TrackPoints;

/// Value of one header statistic.
///
/// Distances, elevations and speeds are always `Number`, for GPX and CSV
/// files alike.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Count(u64),
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatEntry {
    pub value: StatValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Header statistics keyed by name (`distance`, `duration`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParsedStatistics(BTreeMap<&'static str, StatEntry>);

impl ParsedStatistics {
    pub fn get(&self, key: &str) -> Option<&StatEntry> {
        self.0.get(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.get(key)?.value {
            StatValue::Number(n) => Some(n),
            StatValue::Count(n) => Some(n as f64),
            StatValue::Text(_) => None,
        }
    }

    pub fn count(&self, key: &str) -> Option<u64> {
        match self.get(key)?.value {
            StatValue::Count(n) => Some(n),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match &self.get(key)?.value {
            StatValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn unit(&self, key: &str) -> Option<&str> {
        self.get(key)?.unit.as_deref()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Text,
    Count,
    Measure,
}

struct Pattern {
    key: &'static str,
    kind: Kind,
    regex: Regex,
}

/// One pattern per header label. Lines start with `#` (CSV) or `<!--` (GPX).
fn patterns() -> &'static [Pattern] {
    static PATTERNS: OnceLock<Vec<Pattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let table: [(&'static str, Kind, &str); 12] = [
            ("version", Kind::Text, r"GPX Version = ([\d.]+)"),
            ("units", Kind::Text, r"Units = (\w+)"),
            ("track_points", Kind::Count, r"Track = (\d+) TrackPoints"),
            ("distance", Kind::Measure, r"Distance = ([\d.]+)[ \t]*([\w/]+)?"),
            ("duration", Kind::Text, r"Duration = ([\d:]+)"),
            ("elevation_gain", Kind::Measure, r"Elevation Gain = ([\d.]+)[ \t]*([\w/]+)?"),
            ("elevation_loss", Kind::Measure, r"Elevation Loss = ([\d.]+)[ \t]*([\w/]+)?"),
            ("speed_max", Kind::Measure, r"Max Speed = ([\d.]+)[ \t]*([\w/]+)?"),
            ("speed_avg", Kind::Measure, r"Avg Speed = ([\d.]+)[ \t]*([\w/]+)?"),
            ("activity", Kind::Text, r"Activity = (.*?)[ \t]*(?:-->)?[ \t]*$"),
            ("track_name", Kind::Text, r"Track Name = (.*?)[ \t]*$"),
            ("start_time", Kind::Text, r"Start Time = (\S+)"),
        ];
        table
            .into_iter()
            .map(|(key, kind, label)| Pattern {
                key,
                kind,
                regex: Regex::new(&format!(r"(?m)^(?:#|<!--)[ \t]*{label}"))
                    .expect("statistics pattern is valid"),
            })
            .collect()
    })
}

/// Extract every known statistic from a file's header comments, plus
/// `net_elevation_change` (gain minus loss) when both are present.
pub fn parse_all_statistics(content: &str) -> ParsedStatistics {
    let mut statistics = BTreeMap::new();

    for pattern in patterns() {
        let Some(captures) = pattern.regex.captures(content) else {
            continue;
        };
        let raw = captures.get(1).map_or("", |m| m.as_str());
        let entry = match pattern.kind {
            Kind::Text => StatEntry {
                value: StatValue::Text(raw.to_string()),
                unit: None,
            },
            Kind::Count => match raw.parse::<u64>() {
                Ok(n) => StatEntry {
                    value: StatValue::Count(n),
                    unit: Some("points".to_string()),
                },
                Err(_) => continue,
            },
            Kind::Measure => match raw.parse::<f64>() {
                Ok(n) => StatEntry {
                    value: StatValue::Number(n),
                    unit: captures.get(2).map(|m| m.as_str().to_string()),
                },
                Err(_) => continue,
            },
        };
        statistics.insert(pattern.key, entry);
    }

    let mut parsed = ParsedStatistics(statistics);
    if let (Some(gain), Some(loss)) = (parsed.number("elevation_gain"), parsed.number("elevation_loss")) {
        let unit = parsed.unit("elevation_gain").map(str::to_string);
        parsed.0.insert(
            "net_elevation_change",
            StatEntry {
                value: StatValue::Number(gain - loss),
                unit,
            },
        );
    }
    parsed
}

/// Points of a finished or temporary track file, format detected from content.
/// With `reconstruct` every stored field is returned, otherwise coordinates only.
pub fn parse_track_points(content: &str, reconstruct: bool) -> Result<TrackPoints, DecodeError> {
    TrackFormat::detect(content).decode(content, reconstruct)
}
