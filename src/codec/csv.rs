use super::{BLANK, RawPoint, TrackMetadata, encode_time, fixed, non_blank, single_line, summary_lines};
use crate::error::DecodeError;
use crate::point::Point;
use crate::statistics::TripStatistics;
use crate::units::utc_ms_to_gpx_time;

pub const COLUMN_HEADER: &str = "lat,lon,ele,time,speed,sat,accuracy";

const COLUMNS: usize = 7;

/// Encode a point as a fixed 7-column row.
pub(crate) fn encode_point(point: &Point) -> String {
    let (lat, lon) = match point.position() {
        Some((lat, lon)) => (Some(fixed(lat)), Some(fixed(lon))),
        None => (None, None),
    };
    let columns = [
        lat,
        lon,
        point.altitude_m.map(fixed),
        encode_time(point.time_ms_utc),
        point.speed_mps.map(fixed),
        point.satellites_used_in_fix.map(|s| s.to_string()),
        point.accuracy_m.map(fixed),
    ];
    columns
        .iter()
        .map(|c| c.as_deref().unwrap_or(BLANK))
        .collect::<Vec<_>>()
        .join(",")
}

/// `#`-prefixed metadata block, separator comment and column header row.
pub(crate) fn render_header(stats: &TripStatistics, meta: &TrackMetadata) -> String {
    let mut header = String::new();
    for line in summary_lines(None, stats, meta) {
        header.push_str(&format!("# {line}\n"));
    }
    if let Some(b) = stats.bounds() {
        header.push_str(&format!(
            "# Bounds: {}, {} to {}, {}\n",
            fixed(b.min_lat),
            fixed(b.min_lon),
            fixed(b.max_lat),
            fixed(b.max_lon)
        ));
    }
    header.push_str(&format!("# Track Name = {}\n", single_line(&meta.track_name)));
    if let Some(time) = meta.start_time_ms.and_then(utc_ms_to_gpx_time) {
        header.push_str(&format!("# Start Time = {time}\n"));
    }
    header.push_str("#\n");
    header.push_str(COLUMN_HEADER);
    header.push('\n');
    header
}

/// Rows of a temporary file (bare rows) or a finished file (comments and
/// column header first). Blank lines are ignored.
pub(crate) fn raw_points(content: &str) -> Result<Vec<RawPoint>, DecodeError> {
    let mut points = Vec::new();

    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with(|c: char| c.is_ascii_alphabetic()) {
            let normalized: String = line.chars().filter(|c| !c.is_whitespace()).collect();
            if normalized == COLUMN_HEADER {
                continue;
            }
            return Err(DecodeError::UnexpectedHeader(line.to_string()));
        }

        let columns: Vec<&str> = line.split(',').collect();
        if columns.len() != COLUMNS {
            return Err(DecodeError::ColumnCount {
                line: number + 1,
                found: columns.len(),
            });
        }

        points.push(RawPoint {
            lat: non_blank(columns[0]),
            lon: non_blank(columns[1]),
            ele: non_blank(columns[2]),
            time: non_blank(columns[3]),
            speed: non_blank(columns[4]),
            sat: non_blank(columns[5]),
            accuracy: non_blank(columns[6]),
        });
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::UnitSystem;

    #[test]
    fn test_row_layout() {
        let point = Point {
            altitude_m: Some(100.0),
            time_ms_utc: Some(0),
            satellites_used_in_fix: Some(4),
            ..Point::new(50.0, 8.0)
        };
        assert_eq!(
            encode_point(&point),
            "50.0000000000000000,8.0000000000000000,100.0000000000000000,1970-01-01T00:00:00Z, ,4, "
        );
        assert_eq!(encode_point(&Point::default()), " , , , , , , ");
    }

    #[test]
    fn test_header_layout() {
        let mut stats = TripStatistics::new();
        stats.update(&Point::new(50.0, 8.0));
        let meta = TrackMetadata {
            creator: "track-recorder".to_string(),
            units: UnitSystem::Imperial,
            activity: None,
            track_name: "Evening".to_string(),
            start_time_ms: Some(0),
            link: String::new(),
        };
        let header = render_header(&stats, &meta);
        let lines: Vec<&str> = header.lines().collect();
        assert_eq!(lines[0], "# Created with track-recorder");
        assert_eq!(lines[1], "# Units = imperial");
        assert_eq!(lines[2], "# Track = 1 TrackPoints");
        assert_eq!(lines[3], "# Track Statistics:");
        assert_eq!(lines[4], "# Distance = 0 ft");
        assert_eq!(lines[5], "# Duration = 00:00:00");
        assert_eq!(lines[8], "# Max Speed = 0 mi/h");
        assert!(lines[10].starts_with("# Bounds: 50.0000000000000000, 8.0000000000000000 to "));
        assert_eq!(lines[11], "# Track Name = Evening");
        assert_eq!(lines[12], "# Start Time = 1970-01-01T00:00:00Z");
        assert_eq!(lines[13], "#");
        assert_eq!(lines[14], COLUMN_HEADER);
        assert!(!header.contains("Activity"));
        assert!(!header.contains("GPX Version"));
    }

    #[test]
    fn test_finished_file_rows() {
        let content = "# Units = metric\n#\nlat, lon, ele, time, speed, sat, accuracy\n\n50.0,8.0, ,2025-01-01T00:00:00Z, , , \n";
        let raw = raw_points(content).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].lat.as_deref(), Some("50.0"));
        assert_eq!(raw[0].ele, None);
        assert_eq!(raw[0].time.as_deref(), Some("2025-01-01T00:00:00Z"));
    }

    #[test]
    fn test_truncated_row_fails() {
        let content = "50.0,8.0, ,2025-01-01T00:00:00Z, , , \n50.1,8.1,12";
        let err = raw_points(content).unwrap_err();
        assert!(matches!(err, DecodeError::ColumnCount { line: 2, found: 3 }));
    }

    #[test]
    fn test_foreign_header_fails() {
        let err = raw_points("time,lat,lon\n").unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedHeader(_)));
    }
}
