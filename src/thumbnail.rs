use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Value as JsonValue};

use crate::codec::TrackFormat;
use crate::error::DecodeError;
use crate::point::LightPoint;
use crate::stat_parser::parse_all_statistics;

/// Most points a map thumbnail is drawn from.
pub const POINTS_LIMIT: usize = 1200;

/// Keep every n-th point so that at most `limit` remain. The first point is
/// always kept.
pub fn decimate(points: &[LightPoint], limit: usize) -> Vec<LightPoint> {
    if limit == 0 {
        return Vec::new();
    }
    let step = points.len().div_ceil(limit).max(1);
    points.iter().step_by(step).copied().collect()
}

/// Convert thumbnail points to a GeoJSON FeatureCollection: a LineString for
/// two or more points, a Point for exactly one, no feature otherwise.
pub fn to_feature_collection(points: &[LightPoint], name: Option<&str>) -> FeatureCollection {
    let geometry = match points {
        [] => None,
        [point] => Some(Geometry::new(Value::Point(point_coords(point)))),
        _ => Some(Geometry::new(Value::LineString(
            points.iter().map(point_coords).collect(),
        ))),
    };

    let features = geometry
        .map(|geometry| {
            let mut props = Map::new();
            if let Some(name) = name {
                props.insert("name".to_string(), JsonValue::String(name.to_string()));
            }
            props.insert(
                "pointCount".to_string(),
                JsonValue::Number(points.len().into()),
            );
            Feature {
                bbox: None,
                geometry: Some(geometry),
                id: None,
                properties: Some(props),
                foreign_members: None,
            }
        })
        .into_iter()
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Decode a track file's coordinates and build its thumbnail collection.
/// The CSV track name, when present, becomes the feature name.
pub fn track_to_feature_collection(
    content: &str,
    limit: Option<usize>,
) -> Result<FeatureCollection, DecodeError> {
    let points = TrackFormat::detect(content).decode_light(content)?;
    let points = decimate(&points, limit.unwrap_or(POINTS_LIMIT));
    let stats = parse_all_statistics(content);
    Ok(to_feature_collection(&points, stats.text("track_name")))
}

/// [lon, lat] coordinate array.
fn point_coords(point: &LightPoint) -> Vec<f64> {
    vec![point.lon, point.lat]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<LightPoint> {
        (0..n)
            .map(|i| LightPoint {
                lat: 35.0 + i as f64 * 0.001,
                lon: 139.0,
            })
            .collect()
    }

    #[test]
    fn test_decimate_keeps_short_tracks() {
        let points = line(10);
        assert_eq!(decimate(&points, POINTS_LIMIT), points);
    }

    #[test]
    fn test_decimate_caps_long_tracks() {
        for n in [1201, 2399, 2400, 5000] {
            let points = line(n);
            let thinned = decimate(&points, POINTS_LIMIT);
            assert!(thinned.len() <= POINTS_LIMIT, "{n}: {}", thinned.len());
            assert_eq!(thinned[0], points[0]);
        }
        assert!(decimate(&line(5), 0).is_empty());
    }

    #[test]
    fn test_line_string() {
        let fc = to_feature_collection(&line(3), Some("Run"));
        assert_eq!(fc.features.len(), 1);
        let geom = fc.features[0].geometry.as_ref().unwrap();
        match &geom.value {
            Value::LineString(coords) => {
                assert_eq!(coords.len(), 3);
                // [lon, lat] order
                assert!((coords[0][0] - 139.0).abs() < 1e-10);
                assert!((coords[0][1] - 35.0).abs() < 1e-10);
            }
            _ => panic!("Expected LineString geometry"),
        }
        let props = fc.features[0].properties.as_ref().unwrap();
        assert_eq!(props["name"], "Run");
        assert_eq!(props["pointCount"], 3);
    }

    #[test]
    fn test_single_point() {
        let fc = to_feature_collection(&line(1), None);
        let geom = fc.features[0].geometry.as_ref().unwrap();
        assert!(matches!(geom.value, Value::Point(_)));
        assert!(!fc.features[0].properties.as_ref().unwrap().contains_key("name"));
    }

    #[test]
    fn test_empty() {
        assert!(to_feature_collection(&[], Some("Empty")).features.is_empty());
    }

    #[test]
    fn test_track_content() {
        let csv = "# Track Name = Dog walk\n#\nlat,lon,ele,time,speed,sat,accuracy\n\
                   50.0,8.0, , , , , \n50.1,8.1, , , , , \n";
        let fc = track_to_feature_collection(csv, None).unwrap();
        let props = fc.features[0].properties.as_ref().unwrap();
        assert_eq!(props["name"], "Dog walk");
        assert_eq!(props["pointCount"], 2);

        let fc = track_to_feature_collection(csv, Some(1)).unwrap();
        assert!(matches!(
            fc.features[0].geometry.as_ref().unwrap().value,
            Value::Point(_)
        ));
    }
}
