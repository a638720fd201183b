use serde::Serialize;

use crate::geo::haversine_distance;
use crate::point::Point;
use crate::units::format_duration;

/// Geographic bounding box of the recorded points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

/// Running trip statistics, updated once per accepted point in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct TripStatistics {
    pub total_distance_m: f64,
    pub speed_max_mps: f64,
    pub speed_avg_mps: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub total_duration_s: f64,
    pub duration_formatted: String,
    pub points_count: u64,
    speed_sum: f64,
    speed_count: u64,
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
    last_point: Option<Point>,
    last_elevation: Option<f64>,
}

impl Default for TripStatistics {
    fn default() -> Self {
        Self {
            total_distance_m: 0.0,
            speed_max_mps: 0.0,
            speed_avg_mps: 0.0,
            elevation_gain_m: 0.0,
            elevation_loss_m: 0.0,
            total_duration_s: 0.0,
            duration_formatted: format_duration(0.0),
            points_count: 0,
            speed_sum: 0.0,
            speed_count: 0,
            min_lat: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
            min_lon: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            last_point: None,
            last_elevation: None,
        }
    }
}

impl TripStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return to identity values.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn update(&mut self, point: &Point) {
        if let Some((lat, lon)) = point.position() {
            self.min_lat = self.min_lat.min(lat);
            self.max_lat = self.max_lat.max(lat);
            self.min_lon = self.min_lon.min(lon);
            self.max_lon = self.max_lon.max(lon);

            if let Some((prev_lat, prev_lon)) = self.last_point.as_ref().and_then(Point::position) {
                self.total_distance_m += haversine_distance(prev_lat, prev_lon, lat, lon);
            }
        }

        if let Some(speed) = point.speed_mps {
            if speed > self.speed_max_mps {
                self.speed_max_mps = speed;
            }
            self.speed_sum += speed;
            self.speed_count += 1;
            self.speed_avg_mps = self.speed_sum / self.speed_count as f64;
        }

        if let Some(altitude) = point.altitude_m {
            if let Some(last) = self.last_elevation {
                let diff = altitude - last;
                if diff > 0.0 {
                    self.elevation_gain_m += diff;
                } else {
                    self.elevation_loss_m += diff.abs();
                }
            }
            self.last_elevation = Some(altitude);
        }

        // Out-of-order or missing timestamps never advance the duration.
        let previous_time = self.last_point.as_ref().and_then(|p| p.time_ms_utc);
        if let (Some(t0), Some(t1)) = (previous_time, point.time_ms_utc) {
            if t1 > t0 {
                self.total_duration_s += (t1 - t0) as f64 / 1000.0;
            }
        }
        self.duration_formatted = format_duration(self.total_duration_s);

        self.points_count += 1;
        self.last_point = Some(point.clone());
    }

    /// Bounding box, or `None` while no positioned point has been seen.
    pub fn bounds(&self) -> Option<Bounds> {
        if self.points_count == 0 || self.min_lat > self.max_lat || self.min_lon > self.max_lon {
            return None;
        }
        Some(Bounds {
            min_lat: self.min_lat,
            min_lon: self.min_lon,
            max_lat: self.max_lat,
            max_lon: self.max_lon,
        })
    }

    pub fn last_point(&self) -> Option<&Point> {
        self.last_point.as_ref()
    }
}
