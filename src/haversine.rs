//! Great-circle distance and a straight-line route estimator.
//!
//! The estimator ignores roads, so it is less accurate than OSRM, but it is
//! always available.

use std::time::Duration;

use crate::error::RouteError;
use crate::model::GeoPoint;
use crate::polyline::Polyline;
use crate::traits::RouteEstimator;

/// Average driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in metres.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two points in metres.
///
/// Zero for identical points and symmetric in its arguments.
pub fn distance_m(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1_rad = from.latitude.to_radians();
    let lat2_rad = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lng = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Route estimator that travels in straight lines at a fixed speed.
#[derive(Debug, Clone)]
pub struct HaversineEstimator {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineEstimator {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineEstimator {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    fn metres_to_duration(&self, metres: f64) -> Duration {
        let hours = metres / 1000.0 / self.speed_kmh;
        Duration::from_secs((hours * 3600.0).round() as u64)
    }
}

impl RouteEstimator for HaversineEstimator {
    fn travel_time(&self, from: GeoPoint, to: GeoPoint) -> Result<Duration, RouteError> {
        Ok(self.metres_to_duration(distance_m(from, to)))
    }

    fn polyline(&self, from: GeoPoint, to: GeoPoint) -> Result<Polyline, RouteError> {
        Ok(Polyline::through(&[from, to]))
    }

    fn multi_stop_route(&self, points: &[GeoPoint]) -> Result<Polyline, RouteError> {
        if points.len() < 2 {
            return Err(RouteError::NoRoute);
        }
        Ok(Polyline::through(points))
    }
}
