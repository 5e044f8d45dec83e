//! Data model shared by the engine, the driver and the collaborator adapters.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::polyline::Polyline;

/// Identifier of a monitored entity (field worker or device owner).
pub type EntityId = String;

/// A geographic position in degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Coordinates as a `(lat, lng)` pair, the order used by [`Polyline`].
    pub fn lat_lng(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

/// A scheduled appointment of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    /// Stable identifier, also the key of the dwell tracker.
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Target location. Without it the entity cannot be monitored.
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub completed: bool,
}

impl Appointment {
    /// Scheduled duration, never negative.
    pub fn duration(&self) -> Duration {
        (self.end - self.start).max(Duration::zero())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationStatus {
    OnTheMove,
    AtAppointment,
    #[default]
    Unknown,
}

/// Location status together with the instant it was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingStatus {
    pub location_status: LocationStatus,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeStatus {
    InTime,
    Delayed,
    #[default]
    Unknown,
}

/// Latest computed state of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub position: GeoPoint,
    /// Route across every appointment of the day, computed once per
    /// monitoring session.
    pub route_total: Option<Polyline>,
    /// Route from the current position to the appointment the ETA refers to.
    pub route_next: Option<Polyline>,
    pub working_status: WorkingStatus,
    pub time_status: TimeStatus,
    pub expected_time_of_arrival: Option<DateTime<Utc>>,
    pub delay_in_minutes: u32,
}

impl Report {
    pub fn location_status(&self) -> LocationStatus {
        self.working_status.location_status
    }
}
