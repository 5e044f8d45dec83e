//! Collaborator seams of the monitor.
//!
//! The engine and the driver only see these traits. Concrete adapters
//! (OSRM, the tracking service, a fleet file, an in-memory store) implement
//! them; tests implement them with fixtures.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{RouteError, UpstreamError};
use crate::model::{Appointment, EntityId, GeoPoint, Report};
use crate::polyline::Polyline;

/// Source of entities and their appointments.
pub trait ScheduleProvider: Send + Sync {
    /// Entities currently known to the schedule.
    fn entities(&self) -> Result<Vec<EntityId>, UpstreamError>;

    /// Appointments of `entity_id` starting in `[window_start, window_end)`
    /// whose completion flag equals `completed`, ordered by start time.
    fn appointments(
        &self,
        entity_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        completed: bool,
    ) -> Result<Vec<Appointment>, UpstreamError>;
}

/// Live position source.
pub trait PositionResolver: Send + Sync {
    /// Current fix of a device. `Ok(None)` when there is no fix or it is stale.
    fn current_position(&self, device_id: &str) -> Result<Option<GeoPoint>, UpstreamError>;
}

/// Identity mapping between entities and devices, plus home locations.
pub trait EntityDirectory: Send + Sync {
    fn device_id_for(&self, entity_id: &str) -> Result<String, UpstreamError>;

    /// Last-resort position when neither a live fix nor a previous report exist.
    fn home_location_of(&self, entity_id: &str) -> Result<Option<GeoPoint>, UpstreamError>;
}

/// Travel-time and geometry oracle.
pub trait RouteEstimator: Send + Sync {
    fn travel_time(&self, from: GeoPoint, to: GeoPoint) -> Result<Duration, RouteError>;

    fn polyline(&self, from: GeoPoint, to: GeoPoint) -> Result<Polyline, RouteError>;

    /// Route visiting `points` in order.
    fn multi_stop_route(&self, points: &[GeoPoint]) -> Result<Polyline, RouteError>;
}

/// Table of the latest report per entity.
///
/// Implementations must be linearizable per key: `get` never observes a
/// partially written report.
pub trait ReportStore: Send + Sync {
    fn get(&self, entity_id: &str) -> Option<Report>;

    /// Replaces any previous report of `entity_id`.
    fn put(&self, entity_id: &str, report: Report);

    fn delete(&self, entity_id: &str) -> Option<Report>;

    fn contains(&self, entity_id: &str) -> bool;

    fn entity_ids(&self) -> Vec<EntityId>;
}
