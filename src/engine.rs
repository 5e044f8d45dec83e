//! Status reconciliation engine.
//!
//! Classifies an entity as moving or at its appointment, tracks dwell time,
//! and estimates whether it reaches its next appointment on time. The engine
//! holds no per-entity state besides the dwell table; the previous report is
//! passed in by the caller.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::dwell::{DwellRecord, DwellTable};
use crate::error::{MonitorError, RouteError};
use crate::haversine::distance_m;
use crate::model::{Appointment, GeoPoint, LocationStatus, Report, TimeStatus, WorkingStatus};
use crate::polyline::Polyline;
use crate::traits::RouteEstimator;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Displacement between ticks at or above which the entity is moving.
    pub movement_threshold_m: f64,
    /// Distance to the appointment below which a stationary entity is there.
    pub proximity_threshold_m: f64,
    /// Proximity threshold of the stateless one-shot evaluation.
    pub one_shot_proximity_m: f64,
    /// Delay, in whole minutes, from which an arrival counts as delayed.
    pub delay_threshold_min: u32,
    /// Period between two reconciliations of the same entity.
    pub tick_period: StdDuration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            movement_threshold_m: 100.0,
            proximity_threshold_m: 100.0,
            one_shot_proximity_m: 100.0,
            delay_threshold_min: 5,
            tick_period: StdDuration::from_secs(15),
        }
    }
}

/// Outcome of one reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    Report(Report),
    /// The entity cannot be monitored this tick; its report must go.
    Evict(EvictReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvictReason {
    NoAppointments,
    NoPosition,
    NoTargetLocation { appointment_id: String },
}

/// Arrival estimate against a scheduled start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrival {
    pub time_status: TimeStatus,
    pub expected_time_of_arrival: DateTime<Utc>,
    pub delay_in_minutes: u32,
}

/// Classifies an expected arrival against the scheduled start.
///
/// Early arrivals are reported at the scheduled start with no delay. Late
/// ones carry the delay rounded up to whole minutes and are delayed once that
/// reaches `threshold_min`.
pub fn classify_arrival(
    expected: DateTime<Utc>,
    scheduled_start: DateTime<Utc>,
    threshold_min: u32,
) -> Arrival {
    if expected < scheduled_start {
        return Arrival {
            time_status: TimeStatus::InTime,
            expected_time_of_arrival: scheduled_start,
            delay_in_minutes: 0,
        };
    }

    let late_ms = (expected - scheduled_start).num_milliseconds();
    let delay = u32::try_from((late_ms + 59_999) / 60_000).unwrap_or(u32::MAX);
    let time_status = if delay >= threshold_min {
        TimeStatus::Delayed
    } else {
        TimeStatus::InTime
    };

    Arrival {
        time_status,
        expected_time_of_arrival: expected,
        delay_in_minutes: delay,
    }
}

/// ETA-related fields of a report.
#[derive(Debug, Clone, Default)]
struct Timing {
    route_next: Option<Polyline>,
    time_status: TimeStatus,
    expected_time_of_arrival: Option<DateTime<Utc>>,
    delay_in_minutes: u32,
}

impl Timing {
    fn carried_from(previous: Option<&Report>) -> Self {
        previous
            .map(|report| Self {
                route_next: report.route_next.clone(),
                time_status: report.time_status,
                expected_time_of_arrival: report.expected_time_of_arrival,
                delay_in_minutes: report.delay_in_minutes,
            })
            .unwrap_or_default()
    }
}

pub struct Engine {
    config: EngineConfig,
    estimator: Arc<dyn RouteEstimator>,
    dwell: DwellTable,
}

impl Engine {
    pub fn new(config: EngineConfig, estimator: Arc<dyn RouteEstimator>) -> Self {
        Self {
            config,
            estimator,
            dwell: DwellTable::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dwell(&self) -> &DwellTable {
        &self.dwell
    }

    /// Computes the next report of `entity_id`.
    ///
    /// `appointments` must be the entity's open appointments of the day in
    /// start order. Only upstream failures are returned as errors; a missing
    /// route keeps the previous ETA fields instead.
    pub fn reconcile(
        &self,
        entity_id: &str,
        appointments: &[Appointment],
        current_position: Option<GeoPoint>,
        now: DateTime<Utc>,
        previous: Option<&Report>,
    ) -> Result<Reconciliation, MonitorError> {
        let Some(current) = appointments.first() else {
            return Ok(Reconciliation::Evict(EvictReason::NoAppointments));
        };
        let Some(position) = current_position else {
            return Ok(Reconciliation::Evict(EvictReason::NoPosition));
        };
        let Some(current_location) = current.location else {
            return Ok(Reconciliation::Evict(EvictReason::NoTargetLocation {
                appointment_id: current.id.clone(),
            }));
        };

        let route_total = match previous {
            Some(report) => report.route_total.clone(),
            None if appointments.len() > 1 => self.day_route(appointments)?,
            None => None,
        };

        let location_status = self.classify_movement(position, current_location, previous);
        let mut since = match previous {
            Some(report) if report.location_status() == location_status => {
                report.working_status.since
            }
            _ => now,
        };

        let mut remaining_here = Duration::zero();
        let mut eta_target = Some(current);
        let mut dwell = None;
        if location_status == LocationStatus::AtAppointment {
            let record = self.dwell.next(&current.id, now, self.tick_period());
            since = record.since;
            remaining_here = remaining_duration(current, &record);
            eta_target = appointments.get(1);
            dwell = Some(record);
        }

        let timing = match eta_target {
            // At the last appointment of the day: nothing left to arrive at.
            None => Timing::carried_from(previous),
            Some(target) => match target.location {
                None => {
                    debug!(entity_id, appointment_id = %target.id, "next appointment has no location");
                    Timing::carried_from(previous)
                }
                Some(target_location) => {
                    match self.estimate(position, target_location, target.start, now, remaining_here) {
                        Ok(timing) => timing,
                        Err(MonitorError::NoRouteFound) => {
                            debug!(entity_id, appointment_id = %target.id, "no route, keeping previous eta");
                            Timing::carried_from(previous)
                        }
                        Err(err) => return Err(err),
                    }
                }
            },
        };

        // Only a tick that produces a report counts as time spent on site.
        if let Some(record) = dwell {
            self.dwell.commit(entity_id, &current.id, record);
        }

        Ok(Reconciliation::Report(Report {
            position,
            route_total,
            route_next: timing.route_next,
            working_status: WorkingStatus {
                location_status,
                since,
            },
            time_status: timing.time_status,
            expected_time_of_arrival: timing.expected_time_of_arrival,
            delay_in_minutes: timing.delay_in_minutes,
        }))
    }

    /// Stateless evaluation of one device against one appointment.
    ///
    /// No hysteresis and no dwell tracking; `known_delay_minutes` is added to
    /// the travel time.
    pub fn evaluate_once(
        &self,
        device_position: GeoPoint,
        appointment_time: DateTime<Utc>,
        appointment_location: GeoPoint,
        known_delay_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<Report, MonitorError> {
        let location_status =
            if distance_m(device_position, appointment_location) < self.config.one_shot_proximity_m {
                LocationStatus::AtAppointment
            } else {
                LocationStatus::OnTheMove
            };

        let timing = match self.estimate(
            device_position,
            appointment_location,
            appointment_time,
            now,
            Duration::minutes(i64::from(known_delay_minutes)),
        ) {
            Ok(timing) => timing,
            Err(MonitorError::NoRouteFound) => Timing::default(),
            Err(err) => return Err(err),
        };

        Ok(Report {
            position: device_position,
            route_total: None,
            route_next: timing.route_next,
            working_status: WorkingStatus {
                location_status,
                since: now,
            },
            time_status: timing.time_status,
            expected_time_of_arrival: timing.expected_time_of_arrival,
            delay_in_minutes: timing.delay_in_minutes,
        })
    }

    fn classify_movement(
        &self,
        position: GeoPoint,
        appointment_location: GeoPoint,
        previous: Option<&Report>,
    ) -> LocationStatus {
        let moved = previous
            .map(|report| distance_m(report.position, position))
            .unwrap_or(0.0);
        if moved >= self.config.movement_threshold_m {
            return LocationStatus::OnTheMove;
        }

        if distance_m(position, appointment_location) < self.config.proximity_threshold_m {
            LocationStatus::AtAppointment
        } else {
            LocationStatus::OnTheMove
        }
    }

    /// Route across every appointment of the day, if they all have a location.
    fn day_route(&self, appointments: &[Appointment]) -> Result<Option<Polyline>, MonitorError> {
        let Some(stops) = appointments
            .iter()
            .map(|appointment| appointment.location)
            .collect::<Option<Vec<_>>>()
        else {
            return Ok(None);
        };

        match self.estimator.multi_stop_route(&stops) {
            Ok(route) => Ok(Some(route)),
            Err(RouteError::NoRoute) => Ok(None),
            Err(RouteError::Upstream(err)) => Err(err.into()),
        }
    }

    fn estimate(
        &self,
        from: GeoPoint,
        to: GeoPoint,
        scheduled_start: DateTime<Utc>,
        now: DateTime<Utc>,
        extra: Duration,
    ) -> Result<Timing, MonitorError> {
        let travel = self.estimator.travel_time(from, to)?;
        let route_next = self.estimator.polyline(from, to)?;

        let expected = Duration::from_std(travel)
            .ok()
            .and_then(|travel| now.checked_add_signed(travel))
            .and_then(|arrival| arrival.checked_add_signed(extra))
            .ok_or(MonitorError::NoRouteFound)?;
        let arrival = classify_arrival(expected, scheduled_start, self.config.delay_threshold_min);

        Ok(Timing {
            route_next: Some(route_next),
            time_status: arrival.time_status,
            expected_time_of_arrival: Some(arrival.expected_time_of_arrival),
            delay_in_minutes: arrival.delay_in_minutes,
        })
    }

    fn tick_period(&self) -> Duration {
        Duration::from_std(self.config.tick_period).unwrap_or(Duration::zero())
    }
}

/// Scheduled duration left at an appointment, never negative.
fn remaining_duration(appointment: &Appointment, record: &DwellRecord) -> Duration {
    let spent = record.minutes_present.round() as i64;
    Duration::minutes((appointment.duration().num_minutes() - spent).max(0))
}
