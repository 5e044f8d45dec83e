//! In-memory collaborators with knobs for failure injection.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use eta_monitor::error::{RouteError, UpstreamError};
use eta_monitor::model::{Appointment, EntityId, GeoPoint};
use eta_monitor::polyline::Polyline;
use eta_monitor::traits::{EntityDirectory, PositionResolver, RouteEstimator, ScheduleProvider};

/// Monday 2 March 2026, `hour:minute` UTC (one hour behind Berlin).
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
}

pub fn appointment(
    id: &str,
    start: DateTime<Utc>,
    minutes: i64,
    location: Option<GeoPoint>,
) -> Appointment {
    Appointment {
        id: id.to_string(),
        start,
        end: start + chrono::Duration::minutes(minutes),
        location,
        completed: false,
    }
}

pub fn device_of(entity_id: &str) -> String {
    format!("dev-{}", entity_id)
}

fn timeout(service: &'static str) -> UpstreamError {
    UpstreamError::Timeout { service }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMode {
    Ok,
    NoRoute,
    Timeout,
}

/// Estimator with a fixed travel time that counts its calls.
pub struct MockEstimator {
    travel: Mutex<Duration>,
    mode: Mutex<RouteMode>,
    pub travel_calls: AtomicUsize,
    pub multi_stop_calls: AtomicUsize,
}

impl MockEstimator {
    pub fn new(travel: Duration) -> Self {
        Self {
            travel: Mutex::new(travel),
            mode: Mutex::new(RouteMode::Ok),
            travel_calls: AtomicUsize::new(0),
            multi_stop_calls: AtomicUsize::new(0),
        }
    }

    pub fn minutes(minutes: u64) -> Self {
        Self::new(Duration::from_secs(minutes * 60))
    }

    pub fn set_travel(&self, travel: Duration) {
        *self.travel.lock().unwrap() = travel;
    }

    pub fn set_mode(&self, mode: RouteMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn multi_stop_calls(&self) -> usize {
        self.multi_stop_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), RouteError> {
        match *self.mode.lock().unwrap() {
            RouteMode::Ok => Ok(()),
            RouteMode::NoRoute => Err(RouteError::NoRoute),
            RouteMode::Timeout => Err(RouteError::Upstream(timeout("osrm"))),
        }
    }
}

impl RouteEstimator for MockEstimator {
    fn travel_time(&self, _from: GeoPoint, _to: GeoPoint) -> Result<Duration, RouteError> {
        self.travel_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(*self.travel.lock().unwrap())
    }

    fn polyline(&self, from: GeoPoint, to: GeoPoint) -> Result<Polyline, RouteError> {
        self.check()?;
        Ok(Polyline::through(&[from, to]))
    }

    fn multi_stop_route(&self, points: &[GeoPoint]) -> Result<Polyline, RouteError> {
        self.multi_stop_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(Polyline::through(points))
    }
}

/// Schedule whose appointments can be changed between ticks.
#[derive(Default)]
pub struct MockSchedule {
    appointments: Mutex<HashMap<EntityId, Vec<Appointment>>>,
    failing: Mutex<Vec<EntityId>>,
    pub listing_fails: AtomicBool,
    pub listings: AtomicUsize,
}

impl MockSchedule {
    pub fn set(&self, entity_id: &str, appointments: Vec<Appointment>) {
        self.appointments
            .lock()
            .unwrap()
            .insert(entity_id.to_string(), appointments);
    }

    pub fn remove(&self, entity_id: &str) {
        self.appointments.lock().unwrap().remove(entity_id);
    }

    pub fn complete(&self, entity_id: &str, appointment_id: &str) {
        if let Some(appointments) = self.appointments.lock().unwrap().get_mut(entity_id) {
            for appointment in appointments.iter_mut().filter(|a| a.id == appointment_id) {
                appointment.completed = true;
            }
        }
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    pub fn fail_for(&self, entity_id: &str) {
        self.failing.lock().unwrap().push(entity_id.to_string());
    }

    pub fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }
}

impl ScheduleProvider for MockSchedule {
    fn entities(&self) -> Result<Vec<EntityId>, UpstreamError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if self.listing_fails.load(Ordering::SeqCst) {
            return Err(timeout("schedule"));
        }
        let mut ids: Vec<EntityId> = self.appointments.lock().unwrap().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn appointments(
        &self,
        entity_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        completed: bool,
    ) -> Result<Vec<Appointment>, UpstreamError> {
        if self.failing.lock().unwrap().iter().any(|id| id == entity_id) {
            return Err(timeout("schedule"));
        }
        let mut appointments: Vec<Appointment> = self
            .appointments
            .lock()
            .unwrap()
            .get(entity_id)
            .map(|list| {
                list.iter()
                    .filter(|a| a.completed == completed)
                    .filter(|a| window_start <= a.start && a.start < window_end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        appointments.sort_by_key(|a| a.start);
        Ok(appointments)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Fix {
    At(GeoPoint),
    Missing,
    Timeout,
}

/// Live fixes per device; devices without an entry have no fix.
#[derive(Default)]
pub struct MockPositions {
    fixes: Mutex<HashMap<String, Fix>>,
    hold: Mutex<Option<Arc<Hold>>>,
}

struct Hold {
    device_id: String,
    entered: Sender<()>,
    release: Mutex<Receiver<()>>,
}

/// Keeps lookups of one device waiting until released or dropped.
pub struct Gate {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl Gate {
    /// Blocks until a lookup of the held device is waiting.
    pub fn wait_entered(&self) {
        self.entered
            .recv_timeout(Duration::from_secs(10))
            .expect("lookup never reached the gate");
    }

    pub fn release(self) {
        let _ = self.release.send(());
    }
}

impl MockPositions {
    pub fn set(&self, device_id: &str, fix: Fix) {
        self.fixes.lock().unwrap().insert(device_id.to_string(), fix);
    }

    /// Makes lookups of `device_id` wait on the returned gate.
    pub fn hold(&self, device_id: &str) -> Gate {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.hold.lock().unwrap() = Some(Arc::new(Hold {
            device_id: device_id.to_string(),
            entered: entered_tx,
            release: Mutex::new(release_rx),
        }));
        Gate {
            entered: entered_rx,
            release: release_tx,
        }
    }
}

impl PositionResolver for MockPositions {
    fn current_position(&self, device_id: &str) -> Result<Option<GeoPoint>, UpstreamError> {
        let hold = self.hold.lock().unwrap().clone();
        if let Some(hold) = hold.filter(|hold| hold.device_id == device_id) {
            let _ = hold.entered.send(());
            let _ = hold.release.lock().unwrap().recv();
        }

        match self.fixes.lock().unwrap().get(device_id) {
            Some(Fix::At(point)) => Ok(Some(*point)),
            Some(Fix::Timeout) => Err(timeout("tracking")),
            Some(Fix::Missing) | None => Ok(None),
        }
    }
}

/// Maps every entity to `dev-<entity>`; home locations are optional.
#[derive(Default)]
pub struct MockDirectory {
    homes: Mutex<HashMap<EntityId, GeoPoint>>,
}

impl MockDirectory {
    pub fn set_home(&self, entity_id: &str, home: GeoPoint) {
        self.homes.lock().unwrap().insert(entity_id.to_string(), home);
    }
}

impl EntityDirectory for MockDirectory {
    fn device_id_for(&self, entity_id: &str) -> Result<String, UpstreamError> {
        Ok(device_of(entity_id))
    }

    fn home_location_of(&self, entity_id: &str) -> Result<Option<GeoPoint>, UpstreamError> {
        Ok(self.homes.lock().unwrap().get(entity_id).copied())
    }
}
