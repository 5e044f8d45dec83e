//! Reconciliation driver.
//!
//! Applies the engine to every known entity once per tick and keeps the
//! report store current. Entities are independent, so one tick fans them out
//! over a worker pool; a failure on one entity never stops the others.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use dashmap::DashSet;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::engine::{Engine, EvictReason, Reconciliation};
use crate::error::{ConfigError, MonitorError};
use crate::model::{EntityId, GeoPoint, Report};
use crate::schedule::{self, DayWindow};
use crate::traits::{EntityDirectory, PositionResolver, ReportStore, ScheduleProvider};

/// Device id answered with [`DEMO_POSITION`] instead of a tracked fix.
pub const DEMO_DEVICE_ID: &str = "demo";

/// Fixed position of the demo device (Dresden).
pub const DEMO_POSITION: GeoPoint = GeoPoint::new(51.0399, 13.7300);

/// External collaborators used by the driver.
#[derive(Clone)]
pub struct Collaborators {
    pub schedule: Arc<dyn ScheduleProvider>,
    pub positions: Arc<dyn PositionResolver>,
    pub directory: Arc<dyn EntityDirectory>,
    pub store: Arc<dyn ReportStore>,
}

/// Counts of what one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Entities whose report was written.
    pub updated: usize,
    /// Entities whose report was removed.
    pub evicted: usize,
    /// Entities that are not monitorable and had no report.
    pub unmonitored: usize,
    /// Entities left untouched because of an upstream failure or an
    /// overlapping reconciliation.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Updated,
    Evicted,
    Unmonitored,
    Skipped,
}

pub struct Driver {
    engine: Engine,
    collaborators: Collaborators,
    time_zone: Tz,
    pool: rayon::ThreadPool,
    in_flight: DashSet<EntityId>,
}

impl Driver {
    pub fn new(
        engine: Engine,
        collaborators: Collaborators,
        time_zone: Tz,
        workers: usize,
    ) -> Result<Self, ConfigError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("eta-monitor-worker-{}", index))
            .build()
            .map_err(|err| ConfigError::Build {
                component: "worker pool",
                message: err.to_string(),
            })?;

        Ok(Self {
            engine,
            collaborators,
            time_zone,
            pool,
            in_flight: DashSet::new(),
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Latest report of an entity, as served to readers.
    pub fn latest_report(&self, entity_id: &str) -> Option<Report> {
        self.collaborators.store.get(entity_id)
    }

    /// Runs one reconciliation pass over every known entity.
    pub fn tick(&self, now: DateTime<Utc>) -> TickSummary {
        let entities = match self.collaborators.schedule.entities() {
            Ok(entities) => entities,
            Err(err) => {
                warn!(error = %err, "could not list entities, skipping tick");
                return TickSummary::default();
            }
        };

        let mut summary = TickSummary::default();
        let known: HashSet<&str> = entities.iter().map(String::as_str).collect();
        for entity_id in self.collaborators.store.entity_ids() {
            if !known.contains(entity_id.as_str()) {
                summary.record(self.evict(&entity_id, "entity left the schedule"));
            }
        }

        let dropped = self
            .engine
            .dwell()
            .retain_entities(|entity_id| known.contains(entity_id));
        if dropped > 0 {
            debug!(dropped, "dropped dwell records of entities that left the schedule");
        }

        let outcomes: Vec<Outcome> = self.pool.install(|| {
            entities
                .par_iter()
                .map(|entity_id| self.process(entity_id, now))
                .collect()
        });
        for outcome in outcomes {
            summary.record(outcome);
        }

        info!(
            updated = summary.updated,
            evicted = summary.evicted,
            unmonitored = summary.unmonitored,
            skipped = summary.skipped,
            "tick complete"
        );
        summary
    }

    /// Stateless evaluation of a device against one appointment.
    ///
    /// Unlike the periodic path there is no fallback position: a device
    /// without a fix is an error.
    pub fn evaluate_once(
        &self,
        device_id: &str,
        appointment_epoch_millis: i64,
        latitude: f64,
        longitude: f64,
        known_delay_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<Report, MonitorError> {
        let appointment_time = DateTime::from_timestamp_millis(appointment_epoch_millis)
            .ok_or_else(|| {
                MonitorError::InvalidRequest(format!(
                    "timestamp {} is out of range",
                    appointment_epoch_millis
                ))
            })?;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(MonitorError::InvalidRequest(format!(
                "({}, {}) is not a valid coordinate",
                latitude, longitude
            )));
        }

        let position = if device_id == DEMO_DEVICE_ID {
            DEMO_POSITION
        } else {
            self.collaborators
                .positions
                .current_position(device_id)?
                .ok_or_else(|| MonitorError::NoPositionAvailable {
                    device_id: device_id.to_string(),
                })?
        };

        self.engine.evaluate_once(
            position,
            appointment_time,
            GeoPoint::new(latitude, longitude),
            known_delay_minutes,
            now,
        )
    }

    /// Starts the periodic loop on its own thread.
    ///
    /// Ticks fire at a fixed rate of the engine's tick period. With
    /// `max_ticks` the loop ends by itself after that many ticks.
    pub fn spawn(self: Arc<Self>, max_ticks: Option<u64>) -> std::io::Result<DriverHandle> {
        let (stop, stop_rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("eta-monitor-driver".to_string())
            .spawn(move || self.run(stop_rx, max_ticks))?;

        Ok(DriverHandle { stop, thread })
    }

    fn run(&self, stop: Receiver<()>, max_ticks: Option<u64>) {
        let period = self.engine.config().tick_period;
        let mut ticks = 0u64;
        info!(period_ms = period.as_millis() as u64, "monitoring started");

        loop {
            let started = Instant::now();
            self.tick(Utc::now());
            ticks += 1;
            if max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }

            match stop.recv_timeout(period.saturating_sub(started.elapsed())) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        info!(ticks, "monitoring stopped");
    }

    fn process(&self, entity_id: &str, now: DateTime<Utc>) -> Outcome {
        let Some(_claim) = self.claim(entity_id) else {
            debug!(entity_id, "previous reconciliation still running");
            return Outcome::Skipped;
        };

        match self.reconcile_entity(entity_id, now) {
            Ok(Reconciliation::Report(report)) => {
                self.collaborators.store.put(entity_id, report);
                Outcome::Updated
            }
            Ok(Reconciliation::Evict(reason)) => self.evict(entity_id, describe(&reason)),
            Err(err) => {
                warn!(entity_id, error = %err, "skipping entity this tick");
                Outcome::Skipped
            }
        }
    }

    fn reconcile_entity(
        &self,
        entity_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Reconciliation, MonitorError> {
        let window = DayWindow::containing(now, self.time_zone);
        let appointments = schedule::open_in_order(self.collaborators.schedule.appointments(
            entity_id,
            window.start,
            window.end,
            false,
        )?);

        let dropped = self
            .engine
            .dwell()
            .retain_open(entity_id, appointments.iter().map(|a| a.id.as_str()));
        if dropped > 0 {
            debug!(entity_id, dropped, "dropped dwell records of closed appointments");
        }

        if appointments.is_empty() {
            return Ok(Reconciliation::Evict(EvictReason::NoAppointments));
        }

        let previous = self.collaborators.store.get(entity_id);
        let position = self.resolve_position(entity_id, previous.as_ref())?;
        self.engine
            .reconcile(entity_id, &appointments, position, now, previous.as_ref())
    }

    /// Live fix, else the last reported position, else the home location.
    fn resolve_position(
        &self,
        entity_id: &str,
        previous: Option<&Report>,
    ) -> Result<Option<GeoPoint>, MonitorError> {
        let directory = &self.collaborators.directory;
        let device_id = directory.device_id_for(entity_id)?;
        if let Some(fix) = self.collaborators.positions.current_position(&device_id)? {
            return Ok(Some(fix));
        }

        if let Some(report) = previous {
            debug!(entity_id, device_id = %device_id, "no live fix, using last reported position");
            return Ok(Some(report.position));
        }

        debug!(entity_id, device_id = %device_id, "no live fix, using home location");
        Ok(directory.home_location_of(entity_id)?)
    }

    fn evict(&self, entity_id: &str, reason: &str) -> Outcome {
        if self.collaborators.store.delete(entity_id).is_some() {
            info!(entity_id, reason, "monitoring will be stopped");
            Outcome::Evicted
        } else {
            Outcome::Unmonitored
        }
    }

    fn claim(&self, entity_id: &str) -> Option<Claim<'_>> {
        self.in_flight.insert(entity_id.to_string()).then(|| Claim {
            in_flight: &self.in_flight,
            entity_id: entity_id.to_string(),
        })
    }
}

impl TickSummary {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Updated => self.updated += 1,
            Outcome::Evicted => self.evicted += 1,
            Outcome::Unmonitored => self.unmonitored += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

fn describe(reason: &EvictReason) -> &'static str {
    match reason {
        EvictReason::NoAppointments => "no open appointments",
        EvictReason::NoPosition => "no position",
        EvictReason::NoTargetLocation { .. } => "appointment has no location",
    }
}

/// Marks an entity as being reconciled until dropped.
struct Claim<'a> {
    in_flight: &'a DashSet<EntityId>,
    entity_id: EntityId,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.entity_id);
    }
}

/// Handle of a running periodic loop.
pub struct DriverHandle {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

impl DriverHandle {
    /// Stops the loop after the tick in progress and waits for it.
    pub fn stop(self) {
        let _ = self.stop.send(());
        self.join();
    }

    /// Waits for the loop to end on its own.
    pub fn join(self) {
        if self.thread.join().is_err() {
            warn!("driver thread panicked");
        }
    }
}
