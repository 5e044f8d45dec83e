//! Dwell tracking: how long an entity has been present at an appointment.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::model::EntityId;

/// Presence record of one appointment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DwellRecord {
    /// First instant the entity was seen at the appointment.
    pub since: DateTime<Utc>,
    /// Minutes accumulated over the ticks spent there.
    pub minutes_present: f64,
}

#[derive(Debug)]
struct Entry {
    entity_id: EntityId,
    record: DwellRecord,
}

/// Dwell records keyed by appointment id.
///
/// Each appointment belongs to one entity, and entities are reconciled by a
/// single writer at a time, so a key is never updated concurrently.
#[derive(Debug, Default)]
pub struct DwellTable {
    entries: DashMap<String, Entry>,
}

impl DwellTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record after one more tick of presence at `appointment_id`, not yet
    /// stored.
    ///
    /// A fresh record starts with zero minutes; an existing one gains `tick`.
    pub fn next(&self, appointment_id: &str, now: DateTime<Utc>, tick: Duration) -> DwellRecord {
        let tick_minutes = tick.num_milliseconds() as f64 / 60_000.0;
        match self.get(appointment_id) {
            Some(record) => DwellRecord {
                minutes_present: record.minutes_present + tick_minutes,
                ..record
            },
            None => DwellRecord {
                since: now,
                minutes_present: 0.0,
            },
        }
    }

    /// Stores `record` for `appointment_id`, replacing any previous one.
    pub fn commit(&self, entity_id: &str, appointment_id: &str, record: DwellRecord) {
        self.entries.insert(
            appointment_id.to_string(),
            Entry {
                entity_id: entity_id.to_string(),
                record,
            },
        );
    }

    pub fn get(&self, appointment_id: &str) -> Option<DwellRecord> {
        self.entries.get(appointment_id).map(|entry| entry.record)
    }

    pub fn remove(&self, appointment_id: &str) -> Option<DwellRecord> {
        self.entries.remove(appointment_id).map(|(_, entry)| entry.record)
    }

    /// Drops the records of `entity_id` whose appointment is not in `open_ids`
    /// any more. Returns the number of dropped records.
    pub fn retain_open<'a>(
        &self,
        entity_id: &str,
        open_ids: impl IntoIterator<Item = &'a str>,
    ) -> usize {
        let open: Vec<&str> = open_ids.into_iter().collect();
        let before = self.entries.len();
        self.entries.retain(|appointment_id, entry| {
            entry.entity_id != entity_id || open.contains(&appointment_id.as_str())
        });
        before.saturating_sub(self.entries.len())
    }

    /// Drops the records of every entity for which `keep` is false. Returns
    /// the number of dropped records.
    pub fn retain_entities(&self, keep: impl Fn(&str) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| keep(&entry.entity_id));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
