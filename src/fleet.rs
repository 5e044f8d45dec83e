//! Fleet file: schedules and directory entries read from JSON.
//!
//! Stands in for the calendar and identity services in deployments that
//! have neither.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{ConfigError, UpstreamError};
use crate::model::{Appointment, EntityId, GeoPoint};
use crate::schedule;
use crate::traits::{EntityDirectory, ScheduleProvider};

const SERVICE: &str = "fleet";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetEntity {
    pub id: EntityId,
    pub device_id: String,
    #[serde(default)]
    pub home: Option<GeoPoint>,
    #[serde(default)]
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticFleet {
    entities: Vec<FleetEntity>,
}

impl StaticFleet {
    pub fn new(entities: Vec<FleetEntity>) -> Self {
        Self { entities }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    fn entity(&self, entity_id: &str) -> Result<&FleetEntity, UpstreamError> {
        self.entities
            .iter()
            .find(|entity| entity.id == entity_id)
            .ok_or_else(|| UpstreamError::NotFound {
                service: SERVICE,
                key: format!("entity {}", entity_id),
            })
    }
}

impl ScheduleProvider for StaticFleet {
    fn entities(&self) -> Result<Vec<EntityId>, UpstreamError> {
        Ok(self.entities.iter().map(|entity| entity.id.clone()).collect())
    }

    fn appointments(
        &self,
        entity_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        completed: bool,
    ) -> Result<Vec<Appointment>, UpstreamError> {
        let mut appointments = self
            .entity(entity_id)?
            .appointments
            .iter()
            .filter(|a| a.completed == completed)
            .filter(|a| window_start <= a.start && a.start < window_end)
            .cloned()
            .collect::<Vec<_>>();
        if !completed {
            appointments = schedule::open_in_order(appointments);
        } else {
            appointments.sort_by_key(|a| a.start);
        }
        Ok(appointments)
    }
}

impl EntityDirectory for StaticFleet {
    fn device_id_for(&self, entity_id: &str) -> Result<String, UpstreamError> {
        Ok(self.entity(entity_id)?.device_id.clone())
    }

    fn home_location_of(&self, entity_id: &str) -> Result<Option<GeoPoint>, UpstreamError> {
        Ok(self.entity(entity_id)?.home)
    }
}
