//! In-memory report store.

use dashmap::DashMap;

use crate::model::{EntityId, Report};
use crate::traits::ReportStore;

/// Report table backed by a sharded concurrent map.
///
/// Every operation holds the shard lock of its key, so readers never see a
/// partially replaced report.
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    reports: DashMap<EntityId, Report>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

impl ReportStore for InMemoryReportStore {
    fn get(&self, entity_id: &str) -> Option<Report> {
        self.reports.get(entity_id).map(|entry| entry.value().clone())
    }

    fn put(&self, entity_id: &str, report: Report) {
        self.reports.insert(entity_id.to_string(), report);
    }

    fn delete(&self, entity_id: &str) -> Option<Report> {
        self.reports.remove(entity_id).map(|(_, report)| report)
    }

    fn contains(&self, entity_id: &str) -> bool {
        self.reports.contains_key(entity_id)
    }

    fn entity_ids(&self) -> Vec<EntityId> {
        self.reports.iter().map(|entry| entry.key().clone()).collect()
    }
}
