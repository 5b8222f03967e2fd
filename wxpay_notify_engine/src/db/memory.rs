use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::Utc;
use log::*;

use crate::{
    db_types::{EventOutcome, InsertEventResult, NewEventRecord, ProcessedEventRecord},
    traits::{EventStore, EventStoreError},
};

/// A process-local event store.
///
/// Every operation runs under one mutex, which makes insert-if-absent and reclaim trivially atomic. Records are lost
/// on restart, so this suits a single instance whose provider retries are a safety net rather than the only copy of
/// the data, and tests. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventStore {
    events: Arc<Mutex<HashMap<String, ProcessedEventRecord>>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ProcessedEventRecord>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventStore for MemoryEventStore {
    async fn insert_if_absent(&self, record: NewEventRecord) -> Result<InsertEventResult, EventStoreError> {
        let mut events = self.lock();
        if let Some(existing) = events.get(&record.event_id) {
            return Ok(InsertEventResult::Existing(existing.clone()));
        }
        let record = record.into_record(Utc::now());
        events.insert(record.event_id.clone(), record.clone());
        trace!("🗃️ Event {} stored in memory", record.event_id);
        Ok(InsertEventResult::Inserted(record))
    }

    async fn mark_outcome(
        &self,
        event_id: &str,
        outcome: EventOutcome,
    ) -> Result<ProcessedEventRecord, EventStoreError> {
        let mut events = self.lock();
        let record = events.get_mut(event_id).ok_or_else(|| EventStoreError::EventNotFound(event_id.to_string()))?;
        record.outcome = outcome;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn reclaim(&self, seen: &ProcessedEventRecord) -> Result<Option<ProcessedEventRecord>, EventStoreError> {
        let mut events = self.lock();
        let Some(record) = events.get_mut(&seen.event_id) else {
            return Err(EventStoreError::EventNotFound(seen.event_id.clone()));
        };
        if record.outcome != seen.outcome || record.attempts != seen.attempts {
            return Ok(None);
        }
        record.outcome = EventOutcome::Pending;
        record.attempts += 1;
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn fetch_event(&self, event_id: &str) -> Result<Option<ProcessedEventRecord>, EventStoreError> {
        Ok(self.lock().get(event_id).cloned())
    }
}
