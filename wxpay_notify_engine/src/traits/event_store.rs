use thiserror::Error;

use crate::db_types::{EventOutcome, InsertEventResult, NewEventRecord, ProcessedEventRecord};

/// Backend contract for the deduplication store.
///
/// Both mutating calls must be atomic with respect to every other caller of the same store:
/// * [`insert_if_absent`](Self::insert_if_absent) must let exactly one of any number of concurrent callers insert a
///   given event id.
/// * [`reclaim`](Self::reclaim) is a compare-and-set: it succeeds only if the stored record still has the outcome and
///   attempt count of the `seen` snapshot.
#[allow(async_fn_in_trait)]
pub trait EventStore {
    /// Inserts a new `Pending` record for the event, unless one already exists, in which case the existing record is
    /// returned untouched.
    async fn insert_if_absent(&self, record: NewEventRecord) -> Result<InsertEventResult, EventStoreError>;

    /// Sets the outcome for a previously reserved event.
    async fn mark_outcome(&self, event_id: &str, outcome: EventOutcome)
        -> Result<ProcessedEventRecord, EventStoreError>;

    /// Moves the record back to `Pending` and increments `attempts`, provided nobody else has changed it since `seen`
    /// was read. Returns `Ok(None)` if the record has moved on.
    async fn reclaim(&self, seen: &ProcessedEventRecord) -> Result<Option<ProcessedEventRecord>, EventStoreError>;

    async fn fetch_event(&self, event_id: &str) -> Result<Option<ProcessedEventRecord>, EventStoreError>;
}

#[derive(Debug, Clone, Error)]
pub enum EventStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Event {0} has not been reserved")]
    EventNotFound(String),
}

impl From<sqlx::Error> for EventStoreError {
    fn from(e: sqlx::Error) -> Self {
        EventStoreError::DatabaseError(e.to_string())
    }
}
