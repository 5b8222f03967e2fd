use std::time::Duration;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{EventOutcome, InsertEventResult, NewEventRecord, ProcessedEventRecord},
    traits::{EventStore, EventStoreError},
    DecryptedEvent,
};

pub const DEFAULT_RESERVATION_TTL: Duration = Duration::from_secs(60);

/// The result of trying to reserve an event id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// This caller inserted the record and now owns the event.
    FirstSeen(ProcessedEventRecord),
    /// The event id was already in the store. The record is as it was when the reservation was attempted.
    AlreadySeen(ProcessedEventRecord),
}

/// Decides whether an authenticated event still needs its side effect.
///
/// Reservation is a single insert-if-absent call on the store, so of any number of concurrent deliveries of one event,
/// exactly one gets [`Reservation::FirstSeen`]. A delivery that finds a previous `Failure`, or a `Pending` record
/// whose owner has gone quiet for longer than the reservation TTL, may take the event over with
/// [`try_reclaim`](Self::try_reclaim).
pub struct EventDeduplicator<S> {
    store: S,
    reservation_ttl: chrono::Duration,
}

impl<S> EventDeduplicator<S> {
    pub fn new(store: S, reservation_ttl: Duration) -> Self {
        let reservation_ttl =
            chrono::Duration::from_std(reservation_ttl).unwrap_or_else(|_| chrono::Duration::days(365));
        Self { store, reservation_ttl }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether a `Pending` record was last touched so long ago that its owner is presumed dead.
    pub fn is_abandoned(&self, record: &ProcessedEventRecord, now: DateTime<Utc>) -> bool {
        record.outcome == EventOutcome::Pending && now - record.updated_at > self.reservation_ttl
    }
}

impl<S: EventStore> EventDeduplicator<S> {
    pub async fn check_and_reserve(&self, event: &DecryptedEvent) -> Result<Reservation, EventStoreError> {
        let mut record = NewEventRecord::new(event.event_id.as_str(), event.raw_event_type.as_str());
        record.idempotency_token = event.idempotency_token();
        match self.store.insert_if_absent(record).await? {
            InsertEventResult::Inserted(r) => {
                debug!("🧾️ Event {} reserved", r.event_id);
                Ok(Reservation::FirstSeen(r))
            },
            InsertEventResult::Existing(r) => {
                debug!("🧾️ Event {} already seen ({}, {} attempts)", r.event_id, r.outcome, r.attempts);
                Ok(Reservation::AlreadySeen(r))
            },
        }
    }

    /// Takes over an event whose previous attempt failed or was abandoned. Returns `Ok(None)` if the record is settled
    /// as a success, is still legitimately in flight, or another delivery reclaimed it first.
    pub async fn try_reclaim(
        &self,
        prior: &ProcessedEventRecord,
        now: DateTime<Utc>,
    ) -> Result<Option<ProcessedEventRecord>, EventStoreError> {
        let reclaimable = prior.outcome == EventOutcome::Failure || self.is_abandoned(prior, now);
        if !reclaimable {
            return Ok(None);
        }
        let reclaimed = self.store.reclaim(prior).await?;
        match &reclaimed {
            Some(r) => info!("🧾️ Event {} reclaimed for attempt {}", r.event_id, r.attempts),
            None => debug!("🧾️ Event {} was reclaimed by another delivery first", prior.event_id),
        }
        Ok(reclaimed)
    }

    pub async fn record_outcome(
        &self,
        event_id: &str,
        outcome: EventOutcome,
    ) -> Result<ProcessedEventRecord, EventStoreError> {
        let record = self.store.mark_outcome(event_id, outcome).await?;
        debug!("🧾️ Event {event_id} marked as {outcome}");
        Ok(record)
    }
}
