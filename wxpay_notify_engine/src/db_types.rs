use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------   EventOutcome    ---------------------------------------------------------
/// The state of a reserved event id.
///
/// `Pending` means a handler has reserved the event and is (or was, if it crashed) running the business callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
pub enum EventOutcome {
    Pending,
    Success,
    Failure,
}

impl Display for EventOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Success => write!(f, "Success"),
            Self::Failure => write!(f, "Failure"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid event outcome: {0}")]
pub struct ConversionError(String);

impl FromStr for EventOutcome {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Success" => Ok(Self::Success),
            "Failure" => Ok(Self::Failure),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

//--------------------------------------  ProcessedEventRecord  ------------------------------------------------------
/// The durable marker that an event id has been seen.
///
/// Records are never deleted by the engine. The outcome moves `Pending -> Success | Failure`, and a `Failure` (or an
/// abandoned `Pending`) can be reclaimed back to `Pending` for another attempt, which bumps `attempts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ProcessedEventRecord {
    pub event_id: String,
    pub event_type: String,
    pub outcome: EventOutcome,
    pub attempts: i64,
    pub idempotency_token: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessedEventRecord {
    pub fn is_settled(&self) -> bool {
        self.outcome != EventOutcome::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEventRecord {
    pub event_id: String,
    pub event_type: String,
    pub idempotency_token: Option<String>,
}

impl NewEventRecord {
    pub fn new<S: Into<String>, T: Into<String>>(event_id: S, event_type: T) -> Self {
        Self { event_id: event_id.into(), event_type: event_type.into(), idempotency_token: None }
    }

    pub fn with_idempotency_token<S: Into<String>>(mut self, token: S) -> Self {
        self.idempotency_token = Some(token.into());
        self
    }

    /// A fresh `Pending` record for this event, stamped with `now`.
    pub fn into_record(self, now: DateTime<Utc>) -> ProcessedEventRecord {
        ProcessedEventRecord {
            event_id: self.event_id,
            event_type: self.event_type,
            outcome: EventOutcome::Pending,
            attempts: 1,
            idempotency_token: self.idempotency_token,
            first_seen_at: now,
            updated_at: now,
        }
    }
}

/// The result of an insert-if-absent call against an [`crate::EventStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertEventResult {
    Inserted(ProcessedEventRecord),
    Existing(ProcessedEventRecord),
}
