use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db_types::{EventOutcome, InsertEventResult, NewEventRecord, ProcessedEventRecord},
    traits::EventStoreError,
};

const SELECT_EVENT: &str = r#"SELECT event_id, event_type, outcome, attempts, idempotency_token, first_seen_at,
    updated_at FROM processed_events WHERE event_id = ?"#;

pub async fn idempotent_insert(
    record: NewEventRecord,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<InsertEventResult, EventStoreError> {
    let record = record.into_record(now);
    let result = sqlx::query(
        r#"INSERT INTO processed_events
        (event_id, event_type, outcome, attempts, idempotency_token, first_seen_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&record.event_id)
    .bind(&record.event_type)
    .bind(record.outcome.to_string())
    .bind(record.attempts)
    .bind(&record.idempotency_token)
    .bind(record.first_seen_at)
    .bind(record.updated_at)
    .execute(&mut *conn)
    .await;
    match result {
        Ok(_) => Ok(InsertEventResult::Inserted(record)),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let existing = fetch_event(&record.event_id, conn)
                .await?
                .ok_or_else(|| EventStoreError::DatabaseError(format!("Event {} vanished", record.event_id)))?;
            Ok(InsertEventResult::Existing(existing))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn update_outcome(
    event_id: &str,
    outcome: EventOutcome,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<ProcessedEventRecord, EventStoreError> {
    let result = sqlx::query("UPDATE processed_events SET outcome = ?, updated_at = ? WHERE event_id = ?")
        .bind(outcome.to_string())
        .bind(now)
        .bind(event_id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(EventStoreError::EventNotFound(event_id.to_string()));
    }
    fetch_event(event_id, conn).await?.ok_or_else(|| EventStoreError::EventNotFound(event_id.to_string()))
}

/// Moves `seen` back to `Pending` only if outcome and attempts are unchanged in the table.
pub async fn reclaim(
    seen: &ProcessedEventRecord,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<ProcessedEventRecord>, EventStoreError> {
    let result = sqlx::query(
        r#"UPDATE processed_events SET outcome = ?, attempts = attempts + 1, updated_at = ?
        WHERE event_id = ? AND outcome = ? AND attempts = ?"#,
    )
    .bind(EventOutcome::Pending.to_string())
    .bind(now)
    .bind(&seen.event_id)
    .bind(seen.outcome.to_string())
    .bind(seen.attempts)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return match fetch_event(&seen.event_id, conn).await? {
            Some(_) => Ok(None),
            None => Err(EventStoreError::EventNotFound(seen.event_id.clone())),
        };
    }
    fetch_event(&seen.event_id, conn).await
}

pub async fn fetch_event(
    event_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<ProcessedEventRecord>, EventStoreError> {
    let record = sqlx::query_as(SELECT_EVENT).bind(event_id).fetch_optional(conn).await?;
    Ok(record)
}
