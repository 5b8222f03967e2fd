use std::fmt::Debug;

use chrono::Utc;
use log::*;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite, SqlitePool};

use super::{events, new_pool, DEFAULT_MAX_CONNECTIONS};
use crate::{
    db_types::{EventOutcome, InsertEventResult, NewEventRecord, ProcessedEventRecord},
    traits::{EventStore, EventStoreError},
};

/// A durable [`EventStore`] backed by SQLite. Clones share the connection pool.
#[derive(Clone)]
pub struct SqliteEventStore {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteEventStore ({})", self.url)
    }
}

impl SqliteEventStore {
    /// Connects to an existing database without touching its schema.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, EventStoreError> {
        trace!("🗃️ Creating new event store connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Creates the database if it does not exist, connects, and brings the schema up to date.
    pub async fn connect(url: &str) -> Result<Self, EventStoreError> {
        if !Sqlite::database_exists(url).await? {
            info!("🗃️ Creating event store database {url}");
            Sqlite::create_database(url).await?;
        }
        let store = Self::new_with_url(url, DEFAULT_MAX_CONNECTIONS).await?;
        migrate!("./src/db/sqlite/migrations")
            .run(&store.pool)
            .await
            .map_err(|e| EventStoreError::DatabaseError(format!("Migrations failed. {e}")))?;
        debug!("🗃️ Event store migrations complete");
        Ok(store)
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl EventStore for SqliteEventStore {
    async fn insert_if_absent(&self, record: NewEventRecord) -> Result<InsertEventResult, EventStoreError> {
        let mut conn = self.pool.acquire().await?;
        events::idempotent_insert(record, Utc::now(), &mut conn).await
    }

    async fn mark_outcome(
        &self,
        event_id: &str,
        outcome: EventOutcome,
    ) -> Result<ProcessedEventRecord, EventStoreError> {
        let mut conn = self.pool.acquire().await?;
        events::update_outcome(event_id, outcome, Utc::now(), &mut conn).await
    }

    async fn reclaim(&self, seen: &ProcessedEventRecord) -> Result<Option<ProcessedEventRecord>, EventStoreError> {
        let mut conn = self.pool.acquire().await?;
        events::reclaim(seen, Utc::now(), &mut conn).await
    }

    async fn fetch_event(&self, event_id: &str) -> Result<Option<ProcessedEventRecord>, EventStoreError> {
        let mut conn = self.pool.acquire().await?;
        events::fetch_event(event_id, &mut conn).await
    }
}
