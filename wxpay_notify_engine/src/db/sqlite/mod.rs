//! SQLite event store.
//!
//! The `processed_events` table has `event_id` as its primary key, so insert-if-absent is a plain `INSERT` whose
//! unique-constraint violation means "already seen". Migrations are embedded and run by
//! [`SqliteEventStore::connect`].
mod db;
mod events;

pub use db::SqliteEventStore;
use log::info;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    info!("🗃️ Opening event store database at {url}");
    SqlitePoolOptions::new().max_connections(max_connections).connect(url).await
}
