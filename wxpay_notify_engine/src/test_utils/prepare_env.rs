use std::sync::atomic::{AtomicUsize, Ordering};

use log::*;

use crate::SqliteEventStore;

static DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Loads `.env.test`, starts logging and creates a migrated event store at `url`.
pub async fn prepare_test_env(url: &str) -> SqliteEventStore {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    SqliteEventStore::connect(url).await.expect("Error creating test event store")
}

/// A database URL in the system temp directory that no other test in this process uses.
pub fn random_db_url() -> String {
    let n = DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let path = std::env::temp_dir().join(format!("wxn_test_{}_{nanos}_{n}.db", std::process::id()));
    format!("sqlite://{}", path.display())
}
