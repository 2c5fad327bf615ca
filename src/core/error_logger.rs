//! Error sink
//!
//! The engine reports non-fatal failures (lookup errors, storage hiccups,
//! malformed stored payloads) through an injected sink rather than a global,
//! so tests can observe them and so persistence of error records stays an
//! implementation detail of one sink rather than part of the control flow.

use std::fmt::Display;
use std::sync::Arc;

use crate::storage::db::DbPool;
use crate::storage::get_connection;

/// Destination for non-fatal errors the engine swallows.
pub trait ErrorSink: Send + Sync {
    /// Record one error with a short human-readable context label.
    fn record(&self, context: &str, error: &dyn Display);
}

/// Production sink: logs the error and persists it to the `err_logs` table.
///
/// Persistence failures are logged and dropped — the sink must never turn a
/// swallowed error into a new failure path.
pub struct DbErrorSink {
    db: Arc<DbPool>,
}

impl DbErrorSink {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }
}

impl ErrorSink for DbErrorSink {
    fn record(&self, context: &str, error: &dyn Display) {
        log::error!("{}: {}", context, error);

        match get_connection(&self.db) {
            Ok(conn) => {
                let result = conn.execute(
                    "INSERT INTO err_logs (context, error) VALUES (?1, ?2)",
                    rusqlite::params![context, error.to_string()],
                );
                if let Err(e) = result {
                    log::warn!("Failed to persist error record: {}", e);
                }
            }
            Err(e) => log::warn!("Failed to get DB connection for error record: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::memory_pool;

    #[test]
    fn record_inserts_err_log_row() {
        let pool = Arc::new(memory_pool());
        let sink = DbErrorSink::new(Arc::clone(&pool));

        sink.record("unit test", &"boom");

        let conn = get_connection(&pool).expect("get connection");
        let (context, error): (String, String) = conn
            .query_row("SELECT context, error FROM err_logs", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .expect("one err_logs row");
        assert_eq!(context, "unit test");
        assert_eq!(error, "boom");
    }
}
