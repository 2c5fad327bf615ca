//! Test support: in-memory storage, a recording delivery sink and canned
//! collaborator implementations.
//!
//! Compiled into the library so both unit tests and the integration suite
//! can drive the engine end-to-end without a network or a Telegram account.

use async_trait::async_trait;
use std::fmt::Display;
use std::net::IpAddr;
use std::sync::Mutex;

use crate::core::error::{AppError, AppResult};
use crate::core::error_logger::ErrorSink;
use crate::geo::{GeoProvider, IpInfo};
use crate::storage::db::DbPool;
use crate::storage::migrations::run_migrations;
use crate::telegram::send::{MessageSink, Outbound};

/// Build a migrated in-memory database pool.
///
/// The pool is capped at one connection: every pooled handle of an in-memory
/// SQLite database is its own separate database, so a single shared
/// connection is the only way tests see one coherent store.
pub fn memory_pool() -> DbPool {
    let manager = r2d2_sqlite::SqliteConnectionManager::memory();
    let pool = match r2d2::Pool::builder().max_size(1).build(manager) {
        Ok(pool) => pool,
        Err(e) => panic!("failed to build in-memory pool: {e}"),
    };
    {
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => panic!("failed to get in-memory connection: {e}"),
        };
        if let Err(e) = run_migrations(&mut conn) {
            panic!("failed to migrate in-memory database: {e}");
        }
    }
    pool
}

/// Message sink that records every outbound message instead of sending it.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Outbound>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages sent so far, in send order.
    pub fn sent(&self) -> Vec<Outbound> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send(&self, outbound: Outbound) {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(outbound),
            Err(poisoned) => poisoned.into_inner().push(outbound),
        }
    }
}

/// Geolocation provider that answers every lookup with the same payload,
/// patched with the requested IP.
pub struct StaticGeo {
    pub info: IpInfo,
}

impl StaticGeo {
    pub fn new(info: IpInfo) -> Self {
        Self { info }
    }
}

#[async_trait]
impl GeoProvider for StaticGeo {
    async fn lookup(&self, ip: IpAddr) -> AppResult<IpInfo> {
        let mut info = self.info.clone();
        info.ip = ip.to_string();
        Ok(info)
    }
}

/// Geolocation provider that fails every lookup.
pub struct FailingGeo;

#[async_trait]
impl GeoProvider for FailingGeo {
    async fn lookup(&self, _ip: IpAddr) -> AppResult<IpInfo> {
        Err(AppError::Validation("lookup service unavailable".to_string()))
    }
}

/// Error sink that records context labels for assertions.
#[derive(Default)]
pub struct RecordingErrorSink {
    recorded: Mutex<Vec<String>>,
}

impl RecordingErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<String> {
        match self.recorded.lock() {
            Ok(recorded) => recorded.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ErrorSink for RecordingErrorSink {
    fn record(&self, context: &str, error: &dyn Display) {
        let entry = format!("{}: {}", context, error);
        match self.recorded.lock() {
            Ok(mut recorded) => recorded.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}
