use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::Connection;
use tokio::sync::Mutex;
use tracing::info;

use crate::schema::init_sql;

/// Storage format for `TIMESTAMP` parameters. DuckDB keeps microseconds.
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
/// Read format for `CAST(ts AS VARCHAR)`; the fraction is omitted on whole seconds.
const TS_READ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, TS_READ_FORMAT)
        .with_context(|| format!("invalid timestamp from DuckDB: {raw}"))?;
    Ok(naive.and_utc())
}

/// A DuckDB backend for Siteview sessions and events.
///
/// DuckDB is single-writer: concurrent reads are fine, but concurrent writes
/// cause contention. We wrap the connection in `Arc<Mutex<_>>` so every
/// statement runs under the lock while the struct stays cheap to share across
/// Axum handlers.
///
/// Memory and thread limits are enforced by [`init_sql`] at open time.
pub struct DuckDbBackend {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl DuckDbBackend {
    /// Open (or create) a DuckDB database file at `path`.
    ///
    /// `memory_limit` is a DuckDB size string such as `"1GB"` or `"512MB"`.
    /// Runs the schema init SQL so all tables and indexes exist.
    pub fn open(path: &str, memory_limit: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(&init_sql(memory_limit))?;
        info!(
            "DuckDB opened at {} with memory_limit={}, threads=2",
            path, memory_limit
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an **in-memory** DuckDB database.
    ///
    /// Intended for tests only: data is discarded when the struct is dropped.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&init_sql("1GB"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute `SELECT 1` as a lightweight liveness check.
    ///
    /// Called by the `/health` endpoint. Returns an error if the connection
    /// is unavailable (file locked, disk full, etc.).
    pub async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }

    /// Acquire the DuckDB connection lock for direct queries.
    ///
    /// Intended for integration tests that need to verify stored data.
    /// Production code should use the typed methods.
    pub async fn conn_for_test(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn timestamps_round_trip_through_duckdb_text() {
        let ts = Utc
            .with_ymd_and_hms(2026, 10, 19, 8, 30, 15)
            .single()
            .expect("valid date")
            + Duration::microseconds(250);
        assert_eq!(format_ts(ts), "2026-10-19 08:30:15.000250");
        assert_eq!(parse_ts(&format_ts(ts)).expect("parse"), ts);
    }

    #[test]
    fn whole_second_timestamps_parse_without_fraction() {
        let parsed = parse_ts("2026-10-19 08:30:15").expect("parse");
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 15)
                .single()
                .expect("valid date")
        );
    }

    #[test]
    fn garbage_timestamp_is_an_error() {
        assert!(parse_ts("yesterday").is_err());
    }

    #[tokio::test]
    async fn in_memory_backend_answers_ping() {
        let db = DuckDbBackend::open_in_memory().expect("db");
        db.ping().await.expect("ping");
    }
}
