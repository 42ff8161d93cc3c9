use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use duckdb::Connection;

use siteview_core::event::{Session, SessionPatch};

use crate::backend::{format_ts, parse_ts};
use crate::DuckDbBackend;

const SESSION_COLUMNS: &str = "session_id, referrer, page_views, \
     CAST(first_visit AS VARCHAR), CAST(last_visit AS VARCHAR), is_returning";

/// Raw `sessions` row; timestamps still in DuckDB text form.
struct SessionRow {
    session_id: String,
    referrer: Option<String>,
    page_views: i64,
    first_visit: String,
    last_visit: String,
    is_returning: bool,
}

impl SessionRow {
    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            session_id: row.get(0)?,
            referrer: row.get(1)?,
            page_views: row.get(2)?,
            first_visit: row.get(3)?,
            last_visit: row.get(4)?,
            is_returning: row.get(5)?,
        })
    }

    fn into_session(self) -> Result<Session> {
        Ok(Session {
            session_id: self.session_id,
            referrer: self.referrer,
            page_views: self.page_views,
            first_visit: parse_ts(&self.first_visit)?,
            last_visit: parse_ts(&self.last_visit)?,
            is_returning: self.is_returning,
        })
    }
}

fn select_session(conn: &Connection, session_id: &str) -> Result<Option<Session>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    match stmt.query_row(duckdb::params![session_id], SessionRow::from_row) {
        Ok(row) => Ok(Some(row.into_session()?)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Create the session with one page view or count another one.
///
/// A single `INSERT ... ON CONFLICT DO UPDATE` statement: the increment runs
/// inside the statement, so there is no read-modify-write window and a racing
/// first event cannot create a second row. Requests may reach the lock out of
/// order, so the visit bounds only ever widen. `referrer` and `is_returning`
/// are only written on insert.
pub(crate) async fn upsert_session_inner(
    db: &DuckDbBackend,
    session_id: &str,
    referrer: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Session> {
    let conn = db.conn.lock().await;
    let now_str = format_ts(now);

    conn.execute(
        "INSERT INTO sessions (session_id, referrer, page_views, first_visit, last_visit, is_returning) \
         VALUES (?1, ?2, 1, ?3, ?4, false) \
         ON CONFLICT (session_id) DO UPDATE SET \
             page_views = sessions.page_views + 1, \
             first_visit = LEAST(sessions.first_visit, EXCLUDED.first_visit), \
             last_visit = GREATEST(sessions.last_visit, EXCLUDED.last_visit)",
        duckdb::params![session_id, referrer, now_str, now_str],
    )?;

    select_session(&conn, session_id)?
        .ok_or_else(|| anyhow!("session {session_id} missing after upsert"))
}

/// Apply a [`SessionPatch`] to one session, field by field.
///
/// Returns `Ok(None)` when the session does not exist. An empty patch only
/// reads the current row.
pub async fn apply_session_patch(
    db: &DuckDbBackend,
    session_id: &str,
    patch: &SessionPatch,
) -> Result<Option<Session>> {
    let conn = db.conn.lock().await;
    if patch.is_empty() {
        return select_session(&conn, session_id);
    }

    let mut assignments: Vec<String> = Vec::new();
    let mut params: Vec<Box<dyn duckdb::types::ToSql>> = Vec::new();
    let mut idx = 1;

    if let Some(seen) = patch.last_visit {
        assignments.push(format!(
            "last_visit = GREATEST(last_visit, CAST(?{idx} AS TIMESTAMP)), \
             first_visit = LEAST(first_visit, CAST(?{idx} AS TIMESTAMP))"
        ));
        params.push(Box::new(format_ts(seen)));
        idx += 1;
    }
    if let Some(increment) = patch.page_view_increment {
        assignments.push(format!("page_views = page_views + ?{}", idx));
        params.push(Box::new(i64::from(increment)));
        idx += 1;
    }
    if let Some(ref referrer) = patch.referrer {
        assignments.push(format!("referrer = ?{}", idx));
        params.push(Box::new(referrer.clone()));
        idx += 1;
    }
    if let Some(is_returning) = patch.is_returning {
        assignments.push(format!("is_returning = ?{}", idx));
        params.push(Box::new(is_returning));
        idx += 1;
    }
    params.push(Box::new(session_id.to_string()));

    let sql = format!(
        "UPDATE sessions SET {} WHERE session_id = ?{}",
        assignments.join(", "),
        idx
    );
    let param_refs: Vec<&dyn duckdb::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let changed = conn.execute(&sql, param_refs.as_slice())?;
    if changed == 0 {
        return Ok(None);
    }
    select_session(&conn, session_id)
}

pub(crate) async fn increment_session_inner(
    db: &DuckDbBackend,
    session_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Session>> {
    apply_session_patch(db, session_id, &SessionPatch::page_view(now)).await
}

pub(crate) async fn get_session_inner(
    db: &DuckDbBackend,
    session_id: &str,
) -> Result<Option<Session>> {
    let conn = db.conn.lock().await;
    select_session(&conn, session_id)
}

pub(crate) async fn find_sessions_by_window_inner(
    db: &DuckDbBackend,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Session>> {
    let conn = db.conn.lock().await;
    let sql = format!(
        "SELECT {SESSION_COLUMNS} FROM sessions \
         WHERE first_visit >= CAST(?1 AS TIMESTAMP) AND first_visit < CAST(?2 AS TIMESTAMP) \
         ORDER BY first_visit"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        duckdb::params![format_ts(start), format_ts(end)],
        SessionRow::from_row,
    )?;

    let mut sessions = Vec::new();
    for row in rows {
        sessions.push(row?.into_session()?);
    }
    Ok(sessions)
}

pub(crate) async fn count_sessions_active_since_inner(
    db: &DuckDbBackend,
    since: DateTime<Utc>,
) -> Result<i64> {
    let conn = db.conn.lock().await;
    let count: i64 = conn
        .prepare("SELECT COUNT(*) FROM sessions WHERE last_visit >= CAST(?1 AS TIMESTAMP)")?
        .query_row(duckdb::params![format_ts(since)], |row| row.get(0))?;
    Ok(count)
}
