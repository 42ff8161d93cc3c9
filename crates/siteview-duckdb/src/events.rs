use anyhow::Result;
use chrono::{DateTime, SubsecRound, Utc};

use siteview_core::event::{Event, EventFields, Utm};

use crate::backend::{format_ts, parse_ts};
use crate::DuckDbBackend;

/// Append one page view. The id is assigned here (UUID v4); `created_at` is
/// stored at microsecond precision and the returned event matches the row.
pub(crate) async fn insert_event_inner(db: &DuckDbBackend, mut fields: EventFields) -> Result<Event> {
    fields.created_at = fields.created_at.trunc_subsecs(6);
    let id = uuid::Uuid::new_v4().to_string();

    let conn = db.conn.lock().await;
    conn.execute(
        r#"INSERT INTO events (
            id, session_id, path, referrer, user_agent, origin_address, duration_ms,
            utm_source, utm_medium, utm_campaign, utm_content, utm_term,
            created_at
        ) VALUES (
            ?1,  ?2,  ?3,  ?4,  ?5,  ?6,  ?7,
            ?8,  ?9,  ?10, ?11, ?12,
            ?13
        )"#,
        duckdb::params![
            id,
            fields.session_id,
            fields.path,
            fields.referrer,
            fields.user_agent,
            fields.origin_address,
            fields.duration_ms,
            fields.utm.source,
            fields.utm.medium,
            fields.utm.campaign,
            fields.utm.content,
            fields.utm.term,
            format_ts(fields.created_at),
        ],
    )?;
    drop(conn);

    tracing::debug!(event_id = %id, session_id = %fields.session_id, "Event stored");
    Ok(Event::from_fields(id, fields))
}

/// Raw `events` row; `created_at` still in DuckDB text form.
struct EventRow {
    id: String,
    session_id: String,
    path: String,
    referrer: Option<String>,
    user_agent: Option<String>,
    origin_address: Option<String>,
    duration_ms: Option<f64>,
    utm: Utm,
    created_at: String,
}

impl EventRow {
    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            path: row.get(2)?,
            referrer: row.get(3)?,
            user_agent: row.get(4)?,
            origin_address: row.get(5)?,
            duration_ms: row.get(6)?,
            utm: Utm {
                source: row.get(7)?,
                medium: row.get(8)?,
                campaign: row.get(9)?,
                content: row.get(10)?,
                term: row.get(11)?,
            },
            created_at: row.get(12)?,
        })
    }

    fn into_event(self) -> Result<Event> {
        Ok(Event {
            id: self.id,
            session_id: self.session_id,
            path: self.path,
            referrer: self.referrer,
            user_agent: self.user_agent,
            origin_address: self.origin_address,
            duration_ms: self.duration_ms,
            utm: self.utm,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

pub(crate) async fn find_events_by_window_inner(
    db: &DuckDbBackend,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Event>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(
        "SELECT id, session_id, path, referrer, user_agent, origin_address, duration_ms, \
                utm_source, utm_medium, utm_campaign, utm_content, utm_term, \
                CAST(created_at AS VARCHAR) \
         FROM events \
         WHERE created_at >= CAST(?1 AS TIMESTAMP) AND created_at < CAST(?2 AS TIMESTAMP) \
         ORDER BY created_at",
    )?;
    let rows = stmt.query_map(
        duckdb::params![format_ts(start), format_ts(end)],
        EventRow::from_row,
    )?;

    let mut events = Vec::new();
    for row in rows {
        events.push(row?.into_event()?);
    }
    Ok(events)
}
