/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// All statements use `IF NOT EXISTS` so they are safe to re-run on every
/// startup.
///
/// `memory_limit` comes from `Config.duckdb_memory_limit`
/// (env `SITEVIEW_DUCKDB_MEMORY`, default `"1GB"`). Always set an explicit
/// limit: the DuckDB default (80% of system RAM) is not acceptable for a
/// server process.
///
/// NOTE: `sessions.first_visit`, `last_visit` and `page_views` are rewritten
/// by the `ON CONFLICT DO UPDATE` upsert, and DuckDB refuses to assign columns
/// that an index references in that clause. Keep them out of secondary
/// indexes; session window scans run over the whole table.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- SESSIONS (rollup, upserted on each event)
-- ===========================================
-- One row per caller-supplied session id. The primary key makes the
-- create-or-increment upsert idempotent under concurrent first events.
CREATE TABLE IF NOT EXISTS sessions (
    session_id      VARCHAR PRIMARY KEY,
    referrer        VARCHAR,                       -- first-touch referrer, never updated
    page_views      BIGINT NOT NULL DEFAULT 1,     -- incremented in-statement on upsert
    first_visit     TIMESTAMP NOT NULL,
    last_visit      TIMESTAMP NOT NULL,
    is_returning    BOOLEAN NOT NULL DEFAULT false
);
-- Older databases carried an index on first_visit, which blocks the upsert.
DROP INDEX IF EXISTS idx_sessions_first_visit;

-- ===========================================
-- EVENTS (append-only page views)
-- ===========================================
CREATE TABLE IF NOT EXISTS events (
    id              VARCHAR PRIMARY KEY,           -- UUID v4
    session_id      VARCHAR NOT NULL,
    path            VARCHAR NOT NULL,
    referrer        VARCHAR,
    user_agent      VARCHAR,
    origin_address  VARCHAR,
    duration_ms     DOUBLE,                        -- client-reported time on page

    -- UTM parameters
    utm_source      VARCHAR,
    utm_medium      VARCHAR,
    utm_campaign    VARCHAR,
    utm_content     VARCHAR,
    utm_term        VARCHAR,

    created_at      TIMESTAMP NOT NULL
    -- NOTE: no FOREIGN KEY on session_id. Events outlive any session
    -- bookkeeping and the session row is always written first.
);

-- Primary query pattern: date range
CREATE INDEX IF NOT EXISTS idx_events_created_at
    ON events(created_at);

-- Accelerates per-session lookups
CREATE INDEX IF NOT EXISTS idx_events_session
    ON events(session_id, created_at);

-- Accelerates campaign attribution
CREATE INDEX IF NOT EXISTS idx_events_campaign
    ON events(utm_campaign, created_at);
"#
    )
}
