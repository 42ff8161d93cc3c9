//! Storage abstraction for sessions and page-view events.

use chrono::{DateTime, Utc};

use crate::event::{Event, EventFields, Session};

/// Session tracker and event recorder behind one interface.
///
/// Implementations hold no business logic: classification and aggregation
/// live in [`crate::metrics`]. Time ranges are half-open `[start, end)`.
#[async_trait::async_trait]
pub trait AnalyticsStore: Send + Sync + 'static {
    /// Create the session with one page view, or count another page view on
    /// the existing one. Must be a single atomic create-or-increment so that
    /// concurrent calls for the same id neither lose increments nor create
    /// duplicate rows. `referrer` is only used on creation.
    async fn upsert_session(
        &self,
        session_id: &str,
        referrer: Option<&str>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Session>;

    /// Count one more page view on an existing session. `Ok(None)` when the
    /// session does not exist.
    async fn increment_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Session>>;

    async fn get_session(&self, session_id: &str) -> anyhow::Result<Option<Session>>;

    async fn insert_event(&self, fields: EventFields) -> anyhow::Result<Event>;

    /// Sessions whose `first_visit` falls in `[start, end)`.
    async fn find_sessions_by_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Session>>;

    /// Events whose `created_at` falls in `[start, end)`.
    async fn find_events_by_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Event>>;

    /// Number of sessions with `last_visit >= since`.
    async fn count_sessions_active_since(&self, since: DateTime<Utc>) -> anyhow::Result<i64>;

    /// Lightweight liveness check.
    async fn ping(&self) -> anyhow::Result<()>;
}
