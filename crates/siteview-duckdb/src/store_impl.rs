use async_trait::async_trait;
use chrono::{DateTime, Utc};

use siteview_core::event::{Event, EventFields, Session};
use siteview_core::store::AnalyticsStore;

use crate::DuckDbBackend;

#[async_trait]
impl AnalyticsStore for DuckDbBackend {
    async fn upsert_session(
        &self,
        session_id: &str,
        referrer: Option<&str>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Session> {
        crate::session::upsert_session_inner(self, session_id, referrer, now).await
    }

    async fn increment_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Session>> {
        crate::session::increment_session_inner(self, session_id, now).await
    }

    async fn get_session(&self, session_id: &str) -> anyhow::Result<Option<Session>> {
        crate::session::get_session_inner(self, session_id).await
    }

    async fn insert_event(&self, fields: EventFields) -> anyhow::Result<Event> {
        crate::events::insert_event_inner(self, fields).await
    }

    async fn find_sessions_by_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Session>> {
        crate::session::find_sessions_by_window_inner(self, start, end).await
    }

    async fn find_events_by_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Event>> {
        crate::events::find_events_by_window_inner(self, start, end).await
    }

    async fn count_sessions_active_since(&self, since: DateTime<Utc>) -> anyhow::Result<i64> {
        crate::session::count_sessions_active_since_inner(self, since).await
    }

    async fn ping(&self) -> anyhow::Result<()> {
        DuckDbBackend::ping(self).await
    }
}
