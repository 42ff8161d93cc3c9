//! Ingestion gateway: validates tracking calls and writes them to the store.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, error, warn};

use crate::error::{CoreError, CoreResult};
use crate::event::{Event, EventFields, TrackPayload, Utm};
use crate::store::AnalyticsStore;

#[derive(Clone)]
pub struct IngestionGateway {
    store: Arc<dyn AnalyticsStore>,
}

impl IngestionGateway {
    pub fn new(store: Arc<dyn AnalyticsStore>) -> Self {
        Self { store }
    }

    /// Record one page view at the current time.
    pub async fn record(
        &self,
        payload: TrackPayload,
        origin_address: Option<String>,
    ) -> CoreResult<Event> {
        self.record_at(payload, origin_address, Utc::now()).await
    }

    /// Record one page view at `now`.
    ///
    /// The session is upserted before the event is appended. A failed upsert
    /// writes nothing and returns [`CoreError::StoreUnavailable`]; a failed
    /// append after a successful upsert returns [`CoreError::PartialWrite`].
    pub async fn record_at(
        &self,
        payload: TrackPayload,
        origin_address: Option<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<Event> {
        // Stored timestamps carry microsecond precision.
        let now = now.trunc_subsecs(6);
        let fields = validate(payload, origin_address, now).inspect_err(|e| {
            warn!(error = %e, "Rejected tracking call");
        })?;

        let session = self
            .store
            .upsert_session(&fields.session_id, fields.referrer.as_deref(), now)
            .await
            .map_err(|e| {
                error!(session_id = %fields.session_id, error = %e, "Session upsert failed");
                CoreError::StoreUnavailable(e)
            })?;
        debug!(
            session_id = %session.session_id,
            page_views = session.page_views,
            "Session upserted"
        );

        let session_id = fields.session_id.clone();
        self.store.insert_event(fields).await.map_err(|e| {
            error!(session_id = %session_id, error = %e, "Event insert failed after session upsert");
            CoreError::PartialWrite {
                session_id,
                source: e,
            }
        })
    }
}

/// Check required fields and normalise optional ones into [`EventFields`].
pub fn validate(
    payload: TrackPayload,
    origin_address: Option<String>,
    now: DateTime<Utc>,
) -> CoreResult<EventFields> {
    let session_id = payload.session_id.trim();
    if session_id.is_empty() {
        return Err(CoreError::validation("session_id", "session_id is required"));
    }
    let path = payload.path.trim();
    if path.is_empty() {
        return Err(CoreError::validation("path", "path is required"));
    }
    if let Some(duration) = payload.duration {
        if !duration.is_finite() || duration < 0.0 {
            return Err(CoreError::validation(
                "duration",
                "duration must be a non-negative number of milliseconds",
            ));
        }
    }

    Ok(EventFields {
        session_id: session_id.to_string(),
        path: path.to_string(),
        referrer: non_blank(payload.referrer),
        user_agent: non_blank(payload.user_agent),
        origin_address: non_blank(origin_address),
        duration_ms: payload.duration,
        utm: Utm {
            source: non_blank(payload.utm.source),
            medium: non_blank(payload.utm.medium),
            campaign: non_blank(payload.utm.campaign),
            content: non_blank(payload.utm.content),
            term: non_blank(payload.utm.term),
        },
        created_at: now,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
