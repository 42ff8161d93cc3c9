use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Campaign attribution parameters carried by a tracking call.
///
/// Wire names are the usual query-parameter spellings (`utm_source`, ...);
/// camelCase aliases are accepted for JavaScript clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Utm {
    #[serde(rename = "utm_source", alias = "utmSource")]
    pub source: Option<String>,
    #[serde(rename = "utm_medium", alias = "utmMedium")]
    pub medium: Option<String>,
    #[serde(rename = "utm_campaign", alias = "utmCampaign")]
    pub campaign: Option<String>,
    #[serde(rename = "utm_content", alias = "utmContent")]
    pub content: Option<String>,
    #[serde(rename = "utm_term", alias = "utmTerm")]
    pub term: Option<String>,
}

/// The payload the client sends to POST /api/track.
///
/// `session_id` and `path` default to empty so a missing field reaches the
/// gateway and is rejected there with a validation error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackPayload {
    #[serde(default, alias = "sessionId")]
    pub session_id: String,
    #[serde(default)]
    pub path: String,
    pub referrer: Option<String>,
    #[serde(alias = "userAgent")]
    pub user_agent: Option<String>,
    /// Client-reported time on page, in milliseconds.
    pub duration: Option<f64>,
    #[serde(flatten)]
    pub utm: Utm,
}

/// Validated event fields handed to the store for insertion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventFields {
    pub session_id: String,
    pub path: String,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub origin_address: Option<String>,
    pub duration_ms: Option<f64>,
    #[serde(flatten)]
    pub utm: Utm,
    pub created_at: DateTime<Utc>,
}

/// A stored page view. Mirrors the `events` table columns; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub session_id: String,
    pub path: String,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub origin_address: Option<String>,
    pub duration_ms: Option<f64>,
    #[serde(flatten)]
    pub utm: Utm,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn from_fields(id: String, fields: EventFields) -> Self {
        Self {
            id,
            session_id: fields.session_id,
            path: fields.path,
            referrer: fields.referrer,
            user_agent: fields.user_agent,
            origin_address: fields.origin_address,
            duration_ms: fields.duration_ms,
            utm: fields.utm,
            created_at: fields.created_at,
        }
    }
}

/// Per-session rollup, keyed by the caller-supplied session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    /// First-touch referrer; never changed after creation.
    pub referrer: Option<String>,
    pub page_views: i64,
    pub first_visit: DateTime<Utc>,
    pub last_visit: DateTime<Utc>,
    pub is_returning: bool,
}

impl Session {
    /// A freshly created session for its first page view.
    pub fn first_view(session_id: &str, referrer: Option<&str>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.to_string(),
            referrer: referrer.map(str::to_string),
            page_views: 1,
            first_visit: now,
            last_visit: now,
            is_returning: false,
        }
    }
}

/// Explicit partial update of a [`Session`].
///
/// Every field is optional; `None` leaves the column untouched. For
/// `referrer`, `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    /// A visit seen at this time. Widens `[first_visit, last_visit]` to
    /// include it, so a late-arriving older visit never moves either bound
    /// inward.
    pub last_visit: Option<DateTime<Utc>>,
    pub page_view_increment: Option<u32>,
    pub referrer: Option<Option<String>>,
    pub is_returning: Option<bool>,
}

impl SessionPatch {
    /// The patch applied for one additional page view at `now`.
    pub fn page_view(now: DateTime<Utc>) -> Self {
        Self {
            last_visit: Some(now),
            page_view_increment: Some(1),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.last_visit.is_none()
            && self.page_view_increment.is_none()
            && self.referrer.is_none()
            && self.is_returning.is_none()
    }

    /// Apply the patch to an in-memory session, field by field.
    pub fn apply_to(&self, session: &mut Session) {
        if let Some(seen) = self.last_visit {
            session.last_visit = session.last_visit.max(seen);
            session.first_visit = session.first_visit.min(seen);
        }
        if let Some(increment) = self.page_view_increment {
            session.page_views += i64::from(increment);
        }
        if let Some(ref referrer) = self.referrer {
            session.referrer = referrer.clone();
        }
        if let Some(is_returning) = self.is_returning {
            session.is_returning = is_returning;
        }
    }
}
