//! Query-window parsing shared by every metrics endpoint.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::{CoreError, CoreResult};

pub const DEFAULT_PERIOD_DAYS: u32 = 30;
pub const MAX_PERIOD_DAYS: u32 = 3650;

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;

/// Active-user window for the realtime metric. Independent of any period.
pub const REALTIME_WINDOW_MINUTES: i64 = 5;

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// The `days`-long window ending at `now`.
    pub fn last_days(now: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: now - Duration::days(i64::from(days)),
            end: now,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Parse a `period` query value of the form `"<N>d"` (a bare `"<N>"` is
/// read as days too). Missing or blank yields [`DEFAULT_PERIOD_DAYS`].
pub fn parse_period(raw: Option<&str>) -> CoreResult<u32> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(DEFAULT_PERIOD_DAYS),
        Some(s) => s,
    };
    let digits = raw.strip_suffix('d').unwrap_or(raw);
    let days: i64 = digits.parse().map_err(|_| {
        CoreError::validation("period", format!("expected \"<days>d\", got {raw:?}"))
    })?;
    if days < 1 {
        return Err(CoreError::validation("period", "period must be at least 1 day"));
    }
    if days > i64::from(MAX_PERIOD_DAYS) {
        return Err(CoreError::validation(
            "period",
            format!("period cannot exceed {MAX_PERIOD_DAYS} days"),
        ));
    }
    Ok(days as u32)
}

/// Parse a `limit` query value. Missing or blank yields [`DEFAULT_LIMIT`].
pub fn parse_limit(raw: Option<&str>) -> CoreResult<usize> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(DEFAULT_LIMIT),
        Some(s) => s,
    };
    let limit: i64 = raw
        .parse()
        .map_err(|_| CoreError::validation("limit", format!("limit must be an integer, got {raw:?}")))?;
    if limit < 1 || limit > MAX_LIMIT as i64 {
        return Err(CoreError::validation(
            "limit",
            format!("limit must be between 1 and {MAX_LIMIT}"),
        ));
    }
    Ok(limit as usize)
}
