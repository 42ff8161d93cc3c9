use chrono::{DateTime, Utc};
use serde::Deserialize;

use siteview_core::period::{parse_limit, parse_period, Window};

use crate::error::AppError;

/// Query string shared by the analytics endpoints.
///
/// Both values stay raw strings so malformed input surfaces as a
/// `validation_error` naming the field instead of a generic extractor error.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    /// Window length in days, e.g. `30` or `30d`.
    pub period: Option<String>,
    pub limit: Option<String>,
}

impl AnalyticsQuery {
    /// The `[now - period, now)` window this query asks for.
    pub fn window(&self, now: DateTime<Utc>) -> Result<Window, AppError> {
        let days = parse_period(self.period.as_deref())?;
        Ok(Window::last_days(now, days))
    }

    pub fn limit(&self) -> Result<usize, AppError> {
        Ok(parse_limit(self.limit.as_deref())?)
    }
}
