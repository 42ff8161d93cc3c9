//! Metrics engine: dashboard aggregates computed on demand from stored
//! sessions and events.
//!
//! Windowed metrics read the window's rows through the store and aggregate in
//! process. The dashboard reads sessions and events in two separate calls, so
//! an event ingested between them may be counted while its session is not;
//! the two reads can be slightly stale relative to each other. A store failure
//! fails the whole call; there are no partial results.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use tracing::error;

use crate::error::{CoreError, CoreResult};
use crate::event::{Event, Session};
use crate::period::{Window, REALTIME_WINDOW_MINUTES};
use crate::store::AnalyticsStore;
use crate::traffic::TrafficSourceCounts;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_page_views: i64,
    pub total_visitors: i64,
    pub new_visitors: i64,
    pub returning_visitors: i64,
    pub avg_pages_per_session: f64,
    /// Share of sessions with exactly one page view, 0–100.
    pub bounce_rate: f64,
    /// Mean of reported durations; events without one are left out entirely.
    pub avg_duration_ms: f64,
}

impl DashboardStats {
    pub fn compute(sessions: &[Session], events: &[Event]) -> Self {
        let total_page_views = events.len() as i64;
        let total_visitors = sessions.len() as i64;
        let returning_visitors = sessions.iter().filter(|s| s.is_returning).count() as i64;
        let bounced = sessions.iter().filter(|s| s.page_views == 1).count() as i64;

        let durations: Vec<f64> = events.iter().filter_map(|e| e.duration_ms).collect();
        let avg_duration_ms = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        Self {
            total_page_views,
            total_visitors,
            new_visitors: total_visitors - returning_visitors,
            returning_visitors,
            avg_pages_per_session: ratio(total_page_views, total_visitors),
            bounce_rate: ratio(bounced, total_visitors) * 100.0,
            avg_duration_ms,
        }
    }
}

fn ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendBucket {
    pub date: NaiveDate,
    pub page_views: i64,
    pub visitors: i64,
}

#[derive(Debug, Default)]
struct DayTally {
    page_views: i64,
    sessions: HashSet<String>,
}

/// Daily event and distinct-session counts, one bucket per UTC date that has
/// at least one event.
///
/// Buckets are produced lazily by [`TrendSeries::iter`]; every call starts a
/// fresh pass in ascending date order.
#[derive(Debug, Default)]
pub struct TrendSeries {
    days: BTreeMap<NaiveDate, DayTally>,
}

impl TrendSeries {
    pub fn from_events(events: &[Event]) -> Self {
        let mut days: BTreeMap<NaiveDate, DayTally> = BTreeMap::new();
        for event in events {
            let tally = days.entry(event.created_at.date_naive()).or_default();
            tally.page_views += 1;
            tally.sessions.insert(event.session_id.clone());
        }
        Self { days }
    }

    pub fn iter(&self) -> impl Iterator<Item = TrendBucket> + '_ {
        self.days.iter().map(|(date, tally)| TrendBucket {
            date: *date,
            page_views: tally.page_views,
            visitors: tally.sessions.len() as i64,
        })
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

impl Serialize for TrendSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageCount {
    pub path: String,
    pub views: i64,
}

/// Top `limit` paths by event count, most viewed first.
///
/// Paths with equal counts come out in an implementation-defined order
/// (currently lexicographic); callers must not rely on it.
pub fn popular_pages(events: &[Event], limit: usize) -> Vec<PageCount> {
    let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
    for event in events {
        *counts.entry(event.path.as_str()).or_default() += 1;
    }
    let mut pages: Vec<PageCount> = counts
        .into_iter()
        .map(|(path, views)| PageCount {
            path: path.to_string(),
            views,
        })
        .collect();
    pages.sort_by(|a, b| b.views.cmp(&a.views));
    pages.truncate(limit);
    pages
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignStats {
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: String,
    pub visits: i64,
    pub unique_visitors: i64,
    /// `sum(duration) / visits`, where a missing duration counts as zero.
    /// Unlike [`DashboardStats::avg_duration_ms`], events without a duration
    /// stay in the denominator.
    pub avg_duration_ms: f64,
}

type CampaignKey<'a> = (Option<&'a str>, Option<&'a str>, &'a str);

#[derive(Default)]
struct CampaignTally<'a> {
    visits: i64,
    sessions: HashSet<&'a str>,
    duration_sum: f64,
}

/// Campaign attribution over events that carry a `utm_campaign`, grouped by
/// `(source, medium, campaign)` and ordered by visits, most first.
pub fn campaign_performance(events: &[Event]) -> Vec<CampaignStats> {
    let mut groups: BTreeMap<CampaignKey<'_>, CampaignTally<'_>> = BTreeMap::new();
    for event in events {
        let Some(campaign) = event.utm.campaign.as_deref() else {
            continue;
        };
        let key = (
            event.utm.source.as_deref(),
            event.utm.medium.as_deref(),
            campaign,
        );
        let tally = groups.entry(key).or_default();
        tally.visits += 1;
        tally.sessions.insert(event.session_id.as_str());
        tally.duration_sum += event.duration_ms.unwrap_or(0.0);
    }

    let mut rows: Vec<CampaignStats> = groups
        .into_iter()
        .map(|((source, medium, campaign), tally)| CampaignStats {
            utm_source: source.map(str::to_string),
            utm_medium: medium.map(str::to_string),
            utm_campaign: campaign.to_string(),
            visits: tally.visits,
            unique_visitors: tally.sessions.len() as i64,
            avg_duration_ms: tally.duration_sum / tally.visits as f64,
        })
        .collect();
    rows.sort_by(|a, b| b.visits.cmp(&a.visits));
    rows
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RealtimeUsers {
    pub active_users: i64,
    pub window_minutes: i64,
}

/// Read-only aggregate queries over an [`AnalyticsStore`].
#[derive(Clone)]
pub struct MetricsEngine {
    store: Arc<dyn AnalyticsStore>,
}

impl MetricsEngine {
    pub fn new(store: Arc<dyn AnalyticsStore>) -> Self {
        Self { store }
    }

    pub async fn dashboard_stats(&self, window: Window) -> CoreResult<DashboardStats> {
        let sessions = self.sessions_in(window).await?;
        let events = self.events_in(window).await?;
        Ok(DashboardStats::compute(&sessions, &events))
    }

    pub async fn visitor_trends(&self, window: Window) -> CoreResult<TrendSeries> {
        let events = self.events_in(window).await?;
        Ok(TrendSeries::from_events(&events))
    }

    pub async fn traffic_sources(&self, window: Window) -> CoreResult<TrafficSourceCounts> {
        let sessions = self.sessions_in(window).await?;
        Ok(TrafficSourceCounts::from_sessions(&sessions))
    }

    pub async fn popular_pages(&self, window: Window, limit: usize) -> CoreResult<Vec<PageCount>> {
        let events = self.events_in(window).await?;
        Ok(popular_pages(&events, limit))
    }

    /// Sessions seen within the last [`REALTIME_WINDOW_MINUTES`] of `now`.
    pub async fn realtime_active_users(&self, now: DateTime<Utc>) -> CoreResult<RealtimeUsers> {
        let since = now - Duration::minutes(REALTIME_WINDOW_MINUTES);
        let active_users = self
            .store
            .count_sessions_active_since(since)
            .await
            .map_err(store_failure("count_sessions_active_since"))?;
        Ok(RealtimeUsers {
            active_users,
            window_minutes: REALTIME_WINDOW_MINUTES,
        })
    }

    pub async fn campaign_performance(&self, window: Window) -> CoreResult<Vec<CampaignStats>> {
        let events = self.events_in(window).await?;
        Ok(campaign_performance(&events))
    }

    async fn sessions_in(&self, window: Window) -> CoreResult<Vec<Session>> {
        self.store
            .find_sessions_by_window(window.start, window.end)
            .await
            .map_err(store_failure("find_sessions_by_window"))
    }

    async fn events_in(&self, window: Window) -> CoreResult<Vec<Event>> {
        self.store
            .find_events_by_window(window.start, window.end)
            .await
            .map_err(store_failure("find_events_by_window"))
    }
}

fn store_failure(operation: &'static str) -> impl Fn(anyhow::Error) -> CoreError {
    move |e| {
        error!(operation, error = %e, "Metrics query failed");
        CoreError::StoreUnavailable(e)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use chrono::TimeZone;

    use super::*;
    use crate::event::{EventFields, Utm};
    use crate::store::memory::MemoryStore;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0)
            .single()
            .expect("valid date")
    }

    fn event(session_id: &str, path: &str, at: DateTime<Utc>) -> Event {
        Event {
            id: format!("{session_id}-{path}-{}", at.timestamp()),
            session_id: session_id.to_string(),
            path: path.to_string(),
            referrer: None,
            user_agent: None,
            origin_address: None,
            duration_ms: None,
            utm: Utm::default(),
            created_at: at,
        }
    }

    fn campaign_event(session_id: &str, campaign: &str, duration: Option<f64>) -> Event {
        let mut e = event(session_id, "/landing", now());
        e.utm = Utm {
            source: Some("newsletter".to_string()),
            medium: Some("email".to_string()),
            campaign: Some(campaign.to_string()),
            ..Utm::default()
        };
        e.duration_ms = duration;
        e
    }

    fn session(id: &str, page_views: i64, is_returning: bool) -> Session {
        let mut s = Session::first_view(id, None, now());
        s.page_views = page_views;
        s.is_returning = is_returning;
        s
    }

    #[test]
    fn dashboard_with_no_data_is_all_zero() {
        let stats = DashboardStats::compute(&[], &[]);
        assert_eq!(stats.total_page_views, 0);
        assert_eq!(stats.total_visitors, 0);
        assert_eq!(stats.avg_pages_per_session, 0.0);
        assert_eq!(stats.bounce_rate, 0.0);
        assert_eq!(stats.avg_duration_ms, 0.0);
    }

    #[test]
    fn dashboard_only_single_view_sessions_bounce_fully() {
        let sessions = vec![session("a", 1, false), session("b", 1, false)];
        let events = vec![event("a", "/", now()), event("b", "/", now())];
        let stats = DashboardStats::compute(&sessions, &events);
        assert_eq!(stats.bounce_rate, 100.0);
        assert_eq!(stats.avg_pages_per_session, 1.0);
    }

    #[test]
    fn dashboard_counts_and_ratios() {
        let sessions = vec![
            session("a", 1, false),
            session("b", 3, false),
            session("c", 2, true),
            session("d", 1, false),
        ];
        let mut events: Vec<Event> = (0..8).map(|i| event("a", &format!("/{i}"), now())).collect();
        events[0].duration_ms = Some(100.0);
        events[1].duration_ms = Some(300.0);

        let stats = DashboardStats::compute(&sessions, &events);
        assert_eq!(stats.total_page_views, 8);
        assert_eq!(stats.total_visitors, 4);
        assert_eq!(stats.new_visitors, 3);
        assert_eq!(stats.returning_visitors, 1);
        assert_eq!(stats.avg_pages_per_session, 2.0);
        assert_eq!(stats.bounce_rate, 50.0);
        // Only the two reported durations are averaged.
        assert_eq!(stats.avg_duration_ms, 200.0);
    }

    #[test]
    fn dashboard_tolerates_events_without_a_window_session() {
        // Session "late" was written after the sessions read, or started
        // before the window; its events still count as page views.
        let sessions = vec![session("a", 1, false)];
        let events = vec![event("a", "/", now()), event("late", "/", now())];

        let stats = DashboardStats::compute(&sessions, &events);
        assert_eq!(stats.total_page_views, 2);
        assert_eq!(stats.total_visitors, 1);
        assert_eq!(stats.avg_pages_per_session, 2.0);
        assert_eq!(stats.bounce_rate, 100.0);
    }

    #[test]
    fn trends_are_daily_ascending_and_skip_empty_days() {
        let day1 = now() - Duration::days(3);
        let day3 = now() - Duration::days(1);
        let events = vec![
            event("b", "/", day3),
            event("a", "/", day1),
            event("a", "/x", day1 + Duration::hours(1)),
            event("b", "/", day1 + Duration::hours(2)),
            event("b", "/y", day3 + Duration::minutes(5)),
        ];

        let series = TrendSeries::from_events(&events);
        let buckets: Vec<TrendBucket> = series.iter().collect();
        assert_eq!(
            buckets,
            vec![
                TrendBucket {
                    date: day1.date_naive(),
                    page_views: 3,
                    visitors: 2,
                },
                TrendBucket {
                    date: day3.date_naive(),
                    page_views: 2,
                    visitors: 1,
                },
            ]
        );

        // A second pass starts over from the first bucket.
        assert_eq!(series.iter().count(), 2);
        assert_eq!(series.iter().next().map(|b| b.date), Some(day1.date_naive()));
    }

    #[test]
    fn trends_serialize_as_a_list() {
        let series = TrendSeries::from_events(&[event("a", "/", now())]);
        let json = serde_json::to_value(&series).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!([{ "date": "2026-10-19", "page_views": 1, "visitors": 1 }])
        );
        assert_eq!(
            serde_json::to_value(TrendSeries::default()).expect("serialize"),
            serde_json::json!([])
        );
    }

    #[test]
    fn popular_pages_respects_limit_and_order() {
        let mut events = Vec::new();
        for (path, n) in [("/a", 2), ("/b", 5), ("/c", 1), ("/d", 3)] {
            for i in 0..n {
                events.push(event(&format!("s{i}"), path, now()));
            }
        }

        let top = popular_pages(&events, 3);
        assert_eq!(top.len(), 3);
        assert_eq!(
            top.iter().map(|p| p.path.as_str()).collect::<Vec<_>>(),
            vec!["/b", "/d", "/a"]
        );
        assert!(top.windows(2).all(|w| w[0].views >= w[1].views));

        assert!(popular_pages(&[], 10).is_empty());
        assert_eq!(popular_pages(&events, 10).len(), 4);
    }

    #[test]
    fn campaign_average_counts_missing_durations_as_zero() {
        let events = vec![
            campaign_event("a", "launch", Some(100.0)),
            campaign_event("b", "launch", None),
        ];

        let rows = campaign_performance(&events);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].visits, 2);
        assert_eq!(rows[0].unique_visitors, 2);
        assert_eq!(rows[0].avg_duration_ms, 50.0);

        // Dashboard over the same events ignores the missing duration.
        let stats = DashboardStats::compute(&[], &events);
        assert_eq!(stats.avg_duration_ms, 100.0);
    }

    #[test]
    fn campaigns_group_by_source_medium_campaign() {
        let mut social = campaign_event("c", "launch", Some(10.0));
        social.utm.source = Some("twitter".to_string());
        social.utm.medium = Some("social".to_string());

        let events = vec![
            campaign_event("a", "launch", Some(20.0)),
            campaign_event("a", "launch", Some(40.0)),
            campaign_event("b", "launch", None),
            social,
            campaign_event("d", "winter", None),
            event("e", "/no-campaign", now()),
        ];

        let rows = campaign_performance(&events);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].utm_campaign, "launch");
        assert_eq!(rows[0].utm_source.as_deref(), Some("newsletter"));
        assert_eq!(rows[0].visits, 3);
        assert_eq!(rows[0].unique_visitors, 2);
        assert_eq!(rows[0].avg_duration_ms, 20.0);
        assert!(rows.windows(2).all(|w| w[0].visits >= w[1].visits));
        assert_eq!(rows.iter().map(|r| r.visits).sum::<i64>(), 5);
    }

    async fn seeded_engine() -> (Arc<MemoryStore>, MetricsEngine) {
        let store = Arc::new(MemoryStore::default());
        let engine = MetricsEngine::new(store.clone());
        (store, engine)
    }

    async fn track(store: &MemoryStore, session_id: &str, referrer: Option<&str>, at: DateTime<Utc>) {
        store
            .upsert_session(session_id, referrer, at)
            .await
            .expect("upsert");
        store
            .insert_event(EventFields {
                session_id: session_id.to_string(),
                path: "/".to_string(),
                referrer: referrer.map(str::to_string),
                user_agent: None,
                origin_address: None,
                duration_ms: None,
                utm: Utm::default(),
                created_at: at,
            })
            .await
            .expect("insert");
    }

    #[tokio::test]
    async fn engine_scopes_metrics_to_window() {
        let (store, engine) = seeded_engine().await;
        track(&store, "old", None, now() - Duration::days(40)).await;
        track(&store, "g", Some("https://www.google.com/search"), now() - Duration::days(2)).await;
        track(&store, "g", None, now() - Duration::days(2) + Duration::minutes(3)).await;
        track(&store, "r", Some("https://news.example.com"), now() - Duration::hours(1)).await;

        let window = Window::last_days(now(), 30);
        let stats = engine.dashboard_stats(window).await.expect("stats");
        assert_eq!(stats.total_visitors, 2);
        assert_eq!(stats.total_page_views, 3);
        assert_eq!(stats.bounce_rate, 50.0);

        let sources = engine.traffic_sources(window).await.expect("sources");
        assert_eq!(sources.search, 1);
        assert_eq!(sources.referral, 1);
        assert_eq!(sources.total(), stats.total_visitors);

        let trends = engine.visitor_trends(window).await.expect("trends");
        assert_eq!(trends.iter().map(|b| b.page_views).sum::<i64>(), 3);
    }

    #[tokio::test]
    async fn realtime_uses_fixed_five_minute_window() {
        let (store, engine) = seeded_engine().await;
        store.put_session(Session::first_view("recent", None, now() - Duration::minutes(4)));
        store.put_session(Session::first_view("stale", None, now() - Duration::minutes(6)));

        let realtime = engine.realtime_active_users(now()).await.expect("realtime");
        assert_eq!(realtime.active_users, 1);
        assert_eq!(realtime.window_minutes, 5);
    }

    #[tokio::test]
    async fn store_failure_fails_the_whole_query() {
        let (store, engine) = seeded_engine().await;
        track(&store, "a", None, now() - Duration::hours(1)).await;
        store.fail_events.store(true, Ordering::SeqCst);

        let err = engine
            .dashboard_stats(Window::last_days(now(), 30))
            .await
            .expect_err("events unavailable");
        assert!(matches!(err, CoreError::StoreUnavailable(_)));
    }
}
