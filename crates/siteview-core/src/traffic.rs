//! Referrer-based traffic-source classification.
//!
//! Rules are evaluated in order and the first match wins. Matching is a
//! case-sensitive substring test on the raw referrer string.

use serde::Serialize;

use crate::event::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficSource {
    Direct,
    Search,
    Social,
    Referral,
}

pub const SEARCH_ENGINES: &[&str] = &["google", "bing", "yahoo", "duckduckgo"];
pub const SOCIAL_NETWORKS: &[&str] = &["facebook", "twitter", "linkedin", "instagram"];

pub struct TrafficRule {
    pub source: TrafficSource,
    pub matches: fn(&str) -> bool,
}

fn is_direct(referrer: &str) -> bool {
    referrer.is_empty()
}

fn is_search(referrer: &str) -> bool {
    SEARCH_ENGINES.iter().any(|needle| referrer.contains(needle))
}

fn is_social(referrer: &str) -> bool {
    SOCIAL_NETWORKS.iter().any(|needle| referrer.contains(needle))
}

/// Ordered classification rules. Anything left unmatched is `Referral`.
pub const TRAFFIC_RULES: &[TrafficRule] = &[
    TrafficRule {
        source: TrafficSource::Direct,
        matches: is_direct,
    },
    TrafficRule {
        source: TrafficSource::Search,
        matches: is_search,
    },
    TrafficRule {
        source: TrafficSource::Social,
        matches: is_social,
    },
];

pub fn classify_referrer(referrer: Option<&str>) -> TrafficSource {
    classify_with(TRAFFIC_RULES, referrer)
}

pub fn classify_with(rules: &[TrafficRule], referrer: Option<&str>) -> TrafficSource {
    let referrer = referrer.unwrap_or("");
    rules
        .iter()
        .find(|rule| (rule.matches)(referrer))
        .map(|rule| rule.source)
        .unwrap_or(TrafficSource::Referral)
}

/// Session counts per traffic source. The four buckets partition the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrafficSourceCounts {
    pub direct: i64,
    pub search: i64,
    pub social: i64,
    pub referral: i64,
}

impl TrafficSourceCounts {
    pub fn from_sessions(sessions: &[Session]) -> Self {
        let mut counts = Self::default();
        for session in sessions {
            counts.record(classify_referrer(session.referrer.as_deref()));
        }
        counts
    }

    pub fn record(&mut self, source: TrafficSource) {
        match source {
            TrafficSource::Direct => self.direct += 1,
            TrafficSource::Search => self.search += 1,
            TrafficSource::Social => self.social += 1,
            TrafficSource::Referral => self.referral += 1,
        }
    }

    pub fn total(&self) -> i64 {
        self.direct + self.search + self.social + self.referral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn empty_and_missing_referrers_are_direct() {
        assert_eq!(classify_referrer(None), TrafficSource::Direct);
        assert_eq!(classify_referrer(Some("")), TrafficSource::Direct);
    }

    #[test]
    fn search_engines_are_search() {
        assert_eq!(
            classify_referrer(Some("https://www.google.com/search")),
            TrafficSource::Search
        );
        assert_eq!(
            classify_referrer(Some("https://duckduckgo.com/?q=rust")),
            TrafficSource::Search
        );
        assert_eq!(classify_referrer(Some("https://www.bing.com/")), TrafficSource::Search);
    }

    #[test]
    fn social_networks_are_social() {
        assert_eq!(
            classify_referrer(Some("https://www.linkedin.com/feed")),
            TrafficSource::Social
        );
        assert_eq!(classify_referrer(Some("https://twitter.com/x")), TrafficSource::Social);
    }

    #[test]
    fn everything_else_is_referral() {
        assert_eq!(
            classify_referrer(Some("https://news.example.com")),
            TrafficSource::Referral
        );
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(
            classify_referrer(Some("https://WWW.GOOGLE.COM/")),
            TrafficSource::Referral
        );
    }

    #[test]
    fn first_matching_rule_wins() {
        // Contains both a search and a social needle; search is listed first.
        assert_eq!(
            classify_referrer(Some("https://google.com/url?q=facebook.com")),
            TrafficSource::Search
        );
    }

    #[test]
    fn rules_are_replaceable() {
        fn always(_: &str) -> bool {
            true
        }
        let rules = [TrafficRule {
            source: TrafficSource::Social,
            matches: always,
        }];
        assert_eq!(classify_with(&rules, Some("")), TrafficSource::Social);
        assert_eq!(classify_with(&[], Some("https://google.com")), TrafficSource::Referral);
    }

    #[test]
    fn counts_partition_sessions() {
        let now = Utc::now();
        let sessions: Vec<Session> = [
            None,
            Some(""),
            Some("https://www.google.com/search"),
            Some("https://facebook.com/"),
            Some("https://news.example.com"),
            Some("https://blog.example.org"),
        ]
        .iter()
        .enumerate()
        .map(|(i, r)| Session::first_view(&format!("s{i}"), *r, now))
        .collect();

        let counts = TrafficSourceCounts::from_sessions(&sessions);
        assert_eq!(
            counts,
            TrafficSourceCounts {
                direct: 2,
                search: 1,
                social: 1,
                referral: 2,
            }
        );
        assert_eq!(counts.total(), sessions.len() as i64);
    }
}
