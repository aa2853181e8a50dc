//! News item representations, raw and digested.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::normalizer::normalize;

/// One item as returned by a news source, before any merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNewsItem {
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub source: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub collected_at: DateTime<Utc>,
}

/// The results of a single query against a news source.
#[derive(Debug, Clone, Default)]
pub struct QueryBatch {
    pub query: String,
    pub items: Vec<RawNewsItem>,
}

impl QueryBatch {
    pub fn new(query: impl Into<String>, items: Vec<RawNewsItem>) -> Self {
        Self {
            query: query.into(),
            items,
        }
    }
}

/// Collection window handed to news sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewsWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl NewsWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

/// A deduplicated story, as persisted in the `news` table.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub body: Option<String>,
    /// Outlet of the representative (earliest collected) report.
    pub source: String,
    /// Every distinct outlet that carried the story, sorted.
    pub sources: Vec<String>,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub collected_at: DateTime<Utc>,
    pub summary: Option<String>,
    pub dedup_key: String,
}

impl NewsItem {
    pub fn from_raw(raw: &RawNewsItem) -> Self {
        let source = raw.source.trim().to_string();
        let sources = if source.is_empty() {
            Vec::new()
        } else {
            vec![source.clone()]
        };
        Self {
            title: raw.title.trim().to_string(),
            body: raw.body.clone().filter(|b| !b.trim().is_empty()),
            source,
            sources,
            url: raw.url.trim().to_string(),
            published_at: raw.published_at,
            collected_at: raw.collected_at,
            summary: None,
            dedup_key: normalize(&raw.title),
        }
    }

    /// Storage uniqueness key: normalized title plus primary outlet.
    pub fn fingerprint(&self) -> String {
        format!("{}|{}", self.dedup_key, self.source.to_lowercase())
    }

    /// Title and body joined for keyword matching.
    pub fn text(&self) -> String {
        match &self.body {
            Some(body) => format!("{} {}", self.title, body),
            None => self.title.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(title: &str, source: &str) -> RawNewsItem {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 1, 0, 0).unwrap();
        RawNewsItem {
            title: title.into(),
            body: Some("  ".into()),
            source: source.into(),
            url: "https://news.example/a?utm=1".into(),
            published_at: at,
            collected_at: at,
        }
    }

    #[test]
    fn from_raw_normalizes_key_and_drops_blank_body() {
        let item = NewsItem::from_raw(&raw(" Fed holds rates - Reuters ", "Reuters"));
        assert_eq!(item.dedup_key, "fed holds rates");
        assert_eq!(item.title, "Fed holds rates - Reuters");
        assert_eq!(item.body, None);
        assert_eq!(item.sources, vec!["Reuters".to_string()]);
    }

    #[test]
    fn fingerprint_ignores_url_and_case_of_source() {
        let a = NewsItem::from_raw(&raw("Fed holds rates", "Reuters"));
        let mut b_raw = raw("FED holds rates!", "REUTERS");
        b_raw.url = "https://news.example/a?utm=2".into();
        let b = NewsItem::from_raw(&b_raw);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn raw_item_deserializes_with_defaults() {
        let json = r#"{"title":"t","url":"u","published_at":"2024-03-04T01:00:00Z","collected_at":"2024-03-04T01:05:00Z"}"#;
        let item: RawNewsItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.source, "");
        assert_eq!(item.body, None);
    }

    #[test]
    fn window_contains_is_inclusive() {
        let start = Utc.with_ymd_and_hms(2024, 3, 3, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 3, 23, 0, 0).unwrap();
        let window = NewsWindow { start, end };
        assert!(window.contains(start));
        assert!(window.contains(end));
        assert!(!window.contains(end + chrono::Duration::seconds(1)));
    }
}
