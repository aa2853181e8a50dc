#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use newswatch::domain::error::NewswatchError;
use newswatch::domain::news::{NewsWindow, RawNewsItem};
use newswatch::domain::quote::{DailyQuote, Quote, QuoteSource};
use newswatch::domain::retry::RetryPolicy;
use newswatch::domain::settings::PipelineConfig;
use newswatch::ports::news_port::NewsPort;
use newswatch::ports::quote_port::QuotePort;
use std::cell::Cell;
use std::collections::HashMap;

pub struct MockNewsPort {
    pub name: String,
    pub by_query: HashMap<String, Vec<RawNewsItem>>,
    pub failing: bool,
    pub calls: Cell<usize>,
}

impl MockNewsPort {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            by_query: HashMap::new(),
            failing: false,
            calls: Cell::new(0),
        }
    }

    pub fn with_items(mut self, query: &str, items: Vec<RawNewsItem>) -> Self {
        self.by_query.insert(query.to_string(), items);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }
}

impl NewsPort for MockNewsPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, query: &str, window: &NewsWindow) -> Result<Vec<RawNewsItem>, NewswatchError> {
        self.calls.set(self.calls.get() + 1);
        if self.failing {
            return Err(NewswatchError::Fetch {
                source_name: self.name.clone(),
                reason: "connection refused".into(),
            });
        }
        Ok(self
            .by_query
            .get(query)
            .map(|items| {
                items
                    .iter()
                    .filter(|i| window.contains(i.published_at))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub struct MockQuotePort {
    pub source: QuoteSource,
    pub quotes: HashMap<String, DailyQuote>,
    pub failing: bool,
    pub calls: Cell<usize>,
}

impl MockQuotePort {
    pub fn new(source: QuoteSource) -> Self {
        Self {
            source,
            quotes: HashMap::new(),
            failing: false,
            calls: Cell::new(0),
        }
    }

    pub fn with_quote(mut self, quote: DailyQuote) -> Self {
        self.quotes.insert(quote.quote.code.clone(), quote);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }
}

impl QuotePort for MockQuotePort {
    fn source(&self) -> QuoteSource {
        self.source.clone()
    }

    fn fetch_quote(&self, code: &str, date: NaiveDate) -> Result<DailyQuote, NewswatchError> {
        self.calls.set(self.calls.get() + 1);
        if self.failing {
            return Err(NewswatchError::Fetch {
                source_name: self.source.tag().to_string(),
                reason: "timeout".into(),
            });
        }
        self.quotes
            .get(code)
            .cloned()
            .ok_or_else(|| NewswatchError::QuoteUnavailable {
                code: code.to_string(),
                date,
                reason: "no row".into(),
            })
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

/// A raw item published `hours_before` the given instant.
pub fn raw_item(title: &str, source: &str, at: DateTime<Utc>, hours_before: i64) -> RawNewsItem {
    let published_at = at - Duration::hours(hours_before);
    RawNewsItem {
        title: title.to_string(),
        body: None,
        source: source.to_string(),
        url: format!("https://news.example/{}", title.chars().count()),
        published_at,
        collected_at: published_at + Duration::minutes(3),
    }
}

pub fn daily_quote(
    code: &str,
    on: NaiveDate,
    open: f64,
    close: f64,
    prior_close: f64,
    source: QuoteSource,
) -> DailyQuote {
    DailyQuote {
        quote: Quote {
            code: code.to_string(),
            date: on,
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: 1_000_000,
            change_rate: Some((close / prior_close - 1.0) * 100.0),
        },
        prior_close: Some(prior_close),
        source,
    }
}

/// Defaults with no retry delay and a small digest minimum.
pub fn test_config(queries: &[&str]) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.news.queries = queries.iter().map(|q| q.to_string()).collect();
    config.digest.min_digest_size = 1;
    config.retry = RetryPolicy::with_delay(std::time::Duration::ZERO);
    config
}
