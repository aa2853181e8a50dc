//! Validated pipeline settings assembled from configuration.

use std::path::PathBuf;

use super::digest::DigestConfig;
use super::ledger::LedgerConfig;
use super::performance::AggregationPolicy;
use super::relevance::DEFAULT_WATCHLIST_BOOST;
use super::retry::RetryPolicy;
use super::security::Watchlist;
use super::selector::SelectionConfig;

/// Queries used when the configuration names none.
pub const DEFAULT_NEWS_QUERIES: &[&str] = &[
    "미국 증시",
    "나스닥",
    "S&P500",
    "연준 금리",
    "달러 환율",
    "유가",
    "엔비디아",
    "반도체",
    "AI",
    "한국 증시",
    "외국인 수급",
    "삼성전자",
    "SK하이닉스",
];

pub const DEFAULT_LOOKBACK_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsProviderKind {
    Dummy,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketProviderKind {
    Dummy,
    Csv,
}

/// How the morning collection window is placed around `as_of`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsWindowMode {
    /// Previous day 18:00 to 08:00 KST on the cycle date.
    Overnight,
    /// The given number of hours up to `as_of`.
    Lookback { hours: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewsSettings {
    pub provider: NewsProviderKind,
    pub path: Option<PathBuf>,
    pub queries: Vec<String>,
    pub window: NewsWindowMode,
    pub fallback_to_dummy: bool,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            provider: NewsProviderKind::Dummy,
            path: None,
            queries: DEFAULT_NEWS_QUERIES.iter().map(|q| q.to_string()).collect(),
            window: NewsWindowMode::Overnight,
            fallback_to_dummy: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoringSettings {
    pub watchlist: Watchlist,
    pub watchlist_boost: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            watchlist: Watchlist::default(),
            watchlist_boost: DEFAULT_WATCHLIST_BOOST,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketSettings {
    pub provider: MarketProviderKind,
    pub path: Option<PathBuf>,
    pub fallback_to_dummy: bool,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            provider: MarketProviderKind::Dummy,
            path: None,
            fallback_to_dummy: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub news: NewsSettings,
    pub digest: DigestConfig,
    pub scoring: ScoringSettings,
    pub selection: SelectionConfig,
    pub ledger: LedgerConfig,
    pub market: MarketSettings,
    pub aggregation: AggregationPolicy,
    pub retry: RetryPolicy,
}
