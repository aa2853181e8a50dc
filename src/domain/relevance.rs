//! Relevance scoring: which securities does a news item concern, and how much.
//!
//! Extraction is pluggable through [`RelevanceStrategy`]. The scorer itself
//! enforces the contract every strategy shares: scores live in [0, 1], only
//! catalog securities are linked, and the watchlist boost never pushes a
//! score past 1. An out-of-range score is an invariant violation unless the
//! strategy fails closed, in which case the offending pair is dropped.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::error::NewswatchError;
use super::news::NewsItem;
use super::quality::freshness;
use super::security::{mentions, SecurityCatalog, Watchlist};
use crate::ports::completion_port::CompletionPort;

pub const DEFAULT_WATCHLIST_BOOST: f64 = 0.2;

const TITLE_NAME: f64 = 1.0;
const TITLE_ALIAS: f64 = 0.75;
const BODY_NAME: f64 = 0.6;
const BODY_ALIAS: f64 = 0.45;
/// A domestic stand-in for a foreign company named in the item.
const FOREIGN_SUBSTITUTE: f64 = 0.3;

/// A relevance value guaranteed to lie in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct RelevanceScore(f64);

impl RelevanceScore {
    pub const MAX: RelevanceScore = RelevanceScore(1.0);

    pub fn new(value: f64) -> Result<Self, NewswatchError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(NewswatchError::RelevanceOutOfRange { value })
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Additive boost, saturating at 1.0.
    pub fn boosted(self, boost: f64) -> Self {
        Self((self.0 + boost.max(0.0)).min(1.0))
    }
}

/// One (news item, security) association.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityLink {
    pub code: String,
    pub score: RelevanceScore,
    pub boosted: bool,
}

pub trait RelevanceStrategy {
    fn name(&self) -> &str;

    /// Raw (code, base score) pairs for one item. The scorer validates them.
    fn base_scores(
        &self,
        item: &NewsItem,
        catalog: &SecurityCatalog,
        as_of: DateTime<Utc>,
    ) -> Vec<(String, f64)>;

    /// Whether unusable output is discarded rather than reported.
    fn fails_closed(&self) -> bool {
        false
    }
}

/// Deterministic name/alias matching weighted by position and recency.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordStrategy;

impl RelevanceStrategy for KeywordStrategy {
    fn name(&self) -> &str {
        "keyword"
    }

    fn base_scores(
        &self,
        item: &NewsItem,
        catalog: &SecurityCatalog,
        as_of: DateTime<Utc>,
    ) -> Vec<(String, f64)> {
        let recency = 0.5 + 0.5 * freshness(item.published_at, as_of);
        let body = item.body.as_deref().unwrap_or("");

        let mut scores: Vec<(String, f64)> = catalog
            .iter()
            .filter_map(|security| {
                let in_title_alias = security.aliases.iter().any(|a| mentions(&item.title, a));
                let in_body_alias = security.aliases.iter().any(|a| mentions(body, a));
                let strength = if mentions(&item.title, &security.name) {
                    TITLE_NAME
                } else if in_title_alias {
                    TITLE_ALIAS
                } else if mentions(body, &security.name) {
                    BODY_NAME
                } else if in_body_alias {
                    BODY_ALIAS
                } else {
                    return None;
                };
                Some((security.code.clone(), strength * recency))
            })
            .collect();

        // The scorer keeps the strongest score per code, so a direct mention wins.
        scores.extend(
            catalog
                .substitutes_in(&item.text())
                .into_iter()
                .map(|security| (security.code.clone(), FOREIGN_SUBSTITUTE * recency)),
        );
        scores
    }
}

#[derive(Debug, Deserialize)]
struct ModelReply {
    matches: Vec<ModelMatch>,
}

#[derive(Debug, Deserialize)]
struct ModelMatch {
    code: String,
    score: f64,
}

/// Delegates extraction to a language model. Any unusable reply yields no
/// matches rather than guessed ones.
pub struct LanguageModelStrategy<C: CompletionPort> {
    client: C,
}

impl<C: CompletionPort> LanguageModelStrategy<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    fn prompt(item: &NewsItem, catalog: &SecurityCatalog) -> String {
        let universe: Vec<String> = catalog
            .iter()
            .map(|s| format!("{} {}", s.code, s.name))
            .collect();
        format!(
            "Identify which listed securities the news item below concerns.\n\
             Reply with JSON only: {{\"matches\":[{{\"code\":\"<code>\",\"score\":<0..1>}}]}}.\n\
             Use only these securities:\n{}\n\nTitle: {}\nBody: {}\n",
            universe.join("\n"),
            item.title,
            item.body.as_deref().unwrap_or("")
        )
    }

    fn parse_reply(reply: &str) -> Result<ModelReply, NewswatchError> {
        let start = reply.find('{');
        let end = reply.rfind('}');
        let json = match (start, end) {
            (Some(s), Some(e)) if s < e => &reply[s..=e],
            _ => {
                return Err(NewswatchError::MalformedModelReply {
                    reason: "no JSON object in reply".into(),
                });
            }
        };
        serde_json::from_str(json).map_err(|e| NewswatchError::MalformedModelReply {
            reason: e.to_string(),
        })
    }
}

impl<C: CompletionPort> RelevanceStrategy for LanguageModelStrategy<C> {
    fn name(&self) -> &str {
        "language-model"
    }

    fn fails_closed(&self) -> bool {
        true
    }

    fn base_scores(
        &self,
        item: &NewsItem,
        catalog: &SecurityCatalog,
        _as_of: DateTime<Utc>,
    ) -> Vec<(String, f64)> {
        let reply = match self
            .client
            .complete(&Self::prompt(item, catalog))
            .and_then(|text| Self::parse_reply(&text))
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(title = %item.title, error = %e, "model reply discarded");
                return Vec::new();
            }
        };

        reply
            .matches
            .into_iter()
            .filter(|m| {
                let known = catalog.contains(&m.code);
                if !known {
                    tracing::warn!(code = %m.code, "model returned unknown security");
                }
                known
            })
            .map(|m| (m.code, m.score))
            .collect()
    }
}

pub struct RelevanceScorer {
    strategy: Box<dyn RelevanceStrategy>,
    boost: f64,
}

impl RelevanceScorer {
    pub fn new(strategy: Box<dyn RelevanceStrategy>, boost: f64) -> Self {
        Self {
            strategy,
            boost: boost.clamp(0.0, 1.0),
        }
    }

    pub fn keyword(boost: f64) -> Self {
        Self::new(Box::new(KeywordStrategy), boost)
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Links for one item, highest score first, then by code.
    pub fn score(
        &self,
        item: &NewsItem,
        catalog: &SecurityCatalog,
        watchlist: &Watchlist,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<SecurityLink>, NewswatchError> {
        let mut best: BTreeMap<String, RelevanceScore> = BTreeMap::new();
        for (code, raw) in self.strategy.base_scores(item, catalog, as_of) {
            if !catalog.contains(&code) {
                continue;
            }
            let score = match RelevanceScore::new(raw) {
                Ok(score) => score,
                Err(e) if self.strategy.fails_closed() => {
                    tracing::warn!(strategy = self.strategy.name(), %code, error = %e, "score dropped");
                    continue;
                }
                Err(e) => {
                    tracing::error!(strategy = self.strategy.name(), %code, error = %e, "score out of range");
                    return Err(e);
                }
            };
            best.entry(code)
                .and_modify(|current| {
                    if score > *current {
                        *current = score;
                    }
                })
                .or_insert(score);
        }

        let mut links: Vec<SecurityLink> = best
            .into_iter()
            .map(|(code, score)| {
                let on_watchlist = catalog.get(&code).is_some_and(|s| watchlist.contains(s));
                let score = if on_watchlist {
                    score.boosted(self.boost)
                } else {
                    score
                };
                SecurityLink {
                    code,
                    score,
                    boosted: on_watchlist,
                }
            })
            .collect();
        links.sort_by(|a, b| {
            b.score
                .value()
                .total_cmp(&a.score.value())
                .then_with(|| a.code.cmp(&b.code))
        });
        Ok(links)
    }
}
