//! Recommendation selection: the day's top securities from scored links.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use super::error::NewswatchError;
use super::relevance::RelevanceScore;

pub const MAX_PICKS_LIMIT: usize = 3;
pub const DEFAULT_MIN_RELEVANCE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionConfig {
    pub max_picks: usize,
    /// Aggregate relevance a security needs to be eligible.
    pub min_relevance: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_picks: MAX_PICKS_LIMIT,
            min_relevance: DEFAULT_MIN_RELEVANCE,
        }
    }
}

/// A stored news item linked to one security.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub news_id: i64,
    pub published_at: DateTime<Utc>,
    pub title: String,
    pub code: String,
    pub score: RelevanceScore,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pick {
    pub code: String,
    /// 1 is the top pick.
    pub priority: u32,
    pub aggregate: f64,
    pub rationale: String,
    /// Strongest support first.
    pub supporting_news_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectionError {
    #[error("no candidate reached the relevance floor {floor}")]
    EmptyCandidateSet { floor: f64 },

    #[error("max_picks must be between 1 and 3, got {value}")]
    InvalidMaxPicks { value: usize },
}

impl From<SelectionError> for NewswatchError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::EmptyCandidateSet { floor } => NewswatchError::EmptyCandidateSet { floor },
            SelectionError::InvalidMaxPicks { .. } => NewswatchError::ConfigInvalid {
                section: "selection".into(),
                key: "max_picks".into(),
                reason: err.to_string(),
            },
        }
    }
}

struct Aggregate<'a> {
    code: &'a str,
    total: f64,
    earliest: DateTime<Utc>,
    support: Vec<&'a ScoredCandidate>,
}

/// Securities are ranked by the sum of their link scores. Ties go to the
/// earliest supporting story, then to the code.
pub fn select(
    candidates: &[ScoredCandidate],
    already_recommended: &HashSet<String>,
    config: &SelectionConfig,
) -> Result<Vec<Pick>, SelectionError> {
    if config.max_picks == 0 || config.max_picks > MAX_PICKS_LIMIT {
        return Err(SelectionError::InvalidMaxPicks {
            value: config.max_picks,
        });
    }

    // One link per (news, security): a repeated pair keeps its best score.
    let mut per_pair: BTreeMap<(&str, i64), &ScoredCandidate> = BTreeMap::new();
    for candidate in candidates {
        if already_recommended.contains(&candidate.code) {
            continue;
        }
        per_pair
            .entry((candidate.code.as_str(), candidate.news_id))
            .and_modify(|kept| {
                if candidate.score > kept.score {
                    *kept = candidate;
                }
            })
            .or_insert(candidate);
    }

    let mut by_code: BTreeMap<&str, Aggregate> = BTreeMap::new();
    for ((code, _), candidate) in per_pair {
        let entry = by_code.entry(code).or_insert_with(|| Aggregate {
            code,
            total: 0.0,
            earliest: candidate.published_at,
            support: Vec::new(),
        });
        entry.total += candidate.score.value();
        entry.earliest = entry.earliest.min(candidate.published_at);
        entry.support.push(candidate);
    }

    let mut eligible: Vec<Aggregate> = by_code
        .into_values()
        .filter(|agg| agg.total >= config.min_relevance)
        .collect();
    if eligible.is_empty() {
        return Err(SelectionError::EmptyCandidateSet {
            floor: config.min_relevance,
        });
    }

    eligible.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.earliest.cmp(&b.earliest))
            .then_with(|| a.code.cmp(b.code))
    });

    Ok(eligible
        .into_iter()
        .take(config.max_picks)
        .enumerate()
        .map(|(idx, mut agg)| {
            agg.support.sort_by(|a, b| {
                b.score
                    .value()
                    .total_cmp(&a.score.value())
                    .then_with(|| a.published_at.cmp(&b.published_at))
                    .then_with(|| a.news_id.cmp(&b.news_id))
            });
            Pick {
                code: agg.code.to_string(),
                priority: idx as u32 + 1,
                aggregate: agg.total,
                rationale: rationale(&agg),
                supporting_news_ids: agg.support.iter().map(|c| c.news_id).collect(),
            }
        })
        .collect())
}

fn rationale(agg: &Aggregate) -> String {
    let lead = agg.support.first().map(|c| c.title.as_str()).unwrap_or("");
    let noun = if agg.support.len() == 1 { "item" } else { "items" };
    format!(
        "{} news {noun}, aggregate relevance {:.2}; lead: {lead}",
        agg.support.len(),
        agg.total
    )
}
