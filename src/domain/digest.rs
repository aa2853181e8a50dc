//! News digest: merge multi-query results, deduplicate, rank.
//!
//! The builder never fetches. It receives already-fetched batches and an
//! explicit `as_of` instant, so the same inputs always give the same digest.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use super::error::NewswatchError;
use super::news::{NewsItem, QueryBatch};
use super::quality::{
    clickbait_penalty, freshness, is_noise, market_keyword_weight, novelty, repeat_count,
    source_reliability, DEFAULT_NOISE_KEYWORDS,
};

pub const DEFAULT_MAX_PER_QUERY: usize = 30;
pub const DEFAULT_MIN_DIGEST_SIZE: usize = 10;
const MAX_NOISE_RESTORE: usize = 5;

const W_FRESHNESS: f64 = 10.0;
const W_RELIABILITY: f64 = 4.0;
const W_QUERY_COVERAGE: f64 = 2.0;
const W_CLICKBAIT: f64 = 4.0;
const W_NOVELTY: f64 = 5.0;
const W_REPEAT: f64 = 8.0;

#[derive(Debug, Clone)]
pub struct DigestConfig {
    pub max_per_query: usize,
    pub min_digest_size: usize,
    pub noise_keywords: Vec<String>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            max_per_query: DEFAULT_MAX_PER_QUERY,
            min_digest_size: DEFAULT_MIN_DIGEST_SIZE,
            noise_keywords: DEFAULT_NOISE_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DigestItem {
    pub item: NewsItem,
    pub importance: f64,
    /// Number of distinct queries that surfaced the story.
    pub query_hits: usize,
    /// Number of raw reports merged into this item.
    pub merged_count: usize,
    /// Other stories on the same subject run 24 to 72 hours apart.
    pub repeats: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestStats {
    pub fetched: usize,
    pub after_cap: usize,
    pub unusable: usize,
    pub deduped: usize,
    pub noise_dropped: usize,
    pub noise_restored: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Digest {
    pub items: Vec<DigestItem>,
    pub stats: DigestStats,
}

impl Digest {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The merged set fell below the minimum usable size. Carries what was built
/// so the caller can decide whether to widen the window or fall back.
#[derive(Debug, Clone, thiserror::Error)]
#[error("insufficient digest: {} distinct items, need {minimum}", .partial.items.len())]
pub struct InsufficientDigest {
    pub partial: Digest,
    pub minimum: usize,
}

impl From<InsufficientDigest> for NewswatchError {
    fn from(err: InsufficientDigest) -> Self {
        NewswatchError::InsufficientDigest {
            found: err.partial.items.len(),
            minimum: err.minimum,
        }
    }
}

struct MergedStory {
    item: NewsItem,
    sources: BTreeSet<String>,
    queries: BTreeSet<String>,
    count: usize,
}

impl MergedStory {
    fn new(item: NewsItem, query: &str) -> Self {
        let mut sources = BTreeSet::new();
        if !item.source.is_empty() {
            sources.insert(item.source.clone());
        }
        let mut queries = BTreeSet::new();
        queries.insert(query.to_string());
        Self {
            item,
            sources,
            queries,
            count: 1,
        }
    }

    fn absorb(&mut self, other: NewsItem, query: &str) {
        if !other.source.is_empty() {
            self.sources.insert(other.source.clone());
        }
        self.queries.insert(query.to_string());
        self.count += 1;
        if other.collected_at < self.item.collected_at {
            self.item = other;
        }
    }

    fn finish(mut self, repeats: usize, as_of: DateTime<Utc>) -> DigestItem {
        self.item.sources = self.sources.into_iter().collect();
        let query_hits = self.queries.len();
        let importance = importance(&self.item, query_hits, repeats, as_of);
        DigestItem {
            item: self.item,
            importance,
            query_hits,
            merged_count: self.count,
            repeats,
        }
    }
}

pub struct DigestBuilder {
    config: DigestConfig,
}

impl DigestBuilder {
    pub fn new(config: DigestConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        batches: &[QueryBatch],
        as_of: DateTime<Utc>,
    ) -> Result<Digest, InsufficientDigest> {
        let mut stats = DigestStats::default();
        let mut stories: Vec<MergedStory> = Vec::new();
        let mut by_key: HashMap<String, usize> = HashMap::new();

        for batch in batches {
            stats.fetched += batch.items.len();
            for raw in batch.items.iter().take(self.config.max_per_query) {
                stats.after_cap += 1;
                let item = NewsItem::from_raw(raw);
                if item.dedup_key.is_empty() {
                    stats.unusable += 1;
                    continue;
                }
                match by_key.get(&item.dedup_key) {
                    Some(&idx) => stories[idx].absorb(item, &batch.query),
                    None => {
                        by_key.insert(item.dedup_key.clone(), stories.len());
                        stories.push(MergedStory::new(item, &batch.query));
                    }
                }
            }
        }
        stats.deduped = stories.len();

        let stamps: Vec<(&str, DateTime<Utc>)> = stories
            .iter()
            .map(|s| (s.item.dedup_key.as_str(), s.item.published_at))
            .collect();
        let repeats: Vec<usize> = stamps
            .iter()
            .enumerate()
            .map(|(i, (key, at))| {
                let others: Vec<(&str, DateTime<Utc>)> = stamps
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, stamp)| *stamp)
                    .collect();
                repeat_count(key, *at, &others)
            })
            .collect();

        let (mut kept, mut noise): (Vec<DigestItem>, Vec<DigestItem>) = stories
            .into_iter()
            .zip(repeats)
            .map(|(story, repeats)| story.finish(repeats, as_of))
            .partition(|d| !self.is_noise(&d.item));

        if kept.len() < self.config.min_digest_size && !noise.is_empty() {
            rank(&mut noise);
            let restore = noise
                .len()
                .min(MAX_NOISE_RESTORE)
                .min(self.config.min_digest_size - kept.len());
            stats.noise_restored = restore;
            kept.extend(noise.drain(..restore));
        }
        stats.noise_dropped = noise.len();

        rank(&mut kept);
        let digest = Digest { items: kept, stats };

        if digest.items.len() < self.config.min_digest_size {
            return Err(InsufficientDigest {
                partial: digest,
                minimum: self.config.min_digest_size,
            });
        }
        Ok(digest)
    }

    fn is_noise(&self, item: &NewsItem) -> bool {
        let text = format!("{} {} {}", item.text(), item.source, item.url);
        is_noise(&text, &self.config.noise_keywords)
    }
}

/// Estimated market importance of a merged story. Subjects that already ran a
/// day or more earlier (or later) lose novelty and pay a repeat penalty.
pub fn importance(
    item: &NewsItem,
    query_hits: usize,
    repeats: usize,
    as_of: DateTime<Utc>,
) -> f64 {
    let text = item.text();
    let reliability = item
        .sources
        .iter()
        .map(|s| source_reliability(s))
        .fold(source_reliability(&item.source), f64::max);
    let (novel, repeat_penalty) = novelty(repeats);
    market_keyword_weight(&text)
        + W_FRESHNESS * freshness(item.published_at, as_of)
        + W_RELIABILITY * reliability
        + W_QUERY_COVERAGE * query_hits.saturating_sub(1) as f64
        + W_NOVELTY * novel
        - W_REPEAT * repeat_penalty
        - W_CLICKBAIT * clickbait_penalty(&text, &item.source)
}

/// Importance descending, then newest first, then key for a total order.
fn rank(items: &mut [DigestItem]) {
    items.sort_by(|a, b| {
        b.importance
            .total_cmp(&a.importance)
            .then_with(|| b.item.published_at.cmp(&a.item.published_at))
            .then_with(|| a.item.dedup_key.cmp(&b.item.dedup_key))
    });
}
