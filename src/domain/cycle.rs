//! Morning, evening and monthly cycles.
//!
//! Each cycle runs once per invocation against a [`RecordStore`]. Input
//! shortfalls and upstream outages become [`Degradation`]s on the report;
//! invariant violations abort before anything for the day is persisted.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use super::digest::{Digest, DigestBuilder};
use super::error::{ErrorClass, NewswatchError};
use super::ledger::{LedgerDay, build_trades};
use super::news::{NewsWindow, QueryBatch};
use super::performance::{AggregationPolicy, Aggregator, MonthlySummary};
use super::quote::DailyQuote;
use super::recommendation::Recommendation;
use super::relevance::RelevanceScorer;
use super::retry::with_fixed_retry;
use super::security::SecurityCatalog;
use super::selector::{ScoredCandidate, SelectionConfig, SelectionError, select};
use super::settings::{NewsWindowMode, PipelineConfig};
use crate::ports::news_port::NewsPort;
use crate::ports::quote_port::QuotePort;
use crate::ports::store_port::RecordStore;

pub const KST_OFFSET_HOURS: i64 = 9;
const OVERNIGHT_START_HOUR: u32 = 18;
const MORNING_CUTOFF_HOUR: u32 = 8;
const HEADLINE_COUNT: usize = 5;

/// Something the cycle worked around instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub enum Degradation {
    UpstreamUnavailable { source_name: String, detail: String },
    FellBack { from: String, to: String },
    InsufficientDigest { found: usize, minimum: usize },
    NoCandidates { floor: f64 },
    PicksFull { existing: usize },
    QuoteUnavailable { code: String, reason: String },
    NoRecommendations,
    AlreadySettled { trades: usize },
    DegenerateExcluded { count: usize },
    NoTrades,
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::UpstreamUnavailable {
                source_name,
                detail,
            } => write!(f, "{source_name} unavailable: {detail}"),
            Degradation::FellBack { from, to } => write!(f, "fell back from {from} to {to}"),
            Degradation::InsufficientDigest { found, minimum } => {
                write!(f, "digest has {found} items, wanted {minimum}")
            }
            Degradation::NoCandidates { floor } => {
                write!(f, "no security reached relevance {floor:.2}")
            }
            Degradation::PicksFull { existing } => {
                write!(f, "{existing} picks already recorded for the day")
            }
            Degradation::QuoteUnavailable { code, reason } => {
                write!(f, "no quote for {code}: {reason}")
            }
            Degradation::NoRecommendations => write!(f, "no recommendations for the day"),
            Degradation::AlreadySettled { trades } => {
                write!(f, "{trades} paper trades already recorded")
            }
            Degradation::DegenerateExcluded { count } => {
                write!(f, "{count} trades on synthetic quotes excluded")
            }
            Degradation::NoTrades => write!(f, "no paper trades in range"),
        }
    }
}

/// Calendar date in Korea for an instant.
pub fn kst_date(at: DateTime<Utc>) -> NaiveDate {
    (at + Duration::hours(KST_OFFSET_HOURS)).date_naive()
}

/// `hour`:00 KST on `date`, as UTC.
pub fn kst_at(date: NaiveDate, hour: u32) -> Result<DateTime<Utc>, NewswatchError> {
    let local = date
        .and_hms_opt(hour, 0, 0)
        .ok_or_else(|| NewswatchError::invariant(format!("invalid hour {hour}")))?;
    Ok(local.and_utc() - Duration::hours(KST_OFFSET_HOURS))
}

/// Morning cutoff for `date`; the reference instant for a backdated run.
pub fn morning_cutoff(date: NaiveDate) -> Result<DateTime<Utc>, NewswatchError> {
    kst_at(date, MORNING_CUTOFF_HOUR)
}

pub fn news_window(
    mode: NewsWindowMode,
    date: NaiveDate,
    as_of: DateTime<Utc>,
) -> Result<NewsWindow, NewswatchError> {
    match mode {
        NewsWindowMode::Overnight => {
            let previous = date
                .pred_opt()
                .ok_or_else(|| NewswatchError::invariant(format!("no day before {date}")))?;
            Ok(NewsWindow {
                start: kst_at(previous, OVERNIGHT_START_HOUR)?,
                end: kst_at(date, MORNING_CUTOFF_HOUR)?,
            })
        }
        NewsWindowMode::Lookback { hours } => Ok(NewsWindow {
            start: as_of - Duration::hours(hours),
            end: as_of,
        }),
    }
}

/// Built-in large caps overlaid with whatever the store has registered.
pub fn load_catalog(store: &dyn RecordStore) -> Result<SecurityCatalog, NewswatchError> {
    let mut catalog = SecurityCatalog::korean_large_caps();
    for security in store.list_securities()? {
        catalog.insert(security);
    }
    Ok(catalog)
}

#[derive(Debug, Clone)]
pub struct Headline {
    pub title: String,
    pub sources: Vec<String>,
    pub importance: f64,
}

#[derive(Debug, Clone)]
pub struct MorningReport {
    pub date: NaiveDate,
    pub window: NewsWindow,
    pub news_source: String,
    pub digest_size: usize,
    pub stored_news: usize,
    pub links: usize,
    pub headlines: Vec<Headline>,
    pub picks: Vec<Recommendation>,
    pub degradations: Vec<Degradation>,
}

impl fmt::Display for MorningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Morning digest {}", self.date)?;
        writeln!(
            f,
            "window {} .. {} ({})",
            self.window.start.format("%Y-%m-%d %H:%M UTC"),
            self.window.end.format("%Y-%m-%d %H:%M UTC"),
            self.news_source
        )?;
        writeln!(
            f,
            "{} stories, {} stored, {} security links",
            self.digest_size, self.stored_news, self.links
        )?;
        for (i, headline) in self.headlines.iter().enumerate() {
            writeln!(
                f,
                "  {}. {} [{}] ({:.2})",
                i + 1,
                headline.title,
                headline.sources.join(", "),
                headline.importance
            )?;
        }
        if self.picks.is_empty() {
            writeln!(f, "no picks")?;
        }
        for pick in &self.picks {
            writeln!(
                f,
                "#{} {} {}: {}",
                pick.priority, pick.code, pick.name, pick.rationale
            )?;
        }
        write_degradations(f, &self.degradations)
    }
}

#[derive(Debug, Clone)]
pub struct EveningReport {
    pub date: NaiveDate,
    pub ledger: LedgerDay,
    pub persisted: bool,
    pub degradations: Vec<Degradation>,
}

impl fmt::Display for EveningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Paper trades {}", self.date)?;
        for trade in &self.ledger.trades {
            writeln!(
                f,
                "  {} {}: {} @ {:.0} -> {:.0}, pnl {:+.0} ({:+.2}%) [{}]",
                trade.code,
                trade.name,
                trade.quantity,
                trade.entry_price,
                trade.current_price,
                trade.pnl,
                trade.pnl_rate * 100.0,
                trade.quote_source
            )?;
        }
        for unpriced in &self.ledger.unpriced {
            writeln!(f, "  {} unpriced: {}", unpriced.code, unpriced.reason)?;
        }
        writeln!(
            f,
            "invested {:.0}, pnl {:+.0}",
            self.ledger.total_invested(),
            self.ledger.total_pnl()
        )?;
        write_degradations(f, &self.degradations)
    }
}

#[derive(Debug, Clone)]
pub struct MonthlyReport {
    pub monthly: MonthlySummary,
    pub degradations: Vec<Degradation>,
}

impl fmt::Display for MonthlyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.monthly.summary;
        writeln!(
            f,
            "Monthly performance {}-{:02}",
            self.monthly.year, self.monthly.month
        )?;
        writeln!(
            f,
            "trades {} (wins {}, losses {}, flat {}), win rate {:.1}%",
            s.trade_count,
            s.win_count,
            s.loss_count,
            s.draw_count,
            s.win_rate * 100.0
        )?;
        writeln!(
            f,
            "invested {:.0}, pnl {:+.0} ({:+.2}%)",
            s.total_invested,
            s.total_pnl,
            s.total_pnl_rate * 100.0
        )?;
        writeln!(
            f,
            "max drawdown {:.0} ({:.2}%)",
            s.max_drawdown.amount,
            s.max_drawdown.rate * 100.0
        )?;
        if let Some(day) = &s.best_day {
            writeln!(f, "best day {} {:+.0}", day.date, day.pnl)?;
        }
        if let Some(day) = &s.worst_day {
            writeln!(f, "worst day {} {:+.0}", day.date, day.pnl)?;
        }
        if let Some(top) = &s.best_security {
            writeln!(f, "top contributor {} {} {:+.0}", top.code, top.name, top.pnl)?;
        }
        if let Some(bottom) = &s.worst_security {
            writeln!(
                f,
                "bottom contributor {} {} {:+.0}",
                bottom.code, bottom.name, bottom.pnl
            )?;
        }
        write_degradations(f, &self.degradations)
    }
}

fn write_degradations(f: &mut fmt::Formatter<'_>, degradations: &[Degradation]) -> fmt::Result {
    for degradation in degradations {
        writeln!(f, "! {degradation}")?;
    }
    Ok(())
}

fn fetch_batches(
    news: &dyn NewsPort,
    queries: &[String],
    window: &NewsWindow,
    config: &PipelineConfig,
    degradations: &mut Vec<Degradation>,
) -> Result<Vec<QueryBatch>, NewswatchError> {
    let mut batches = Vec::with_capacity(queries.len());
    for query in queries {
        match with_fixed_retry(news.name(), &config.retry, || news.fetch(query, window)) {
            Ok(items) => {
                tracing::debug!(source = news.name(), %query, count = items.len(), "fetched");
                batches.push(QueryBatch::new(query.clone(), items));
            }
            Err(e) if e.class() == ErrorClass::UpstreamUnavailable => {
                degradations.push(Degradation::UpstreamUnavailable {
                    source_name: news.name().to_string(),
                    detail: format!("query '{query}': {e}"),
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(batches)
}

/// Fetch, digest, score, select and persist the day's picks.
///
/// `fallback` is used when every query against `news` failed.
pub fn run_morning_cycle(
    store: &dyn RecordStore,
    news: &dyn NewsPort,
    fallback: Option<&dyn NewsPort>,
    scorer: &RelevanceScorer,
    config: &PipelineConfig,
    date: NaiveDate,
    as_of: DateTime<Utc>,
) -> Result<MorningReport, NewswatchError> {
    let mut degradations = Vec::new();
    let window = news_window(config.news.window, date, as_of)?;
    tracing::info!(%date, start = %window.start, end = %window.end, "morning cycle");

    let mut news_source = news.name().to_string();
    let mut batches = fetch_batches(news, &config.news.queries, &window, config, &mut degradations)?;
    if batches.is_empty() && !config.news.queries.is_empty() {
        if let Some(fallback) = fallback {
            tracing::warn!(from = news.name(), to = fallback.name(), "news provider fallback");
            degradations.push(Degradation::FellBack {
                from: news.name().to_string(),
                to: fallback.name().to_string(),
            });
            news_source = fallback.name().to_string();
            batches =
                fetch_batches(fallback, &config.news.queries, &window, config, &mut degradations)?;
        }
    }

    let digest = match DigestBuilder::new(config.digest.clone()).build(&batches, as_of) {
        Ok(digest) => digest,
        Err(short) => {
            tracing::warn!(error = %short, "continuing with partial digest");
            degradations.push(Degradation::InsufficientDigest {
                found: short.partial.len(),
                minimum: short.minimum,
            });
            short.partial
        }
    };

    let catalog = load_catalog(store)?;
    let (candidates, stored_news, links) =
        persist_and_score(store, scorer, config, &catalog, &digest, as_of)?;

    let existing = store.recommendations_on(date)?;
    let already: HashSet<String> = existing.iter().map(|r| r.code.clone()).collect();
    let remaining = config.selection.max_picks.saturating_sub(existing.len());

    let mut picks = Vec::new();
    if remaining == 0 {
        degradations.push(Degradation::PicksFull {
            existing: existing.len(),
        });
    } else {
        let selection = SelectionConfig {
            max_picks: remaining,
            ..config.selection
        };
        match select(&candidates, &already, &selection) {
            Ok(selected) => {
                let offset = existing.len() as u32;
                let mut recommendations: Vec<Recommendation> = selected
                    .iter()
                    .map(|pick| {
                        let name = catalog
                            .get(&pick.code)
                            .map(|s| s.name.clone())
                            .unwrap_or_else(|| pick.code.clone());
                        let mut rec = Recommendation::from_pick(date, pick, name);
                        rec.priority += offset;
                        rec
                    })
                    .collect();
                let ids = store.insert_recommendations(&recommendations)?;
                for (rec, id) in recommendations.iter_mut().zip(ids) {
                    rec.id = Some(id);
                }
                picks = recommendations;
            }
            Err(SelectionError::EmptyCandidateSet { floor }) => {
                degradations.push(Degradation::NoCandidates { floor });
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(%date, stories = digest.len(), picks = picks.len(), "morning cycle done");
    Ok(MorningReport {
        date,
        window,
        news_source,
        digest_size: digest.len(),
        stored_news,
        links,
        headlines: digest
            .items
            .iter()
            .take(HEADLINE_COUNT)
            .map(|d| Headline {
                title: d.item.title.clone(),
                sources: d.item.sources.clone(),
                importance: d.importance,
            })
            .collect(),
        picks,
        degradations,
    })
}

fn persist_and_score(
    store: &dyn RecordStore,
    scorer: &RelevanceScorer,
    config: &PipelineConfig,
    catalog: &SecurityCatalog,
    digest: &Digest,
    as_of: DateTime<Utc>,
) -> Result<(Vec<ScoredCandidate>, usize, usize), NewswatchError> {
    let mut candidates = Vec::new();
    let mut registered: HashSet<String> = HashSet::new();
    let mut links = 0;

    // Score everything first so an invariant violation aborts before any write.
    let scored = digest
        .items
        .iter()
        .map(|entry| {
            scorer
                .score(&entry.item, catalog, &config.scoring.watchlist, as_of)
                .map(|links| (entry, links))
        })
        .collect::<Result<Vec<_>, NewswatchError>>()?;

    for (entry, item_links) in scored {
        let news_id = store.insert_news(&entry.item)?;
        for link in item_links {
            if registered.insert(link.code.clone()) {
                if let Some(security) = catalog.get(&link.code) {
                    store.upsert_security(security)?;
                }
            }
            store.upsert_news_link(news_id, &link.code, link.score)?;
            links += 1;
            candidates.push(ScoredCandidate {
                news_id,
                published_at: entry.item.published_at,
                title: entry.item.title.clone(),
                code: link.code,
                score: link.score,
            });
        }
    }
    Ok((candidates, digest.len(), links))
}

fn fetch_daily_quote(
    quotes: &dyn QuotePort,
    code: &str,
    date: NaiveDate,
    config: &PipelineConfig,
) -> Result<DailyQuote, NewswatchError> {
    let source = quotes.source();
    with_fixed_retry(source.tag(), &config.retry, || quotes.fetch_quote(code, date))
}

/// Price the day's recommendations and append the resulting paper trades.
///
/// A day that already has trades is reported, never re-priced.
pub fn run_evening_cycle(
    store: &dyn RecordStore,
    quotes: &dyn QuotePort,
    fallback: Option<&dyn QuotePort>,
    config: &PipelineConfig,
    date: NaiveDate,
) -> Result<EveningReport, NewswatchError> {
    let mut degradations = Vec::new();
    tracing::info!(%date, source = %quotes.source(), "evening cycle");

    let recommendations = store.recommendations_on(date)?;
    if recommendations.is_empty() {
        degradations.push(Degradation::NoRecommendations);
        return Ok(EveningReport {
            date,
            ledger: LedgerDay {
                date,
                allocation_per_security: 0.0,
                trades: Vec::new(),
                unpriced: Vec::new(),
            },
            persisted: false,
            degradations,
        });
    }

    let existing = store.paper_trades_on(date)?;
    if !existing.is_empty() {
        degradations.push(Degradation::AlreadySettled {
            trades: existing.len(),
        });
        return Ok(EveningReport {
            date,
            ledger: LedgerDay {
                date,
                allocation_per_security: config.ledger.total_capital
                    / recommendations.len() as f64,
                trades: existing,
                unpriced: Vec::new(),
            },
            persisted: false,
            degradations,
        });
    }

    let mut priced: HashMap<String, DailyQuote> = HashMap::new();
    let mut fell_back = false;
    for rec in &recommendations {
        let quote = match fetch_daily_quote(quotes, &rec.code, date, config) {
            Ok(quote) => Some(quote),
            Err(e) if e.class() == ErrorClass::UpstreamUnavailable => {
                degradations.push(Degradation::UpstreamUnavailable {
                    source_name: quotes.source().to_string(),
                    detail: format!("{}: {e}", rec.code),
                });
                match fallback {
                    Some(fallback) => {
                        if !fell_back {
                            tracing::warn!(from = %quotes.source(), to = %fallback.source(), "quote provider fallback");
                            degradations.push(Degradation::FellBack {
                                from: quotes.source().to_string(),
                                to: fallback.source().to_string(),
                            });
                            fell_back = true;
                        }
                        match fetch_daily_quote(fallback, &rec.code, date, config) {
                            Ok(quote) => Some(quote),
                            Err(e) if e.is_recoverable() => {
                                degradations.push(Degradation::QuoteUnavailable {
                                    code: rec.code.clone(),
                                    reason: e.to_string(),
                                });
                                None
                            }
                            Err(e) => return Err(e),
                        }
                    }
                    None => None,
                }
            }
            Err(e) if e.class() == ErrorClass::InputInsufficiency => {
                degradations.push(Degradation::QuoteUnavailable {
                    code: rec.code.clone(),
                    reason: e.to_string(),
                });
                None
            }
            Err(e) => return Err(e),
        };
        if let Some(quote) = quote {
            priced.insert(rec.code.clone(), quote);
        }
    }

    let ledger = build_trades(date, &recommendations, &priced, &config.ledger)?;

    for quote in priced.values() {
        if !quote.source.is_degenerate()
            && quote.quote.date == date
            && quote.quote.validate().is_ok()
        {
            store.upsert_daily_price(&quote.quote)?;
        }
    }
    store.append_paper_trades(&ledger.trades)?;

    tracing::info!(
        %date,
        trades = ledger.trades.len(),
        unpriced = ledger.unpriced.len(),
        pnl = ledger.total_pnl(),
        "evening cycle done"
    );
    Ok(EveningReport {
        date,
        ledger,
        persisted: true,
        degradations,
    })
}

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), NewswatchError> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| NewswatchError::invariant(format!("invalid month {year}-{month:02}")))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let end = next
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| NewswatchError::invariant(format!("invalid month {year}-{month:02}")))?;
    Ok((start, end))
}

/// Roll the month's stored trades into a performance summary.
pub fn run_monthly_cycle(
    store: &dyn RecordStore,
    policy: &AggregationPolicy,
    year: i32,
    month: u32,
) -> Result<MonthlyReport, NewswatchError> {
    let (start, end) = month_bounds(year, month)?;
    tracing::info!(%start, %end, include_degenerate = policy.include_degenerate, "monthly cycle");

    let trades = store.paper_trades_between(start, end)?;
    let monthly = Aggregator::new(*policy).monthly_summary(year, month, &trades);

    let mut degradations = Vec::new();
    if trades.is_empty() {
        degradations.push(Degradation::NoTrades);
    }
    if monthly.summary.excluded_count > 0 {
        degradations.push(Degradation::DegenerateExcluded {
            count: monthly.summary.excluded_count,
        });
    }
    Ok(MonthlyReport {
        monthly,
        degradations,
    })
}

/// The month before the one containing `date`.
pub fn previous_month(date: NaiveDate) -> (i32, u32) {
    if date.month() == 1 {
        (date.year() - 1, 12)
    } else {
        (date.year(), date.month() - 1)
    }
}
