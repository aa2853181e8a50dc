//! CLI definition and dispatch.

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use crate::adapters::csv_quote_adapter::CsvQuoteAdapter;
use crate::adapters::dummy_news_adapter::DummyNewsAdapter;
use crate::adapters::dummy_quote_adapter::DummyQuoteAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_news_adapter::JsonNewsAdapter;
use crate::domain::config_validation::validate_pipeline_config;
use crate::domain::cycle::{self, kst_date, morning_cutoff, previous_month};
use crate::domain::digest::DigestConfig;
use crate::domain::error::NewswatchError;
use crate::domain::ledger::{EntryPolicy, LedgerConfig};
use crate::domain::performance::AggregationPolicy;
use crate::domain::relevance::RelevanceScorer;
use crate::domain::retry::RetryPolicy;
use crate::domain::security::Watchlist;
use crate::domain::selector::SelectionConfig;
use crate::domain::settings::{
    DEFAULT_LOOKBACK_HOURS, MarketProviderKind, MarketSettings, NewsProviderKind, NewsSettings,
    NewsWindowMode, PipelineConfig, ScoringSettings,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::news_port::NewsPort;
use crate::ports::quote_port::QuotePort;

#[derive(Parser, Debug)]
#[command(
    name = "newswatch",
    about = "News digest, watch picks and paper-trade tracking"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database schema and register the built-in securities
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Collect news, build the digest and record the day's picks
    Morning {
        #[arg(short, long)]
        config: PathBuf,
        /// Cycle date (YYYY-MM-DD); defaults to today in KST
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Price the day's picks and record paper trades
    Evening {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Summarize a month of paper trades
    Monthly {
        #[arg(short, long)]
        config: PathBuf,
        /// Month (YYYY-MM); defaults to the previous month
        #[arg(long)]
        month: Option<YearMonth>,
        /// Include trades priced from synthetic quotes
        #[arg(long)]
        include_dummy: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got '{s}'"))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("invalid year in '{s}'"))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in '{s}'"))?;
        if !(1..=12).contains(&month) {
            return Err(format!("month must be 1-12, got {month}"));
        }
        Ok(Self { year, month })
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::InitDb { config } => run_init_db(&config),
        Command::Morning { config, date } => run_morning(&config, date),
        Command::Evening { config, date } => run_evening(&config, date),
        Command::Monthly {
            config,
            month,
            include_dummy,
        } => run_monthly(&config, month, include_dummy),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(report) => {
            print!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<FileConfigAdapter, NewswatchError> {
    tracing::debug!(path = %path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(path)?;
    validate_pipeline_config(&adapter)?;
    Ok(adapter)
}

fn news_provider(value: Option<String>) -> Result<NewsProviderKind, NewswatchError> {
    match value.as_deref().map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("dummy") => Ok(NewsProviderKind::Dummy),
        Some("json") => Ok(NewsProviderKind::Json),
        Some(other) => Err(NewswatchError::ConfigInvalid {
            section: "news".into(),
            key: "provider".into(),
            reason: format!("unknown provider '{other}'"),
        }),
    }
}

fn market_provider(value: Option<String>) -> Result<MarketProviderKind, NewswatchError> {
    match value.as_deref().map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("dummy") => Ok(MarketProviderKind::Dummy),
        Some("csv") => Ok(MarketProviderKind::Csv),
        Some(other) => Err(NewswatchError::ConfigInvalid {
            section: "market".into(),
            key: "provider".into(),
            reason: format!("unknown provider '{other}'"),
        }),
    }
}

fn news_window_mode(adapter: &dyn ConfigPort) -> Result<NewsWindowMode, NewswatchError> {
    match adapter
        .get_string("news", "window")
        .map(|v| v.trim().to_lowercase())
        .as_deref()
    {
        None | Some("overnight") => Ok(NewsWindowMode::Overnight),
        Some("lookback") => Ok(NewsWindowMode::Lookback {
            hours: adapter.get_int("news", "lookback_hours", DEFAULT_LOOKBACK_HOURS),
        }),
        Some(other) => Err(NewswatchError::ConfigInvalid {
            section: "news".into(),
            key: "window".into(),
            reason: format!("unknown window '{other}'"),
        }),
    }
}

fn non_negative(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

pub fn build_pipeline_config(adapter: &dyn ConfigPort) -> Result<PipelineConfig, NewswatchError> {
    let defaults = PipelineConfig::default();

    let queries = adapter.get_list("news", "queries");
    let news = NewsSettings {
        provider: news_provider(adapter.get_string("news", "provider"))?,
        path: adapter.get_string("news", "path").map(PathBuf::from),
        queries: if queries.is_empty() {
            defaults.news.queries.clone()
        } else {
            queries
        },
        window: news_window_mode(adapter)?,
        fallback_to_dummy: adapter.get_bool("news", "fallback_to_dummy", true),
    };

    let noise_keywords = adapter.get_list("news", "noise_keywords");
    let digest = DigestConfig {
        max_per_query: non_negative(adapter.get_int(
            "news",
            "max_per_query",
            defaults.digest.max_per_query as i64,
        )),
        min_digest_size: non_negative(adapter.get_int(
            "news",
            "min_digest_size",
            defaults.digest.min_digest_size as i64,
        )),
        noise_keywords: if noise_keywords.is_empty() {
            defaults.digest.noise_keywords.clone()
        } else {
            noise_keywords
        },
    };

    let scoring = ScoringSettings {
        watchlist: Watchlist::new(adapter.get_list("scoring", "watchlist")),
        watchlist_boost: adapter.get_double(
            "scoring",
            "watchlist_boost",
            defaults.scoring.watchlist_boost,
        ),
    };

    let selection = SelectionConfig {
        max_picks: non_negative(adapter.get_int(
            "selection",
            "max_picks",
            defaults.selection.max_picks as i64,
        )),
        min_relevance: adapter.get_double(
            "selection",
            "min_relevance",
            defaults.selection.min_relevance,
        ),
    };

    let entry_policy = match adapter.get_string("paper_trade", "entry_policy") {
        None => EntryPolicy::default(),
        Some(raw) => EntryPolicy::parse(&raw).ok_or_else(|| NewswatchError::ConfigInvalid {
            section: "paper_trade".into(),
            key: "entry_policy".into(),
            reason: format!("unknown entry policy '{raw}'"),
        })?,
    };
    let ledger = LedgerConfig {
        total_capital: adapter.get_double(
            "paper_trade",
            "total_capital",
            defaults.ledger.total_capital,
        ),
        entry_policy,
    };

    let market = MarketSettings {
        provider: market_provider(adapter.get_string("market", "provider"))?,
        path: adapter.get_string("market", "path").map(PathBuf::from),
        fallback_to_dummy: adapter.get_bool(
            "market",
            "fallback_to_dummy",
            defaults.market.fallback_to_dummy,
        ),
    };

    let aggregation = AggregationPolicy {
        include_degenerate: adapter.get_bool("monthly", "include_dummy", false),
        base_capital: ledger.total_capital,
    };

    let retry = RetryPolicy::with_delay(Duration::from_millis(
        adapter
            .get_int("fetch", "retry_delay_ms", defaults.retry.delay.as_millis() as i64)
            .max(0) as u64,
    ));

    Ok(PipelineConfig {
        news,
        digest,
        scoring,
        selection,
        ledger,
        market,
        aggregation,
        retry,
    })
}

fn require_path(path: Option<&PathBuf>, section: &str) -> Result<PathBuf, NewswatchError> {
    path.cloned().ok_or_else(|| NewswatchError::ConfigMissing {
        section: section.into(),
        key: "path".into(),
    })
}

/// Primary news source plus the dummy fallback when configured.
pub fn build_news_ports(
    config: &PipelineConfig,
) -> Result<(Box<dyn NewsPort>, Option<Box<dyn NewsPort>>), NewswatchError> {
    match config.news.provider {
        NewsProviderKind::Dummy => Ok((Box::new(DummyNewsAdapter), None)),
        NewsProviderKind::Json => {
            let primary = JsonNewsAdapter::new(require_path(config.news.path.as_ref(), "news")?);
            let fallback: Option<Box<dyn NewsPort>> = if config.news.fallback_to_dummy {
                Some(Box::new(DummyNewsAdapter))
            } else {
                None
            };
            Ok((Box::new(primary), fallback))
        }
    }
}

/// Primary quote source plus the dummy fallback when configured.
pub fn build_quote_ports(
    config: &PipelineConfig,
) -> Result<(Box<dyn QuotePort>, Option<Box<dyn QuotePort>>), NewswatchError> {
    match config.market.provider {
        MarketProviderKind::Dummy => Ok((Box::new(DummyQuoteAdapter), None)),
        MarketProviderKind::Csv => {
            let primary = CsvQuoteAdapter::new(require_path(config.market.path.as_ref(), "market")?);
            let fallback: Option<Box<dyn QuotePort>> = if config.market.fallback_to_dummy {
                Some(Box::new(DummyQuoteAdapter))
            } else {
                None
            };
            Ok((Box::new(primary), fallback))
        }
    }
}

fn run_validate(config_path: &Path) -> Result<String, NewswatchError> {
    let adapter = load_config(config_path)?;
    let config = build_pipeline_config(&adapter)?;
    Ok(format!(
        "{} is valid: news={:?} market={:?} queries={} max_picks={}\n",
        config_path.display(),
        config.news.provider,
        config.market.provider,
        config.news.queries.len(),
        config.selection.max_picks
    ))
}

#[cfg(feature = "sqlite")]
fn open_store(
    adapter: &dyn ConfigPort,
) -> Result<crate::adapters::sqlite_adapter::SqliteAdapter, NewswatchError> {
    use crate::ports::store_port::RecordStore;

    let store = crate::adapters::sqlite_adapter::SqliteAdapter::from_config(adapter)?;
    store.initialize_schema()?;
    Ok(store)
}

#[cfg(not(feature = "sqlite"))]
fn sqlite_required() -> NewswatchError {
    NewswatchError::ConfigInvalid {
        section: "database".into(),
        key: "path".into(),
        reason: "built without the sqlite feature".into(),
    }
}

fn run_init_db(config_path: &Path) -> Result<String, NewswatchError> {
    let adapter = load_config(config_path)?;

    #[cfg(feature = "sqlite")]
    {
        use crate::domain::security::SecurityCatalog;
        use crate::ports::store_port::RecordStore;

        let store = open_store(&adapter)?;
        let catalog = SecurityCatalog::korean_large_caps();
        for security in catalog.iter() {
            store.upsert_security(security)?;
        }
        tracing::info!(securities = catalog.len(), "database initialized");
        Ok(format!(
            "schema ready, {} securities registered\n",
            catalog.len()
        ))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = adapter;
        Err(sqlite_required())
    }
}

fn run_morning(config_path: &Path, date: Option<NaiveDate>) -> Result<String, NewswatchError> {
    let adapter = load_config(config_path)?;
    let config = build_pipeline_config(&adapter)?;
    let (date, as_of) = match date {
        Some(d) => (d, morning_cutoff(d)?),
        None => {
            let now = Utc::now();
            (kst_date(now), now)
        }
    };

    #[cfg(feature = "sqlite")]
    {
        let store = open_store(&adapter)?;
        let (news, fallback) = build_news_ports(&config)?;
        let scorer = RelevanceScorer::keyword(config.scoring.watchlist_boost);
        let report = cycle::run_morning_cycle(
            &store,
            news.as_ref(),
            fallback.as_deref(),
            &scorer,
            &config,
            date,
            as_of,
        )?;
        Ok(report.to_string())
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (&config, date, as_of);
        Err(sqlite_required())
    }
}

fn run_evening(config_path: &Path, date: Option<NaiveDate>) -> Result<String, NewswatchError> {
    let adapter = load_config(config_path)?;
    let config = build_pipeline_config(&adapter)?;
    let date = date.unwrap_or_else(|| kst_date(Utc::now()));

    #[cfg(feature = "sqlite")]
    {
        let store = open_store(&adapter)?;
        let (quotes, fallback) = build_quote_ports(&config)?;
        let report = cycle::run_evening_cycle(
            &store,
            quotes.as_ref(),
            fallback.as_deref(),
            &config,
            date,
        )?;
        Ok(report.to_string())
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (&config, date);
        Err(sqlite_required())
    }
}

fn run_monthly(
    config_path: &Path,
    month: Option<YearMonth>,
    include_dummy: bool,
) -> Result<String, NewswatchError> {
    let adapter = load_config(config_path)?;
    let config = build_pipeline_config(&adapter)?;
    let month = month.unwrap_or_else(|| {
        let (year, month) = previous_month(kst_date(Utc::now()));
        YearMonth { year, month }
    });
    let policy = AggregationPolicy {
        include_degenerate: include_dummy || config.aggregation.include_degenerate,
        ..config.aggregation
    };

    #[cfg(feature = "sqlite")]
    {
        let store = open_store(&adapter)?;
        let report = cycle::run_monthly_cycle(&store, &policy, month.year, month.month)?;
        Ok(report.to_string())
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (policy, month);
        Err(sqlite_required())
    }
}
