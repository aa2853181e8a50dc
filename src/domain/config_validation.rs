//! Configuration validation.
//!
//! Validates every pipeline field before a cycle runs. Missing keys fall back
//! to their defaults; present keys must hold a usable value.

use crate::domain::error::NewswatchError;
use crate::domain::ledger::EntryPolicy;
use crate::domain::selector::MAX_PICKS_LIMIT;
use crate::ports::config_port::ConfigPort;

pub fn validate_pipeline_config(config: &dyn ConfigPort) -> Result<(), NewswatchError> {
    validate_database(config)?;
    validate_news_provider(config)?;
    validate_news_window(config)?;
    validate_digest_sizes(config)?;
    validate_watchlist_boost(config)?;
    validate_max_picks(config)?;
    validate_min_relevance(config)?;
    validate_total_capital(config)?;
    validate_entry_policy(config)?;
    validate_market_provider(config)?;
    validate_retry_delay(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> NewswatchError {
    NewswatchError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_database(config: &dyn ConfigPort) -> Result<(), NewswatchError> {
    match config.get_string("database", "path") {
        Some(s) if !s.trim().is_empty() => {}
        _ => {
            return Err(NewswatchError::ConfigMissing {
                section: "database".to_string(),
                key: "path".to_string(),
            });
        }
    }
    if config.get_int("database", "pool_size", 4) < 1 {
        return Err(invalid("database", "pool_size", "pool_size must be at least 1"));
    }
    Ok(())
}

/// A file-backed provider needs its path.
fn require_path(config: &dyn ConfigPort, section: &str) -> Result<(), NewswatchError> {
    match config.get_string(section, "path") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(NewswatchError::ConfigMissing {
            section: section.to_string(),
            key: "path".to_string(),
        }),
    }
}

fn validate_news_provider(config: &dyn ConfigPort) -> Result<(), NewswatchError> {
    let provider = config
        .get_string("news", "provider")
        .unwrap_or_else(|| "dummy".to_string());
    match provider.trim().to_lowercase().as_str() {
        "dummy" => Ok(()),
        "json" => require_path(config, "news"),
        other => Err(invalid(
            "news",
            "provider",
            format!("unknown provider '{other}', expected dummy or json"),
        )),
    }
}

fn validate_news_window(config: &dyn ConfigPort) -> Result<(), NewswatchError> {
    let window = config
        .get_string("news", "window")
        .unwrap_or_else(|| "overnight".to_string());
    match window.trim().to_lowercase().as_str() {
        "overnight" => Ok(()),
        "lookback" => {
            if config.get_int("news", "lookback_hours", 24) < 1 {
                return Err(invalid(
                    "news",
                    "lookback_hours",
                    "lookback_hours must be at least 1",
                ));
            }
            Ok(())
        }
        other => Err(invalid(
            "news",
            "window",
            format!("unknown window '{other}', expected overnight or lookback"),
        )),
    }
}

fn validate_digest_sizes(config: &dyn ConfigPort) -> Result<(), NewswatchError> {
    if config.get_int("news", "max_per_query", 30) < 1 {
        return Err(invalid(
            "news",
            "max_per_query",
            "max_per_query must be at least 1",
        ));
    }
    if config.get_int("news", "min_digest_size", 10) < 0 {
        return Err(invalid(
            "news",
            "min_digest_size",
            "min_digest_size must be non-negative",
        ));
    }
    Ok(())
}

fn validate_watchlist_boost(config: &dyn ConfigPort) -> Result<(), NewswatchError> {
    let value = config.get_double("scoring", "watchlist_boost", 0.2);
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(
            "scoring",
            "watchlist_boost",
            "watchlist_boost must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_max_picks(config: &dyn ConfigPort) -> Result<(), NewswatchError> {
    let value = config.get_int("selection", "max_picks", 3);
    if value < 1 || value > MAX_PICKS_LIMIT as i64 {
        return Err(invalid(
            "selection",
            "max_picks",
            format!("max_picks must be between 1 and {MAX_PICKS_LIMIT}"),
        ));
    }
    Ok(())
}

fn validate_min_relevance(config: &dyn ConfigPort) -> Result<(), NewswatchError> {
    let value = config.get_double("selection", "min_relevance", 0.3);
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(
            "selection",
            "min_relevance",
            "min_relevance must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_total_capital(config: &dyn ConfigPort) -> Result<(), NewswatchError> {
    let value = config.get_double("paper_trade", "total_capital", 10_000_000.0);
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(
            "paper_trade",
            "total_capital",
            "total_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_entry_policy(config: &dyn ConfigPort) -> Result<(), NewswatchError> {
    match config.get_string("paper_trade", "entry_policy") {
        None => Ok(()),
        Some(s) if EntryPolicy::parse(&s).is_some() => Ok(()),
        Some(s) => Err(invalid(
            "paper_trade",
            "entry_policy",
            format!("unknown entry policy '{s}', expected open or prior_close"),
        )),
    }
}

fn validate_market_provider(config: &dyn ConfigPort) -> Result<(), NewswatchError> {
    let provider = config
        .get_string("market", "provider")
        .unwrap_or_else(|| "dummy".to_string());
    match provider.trim().to_lowercase().as_str() {
        "dummy" => Ok(()),
        "csv" => require_path(config, "market"),
        other => Err(invalid(
            "market",
            "provider",
            format!("unknown provider '{other}', expected dummy or csv"),
        )),
    }
}

fn validate_retry_delay(config: &dyn ConfigPort) -> Result<(), NewswatchError> {
    if config.get_int("fetch", "retry_delay_ms", 1000) < 0 {
        return Err(invalid(
            "fetch",
            "retry_delay_ms",
            "retry_delay_ms must be non-negative",
        ));
    }
    Ok(())
}
