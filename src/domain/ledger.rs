//! Paper-trade ledger: equal-weight simulated positions for one day.
//!
//! Each recommended security gets `total_capital / n` of notional cash. The
//! position is bought at the entry price, whole shares only, and marked at the
//! session close.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use super::error::NewswatchError;
use super::quote::{DailyQuote, QuoteSource};
use super::recommendation::Recommendation;

pub const DEFAULT_TOTAL_CAPITAL: f64 = 10_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryPolicy {
    /// Buy at the session open.
    #[default]
    Open,
    /// Buy at the previous session's close.
    PriorClose,
}

impl EntryPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "open" => Some(EntryPolicy::Open),
            "prior_close" | "prior-close" => Some(EntryPolicy::PriorClose),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerConfig {
    pub total_capital: f64,
    pub entry_policy: EntryPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            total_capital: DEFAULT_TOTAL_CAPITAL,
            entry_policy: EntryPolicy::Open,
        }
    }
}

/// One simulated position. Append-only once stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperTrade {
    pub date: NaiveDate,
    pub code: String,
    pub name: String,
    pub recommendation_id: Option<i64>,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub current_price: f64,
    pub quantity: i64,
    pub invested_amount: f64,
    pub current_value: f64,
    pub pnl: f64,
    /// Fraction of the invested amount; 0 when nothing was bought.
    pub pnl_rate: f64,
    pub quote_source: QuoteSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnpricedSecurity {
    pub code: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerDay {
    pub date: NaiveDate,
    pub allocation_per_security: f64,
    pub trades: Vec<PaperTrade>,
    pub unpriced: Vec<UnpricedSecurity>,
}

impl LedgerDay {
    pub fn total_invested(&self) -> f64 {
        self.trades.iter().map(|t| t.invested_amount).sum()
    }

    pub fn total_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }
}

/// Build the day's trades. Securities without a usable quote are listed in
/// `unpriced`; the rest are still emitted.
pub fn build_trades(
    date: NaiveDate,
    recommendations: &[Recommendation],
    quotes: &HashMap<String, DailyQuote>,
    config: &LedgerConfig,
) -> Result<LedgerDay, NewswatchError> {
    if !config.total_capital.is_finite() || config.total_capital <= 0.0 {
        return Err(NewswatchError::invariant(format!(
            "total capital must be positive, got {}",
            config.total_capital
        )));
    }

    let mut seen = HashSet::new();
    for rec in recommendations {
        if !seen.insert(rec.code.as_str()) {
            return Err(NewswatchError::DuplicateTrade {
                date,
                code: rec.code.clone(),
            });
        }
    }

    let allocation = if recommendations.is_empty() {
        0.0
    } else {
        config.total_capital / recommendations.len() as f64
    };

    let mut day = LedgerDay {
        date,
        allocation_per_security: allocation,
        trades: Vec::with_capacity(recommendations.len()),
        unpriced: Vec::new(),
    };

    for rec in recommendations {
        match price(rec, date, quotes.get(&rec.code), config.entry_policy) {
            Ok((entry_price, daily)) => {
                let trade = open_position(rec, date, entry_price, daily, allocation)?;
                day.trades.push(trade);
            }
            Err(reason) => {
                tracing::warn!(code = %rec.code, %date, %reason, "security left unpriced");
                day.unpriced.push(UnpricedSecurity {
                    code: rec.code.clone(),
                    reason,
                });
            }
        }
    }

    let invested = day.total_invested();
    if invested > config.total_capital * (1.0 + 1e-9) {
        return Err(NewswatchError::invariant(format!(
            "invested {invested} exceeds capital {}",
            config.total_capital
        )));
    }
    Ok(day)
}

fn price<'a>(
    rec: &Recommendation,
    date: NaiveDate,
    quote: Option<&'a DailyQuote>,
    policy: EntryPolicy,
) -> Result<(f64, &'a DailyQuote), String> {
    let daily = quote.ok_or_else(|| "no quote".to_string())?;
    if daily.quote.date != date {
        return Err(format!("quote dated {} for {}", daily.quote.date, rec.code));
    }
    daily.quote.validate().map_err(|e| e.to_string())?;
    let entry = match policy {
        EntryPolicy::Open => daily.quote.open,
        EntryPolicy::PriorClose => match daily.prior_close {
            Some(p) if p.is_finite() && p > 0.0 => p,
            Some(p) => return Err(format!("unusable prior close {p}")),
            None => return Err("no prior close".to_string()),
        },
    };
    Ok((entry, daily))
}

fn open_position(
    rec: &Recommendation,
    date: NaiveDate,
    entry_price: f64,
    daily: &DailyQuote,
    allocation: f64,
) -> Result<PaperTrade, NewswatchError> {
    let quantity = (allocation / entry_price).floor() as i64;
    let current_price = daily.quote.close;
    let invested_amount = quantity as f64 * entry_price;
    let current_value = quantity as f64 * current_price;
    let pnl = current_value - invested_amount;
    let pnl_rate = if quantity == 0 { 0.0 } else { pnl / invested_amount };

    if [invested_amount, current_value, pnl, pnl_rate]
        .iter()
        .any(|v| !v.is_finite())
    {
        return Err(NewswatchError::invariant(format!(
            "non-finite trade values for {}",
            rec.code
        )));
    }

    Ok(PaperTrade {
        date,
        code: rec.code.clone(),
        name: rec.name.clone(),
        recommendation_id: rec.id,
        entry_date: date,
        entry_price,
        current_price,
        quantity,
        invested_amount,
        current_value,
        pnl,
        pnl_rate,
        quote_source: daily.source.clone(),
    })
}
