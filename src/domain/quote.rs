//! Daily quote representation and sanity checks.

use std::fmt;

use chrono::NaiveDate;

use super::error::NewswatchError;

/// Largest |close/open - 1| accepted as a real trading day.
const MAX_INTRADAY_MOVE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub code: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    /// Percent change against the prior close, when the provider reports it.
    pub change_rate: Option<f64>,
}

impl Quote {
    /// Reject quotes that cannot describe a real trading day.
    pub fn validate(&self) -> Result<(), NewswatchError> {
        let reject = |reason: String| {
            Err(NewswatchError::QuoteUnavailable {
                code: self.code.clone(),
                date: self.date,
                reason,
            })
        };
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return reject("non-positive or non-finite price".into());
        }
        if self.high < self.low {
            return reject(format!("high {} below low {}", self.high, self.low));
        }
        if self.open < self.low || self.open > self.high {
            return reject(format!("open {} outside [{}, {}]", self.open, self.low, self.high));
        }
        if self.close < self.low || self.close > self.high {
            return reject(format!("close {} outside [{}, {}]", self.close, self.low, self.high));
        }
        let moved = (self.close / self.open - 1.0).abs();
        if moved > MAX_INTRADAY_MOVE {
            return reject(format!("close moved {:.1}% from open", moved * 100.0));
        }
        Ok(())
    }
}

/// Where a quote came from. Dummy quotes are synthetic and excluded from
/// performance statistics by default.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QuoteSource {
    Csv,
    Dummy,
    External(String),
}

impl QuoteSource {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "csv" => QuoteSource::Csv,
            "dummy" => QuoteSource::Dummy,
            other => QuoteSource::External(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            QuoteSource::Csv => "csv",
            QuoteSource::Dummy => "dummy",
            QuoteSource::External(name) => name,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self, QuoteSource::Dummy)
    }
}

impl fmt::Display for QuoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A quote as delivered by a provider, with the previous session's close.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyQuote {
    pub quote: Quote,
    pub prior_close: Option<f64>,
    pub source: QuoteSource,
}
