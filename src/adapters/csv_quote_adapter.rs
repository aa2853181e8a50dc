//! CSV quote adapter: one `<CODE>.csv` file of daily bars per security.
//!
//! Columns: `date,open,high,low,close,volume[,change_rate]`, dates as
//! `YYYY-MM-DD`, any row order. The files are local input, so a missing,
//! unreadable or malformed file makes the quote unavailable. It is never an
//! upstream outage and is neither retried nor sent to a fallback source.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::domain::error::NewswatchError;
use crate::domain::quote::{DailyQuote, Quote, QuoteSource};
use crate::ports::quote_port::QuotePort;

pub struct CsvQuoteAdapter {
    base_path: PathBuf,
}

impl CsvQuoteAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{code}.csv"))
    }

    fn read_bars(&self, code: &str) -> Result<Vec<Quote>, NewswatchError> {
        let path = self.csv_path(code);
        let content = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                unavailable(code, format!("no quote file {}", path.display()))
            } else {
                unavailable(code, format!("failed to read {}: {e}", path.display()))
            }
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| unavailable(code, format!("CSV parse error: {e}")))?;
            let date_str = record
                .get(0)
                .ok_or_else(|| unavailable(code, "missing date column".into()))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| unavailable(code, format!("invalid date {date_str:?}: {e}")))?;

            let change_rate = match record.get(6).map(str::trim) {
                None | Some("") => None,
                Some(raw) => Some(
                    raw.parse()
                        .map_err(|e| unavailable(code, format!("invalid change_rate value: {e}")))?,
                ),
            };

            bars.push(Quote {
                code: code.to_string(),
                date,
                open: column(&record, 1, "open", code)?,
                high: column(&record, 2, "high", code)?,
                low: column(&record, 3, "low", code)?,
                close: column(&record, 4, "close", code)?,
                volume: column(&record, 5, "volume", code)?,
                change_rate,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

/// The session date is filled in by `fetch_quote`.
fn unavailable(code: &str, reason: String) -> NewswatchError {
    NewswatchError::QuoteUnavailable {
        code: code.to_string(),
        date: NaiveDate::MIN,
        reason,
    }
}

fn column<T>(record: &csv::StringRecord, idx: usize, name: &str, code: &str) -> Result<T, NewswatchError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    record
        .get(idx)
        .ok_or_else(|| unavailable(code, format!("missing {name} column")))?
        .trim()
        .parse()
        .map_err(|e| unavailable(code, format!("invalid {name} value: {e}")))
}

impl QuotePort for CsvQuoteAdapter {
    fn source(&self) -> QuoteSource {
        QuoteSource::Csv
    }

    fn fetch_quote(&self, code: &str, date: NaiveDate) -> Result<DailyQuote, NewswatchError> {
        let bars = self.read_bars(code).map_err(|e| match e {
            NewswatchError::QuoteUnavailable { code, reason, .. } => {
                NewswatchError::QuoteUnavailable { code, date, reason }
            }
            other => other,
        })?;

        let idx = bars
            .iter()
            .position(|b| b.date == date)
            .ok_or_else(|| NewswatchError::QuoteUnavailable {
                code: code.to_string(),
                date,
                reason: "no session on that date".into(),
            })?;
        let prior_close = idx.checked_sub(1).map(|i| bars[i].close);

        Ok(DailyQuote {
            quote: bars[idx].clone(),
            prior_close,
            source: QuoteSource::Csv,
        })
    }
}
