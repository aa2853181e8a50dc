//! Synthetic quotes for dry runs and fallback.
//!
//! The generator for each (code, date) pair is seeded from a stable FNV-1a
//! hash, so reruns of a cycle produce identical trades. `StdRng` makes no
//! promise of identical output across `rand` releases: prices repeat only
//! while the locked `rand` version stays the same, and a `rand` upgrade may
//! change every synthetic price.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::error::NewswatchError;
use crate::domain::quote::{DailyQuote, Quote, QuoteSource};
use crate::ports::quote_port::QuotePort;

const BASE_PRICE_FLOOR: f64 = 50_000.0;
const BASE_PRICE_SPAN: u64 = 100_000;
/// Largest simulated session move, in percent.
const MAX_DAILY_MOVE_PCT: f64 = 3.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct DummyQuoteAdapter;

/// 64-bit FNV-1a. Unlike `DefaultHasher`, its output is fixed across Rust releases.
fn stable_hash(parts: &[&str]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for part in parts {
        for byte in part.bytes().chain(std::iter::once(0xff)) {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
    }
    hash
}

fn session_rng(code: &str, date: NaiveDate) -> StdRng {
    StdRng::seed_from_u64(stable_hash(&[code, &date.to_string()]))
}

fn closing_price(code: &str, date: NaiveDate) -> f64 {
    let base = BASE_PRICE_FLOOR + (stable_hash(&[code]) % BASE_PRICE_SPAN) as f64;
    let drift_pct: f64 = session_rng(code, date).gen_range(-5.0..=5.0);
    (base * (1.0 + drift_pct / 100.0)).round()
}

impl DummyQuoteAdapter {
    pub fn quote_for(code: &str, date: NaiveDate) -> DailyQuote {
        let close = closing_price(code, date);
        let mut rng = session_rng(code, date);
        // Skip the draw already used for the close.
        let _: f64 = rng.gen_range(-5.0..=5.0);
        let move_pct: f64 = rng.gen_range(-MAX_DAILY_MOVE_PCT..=MAX_DAILY_MOVE_PCT);

        let open = (close * (1.0 - move_pct * 0.3 / 100.0)).round();
        let high = (close * (1.0 + move_pct.abs() * 0.5 / 100.0)).round().max(open);
        let low = (close * (1.0 - move_pct.abs() * 0.5 / 100.0)).round().min(open);
        let prior_close = date.pred_opt().map(|prev| closing_price(code, prev));

        DailyQuote {
            quote: Quote {
                code: code.to_string(),
                date,
                open,
                high,
                low,
                close,
                volume: rng.gen_range(1_000_000..10_000_000),
                change_rate: prior_close.map(|p| ((close / p - 1.0) * 10_000.0).round() / 100.0),
            },
            prior_close,
            source: QuoteSource::Dummy,
        }
    }
}

impl QuotePort for DummyQuoteAdapter {
    fn source(&self) -> QuoteSource {
        QuoteSource::Dummy
    }

    fn fetch_quote(&self, code: &str, date: NaiveDate) -> Result<DailyQuote, NewswatchError> {
        Ok(Self::quote_for(code, date))
    }
}
