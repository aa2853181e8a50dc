//! Persistent record store port trait.

use chrono::NaiveDate;

use crate::domain::error::NewswatchError;
use crate::domain::ledger::PaperTrade;
use crate::domain::news::NewsItem;
use crate::domain::quote::Quote;
use crate::domain::recommendation::Recommendation;
use crate::domain::relevance::RelevanceScore;
use crate::domain::security::Security;

pub trait RecordStore {
    fn initialize_schema(&self) -> Result<(), NewswatchError>;

    /// Create the security on first sighting, otherwise refresh its display
    /// metadata. Returns the stable row id.
    fn upsert_security(&self, security: &Security) -> Result<i64, NewswatchError>;

    fn list_securities(&self) -> Result<Vec<Security>, NewswatchError>;

    /// Store a news item unless its fingerprint is already known. Returns the
    /// row id either way.
    fn insert_news(&self, item: &NewsItem) -> Result<i64, NewswatchError>;

    /// Link a stored item to a security; re-scoring overwrites.
    fn upsert_news_link(
        &self,
        news_id: i64,
        code: &str,
        score: RelevanceScore,
    ) -> Result<(), NewswatchError>;

    /// Insert a day's recommendations atomically. Any (date, security) already
    /// present fails the whole batch with `DuplicateRecommendation`.
    fn insert_recommendations(
        &self,
        recommendations: &[Recommendation],
    ) -> Result<Vec<i64>, NewswatchError>;

    /// Recommendations for `date`, by priority.
    fn recommendations_on(&self, date: NaiveDate) -> Result<Vec<Recommendation>, NewswatchError>;

    fn upsert_daily_price(&self, quote: &Quote) -> Result<(), NewswatchError>;

    /// Append trades atomically. An existing (date, security) fails the whole
    /// batch with `DuplicateTrade`.
    fn append_paper_trades(&self, trades: &[PaperTrade]) -> Result<(), NewswatchError>;

    fn paper_trades_on(&self, date: NaiveDate) -> Result<Vec<PaperTrade>, NewswatchError>;

    /// Trades with `start <= date <= end`, by date then security.
    fn paper_trades_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PaperTrade>, NewswatchError>;
}
