//! Daily quote port trait.

use chrono::NaiveDate;

use crate::domain::error::NewswatchError;
use crate::domain::quote::{DailyQuote, QuoteSource};

pub trait QuotePort {
    fn source(&self) -> QuoteSource;

    /// The session quote for `code` on `date`, with the previous close when
    /// known. A missing session is `QuoteUnavailable`; a transport failure is
    /// `Fetch`.
    fn fetch_quote(&self, code: &str, date: NaiveDate) -> Result<DailyQuote, NewswatchError>;
}
