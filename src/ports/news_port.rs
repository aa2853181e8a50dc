//! News source port trait.

use crate::domain::error::NewswatchError;
use crate::domain::news::{NewsWindow, RawNewsItem};

pub trait NewsPort {
    /// Short provider name used in logs and degradation notes.
    fn name(&self) -> &str;

    /// Items matching `query` published inside `window`, in provider order.
    fn fetch(&self, query: &str, window: &NewsWindow) -> Result<Vec<RawNewsItem>, NewswatchError>;
}
