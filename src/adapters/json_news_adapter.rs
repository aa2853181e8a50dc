//! News source backed by a JSON file of collected items.
//!
//! The file holds an array of raw items (`title`, `url`, `published_at`,
//! `collected_at`, optional `body` and `source`). An external collector keeps
//! it current; it is re-read on every fetch.

use std::fs;
use std::path::PathBuf;

use crate::domain::error::NewswatchError;
use crate::domain::news::{NewsWindow, RawNewsItem};
use crate::ports::news_port::NewsPort;

pub struct JsonNewsAdapter {
    path: PathBuf,
}

impl JsonNewsAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Result<Vec<RawNewsItem>, NewswatchError> {
        let content = fs::read_to_string(&self.path).map_err(|e| NewswatchError::Fetch {
            source_name: self.name().into(),
            reason: format!("failed to read {}: {e}", self.path.display()),
        })?;
        serde_json::from_str(&content).map_err(|e| NewswatchError::Fetch {
            source_name: self.name().into(),
            reason: format!("invalid news file {}: {e}", self.path.display()),
        })
    }
}

/// Every whitespace token of the query appears in the item, ignoring case.
fn matches_query(item: &RawNewsItem, query: &str) -> bool {
    let text = format!("{} {}", item.title, item.body.as_deref().unwrap_or("")).to_lowercase();
    let mut tokens = query.split_whitespace().peekable();
    if tokens.peek().is_none() {
        return true;
    }
    tokens.all(|t| text.contains(&t.to_lowercase()))
}

impl NewsPort for JsonNewsAdapter {
    fn name(&self) -> &str {
        "json"
    }

    fn fetch(&self, query: &str, window: &NewsWindow) -> Result<Vec<RawNewsItem>, NewswatchError> {
        let items: Vec<RawNewsItem> = self
            .load()?
            .into_iter()
            .filter(|item| window.contains(item.published_at) && matches_query(item, query))
            .collect();
        tracing::debug!(query, count = items.len(), "json news fetched");
        Ok(items)
    }
}
