//! Stored recommendation rows.

use chrono::NaiveDate;

use super::selector::Pick;

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    /// Row id once persisted.
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub code: String,
    pub name: String,
    pub priority: u32,
    pub rationale: String,
    pub news_ids: Vec<i64>,
}

impl Recommendation {
    pub fn from_pick(date: NaiveDate, pick: &Pick, name: impl Into<String>) -> Self {
        Self {
            id: None,
            date,
            code: pick.code.clone(),
            name: name.into(),
            priority: pick.priority,
            rationale: pick.rationale.clone(),
            news_ids: pick.supporting_news_ids.clone(),
        }
    }
}
