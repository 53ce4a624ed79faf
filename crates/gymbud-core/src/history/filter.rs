//! History list filtering (status, date range, free-text query).

use chrono::NaiveDate;

use crate::models::{HistoryListItem, SessionStatus};
use crate::{Error, Result};

/// Filter applied to the history list. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub status: Option<SessionStatus>,
    /// Inclusive lower bound
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound
    pub to: Option<NaiveDate>,
    /// Case-insensitive substring of the rendered date
    pub query: String,
}

impl HistoryFilter {
    /// Build a filter from raw user input. Blank values are treated as unset.
    pub fn parse(
        status: Option<&str>,
        from: Option<&str>,
        to: Option<&str>,
        query: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            status: non_blank(status).map(str::parse).transpose()?,
            from: non_blank(from).map(parse_date).transpose()?,
            to: non_blank(to).map(parse_date).transpose()?,
            query: query.unwrap_or_default().trim().to_lowercase(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.from.is_none() && self.to.is_none() && self.query.is_empty()
    }

    pub fn matches(&self, item: &HistoryListItem) -> bool {
        if self.status.is_some_and(|status| status != item.status) {
            return false;
        }
        if self.from.is_some_and(|from| item.date < from) {
            return false;
        }
        if self.to.is_some_and(|to| item.date > to) {
            return false;
        }

        let query = self.query.trim();
        query.is_empty() || item.date.to_string().to_lowercase().contains(&query.to_lowercase())
    }
}

/// Items that pass `filter`, order preserved.
#[must_use]
pub fn filter_history(items: &[HistoryListItem], filter: &HistoryFilter) -> Vec<HistoryListItem> {
    items
        .iter()
        .filter(|item| filter.matches(item))
        .cloned()
        .collect()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    raw.parse()
        .map_err(|_| Error::InvalidInput(format!("invalid date '{raw}', expected YYYY-MM-DD")))
}
