// Resolved anniversary facts.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A resolved "on this day" fact produced by a source for one query date.
///
/// `date` is always the date that was queried, never a date read back from
/// storage, so two sources answering the same query agree on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anniversary {
    pub date: NaiveDate,
    pub title: String,
    pub description: String,
    /// Display name of the producing source.
    pub source: String,
}

impl Anniversary {
    pub fn new(
        date: NaiveDate,
        title: impl Into<String>,
        description: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            date,
            title: title.into(),
            description: description.into(),
            source: source.into(),
        }
    }
}

/// Renders the delivery line: `[<source>] <title>: <description>`.
impl fmt::Display for Anniversary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.source, self.title, self.description)
    }
}
