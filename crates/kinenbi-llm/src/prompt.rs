// Prompt and title text for generative anniversary lookups.

use chrono::{Datelike, NaiveDate};

/// The single user message sent for `date`: states the date and asks,
/// in Japanese, for historical events or commemorations on it, briefly.
pub fn anniversary_prompt(date: NaiveDate) -> String {
    format!(
        "今日は{}年{}月{}日です。この日は何の日ですか？歴史的な出来事や記念日を教えてください。簡潔に答えてください。",
        date.year(),
        date.month(),
        date.day()
    )
}

/// Title attached to a generated answer, e.g. `3月14日の出来事`.
pub fn anniversary_title(date: NaiveDate) -> String {
    format!("{}月{}日の出来事", date.month(), date.day())
}
