// Static anniversary records backed by a CSV file.
//
// The file has a header row followed by data rows of at least six columns:
// column 0 is the `M-DD` key (unpadded month, zero-padded day, no year),
// column 1 the title and column 5 the description. Columns 2-4 are unused.

use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::model::Anniversary;
use crate::source::{LookupError, Source};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const RECORD_STORE_NAME: &str = "Static CSV";

const MIN_COLUMNS: usize = 6;
const COL_DATE: usize = 0;
const COL_TITLE: usize = 1;
const COL_DESCRIPTION: usize = 5;

// ---------------------------------------------------------------------------
// Key formatting
// ---------------------------------------------------------------------------

/// Matching key for a date: unpadded month, zero-padded day (`3-04`, `12-25`).
///
/// Dataset keys follow this exact convention, so the month must stay
/// unpadded even though the day is padded.
pub fn month_day_key(date: NaiveDate) -> String {
    format!("{}-{:02}", date.month(), date.day())
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

/// Source that scans a CSV dataset of dated historical records.
///
/// Every lookup re-reads the whole file; nothing is cached.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lookup_file(&self, date: NaiveDate) -> Result<Vec<Anniversary>, LookupError> {
        let path = self.path.display().to_string();
        let file = std::fs::File::open(&self.path).map_err(|e| LookupError::Io {
            path: path.clone(),
            source: e,
        })?;
        lookup_in_reader(file, date).map_err(|e| match e {
            TableError::Io(source) => LookupError::Io { path, source },
            TableError::Csv(source) => LookupError::Csv { path, source },
            TableError::Quoting { line, problem } => LookupError::Parse {
                path,
                line,
                message: problem.to_string(),
            },
        })
    }
}

#[async_trait]
impl Source for RecordStore {
    fn name(&self) -> &str {
        RECORD_STORE_NAME
    }

    async fn lookup(&self, date: NaiveDate) -> Result<Vec<Anniversary>, LookupError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.lookup_file(date)).await?
    }
}

// ---------------------------------------------------------------------------
// Table errors
// ---------------------------------------------------------------------------

/// Why a CSV table could not be scanned.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("failed to read table: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("malformed quoting on line {line}: {problem}")]
    Quoting { line: u64, problem: QuotingProblem },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QuotingProblem {
    #[error("bare quote in unquoted field")]
    BareQuote,
    #[error("unexpected text after closing quote")]
    TextAfterClosingQuote,
    #[error("quoted field is never closed")]
    Unterminated,
}

// ---------------------------------------------------------------------------
// Quoting check
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum QuoteState {
    FieldStart,
    Unquoted,
    Quoted,
    /// Inside a quoted field, just after a `"` (closing or first of `""`).
    QuoteInQuoted,
}

/// Reject quoting the `csv` reader would otherwise accept leniently: a `"`
/// inside an unquoted field, text after a closing quote, and a quoted field
/// still open at end of input.
fn check_quoting(data: &[u8]) -> Result<(), TableError> {
    let mut state = QuoteState::FieldStart;
    let mut line: u64 = 1;
    let mut quote_opened_on = line;

    for &byte in data {
        state = match state {
            QuoteState::FieldStart => match byte {
                b'"' => {
                    quote_opened_on = line;
                    QuoteState::Quoted
                }
                b',' | b'\r' | b'\n' => QuoteState::FieldStart,
                _ => QuoteState::Unquoted,
            },
            QuoteState::Unquoted => match byte {
                b'"' => {
                    return Err(TableError::Quoting {
                        line,
                        problem: QuotingProblem::BareQuote,
                    })
                }
                b',' | b'\r' | b'\n' => QuoteState::FieldStart,
                _ => QuoteState::Unquoted,
            },
            QuoteState::Quoted if byte == b'"' => QuoteState::QuoteInQuoted,
            QuoteState::Quoted => QuoteState::Quoted,
            QuoteState::QuoteInQuoted => match byte {
                b'"' => QuoteState::Quoted,
                b',' | b'\r' | b'\n' => QuoteState::FieldStart,
                _ => {
                    return Err(TableError::Quoting {
                        line,
                        problem: QuotingProblem::TextAfterClosingQuote,
                    })
                }
            },
        };
        if byte == b'\n' {
            line += 1;
        }
    }

    if matches!(state, QuoteState::Quoted) {
        return Err(TableError::Quoting {
            line: quote_opened_on,
            problem: QuotingProblem::Unterminated,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

/// Scan CSV rows from `rdr` and return one anniversary per row whose key
/// matches `date`, in file order.
///
/// Rows shorter than six columns are skipped. Malformed quoting or any
/// reader error aborts the scan, since a malformed table cannot be trusted
/// past that point.
pub fn lookup_in_reader<R: Read>(mut rdr: R, date: NaiveDate) -> Result<Vec<Anniversary>, TableError> {
    let mut data = Vec::new();
    rdr.read_to_end(&mut data)?;
    check_quoting(&data)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data.as_slice());

    let key = month_day_key(date);
    let mut anniversaries = Vec::new();

    for result in reader.records() {
        let record = result?;
        if record.len() < MIN_COLUMNS {
            debug!(
                "skipping record with {} columns (line {:?})",
                record.len(),
                record.position().map(|p| p.line())
            );
            continue;
        }

        if record[COL_DATE].trim() != key {
            continue;
        }

        anniversaries.push(Anniversary::new(
            date,
            record[COL_TITLE].trim(),
            record[COL_DESCRIPTION].trim(),
            RECORD_STORE_NAME,
        ));
    }

    Ok(anniversaries)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
