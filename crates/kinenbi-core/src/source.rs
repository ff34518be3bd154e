// The `Source` seam shared by every anniversary provider.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::model::Anniversary;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Why a single (source, date) lookup failed.
///
/// None of these are fatal to a run: the registry logs them and moves on.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("failed to open record file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("malformed CSV in {path} on line {line}: {message}")]
    Parse {
        path: String,
        line: u64,
        message: String,
    },

    #[error("lookup task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("request failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("no response from {0}")]
    EmptyResponse(String),
}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// A pluggable producer of anniversaries for a calendar date.
#[async_trait]
pub trait Source: Send + Sync {
    /// Stable display name, stamped on every produced `Anniversary`.
    fn name(&self) -> &str;

    /// Resolve zero or more anniversaries for `date`.
    async fn lookup(&self, date: NaiveDate) -> Result<Vec<Anniversary>, LookupError>;
}
