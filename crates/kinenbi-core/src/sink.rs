// Output seam: where resolved anniversaries are delivered.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::Anniversary;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to post to webhook: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("webhook returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Receives anniversaries one at a time, in emission order.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn deliver(&self, anniversary: &Anniversary) -> Result<(), DeliveryError>;
}
