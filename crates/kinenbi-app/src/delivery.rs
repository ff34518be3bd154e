// Delivery sinks: a Discord-style webhook, or stdout in dry-run mode.

use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use kinenbi_core::{Anniversary, DeliveryError, Sink};

use crate::config::Config;

// ---------------------------------------------------------------------------
// WebhookSink
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Posts each anniversary line as `{"content": <line>}` to a webhook URL.
pub struct WebhookSink {
    http: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Sink for WebhookSink {
    async fn deliver(&self, anniversary: &Anniversary) -> Result<(), DeliveryError> {
        let line = anniversary.to_string();
        let response = self
            .http
            .post(&self.url)
            .json(&WebhookPayload { content: &line })
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(Box::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(source = %anniversary.source, "delivered to webhook");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ConsoleSink
// ---------------------------------------------------------------------------

/// Writes `[DryRun] <line>` per anniversary instead of delivering it.
pub struct ConsoleSink<W = std::io::Stdout> {
    out: Mutex<W>,
}

impl ConsoleSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<W: Write + Send> Sink for ConsoleSink<W> {
    async fn deliver(&self, anniversary: &Anniversary) -> Result<(), DeliveryError> {
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(out, "[DryRun] {anniversary}")?;
        out.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Console output when dry-run is on or no webhook is configured, otherwise
/// the webhook.
pub fn select_sink(config: &Config) -> Result<Box<dyn Sink>, reqwest::Error> {
    match &config.webhook_url {
        Some(url) if !config.dry_run => Ok(Box::new(WebhookSink::new(url.clone(), config.http_timeout)?)),
        _ => Ok(Box::new(ConsoleSink::stdout())),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
