// OpenAI-compatible chat completion client used as an anniversary source.
//
// One POST per lookup with a single user message; the first choice's content
// becomes the description of exactly one `Anniversary`. There is no
// streaming, no conversation state and no retry.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use kinenbi_core::{Anniversary, LookupError, Source};

use crate::prompt::{anniversary_prompt, anniversary_title};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const CHATGPT_NAME: &str = "ChatGPT";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_MODEL: &str = "gpt-3.5-turbo";

pub const PERPLEXITY_NAME: &str = "Perplexity";
pub const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";
pub const PERPLEXITY_MODEL: &str = "llama-3.1-sonar-small-128k-online";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Where a generative client sends its requests and which model it asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub base_url: String,
    pub model: String,
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn openai() -> Self {
        Self::new(OPENAI_BASE_URL, OPENAI_MODEL)
    }

    pub fn perplexity() -> Self {
        Self::new(PERPLEXITY_BASE_URL, PERPLEXITY_MODEL)
    }

    /// `<base_url>/chat/completions`, tolerating a trailing slash on the base.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

// ---------------------------------------------------------------------------
// GenerativeClient
// ---------------------------------------------------------------------------

/// Anniversary source backed by a remote chat completion endpoint.
pub struct GenerativeClient {
    http: reqwest::Client,
    name: String,
    api_key: String,
    endpoint: Endpoint,
}

impl GenerativeClient {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: Endpoint,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            name: name.into(),
            api_key: api_key.into(),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Send `prompt` as a single user message and return the first choice's
    /// content verbatim.
    pub async fn complete(&self, prompt: &str) -> Result<String, LookupError> {
        let request = ChatRequest {
            model: &self.endpoint.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let url = self.endpoint.completions_url();
        debug!(source = %self.name, model = %self.endpoint.model, %url, "sending completion request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LookupError::Transport(Box::new(e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LookupError::Transport(Box::new(e)))?;

        if !status.is_success() {
            return Err(LookupError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_first_choice(&body, &self.name)
    }
}

#[async_trait]
impl Source for GenerativeClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, date: NaiveDate) -> Result<Vec<Anniversary>, LookupError> {
        let content = self.complete(&anniversary_prompt(date)).await?;
        Ok(vec![Anniversary::new(
            date,
            anniversary_title(date),
            content,
            self.name.clone(),
        )])
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Extract `choices[0].message.content` from a completion response body.
///
/// Expected shape: `{ "choices": [ { "message": { "role": "...", "content": "..." } } ] }`
pub(crate) fn parse_first_choice(body: &str, source_name: &str) -> Result<String, LookupError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| LookupError::Decode(e.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| LookupError::EmptyResponse(source_name.to_string()))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
