// Assembles the active source registry from configuration.

use tracing::info;

use kinenbi_core::{RecordStore, SourceRegistry};
use kinenbi_llm::client::{CHATGPT_NAME, PERPLEXITY_NAME};
use kinenbi_llm::GenerativeClient;

use crate::config::Config;

/// Record store first, then ChatGPT, then Perplexity. A generative source is
/// included only when its API key is configured; this order is the emission
/// order of every run.
pub fn build_registry(config: &Config) -> Result<SourceRegistry, reqwest::Error> {
    let mut registry = SourceRegistry::new();

    registry.push(RecordStore::new(&config.dataset_path));

    if let Some(key) = &config.credentials.openai_api_key {
        registry.push(GenerativeClient::new(
            CHATGPT_NAME,
            key.clone(),
            config.chatgpt.clone(),
            config.http_timeout,
        )?);
    } else {
        info!("{} source disabled (no API key)", CHATGPT_NAME);
    }

    if let Some(key) = &config.credentials.perplexity_api_key {
        registry.push(GenerativeClient::new(
            PERPLEXITY_NAME,
            key.clone(),
            config.perplexity.clone(),
            config.http_timeout,
        )?);
    } else {
        info!("{} source disabled (no API key)", PERPLEXITY_NAME);
    }

    Ok(registry)
}
