// Configuration loading: optional `config/kinenbi.toml` for non-secret
// settings, environment variables for credentials and switches.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use kinenbi_llm::client::{
    OPENAI_BASE_URL, OPENAI_MODEL, PERPLEXITY_BASE_URL, PERPLEXITY_MODEL,
};
use kinenbi_llm::Endpoint;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "config/kinenbi.toml";
pub const DEFAULT_DATASET_PATH: &str = "data/anniversaries.csv";
pub const DEFAULT_DAYS: u32 = 7;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_URL";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_PERPLEXITY_API_KEY: &str = "PERPLEXITY_API_KEY";
pub const ENV_DRY_RUN: &str = "DRY_RUN";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

/// Process configuration, read once at start-up and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub dataset_path: PathBuf,
    pub days: u32,
    pub http_timeout: Duration,
    pub chatgpt: Endpoint,
    pub perplexity: Endpoint,
    pub credentials: CredentialsConfig,
    pub webhook_url: Option<String>,
    pub dry_run: bool,
}

impl Config {
    /// Console delivery is used when dry-run is on or no webhook is set.
    pub fn delivers_to_console(&self) -> bool {
        self.dry_run || self.webhook_url.is_none()
    }
}

/// Per-provider API keys. Absent keys disable the provider.
#[derive(Clone, Default)]
pub struct CredentialsConfig {
    pub openai_api_key: Option<String>,
    pub perplexity_api_key: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("CredentialsConfig")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("perplexity_api_key", &redact(&self.perplexity_api_key))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// kinenbi.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for kinenbi.toml. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SettingsFile {
    dataset: DatasetSection,
    schedule: ScheduleSection,
    http: HttpSection,
    providers: ProvidersSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct DatasetSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ScheduleSection {
    days: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct HttpSection {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ProvidersSection {
    chatgpt: ProviderSection,
    perplexity: ProviderSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ProviderSection {
    base_url: Option<String>,
    model: Option<String>,
}

impl ProviderSection {
    fn resolve(self, default_base_url: &str, default_model: &str) -> Endpoint {
        Endpoint::new(
            self.base_url.unwrap_or_else(|| default_base_url.to_string()),
            self.model.unwrap_or_else(|| default_model.to_string()),
        )
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `<base_dir>/config/kinenbi.toml`
/// (optional) and the given environment map.
///
/// A relative dataset path is resolved against `base_dir`. Empty environment
/// values count as unset.
pub fn load_config_from(base_dir: &Path, env: &HashMap<String, String>) -> Result<Config, ConfigError> {
    let settings_path = base_dir.join(CONFIG_FILE);
    let settings: SettingsFile = if settings_path.exists() {
        let text = std::fs::read_to_string(&settings_path).map_err(|e| ConfigError::ReadError {
            path: settings_path.clone(),
            source: e,
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseError {
            path: settings_path.clone(),
            source: e,
        })?
    } else {
        SettingsFile::default()
    };

    let dataset = settings
        .dataset
        .path
        .unwrap_or_else(|| DEFAULT_DATASET_PATH.to_string());
    if dataset.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "dataset.path".into(),
            message: "must not be empty".into(),
        });
    }
    let dataset_path = PathBuf::from(dataset);
    let dataset_path = if dataset_path.is_relative() {
        base_dir.join(dataset_path)
    } else {
        dataset_path
    };

    let config = Config {
        dataset_path,
        days: settings.schedule.days.unwrap_or(DEFAULT_DAYS),
        http_timeout: Duration::from_secs(settings.http.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        chatgpt: settings.providers.chatgpt.resolve(OPENAI_BASE_URL, OPENAI_MODEL),
        perplexity: settings
            .providers
            .perplexity
            .resolve(PERPLEXITY_BASE_URL, PERPLEXITY_MODEL),
        credentials: CredentialsConfig {
            openai_api_key: env_value(env, ENV_OPENAI_API_KEY),
            perplexity_api_key: env_value(env, ENV_PERPLEXITY_API_KEY),
        },
        webhook_url: env_value(env, ENV_WEBHOOK_URL),
        dry_run: env.get(ENV_DRY_RUN).is_some_and(|v| v == "true"),
    };

    validate(&config)?;

    Ok(config)
}

/// Convenience wrapper: loads config relative to the current working
/// directory using the process environment.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::ReadError {
        path: PathBuf::from("."),
        source: e,
    })?;
    let env: HashMap<String, String> = std::env::vars().collect();
    load_config_from(&cwd, &env)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn env_value(env: &HashMap<String, String>, key: &str) -> Option<String> {
    env.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.days == 0 {
        return Err(ConfigError::ValidationError {
            field: "schedule.days".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.http_timeout.is_zero() {
        return Err(ConfigError::ValidationError {
            field: "http.timeout_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    let endpoints: &[(&str, &Endpoint)] = &[
        ("providers.chatgpt", &config.chatgpt),
        ("providers.perplexity", &config.perplexity),
    ];
    for (name, endpoint) in endpoints {
        if endpoint.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: format!("{name}.base_url"),
                message: "must not be empty".into(),
            });
        }
        if endpoint.model.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: format!("{name}.model"),
                message: "must not be empty".into(),
            });
        }
    }

    // Dry-run never posts, so the webhook URL is not checked there.
    if let Some(url) = config.webhook_url.as_ref().filter(|_| !config.dry_run) {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError {
                field: ENV_WEBHOOK_URL.into(),
                message: format!("must be an http(s) URL, got {url:?}"),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
