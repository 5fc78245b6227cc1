//! Configuration management for sqlrag.
//!
//! Handles loading configuration from TOML files and environment variables
//! for the LLM provider, the warehouse, the polling schedule and the prompt.

use crate::error::{Result, RetrieverError};
use crate::execution::poller::{
    DEFAULT_LONG_EVERY, DEFAULT_LONG_SLEEP, DEFAULT_MAX_ATTEMPTS, DEFAULT_SHORT_SLEEP,
};
use crate::execution::PollSchedule;
use crate::llm::{LlmProvider, PromptConfig};
use crate::warehouse::WarehouseBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Main configuration structure for sqlrag.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// LLM provider configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Warehouse connection and query target.
    #[serde(default)]
    pub warehouse: WarehouseConfig,

    /// Status polling schedule.
    #[serde(default)]
    pub polling: PollingConfig,

    /// SQL generation prompt.
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider: "bedrock", "anthropic" or "mock".
    pub provider: LlmProvider,

    /// Model name; falls back to the provider's environment variable, then
    /// its built-in default.
    pub model: Option<String>,

    /// API key (not recommended to store in config; prefer ANTHROPIC_API_KEY).
    pub api_key: Option<String>,

    /// Bedrock region; inherits the warehouse region when unset.
    pub region: Option<String>,

    /// Bedrock credentials profile; inherits the warehouse profile when unset.
    pub credentials_profile: Option<String>,

    /// Explicit Bedrock runtime endpoint, overriding the regional one.
    pub endpoint_url: Option<String>,
}

impl LlmConfig {
    /// Fills the AWS region and credentials profile from the warehouse
    /// section where this section leaves them unset.
    pub fn inherit_aws_settings(&mut self, warehouse: &WarehouseConfig) {
        if self.region.is_none() {
            self.region = warehouse.region.clone();
        }
        if self.credentials_profile.is_none() {
            self.credentials_profile = warehouse.credentials_profile.clone();
        }
    }
}

/// Warehouse configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct WarehouseConfig {
    /// Backend: "athena" or "local".
    pub backend: WarehouseBackend,

    /// Database (catalog schema) the query runs against.
    pub database: Option<String>,

    /// Where the warehouse writes query output (e.g., `s3://bucket/prefix/`).
    pub output_location: Option<String>,

    /// AWS region.
    pub region: Option<String>,

    /// Named credentials profile.
    pub credentials_profile: Option<String>,

    /// Explicit service endpoint, overriding the regional one.
    pub endpoint_url: Option<String>,

    /// SQLite file for the local backend (`:memory:` for a private database).
    pub local_path: Option<String>,
}

impl WarehouseConfig {
    /// Applies environment variables (AWS_REGION, AWS_PROFILE) as defaults.
    pub fn apply_env_defaults(&mut self) {
        if self.region.is_none() {
            self.region = std::env::var("AWS_REGION")
                .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
                .ok();
        }
        if self.credentials_profile.is_none() {
            self.credentials_profile = std::env::var("AWS_PROFILE").ok();
        }
    }

    /// Returns the database, or an empty string when unset.
    pub fn database_or_default(&self) -> &str {
        self.database.as_deref().unwrap_or_default()
    }

    /// Returns the output location, or an empty string when unset.
    pub fn output_location_or_default(&self) -> &str {
        self.output_location.as_deref().unwrap_or_default()
    }

    /// Returns a short description for log output.
    pub fn display_string(&self) -> String {
        match self.backend {
            WarehouseBackend::Athena => {
                let database = self.database.as_deref().unwrap_or("unknown");
                let location = self
                    .endpoint_url
                    .as_deref()
                    .or(self.region.as_deref())
                    .unwrap_or("unknown");
                format!("athena: {database} @ {location}")
            }
            WarehouseBackend::Local => {
                format!("local: {}", self.local_path.as_deref().unwrap_or("unknown"))
            }
        }
    }
}

/// Polling schedule configuration, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollingConfig {
    /// Status polls before giving up.
    pub max_attempts: u32,
    /// Sleep long whenever the remaining budget is a multiple of this.
    pub long_every: u32,
    /// Long sleep in milliseconds.
    pub long_sleep_ms: u64,
    /// Short sleep in milliseconds.
    pub short_sleep_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            long_every: DEFAULT_LONG_EVERY,
            long_sleep_ms: DEFAULT_LONG_SLEEP.as_millis() as u64,
            short_sleep_ms: DEFAULT_SHORT_SLEEP.as_millis() as u64,
        }
    }
}

impl PollingConfig {
    /// Converts to the schedule used by the poller.
    pub fn schedule(&self) -> PollSchedule {
        PollSchedule {
            max_attempts: self.max_attempts,
            long_every: self.long_every,
            long_sleep: Duration::from_millis(self.long_sleep_ms),
            short_sleep: Duration::from_millis(self.short_sleep_ms),
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sqlrag")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| RetrieverError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            RetrieverError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Checks that the configuration can drive a retrieval.
    pub fn validate(&self) -> Result<()> {
        if self.polling.max_attempts == 0 {
            return Err(RetrieverError::config(
                "polling.max_attempts must be at least 1",
            ));
        }
        if self.polling.long_every == 0 {
            return Err(RetrieverError::config(
                "polling.long_every must be at least 1",
            ));
        }

        let warehouse = &self.warehouse;
        match warehouse.backend {
            WarehouseBackend::Athena => {
                if warehouse.database.is_none() {
                    return Err(RetrieverError::config(
                        "Athena requires warehouse.database",
                    ));
                }
                if warehouse.output_location.is_none() {
                    return Err(RetrieverError::config(
                        "Athena requires warehouse.output_location",
                    ));
                }
            }
            WarehouseBackend::Local => {
                if warehouse.local_path.is_none() {
                    return Err(RetrieverError::config(
                        "Local warehouse requires warehouse.local_path",
                    ));
                }
            }
        }

        for endpoint in [&warehouse.endpoint_url, &self.llm.endpoint_url]
            .into_iter()
            .flatten()
        {
            Url::parse(endpoint).map_err(|e| {
                RetrieverError::config(format!("Invalid endpoint_url '{endpoint}': {e}"))
            })?;
        }

        Ok(())
    }
}
