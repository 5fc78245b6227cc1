//! Command-line argument parsing for sqlrag.
//!
//! Uses clap to parse CLI arguments. Flags override the config file.

use crate::config::Config;
use crate::error::{Result, RetrieverError};
use crate::llm::LlmProvider;
use crate::retriever::RunContext;
use crate::warehouse::WarehouseBackend;
use clap::Parser;
use std::path::PathBuf;

/// Output format for retrieved documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Data content, then one `key: value` line per metadata field.
    #[default]
    Text,
    /// Both documents as a JSON array.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}. Expected: text or json")),
        }
    }
}

/// Answers a question by generating SQL, running it on a warehouse and
/// printing the result documents.
#[derive(Parser, Debug)]
#[command(name = "sqlrag")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Natural-language question to answer
    #[arg(value_name = "QUESTION")]
    pub question: String,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// LLM provider: bedrock, anthropic or mock
    #[arg(long, value_name = "PROVIDER")]
    pub llm: Option<String>,

    /// Model name for the LLM provider
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Warehouse backend: athena or local
    #[arg(long, value_name = "BACKEND")]
    pub warehouse: Option<String>,

    /// Database the query runs against
    #[arg(short = 'd', long, value_name = "DATABASE")]
    pub database: Option<String>,

    /// Query output location (e.g., s3://bucket/prefix/)
    #[arg(long, value_name = "URI")]
    pub output_location: Option<String>,

    /// AWS region (also used by Bedrock unless llm.region is set)
    #[arg(long, value_name = "REGION")]
    pub region: Option<String>,

    /// Named AWS credentials profile
    #[arg(long, value_name = "NAME")]
    pub profile: Option<String>,

    /// Explicit warehouse endpoint URL
    #[arg(long, value_name = "URL")]
    pub endpoint_url: Option<String>,

    /// SQLite database file for the local warehouse
    #[arg(long, value_name = "PATH")]
    pub local_path: Option<String>,

    /// SQL seed file run against the local warehouse before retrieval
    #[arg(long, value_name = "PATH")]
    pub seed: Option<PathBuf>,

    /// Output format: text or json
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub format: String,

    /// Run identifier used to tag log output
    #[arg(long, value_name = "ID")]
    pub run_id: Option<String>,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Overrides config values with the flags that were given.
    pub fn apply_to(&self, config: &mut Config) -> Result<()> {
        if let Some(llm) = &self.llm {
            config.llm.provider = llm.parse::<LlmProvider>().map_err(RetrieverError::config)?;
        }
        if let Some(model) = &self.model {
            config.llm.model = Some(model.clone());
        }

        let warehouse = &mut config.warehouse;
        if let Some(backend) = &self.warehouse {
            warehouse.backend = backend
                .parse::<WarehouseBackend>()
                .map_err(RetrieverError::config)?;
        }
        override_with(&mut warehouse.database, &self.database);
        override_with(&mut warehouse.output_location, &self.output_location);
        override_with(&mut warehouse.region, &self.region);
        override_with(&mut warehouse.credentials_profile, &self.profile);
        override_with(&mut warehouse.endpoint_url, &self.endpoint_url);
        override_with(&mut warehouse.local_path, &self.local_path);

        Ok(())
    }

    /// Parses the output format from the --format argument.
    pub fn parse_output_format(&self) -> std::result::Result<OutputFormat, String> {
        self.format.parse()
    }

    /// Returns the run context, generating a run id when none was given.
    pub fn run_context(&self) -> RunContext {
        match &self.run_id {
            Some(id) => RunContext::new(id.clone()),
            None => RunContext::generated(),
        }
    }
}

fn override_with(target: &mut Option<String>, value: &Option<String>) {
    if value.is_some() {
        target.clone_from(value);
    }
}
