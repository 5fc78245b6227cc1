//! LLM client factory.
//!
//! Centralizes provider-specific logic for creating LLM clients.

use crate::config::LlmConfig;
use crate::error::{Result, RetrieverError};
use crate::llm::anthropic::DEFAULT_ANTHROPIC_MODEL;
use crate::llm::bedrock::DEFAULT_BEDROCK_MODEL;
use crate::llm::{
    AnthropicClient, AnthropicConfig, BedrockClient, BedrockConfig, LlmClient, LlmProvider,
    MockLlmClient,
};

/// Creates an LLM client for the configured provider.
///
/// Bedrock signs with credentials for `credentials_profile` (or the default
/// chain) in `region`, which must be set.
///
/// The Anthropic API key is resolved in order:
/// 1. `api_key` in the `[llm]` config table
/// 2. `ANTHROPIC_API_KEY` environment variable
///
/// When no model is configured, `BEDROCK_MODEL_ID` / `ANTHROPIC_MODEL` are
/// consulted before the built-in defaults.
pub async fn create_client(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider {
        LlmProvider::Bedrock => {
            let region = config.region.as_deref().ok_or_else(|| {
                RetrieverError::config("Bedrock requires a region. Set llm.region or AWS_REGION.")
            })?;
            let model = resolve_model(config, "BEDROCK_MODEL_ID", DEFAULT_BEDROCK_MODEL);
            let mut bedrock = BedrockConfig::new(model, region)?
                .with_credentials_profile(config.credentials_profile.clone());
            if let Some(endpoint) = &config.endpoint_url {
                bedrock = bedrock.with_endpoint(endpoint)?;
            }
            Ok(Box::new(BedrockClient::connect(bedrock).await?))
        }
        LlmProvider::Anthropic => {
            let key = config
                .api_key
                .clone()
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
                .ok_or_else(|| {
                    RetrieverError::config(
                        "No API key configured. Set llm.api_key or ANTHROPIC_API_KEY.",
                    )
                })?;
            let model = resolve_model(config, "ANTHROPIC_MODEL", DEFAULT_ANTHROPIC_MODEL);
            Ok(Box::new(AnthropicClient::new(AnthropicConfig::new(
                key, model,
            ))?))
        }
        LlmProvider::Mock => Ok(Box::new(MockLlmClient::new())),
    }
}

fn resolve_model(config: &LlmConfig, env_var: &str, default: &str) -> String {
    config
        .model
        .clone()
        .or_else(|| std::env::var(env_var).ok())
        .unwrap_or_else(|| default.to_string())
}
