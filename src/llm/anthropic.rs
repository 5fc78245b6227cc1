//! Anthropic LLM client implementation.
//!
//! Implements the LlmClient trait for Anthropic's Messages API (Claude models).
//! The request and response bodies are shared with the Bedrock client, which
//! carries the same Messages format inside InvokeModel.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, RetrieverError};
use crate::llm::types::{CompletionParams, Message, Role};
use crate::llm::LlmClient;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Anthropic API base URL.
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version header.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default model when none is configured.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

/// Anthropic client configuration.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Model to use (e.g., "claude-sonnet-4-20250514").
    pub model: String,
    /// Messages endpoint.
    pub api_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl AnthropicConfig {
    /// Creates a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            api_url: ANTHROPIC_API_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Points the client at a different Messages endpoint.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

/// Anthropic LLM client.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicClient {
    /// Creates a new Anthropic client with the given configuration.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                RetrieverError::generation(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    fn build_request(&self, messages: &[Message], params: &CompletionParams) -> AnthropicRequest {
        messages_request(
            MessagesTarget::Model(self.config.model.clone()),
            messages,
            params,
        )
    }

    /// Parses an API error response.
    fn parse_error(status: reqwest::StatusCode, body: &str) -> RetrieverError {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return RetrieverError::generation(
                "Authentication failed. Check your ANTHROPIC_API_KEY.",
            );
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return RetrieverError::generation("Rate limited. Please wait and try again.");
        }

        if let Ok(error_response) = serde_json::from_str::<AnthropicErrorResponse>(body) {
            return RetrieverError::generation(format!(
                "Anthropic API error: {}",
                error_response.error.message
            ));
        }

        RetrieverError::generation(format!("Anthropic API error ({}): {}", status, body))
    }
}

/// How a Messages request names what it runs against.
pub(super) enum MessagesTarget {
    /// Direct API: the model goes in the body.
    Model(String),
    /// Hosted API: the model is in the URL and the body carries a version.
    Version(&'static str),
}

/// Builds a Messages request body: system text goes in its own field.
pub(super) fn messages_request(
    target: MessagesTarget,
    messages: &[Message],
    params: &CompletionParams,
) -> AnthropicRequest {
    let mut system = None;
    let mut converted = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => system = Some(msg.content.clone()),
            Role::User | Role::Assistant => converted.push(AnthropicMessage {
                role: msg.role.as_str().to_string(),
                content: vec![AnthropicContentBlock {
                    content_type: "text".to_string(),
                    text: msg.content.clone(),
                }],
            }),
        }
    }

    let (model, anthropic_version) = match target {
        MessagesTarget::Model(model) => (Some(model), None),
        MessagesTarget::Version(version) => (None, Some(version)),
    };

    AnthropicRequest {
        model,
        anthropic_version,
        max_tokens: params.max_tokens,
        temperature: params.temperature,
        top_p: params.top_p,
        system,
        messages: converted,
    }
}

/// Parses a Messages response body and returns its first text block.
pub(super) fn parse_messages_response(body: &str) -> Result<String> {
    let response: AnthropicResponse = serde_json::from_str(body)
        .map_err(|e| RetrieverError::generation(format!("Failed to parse response: {}", e)))?;
    first_text_block(response)
}

/// Extracts the text of the first content block.
fn first_text_block(response: AnthropicResponse) -> Result<String> {
    response
        .content
        .into_iter()
        .next()
        .map(|block| block.text)
        .ok_or_else(|| RetrieverError::generation("No content in model response"))
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, messages: &[Message], params: &CompletionParams) -> Result<String> {
        let request = self.build_request(messages, params);

        let response = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RetrieverError::generation("Request timed out. Try again.")
                } else if e.is_connect() {
                    RetrieverError::generation(
                        "Failed to connect to Anthropic API. Check your network.",
                    )
                } else {
                    RetrieverError::generation(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RetrieverError::generation(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Self::parse_error(status, &body));
        }

        parse_messages_response(&body)
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
pub(super) struct AnthropicRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    anthropic_version: Option<&'static str>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AnthropicClient {
        AnthropicClient::new(AnthropicConfig::new("sk-ant-test", DEFAULT_ANTHROPIC_MODEL)).unwrap()
    }

    #[test]
    fn test_config_new() {
        let config = AnthropicConfig::new("sk-ant-test", "claude-3-5-sonnet-latest");
        assert_eq!(config.api_key, "sk-ant-test");
        assert_eq!(config.model, "claude-3-5-sonnet-latest");
        assert_eq!(config.api_url, ANTHROPIC_API_URL);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_config_builders() {
        let config = AnthropicConfig::new("k", "m")
            .with_timeout(10)
            .with_api_url("http://localhost:8080/v1/messages");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.api_url, "http://localhost:8080/v1/messages");
    }

    #[test]
    fn test_request_carries_system_and_sampling() {
        let messages = vec![
            Message::system("Write Presto SQL."),
            Message::user("Top customers"),
        ];
        let request = client().build_request(&messages, &CompletionParams::default());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], DEFAULT_ANTHROPIC_MODEL);
        assert!(json.get("anthropic_version").is_none());
        assert_eq!(json["system"], "Write Presto SQL.");
        assert_eq!(json["max_tokens"], 4000);
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["top_p"], 0.0);
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert_eq!(json["messages"][0]["content"][0]["text"], "Top customers");
    }

    #[test]
    fn test_request_without_system() {
        let request =
            client().build_request(&[Message::user("Hello")], &CompletionParams::default());
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_versioned_request_omits_model() {
        let request = messages_request(
            MessagesTarget::Version("bedrock-2023-05-31"),
            &[Message::user("Hello")],
            &CompletionParams::default(),
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["anthropic_version"], "bedrock-2023-05-31");
        assert!(json.get("model").is_none());
    }

    #[test]
    fn test_parse_messages_response_rejects_bad_body() {
        let err = parse_messages_response("not json").unwrap_err();
        assert_eq!(err.category(), "Generation Error");
    }

    #[test]
    fn test_first_text_block() {
        let response: AnthropicResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"SELECT 1"},{"type":"text","text":"ignored"}]}"#,
        )
        .unwrap();
        assert_eq!(first_text_block(response).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_first_text_block_empty_content() {
        let response: AnthropicResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        let err = first_text_block(response).unwrap_err();
        assert_eq!(err.category(), "Generation Error");
    }

    #[test]
    fn test_parse_error_unauthorized() {
        let error = AnthropicClient::parse_error(reqwest::StatusCode::UNAUTHORIZED, "");
        assert!(error.to_string().contains("Authentication failed"));
    }

    #[test]
    fn test_parse_error_rate_limited() {
        let error = AnthropicClient::parse_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        assert!(error.to_string().contains("Rate limited"));
    }

    #[test]
    fn test_parse_error_with_message() {
        let body = r#"{"error":{"message":"Invalid model"}}"#;
        let error = AnthropicClient::parse_error(reqwest::StatusCode::BAD_REQUEST, body);
        assert!(error.to_string().contains("Invalid model"));
    }
}
