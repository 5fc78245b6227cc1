//! Amazon Bedrock LLM client implementation.
//!
//! Implements the LlmClient trait for Anthropic models hosted on Bedrock,
//! calling the InvokeModel API with SigV4-signed requests.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::aws::AwsSigner;
use crate::error::{Result, RetrieverError};
use crate::llm::anthropic::{messages_request, parse_messages_response, MessagesTarget};
use crate::llm::types::{CompletionParams, Message};
use crate::llm::LlmClient;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Messages format version expected by Bedrock.
const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// SigV4 service name of the runtime API.
const SIGNING_SERVICE: &str = "bedrock";

/// Default model when none is configured.
pub const DEFAULT_BEDROCK_MODEL: &str = "anthropic.claude-3-sonnet-20240229-v1:0";

/// Bedrock client configuration.
#[derive(Debug, Clone)]
pub struct BedrockConfig {
    /// Model identifier (e.g., "anthropic.claude-3-sonnet-20240229-v1:0").
    pub model_id: String,
    /// Region requests are signed for.
    pub region: String,
    /// Named credentials profile; the default chain is used when unset.
    pub credentials_profile: Option<String>,
    /// Runtime endpoint.
    pub endpoint: Url,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl BedrockConfig {
    /// Creates a config for `model_id` on the regional runtime endpoint.
    pub fn new(model_id: impl Into<String>, region: &str) -> Result<Self> {
        Ok(Self {
            model_id: model_id.into(),
            region: region.to_string(),
            credentials_profile: None,
            endpoint: parse_endpoint(&format!("https://bedrock-runtime.{region}.amazonaws.com"))?,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Points the client at a different runtime endpoint.
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        self.endpoint = parse_endpoint(endpoint)?;
        Ok(self)
    }

    /// Sets the credentials profile.
    pub fn with_credentials_profile(mut self, profile: Option<String>) -> Self {
        self.credentials_profile = profile;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Returns the InvokeModel URL for the configured model.
    pub fn invoke_url(&self) -> Result<Url> {
        let path = format!("model/{}/invoke", encode_path_segment(&self.model_id));
        self.endpoint.join(&path).map_err(|e| {
            RetrieverError::config(format!("Invalid Bedrock model id '{}': {e}", self.model_id))
        })
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url> {
    Url::parse(endpoint).map_err(|e| {
        RetrieverError::config(format!("Invalid Bedrock endpoint '{endpoint}': {e}"))
    })
}

/// Percent-encodes everything outside the unreserved set, so model ids and
/// ARNs containing `:` or `/` stay a single path segment.
fn encode_path_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

/// Bedrock LLM client.
#[derive(Debug, Clone)]
pub struct BedrockClient {
    config: BedrockConfig,
    invoke_url: Url,
    client: Client,
    signer: AwsSigner,
}

impl BedrockClient {
    /// Creates a client signing with credentials for the configured profile.
    pub async fn connect(config: BedrockConfig) -> Result<Self> {
        let signer = AwsSigner::from_profile(
            SIGNING_SERVICE,
            &config.region,
            config.credentials_profile.as_deref(),
        )
        .await?;
        Self::with_signer(config, signer)
    }

    /// Creates a client that signs with the given signer.
    pub fn with_signer(config: BedrockConfig, signer: AwsSigner) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                RetrieverError::generation(format!("Failed to create HTTP client: {}", e))
            })?;
        let invoke_url = config.invoke_url()?;

        debug!(
            model = %config.model_id,
            region = %config.region,
            profile = config.credentials_profile.as_deref().unwrap_or("default"),
            "Created Bedrock client"
        );

        Ok(Self {
            config,
            invoke_url,
            client,
            signer,
        })
    }

    /// Parses an InvokeModel error response.
    fn parse_error(status: reqwest::StatusCode, body: &str) -> RetrieverError {
        if let Ok(error) = serde_json::from_str::<BedrockErrorResponse>(body) {
            if let Some(message) = error.message {
                return RetrieverError::generation(format!(
                    "Bedrock error ({}): {}",
                    status.as_u16(),
                    message
                ));
            }
        }

        RetrieverError::generation(format!("Bedrock error ({}): {}", status, body))
    }
}

#[async_trait]
impl LlmClient for BedrockClient {
    async fn complete(&self, messages: &[Message], params: &CompletionParams) -> Result<String> {
        let request = messages_request(
            MessagesTarget::Version(BEDROCK_ANTHROPIC_VERSION),
            messages,
            params,
        );
        let body = serde_json::to_vec(&request)
            .map_err(|e| RetrieverError::generation(format!("Failed to encode request: {}", e)))?;

        let headers = [
            ("content-type", "application/json"),
            ("accept", "application/json"),
        ];
        let signature = self
            .signer
            .sign_post(
                self.invoke_url.as_str(),
                &headers,
                &body,
                RetrieverError::Generation,
            )
            .await?;

        let mut builder = self.client.post(self.invoke_url.clone());
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        for (name, value) in signature {
            builder = builder.header(name, value);
        }

        let response = builder.body(body).send().await.map_err(|e| {
            if e.is_timeout() {
                RetrieverError::generation("Bedrock request timed out. Try again.")
            } else if e.is_connect() {
                RetrieverError::generation(format!(
                    "Failed to connect to Bedrock at {}",
                    self.config.endpoint
                ))
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

#[derive(Debug, Deserialize)]
struct BedrockErrorResponse {
    #[serde(alias = "Message")]
    message: Option<String>,
}
