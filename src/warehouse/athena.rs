//! Amazon Athena client implementation.
//!
//! Implements the QueryExecutionClient trait over Athena's JSON 1.1 wire
//! protocol. Every request is signed with SigV4 using credentials resolved
//! for the configured profile, including requests to an `endpoint_url`
//! override.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::aws::AwsSigner;
use crate::config::WarehouseConfig;
use crate::error::{Result, RetrieverError};
use crate::warehouse::{ExecutionId, QueryExecutionClient, QueryState, RowSet, StatusResponse};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Content type of the Athena JSON protocol.
const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Prefix of the `X-Amz-Target` header.
const TARGET_PREFIX: &str = "AmazonAthena";

/// SigV4 service name.
const SIGNING_SERVICE: &str = "athena";

/// Signing region used when only an endpoint override is configured.
const FALLBACK_REGION: &str = "us-east-1";

/// Athena client configuration.
#[derive(Debug, Clone)]
pub struct AthenaConfig {
    /// Endpoint receiving the JSON protocol requests.
    pub endpoint: Url,
    /// Region requests are signed for.
    pub region: String,
    /// Named credentials profile; the default chain is used when unset.
    pub credentials_profile: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl AthenaConfig {
    /// Creates a new config for the given endpoint and signing region.
    pub fn new(endpoint: &str, region: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            RetrieverError::config(format!("Invalid Athena endpoint '{endpoint}': {e}"))
        })?;
        Ok(Self {
            endpoint,
            region: region.to_string(),
            credentials_profile: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Builds a config from the warehouse section.
    ///
    /// An explicit `endpoint_url` wins; otherwise the regional endpoint is used.
    /// Without a region, an endpoint override is signed for `us-east-1`.
    pub fn from_warehouse_config(config: &WarehouseConfig) -> Result<Self> {
        let (endpoint, region) = match (&config.endpoint_url, &config.region) {
            (Some(url), region) => (
                url.clone(),
                region.as_deref().unwrap_or(FALLBACK_REGION).to_string(),
            ),
            (None, Some(region)) => (
                format!("https://athena.{region}.amazonaws.com"),
                region.clone(),
            ),
            (None, None) => {
                return Err(RetrieverError::config(
                    "Athena requires either 'endpoint_url' or 'region' (or AWS_REGION)",
                ))
            }
        };

        let mut athena = Self::new(&endpoint, &region)?;
        athena.credentials_profile = config.credentials_profile.clone();
        Ok(athena)
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Athena query execution client.
#[derive(Debug, Clone)]
pub struct AthenaClient {
    config: AthenaConfig,
    client: Client,
    signer: AwsSigner,
}

impl AthenaClient {
    /// Creates a client signing with credentials for the configured profile.
    pub async fn connect(config: AthenaConfig) -> Result<Self> {
        let signer = AwsSigner::from_profile(
            SIGNING_SERVICE,
            &config.region,
            config.credentials_profile.as_deref(),
        )
        .await?;
        Self::with_signer(config, signer)
    }

    /// Creates a client that signs with the given signer.
    pub fn with_signer(config: AthenaConfig, signer: AwsSigner) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RetrieverError::config(format!("Failed to create HTTP client: {}", e)))?;

        debug!(
            endpoint = %config.endpoint,
            region = %config.region,
            profile = config.credentials_profile.as_deref().unwrap_or("default"),
            "Created Athena client"
        );

        Ok(Self {
            config,
            client,
            signer,
        })
    }

    /// Signs and sends one protocol request, returning the raw response body.
    ///
    /// Signing failures, transport failures and non-success statuses are
    /// mapped with `to_error`.
    async fn call<T: Serialize>(
        &self,
        operation: &str,
        request: &T,
        to_error: fn(String) -> RetrieverError,
    ) -> Result<String> {
        let body = serde_json::to_vec(request)
            .map_err(|e| to_error(format!("Failed to encode {operation} request: {e}")))?;
        let target = format!("{TARGET_PREFIX}.{operation}");
        let headers = [
            ("content-type", AMZ_JSON_CONTENT_TYPE),
            ("x-amz-target", target.as_str()),
        ];
        let signature = self
            .signer
            .sign_post(self.config.endpoint.as_str(), &headers, &body, to_error)
            .await?;

        let mut builder = self.client.post(self.config.endpoint.clone());
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        for (name, value) in signature {
            builder = builder.header(name, value);
        }

        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    to_error(format!("{operation} timed out"))
                } else if e.is_connect() {
                    to_error(format!(
                        "Failed to connect to Athena at {}",
                        self.config.endpoint
                    ))
                } else {
                    to_error(format!("{operation} request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| to_error(format!("Failed to read {operation} response: {e}")))?;

        if !status.is_success() {
            return Err(to_error(parse_error(operation, status, &body)));
        }

        Ok(body)
    }
}

#[async_trait]
impl QueryExecutionClient for AthenaClient {
    async fn submit(
        &self,
        sql: &str,
        database: &str,
        output_location: &str,
    ) -> Result<ExecutionId> {
        let request = StartQueryExecutionRequest {
            query_string: sql,
            query_execution_context: QueryExecutionContext { database },
            result_configuration: ResultConfiguration { output_location },
        };

        let body = self
            .call("StartQueryExecution", &request, RetrieverError::Submission)
            .await?;

        let response: StartQueryExecutionResponse = serde_json::from_str(&body).map_err(|e| {
            RetrieverError::submission(format!("Failed to parse StartQueryExecution response: {e}"))
        })?;

        Ok(ExecutionId::new(response.query_execution_id))
    }

    async fn poll_status(&self, execution_id: &ExecutionId) -> Result<StatusResponse> {
        let request = QueryExecutionIdRequest {
            query_execution_id: execution_id.as_str(),
        };

        let body = self
            .call("GetQueryExecution", &request, RetrieverError::Status)
            .await?;

        Ok(decode_status(&body))
    }

    async fn fetch_results(&self, execution_id: &ExecutionId) -> Result<RowSet> {
        let request = QueryExecutionIdRequest {
            query_execution_id: execution_id.as_str(),
        };

        let body = self
            .call("GetQueryResults", &request, RetrieverError::Fetch)
            .await?;

        decode_rows(&body)
    }
}

/// Decodes a `GetQueryExecution` body.
///
/// Any missing level of `QueryExecution.Status.State`, or an unparsable body,
/// yields a response without a state.
fn decode_status(body: &str) -> StatusResponse {
    let response: GetQueryExecutionResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => {
            warn!("Unparsable GetQueryExecution response: {}", e);
            return StatusResponse::malformed();
        }
    };

    let status = response.query_execution.and_then(|q| q.status);
    let Some(status) = status else {
        return StatusResponse::malformed();
    };

    StatusResponse {
        state: status.state.as_deref().map(QueryState::parse),
        reason: status.state_change_reason,
    }
}

/// Decodes a `GetQueryResults` body into rows of strings.
///
/// Cells without a `VarCharValue` (SQL NULL) become empty strings.
fn decode_rows(body: &str) -> Result<RowSet> {
    let response: GetQueryResultsResponse = serde_json::from_str(body).map_err(|e| {
        RetrieverError::fetch(format!("Failed to parse GetQueryResults response: {e}"))
    })?;

    let rows = response
        .result_set
        .rows
        .into_iter()
        .map(|row| {
            row.data
                .into_iter()
                .map(|datum| datum.var_char_value.unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(RowSet::new(rows))
}

/// Builds an error message from a non-success response.
fn parse_error(operation: &str, status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(error) = serde_json::from_str::<AthenaErrorResponse>(body) {
        if let Some(message) = error.message {
            return match error.error_type {
                Some(kind) => {
                    let kind = kind.rsplit('#').next().unwrap_or(&kind).to_string();
                    format!("{operation} failed ({kind}): {message}")
                }
                None => format!("{operation} failed: {message}"),
            };
        }
    }

    format!("{operation} failed ({status}): {body}")
}

// Athena API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartQueryExecutionRequest<'a> {
    query_string: &'a str,
    query_execution_context: QueryExecutionContext<'a>,
    result_configuration: ResultConfiguration<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecutionContext<'a> {
    database: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResultConfiguration<'a> {
    output_location: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecutionIdRequest<'a> {
    query_execution_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StartQueryExecutionResponse {
    query_execution_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryExecutionResponse {
    query_execution: Option<QueryExecution>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecution {
    status: Option<QueryExecutionStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecutionStatus {
    state: Option<String>,
    state_change_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryResultsResponse {
    result_set: ResultSet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResultSet {
    #[serde(default)]
    rows: Vec<AthenaRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AthenaRow {
    #[serde(default)]
    data: Vec<Datum>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Datum {
    var_char_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AthenaErrorResponse {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}
