//! Warehouse abstraction layer for sqlrag.
//!
//! Provides a trait-based interface for asynchronous query execution services,
//! allowing different warehouse backends to be used interchangeably.

mod athena;
mod local;
mod mock;
mod types;

pub use athena::{AthenaClient, AthenaConfig};
pub use local::LocalWarehouse;
pub use mock::{FailingWarehouse, FailurePoint, ScriptedWarehouse};
pub use types::{ExecutionId, QueryState, Row, RowSet, StatusResponse};

use crate::config::WarehouseConfig;
use crate::error::{Result, RetrieverError};
use async_trait::async_trait;
use std::str::FromStr;

/// Supported warehouse backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseBackend {
    /// Amazon Athena (JSON wire protocol).
    #[default]
    Athena,
    /// In-process SQLite warehouse.
    Local,
}

impl WarehouseBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Athena => "athena",
            Self::Local => "local",
        }
    }
}

impl FromStr for WarehouseBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "athena" => Ok(Self::Athena),
            "local" | "sqlite" => Ok(Self::Local),
            _ => Err(format!("Unknown warehouse backend: {}", s)),
        }
    }
}

impl std::fmt::Display for WarehouseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Creates a warehouse client for the configured backend.
///
/// This is the central factory function for warehouse connections.
pub async fn connect(config: &WarehouseConfig) -> Result<Box<dyn QueryExecutionClient>> {
    match config.backend {
        WarehouseBackend::Athena => {
            let client = AthenaClient::connect(AthenaConfig::from_warehouse_config(config)?).await?;
            Ok(Box::new(client))
        }
        WarehouseBackend::Local => {
            let path = config.local_path.as_deref().ok_or_else(|| {
                RetrieverError::config("The local warehouse requires 'local_path'")
            })?;
            Ok(Box::new(LocalWarehouse::open(path).await?))
        }
    }
}

/// Trait defining the interface for asynchronous query execution services.
///
/// All operations are keyed by the identifier returned from `submit`.
#[async_trait]
pub trait QueryExecutionClient: Send + Sync {
    /// Submits a query for asynchronous execution.
    ///
    /// `output_location` is where the service stages results; it is passed
    /// through uninterpreted.
    async fn submit(&self, sql: &str, database: &str, output_location: &str)
        -> Result<ExecutionId>;

    /// Polls the current status of an execution.
    ///
    /// A response the service sent without a usable state is returned as
    /// `StatusResponse { state: None, .. }`, not as an error.
    async fn poll_status(&self, execution_id: &ExecutionId) -> Result<StatusResponse>;

    /// Fetches the result rows of a succeeded execution.
    async fn fetch_results(&self, execution_id: &ExecutionId) -> Result<RowSet>;
}
