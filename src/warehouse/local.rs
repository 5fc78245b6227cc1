//! In-process SQLite warehouse.
//!
//! Provides the `LocalWarehouse` struct that implements the
//! `QueryExecutionClient` trait on top of sqlx. Submitted queries run on a
//! background task so callers observe the same submit/poll/fetch lifecycle
//! as with a remote warehouse.

use crate::error::{Result, RetrieverError};
use crate::warehouse::{ExecutionId, QueryExecutionClient, QueryState, Row, RowSet, StatusResponse};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row as SqlxRow, TypeInfo, ValueRef};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Special path selecting a private in-memory database.
const IN_MEMORY_PATH: &str = ":memory:";

/// How long a finished execution stays visible to pollers before eviction.
const DEFAULT_RETENTION: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
enum LocalExecution {
    Queued,
    Running,
    Succeeded(RowSet),
    Failed(String),
}

impl LocalExecution {
    fn is_finished(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }
}

#[derive(Debug)]
struct TrackedExecution {
    execution: LocalExecution,
    updated_at: Instant,
}

type ExecutionTable = Arc<Mutex<HashMap<String, TrackedExecution>>>;

/// SQLite-backed asynchronous warehouse.
#[derive(Debug)]
pub struct LocalWarehouse {
    pool: SqlitePool,
    executions: ExecutionTable,
    next_id: AtomicU64,
    retention: Duration,
}

impl LocalWarehouse {
    /// Opens (or creates) the SQLite database at `path`.
    ///
    /// `:memory:` opens a private in-memory database held on a single
    /// connection for the lifetime of the warehouse.
    pub async fn open(path: &str) -> Result<Self> {
        let pool = if path == IN_MEMORY_PATH {
            let options = SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| RetrieverError::config(format!("Invalid SQLite options: {e}")))?;
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await
        } else {
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);
            SqlitePoolOptions::new()
                .max_connections(4)
                .acquire_timeout(Duration::from_secs(10))
                .connect_with(options)
                .await
        }
        .map_err(|e| RetrieverError::config(format!("Failed to open SQLite database '{path}': {e}")))?;

        debug!("Opened local warehouse at {}", path);
        Ok(Self::from_pool(pool))
    }

    /// Creates a warehouse from an existing connection pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            executions: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            retention: DEFAULT_RETENTION,
        }
    }

    /// Sets how long finished executions are kept for polling.
    ///
    /// Succeeded executions are dropped as soon as their rows are fetched;
    /// anything else finished is evicted on the next submit once it is older
    /// than `retention`.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Number of executions currently tracked.
    pub fn tracked_executions(&self) -> usize {
        self.executions.lock().map(|table| table.len()).unwrap_or(0)
    }

    /// Runs a multi-statement SQL script directly, outside the execution lifecycle.
    ///
    /// Used to seed tables before retrieval.
    pub async fn seed(&self, script: &str) -> Result<()> {
        sqlx::raw_sql(script)
            .execute(&self.pool)
            .await
            .map_err(|e| RetrieverError::config(format!("Failed to seed local warehouse: {e}")))?;
        Ok(())
    }

    fn lookup(&self, execution_id: &ExecutionId) -> Result<Option<LocalExecution>> {
        let table = self
            .executions
            .lock()
            .map_err(|_| RetrieverError::internal("execution table lock poisoned"))?;
        Ok(table
            .get(execution_id.as_str())
            .map(|tracked| tracked.execution.clone()))
    }
}

/// Records a new state for an execution, logging if the table is unusable.
fn record(executions: &ExecutionTable, id: &str, execution: LocalExecution) {
    match executions.lock() {
        Ok(mut table) => {
            table.insert(
                id.to_string(),
                TrackedExecution {
                    execution,
                    updated_at: Instant::now(),
                },
            );
        }
        Err(_) => warn!("Execution table lock poisoned; dropping update for {}", id),
    }
}

#[async_trait]
impl QueryExecutionClient for LocalWarehouse {
    async fn submit(
        &self,
        sql: &str,
        _database: &str,
        _output_location: &str,
    ) -> Result<ExecutionId> {
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("local-{}-{}", std::process::id(), seq);

        {
            let mut table = self
                .executions
                .lock()
                .map_err(|_| RetrieverError::submission("execution table lock poisoned"))?;

            let retention = self.retention;
            let before = table.len();
            table.retain(|_, tracked| {
                !(tracked.execution.is_finished() && tracked.updated_at.elapsed() >= retention)
            });
            if table.len() < before {
                debug!("Evicted {} finished executions", before - table.len());
            }

            table.insert(
                id.clone(),
                TrackedExecution {
                    execution: LocalExecution::Queued,
                    updated_at: Instant::now(),
                },
            );
        }

        let pool = self.pool.clone();
        let executions = Arc::clone(&self.executions);
        let sql = sql.to_string();
        let task_id = id.clone();

        tokio::spawn(async move {
            record(&executions, &task_id, LocalExecution::Running);

            let outcome = match sqlx::query(&sql).fetch_all(&pool).await {
                Ok(rows) => match rows.iter().map(convert_row).collect::<Result<Vec<Row>>>() {
                    Ok(rows) => LocalExecution::Succeeded(RowSet::new(rows)),
                    Err(e) => LocalExecution::Failed(e.to_string()),
                },
                Err(e) => LocalExecution::Failed(e.to_string()),
            };

            debug!("Local execution {} finished", task_id);
            record(&executions, &task_id, outcome);
        });

        Ok(ExecutionId::new(id))
    }

    async fn poll_status(&self, execution_id: &ExecutionId) -> Result<StatusResponse> {
        let execution = self.lookup(execution_id)?.ok_or_else(|| {
            RetrieverError::status(format!("Unknown execution id: {execution_id}"))
        })?;

        Ok(match execution {
            LocalExecution::Queued => StatusResponse::with_state(QueryState::Queued),
            LocalExecution::Running => StatusResponse::with_state(QueryState::Running),
            LocalExecution::Succeeded(_) => StatusResponse::with_state(QueryState::Succeeded),
            LocalExecution::Failed(reason) => {
                StatusResponse::with_state(QueryState::Failed).with_reason(reason)
            }
        })
    }

    async fn fetch_results(&self, execution_id: &ExecutionId) -> Result<RowSet> {
        let mut table = self
            .executions
            .lock()
            .map_err(|_| RetrieverError::fetch("execution table lock poisoned"))?;

        match table.remove(execution_id.as_str()) {
            Some(TrackedExecution {
                execution: LocalExecution::Succeeded(rows),
                ..
            }) => Ok(rows),
            Some(tracked) => {
                table.insert(execution_id.as_str().to_string(), tracked);
                Err(RetrieverError::fetch(format!(
                    "Execution {execution_id} has not succeeded"
                )))
            }
            None => Err(RetrieverError::fetch(format!(
                "Unknown execution id: {execution_id}"
            ))),
        }
    }
}

/// Converts a SqliteRow to string cells.
fn convert_row(row: &SqliteRow) -> Result<Row> {
    (0..row.len()).map(|i| convert_value(row, i)).collect()
}

/// Converts a single column value to its text form.
///
/// SQLite is dynamically typed, so the storage class of the value itself is
/// used rather than the declared column type. A value that cannot be decoded
/// fails the whole execution instead of turning into an empty cell.
fn convert_value(row: &SqliteRow, index: usize) -> Result<String> {
    let raw = row.try_get_raw(index).map_err(|e| decode_error(index, e))?;
    if raw.is_null() {
        return Ok(String::new());
    }
    let type_name = raw.type_info().name().to_uppercase();

    let cell = match type_name.as_str() {
        "INTEGER" => row.try_get::<i64, _>(index).map(|v| v.to_string()),
        "REAL" => row.try_get::<f64, _>(index).map(|v| format!("{v:?}")),
        "BOOLEAN" => row.try_get::<bool, _>(index).map(|v| v.to_string()),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|v| format!("<{} bytes>", v.len())),
        _ => row.try_get::<String, _>(index),
    };

    cell.map_err(|e| decode_error(index, e))
}

fn decode_error(index: usize, e: sqlx::Error) -> RetrieverError {
    warn!(column = index, "Failed to decode local result value: {}", e);
    RetrieverError::fetch(format!("Failed to decode column {index}: {e}"))
}
