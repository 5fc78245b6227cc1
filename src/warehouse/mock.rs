//! Scripted warehouse clients for testing.
//!
//! Replay a fixed sequence of status responses and count every call so the
//! polling lifecycle can be verified without a real service.

use super::{ExecutionId, QueryExecutionClient, QueryState, RowSet, StatusResponse};
use crate::error::{Result, RetrieverError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// A warehouse that replays scripted status responses.
///
/// Once the script is exhausted the last response repeats; an empty script
/// reports `RUNNING` forever.
#[derive(Debug)]
pub struct ScriptedWarehouse {
    execution_id: String,
    script: Mutex<VecDeque<StatusResponse>>,
    last: Mutex<StatusResponse>,
    rows: RowSet,
    submissions: Mutex<Vec<(String, String, String)>>,
    polls: AtomicU32,
    fetches: AtomicU32,
}

impl ScriptedWarehouse {
    /// Creates a warehouse that replays the given status responses.
    pub fn new(script: Vec<StatusResponse>) -> Self {
        Self {
            execution_id: "mock-execution-1".to_string(),
            script: Mutex::new(script.into()),
            last: Mutex::new(StatusResponse::with_state(QueryState::Running)),
            rows: RowSet::default(),
            submissions: Mutex::new(Vec::new()),
            polls: AtomicU32::new(0),
            fetches: AtomicU32::new(0),
        }
    }

    /// Creates a warehouse that reports `SUCCEEDED` on poll `attempt` (1-based).
    pub fn succeeding_on(attempt: usize, rows: RowSet) -> Self {
        let running = StatusResponse::with_state(QueryState::Running);
        let mut script = vec![running; attempt.saturating_sub(1)];
        script.push(StatusResponse::with_state(QueryState::Succeeded));
        Self::new(script).with_rows(rows)
    }

    /// Creates a warehouse that never leaves `RUNNING`.
    pub fn never_finishing() -> Self {
        Self::new(Vec::new())
    }

    /// Sets the rows returned by `fetch_results`.
    pub fn with_rows(mut self, rows: RowSet) -> Self {
        self.rows = rows;
        self
    }

    /// Number of `poll_status` calls so far.
    pub fn poll_count(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    /// Number of `fetch_results` calls so far.
    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Submitted `(sql, database, output_location)` triples, in order.
    pub fn submissions(&self) -> Vec<(String, String, String)> {
        self.submissions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn check_id(&self, execution_id: &ExecutionId) -> Result<()> {
        if execution_id.as_str() == self.execution_id {
            Ok(())
        } else {
            Err(RetrieverError::internal(format!(
                "Unknown execution id: {}",
                execution_id
            )))
        }
    }
}

#[async_trait]
impl QueryExecutionClient for ScriptedWarehouse {
    async fn submit(
        &self,
        sql: &str,
        database: &str,
        output_location: &str,
    ) -> Result<ExecutionId> {
        self.submissions
            .lock()
            .map_err(|_| RetrieverError::internal("submission log lock poisoned"))?
            .push((
                sql.to_string(),
                database.to_string(),
                output_location.to_string(),
            ));
        Ok(ExecutionId::new(self.execution_id.clone()))
    }

    async fn poll_status(&self, execution_id: &ExecutionId) -> Result<StatusResponse> {
        self.check_id(execution_id)?;
        self.polls.fetch_add(1, Ordering::SeqCst);

        let next = self
            .script
            .lock()
            .map_err(|_| RetrieverError::internal("status script lock poisoned"))?
            .pop_front();
        let mut last = self
            .last
            .lock()
            .map_err(|_| RetrieverError::internal("status script lock poisoned"))?;
        if let Some(response) = next {
            *last = response;
        }
        Ok(last.clone())
    }

    async fn fetch_results(&self, execution_id: &ExecutionId) -> Result<RowSet> {
        self.check_id(execution_id)?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.clone())
    }
}

/// Where a `FailingWarehouse` raises its transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    /// `submit` fails.
    Submit,
    /// Every `poll_status` fails.
    Status,
    /// Polling succeeds immediately; `fetch_results` fails.
    Fetch,
}

/// A warehouse whose transport fails at a chosen point.
#[derive(Debug)]
pub struct FailingWarehouse {
    point: FailurePoint,
    message: String,
}

impl FailingWarehouse {
    /// Creates a warehouse failing at `point` with the given message.
    pub fn new(point: FailurePoint, message: impl Into<String>) -> Self {
        Self {
            point,
            message: message.into(),
        }
    }
}

#[async_trait]
impl QueryExecutionClient for FailingWarehouse {
    async fn submit(
        &self,
        _sql: &str,
        _database: &str,
        _output_location: &str,
    ) -> Result<ExecutionId> {
        if self.point == FailurePoint::Submit {
            return Err(RetrieverError::submission(self.message.clone()));
        }
        Ok(ExecutionId::new("failing-execution"))
    }

    async fn poll_status(&self, _execution_id: &ExecutionId) -> Result<StatusResponse> {
        if self.point == FailurePoint::Status {
            return Err(RetrieverError::status(self.message.clone()));
        }
        Ok(StatusResponse::with_state(QueryState::Succeeded))
    }

    async fn fetch_results(&self, _execution_id: &ExecutionId) -> Result<RowSet> {
        Err(RetrieverError::fetch(self.message.clone()))
    }
}
