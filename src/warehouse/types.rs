//! Execution types shared by warehouse backends.
//!
//! Defines execution handles, query states, status responses and row sets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier returned by a warehouse when a query is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(String);

impl ExecutionId {
    /// Wraps a service-issued identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of a submitted query as reported by the warehouse.
///
/// Unrecognized values are kept verbatim in `Other` so the raw service
/// spelling can always be surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QueryState {
    /// Accepted but not yet started.
    Queued,
    /// Currently executing.
    #[default]
    Running,
    /// Finished; results can be fetched.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Cancelled before completion.
    Cancelled,
    /// Any other value reported by the service.
    Other(String),
}

impl QueryState {
    /// Parses a state as spelled by the service.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "QUEUED" => Self::Queued,
            "RUNNING" => Self::Running,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            "CANCELLED" => Self::Cancelled,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the state as spelled by the service.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Other(raw) => raw,
        }
    }

    /// Returns true if results can be fetched for this state.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns true if no further transitions are expected.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for QueryState {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl Serialize for QueryState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for QueryState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// One status poll response.
///
/// `state` is `None` when the service answered without a usable state field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusResponse {
    /// Reported query state, if present.
    pub state: Option<QueryState>,
    /// Service-provided reason for the latest state change, if any.
    pub reason: Option<String>,
}

impl StatusResponse {
    /// Creates a response carrying a state.
    pub fn with_state(state: QueryState) -> Self {
        Self {
            state: Some(state),
            reason: None,
        }
    }

    /// Creates a response with no usable state.
    pub fn malformed() -> Self {
        Self::default()
    }

    /// Attaches a state-change reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// A single result row: ordered string cells.
pub type Row = Vec<String>;

/// Ordered rows fetched for a succeeded query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSet {
    /// Rows in service order.
    pub rows: Vec<Row>,
}

impl RowSet {
    /// Creates a row set from the given rows.
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates rows in order.
    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }
}

impl<R, C> From<Vec<R>> for RowSet
where
    R: IntoIterator<Item = C>,
    C: Into<String>,
{
    fn from(rows: Vec<R>) -> Self {
        Self::new(
            rows.into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_parse_known_values() {
        assert_eq!(QueryState::parse("QUEUED"), QueryState::Queued);
        assert_eq!(QueryState::parse("RUNNING"), QueryState::Running);
        assert_eq!(QueryState::parse("SUCCEEDED"), QueryState::Succeeded);
        assert_eq!(QueryState::parse("FAILED"), QueryState::Failed);
        assert_eq!(QueryState::parse("CANCELLED"), QueryState::Cancelled);
    }

    #[test]
    fn test_state_preserves_unknown_spelling() {
        let state = QueryState::parse("CANCELED");
        assert_eq!(state, QueryState::Other("CANCELED".to_string()));
        assert_eq!(state.as_str(), "CANCELED");
        assert!(state.is_terminal());
        assert!(!state.is_success());
    }

    #[test]
    fn test_state_is_case_sensitive() {
        assert_eq!(
            QueryState::parse("succeeded"),
            QueryState::Other("succeeded".to_string())
        );
    }

    #[test]
    fn test_state_terminal_classification() {
        assert!(!QueryState::Queued.is_terminal());
        assert!(!QueryState::Running.is_terminal());
        assert!(QueryState::Succeeded.is_terminal());
        assert!(QueryState::Failed.is_terminal());
        assert!(QueryState::Cancelled.is_terminal());
    }

    #[test]
    fn test_state_serializes_as_raw_string() {
        let json = serde_json::to_string(&QueryState::Succeeded).unwrap();
        assert_eq!(json, "\"SUCCEEDED\"");

        let state: QueryState = serde_json::from_str("\"TIMED_OUT\"").unwrap();
        assert_eq!(state.as_str(), "TIMED_OUT");
    }

    #[test]
    fn test_row_set_from_str_rows() {
        let rows = RowSet::from(vec![vec!["o1", "100.0"], vec!["o2", "250.0"]]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.rows[1], vec!["o2".to_string(), "250.0".to_string()]);
    }

    #[test]
    fn test_status_response_constructors() {
        assert_eq!(StatusResponse::malformed().state, None);
        let status = StatusResponse::with_state(QueryState::Failed).with_reason("syntax error");
        assert_eq!(status.state, Some(QueryState::Failed));
        assert_eq!(status.reason.as_deref(), Some("syntax error"));
    }
}
