//! Result shaping for retrieval output.
//!
//! Maps an execution outcome to exactly two documents: the serialized data
//! and the execution metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::warehouse::{ExecutionId, QueryState, RowSet};

/// Content of the data document when no rows are available.
pub const NO_DATA_SENTINEL: &str = "NA";

/// Metadata key for the execution identifier.
pub const EXECUTION_ID_KEY: &str = "executionID";

/// Metadata key for the executed SQL.
pub const SQL_QUERY_KEY: &str = "sqlQuery";

/// Metadata key for the last observed query state.
pub const QUERY_STATE_KEY: &str = "queryState";

/// A framework-neutral retrieved document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Text handed to the downstream model.
    pub page_content: String,
    /// String metadata attached to the document.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    /// Creates a document with content and no metadata.
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: BTreeMap::new(),
        }
    }
}

/// The data slot of a retrieval result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataDocument {
    /// Serialized rows, or the `NA` sentinel.
    pub content: String,
}

impl DataDocument {
    /// Returns true if this document carries the no-data sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.content == NO_DATA_SENTINEL
    }
}

/// The metadata slot of a retrieval result. Its content is always empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionMetadata {
    /// Identifier issued by the warehouse.
    #[serde(rename = "executionID")]
    pub execution_id: ExecutionId,
    /// SQL that was submitted.
    #[serde(rename = "sqlQuery")]
    pub sql_query: String,
    /// Last observed state, as spelled by the warehouse.
    #[serde(rename = "queryState")]
    pub query_state: QueryState,
}

impl ExecutionMetadata {
    /// Page content of the metadata document.
    pub fn content(&self) -> &str {
        ""
    }
}

/// Output of one retrieval call: always exactly two documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievalResult {
    /// Serialized data (first document).
    pub data: DataDocument,
    /// Execution metadata (second document).
    pub metadata: ExecutionMetadata,
}

impl RetrievalResult {
    /// Returns true if the query produced rows.
    pub fn has_data(&self) -> bool {
        !self.data.is_sentinel()
    }

    /// Converts into the two documents, data first.
    pub fn into_documents(self) -> [Document; 2] {
        let metadata = BTreeMap::from([
            (
                EXECUTION_ID_KEY.to_string(),
                self.metadata.execution_id.to_string(),
            ),
            (SQL_QUERY_KEY.to_string(), self.metadata.sql_query),
            (
                QUERY_STATE_KEY.to_string(),
                self.metadata.query_state.as_str().to_string(),
            ),
        ]);

        [
            Document::new(self.data.content),
            Document {
                page_content: String::new(),
                metadata,
            },
        ]
    }
}

/// Serializes rows as `[a, b][c, d]`: cells joined with `", "`, each row
/// bracketed, rows concatenated without a separator.
pub fn serialize_rows(rows: &RowSet) -> String {
    rows.iter().map(|row| format!("[{}]", row.join(", "))).collect()
}

/// Shapes an execution outcome into a retrieval result.
pub fn shape(
    execution_id: ExecutionId,
    sql_query: impl Into<String>,
    state: QueryState,
    rows: Option<&RowSet>,
) -> RetrievalResult {
    let content = match rows {
        Some(rows) => serialize_rows(rows),
        None => NO_DATA_SENTINEL.to_string(),
    };

    RetrievalResult {
        data: DataDocument { content },
        metadata: ExecutionMetadata {
            execution_id,
            sql_query: sql_query.into(),
            query_state: state,
        },
    }
}
