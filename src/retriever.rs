//! Retriever facade: question in, two documents out.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, info_span, Instrument};

use crate::error::{Result, RetrieverError};
use crate::execution::{shape, ExecutionPoller, PollSchedule, RetrievalResult, Sleeper, TokioSleeper};
use crate::generator::QueryGenerator;
use crate::warehouse::QueryExecutionClient;

/// Per-call context supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Identifier used to tag log output for this call.
    pub run_id: String,
}

impl RunContext {
    /// Creates a context with the given run id.
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    /// Creates a context with a run id derived from the process id and clock.
    pub fn generated() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self::new(format!("run-{}-{}", std::process::id(), millis))
    }
}

/// Answers questions by generating SQL, executing it and shaping the result.
pub struct SqlRetriever {
    generator: Arc<dyn QueryGenerator>,
    warehouse: Arc<dyn QueryExecutionClient>,
    sleeper: Arc<dyn Sleeper>,
    schedule: PollSchedule,
    database: String,
    output_location: String,
}

impl SqlRetriever {
    /// Starts building a retriever.
    pub fn builder() -> SqlRetrieverBuilder {
        SqlRetrieverBuilder::default()
    }

    /// Returns the polling schedule in use.
    pub fn schedule(&self) -> PollSchedule {
        self.schedule
    }

    /// Retrieves documents for `query`.
    ///
    /// Generation, submission, status and fetch failures propagate. A query
    /// that does not succeed within the polling budget still yields two
    /// documents, with `NA` as the data.
    pub async fn retrieve(&self, query: &str, ctx: &RunContext) -> Result<RetrievalResult> {
        let span = info_span!("retrieve", run_id = %ctx.run_id);

        async move {
            let sql = self.generator.generate_sql(query).await?;

            let poller = ExecutionPoller::new(
                self.warehouse.as_ref(),
                self.sleeper.as_ref(),
                self.schedule,
            );
            let outcome = poller
                .execute(&sql, &self.database, &self.output_location)
                .await?;

            let result = shape(
                outcome.execution_id,
                sql,
                outcome.state,
                outcome.rows.as_ref(),
            );
            info!(
                execution_id = %result.metadata.execution_id,
                state = %result.metadata.query_state,
                has_data = result.has_data(),
                "Retrieval finished"
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }
}

/// Builder for [`SqlRetriever`].
#[derive(Default)]
pub struct SqlRetrieverBuilder {
    generator: Option<Arc<dyn QueryGenerator>>,
    warehouse: Option<Arc<dyn QueryExecutionClient>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    schedule: PollSchedule,
    database: String,
    output_location: String,
}

impl SqlRetrieverBuilder {
    /// Sets the SQL generator.
    pub fn generator(mut self, generator: Arc<dyn QueryGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Sets the warehouse client.
    pub fn warehouse(mut self, warehouse: Arc<dyn QueryExecutionClient>) -> Self {
        self.warehouse = Some(warehouse);
        self
    }

    /// Sets the sleeper used between polls. Defaults to the tokio timer.
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Sets the polling schedule.
    pub fn schedule(mut self, schedule: PollSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Sets the target database.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Sets where the warehouse writes query output.
    pub fn output_location(mut self, output_location: impl Into<String>) -> Self {
        self.output_location = output_location.into();
        self
    }

    /// Builds the retriever.
    pub fn build(self) -> Result<SqlRetriever> {
        let generator = self
            .generator
            .ok_or_else(|| RetrieverError::config("Retriever requires a query generator"))?;
        let warehouse = self
            .warehouse
            .ok_or_else(|| RetrieverError::config("Retriever requires a warehouse client"))?;

        Ok(SqlRetriever {
            generator,
            warehouse,
            sleeper: self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper)),
            schedule: self.schedule,
            database: self.database,
            output_location: self.output_location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::poller::tests::RecordingSleeper;
    use crate::execution::{DataDocument, NO_DATA_SENTINEL};
    use crate::generator::LlmSqlGenerator;
    use crate::llm::MockLlmClient;
    use crate::warehouse::{
        FailingWarehouse, FailurePoint, QueryState, RowSet, ScriptedWarehouse, StatusResponse,
    };
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};

    const COUNT_SQL: &str = "SELECT COUNT(*) AS total_orders FROM orders;";

    fn generator() -> Arc<dyn QueryGenerator> {
        Arc::new(LlmSqlGenerator::new(Box::new(MockLlmClient::new())))
    }

    fn retriever(
        warehouse: Arc<dyn QueryExecutionClient>,
        sleeper: Arc<RecordingSleeper>,
    ) -> SqlRetriever {
        SqlRetriever::builder()
            .generator(generator())
            .warehouse(warehouse)
            .sleeper(sleeper)
            .database("sales")
            .output_location("s3://results/")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_retrieve_success_returns_two_documents() {
        let rows = RowSet::from(vec![vec!["42"]]);
        let warehouse = Arc::new(ScriptedWarehouse::succeeding_on(2, rows));
        let sleeper = Arc::new(RecordingSleeper::default());
        let retriever = retriever(warehouse.clone(), sleeper.clone());

        let result = assert_ok!(
            retriever
                .retrieve("Count all orders", &RunContext::new("t-1"))
                .await
        );

        assert_eq!(
            result.data,
            DataDocument {
                content: "[42]".to_string()
            }
        );
        assert_eq!(result.metadata.execution_id.as_str(), "mock-execution-1");
        assert_eq!(result.metadata.sql_query, COUNT_SQL);
        assert_eq!(result.metadata.query_state, QueryState::Succeeded);
        assert_eq!(warehouse.poll_count(), 2);
        assert_eq!(sleeper.durations().len(), 2);

        let [data, metadata] = result.into_documents();
        assert_eq!(data.page_content, "[42]");
        assert_eq!(metadata.page_content, "");
        assert_eq!(metadata.metadata["queryState"], "SUCCEEDED");
        assert_eq!(metadata.metadata["sqlQuery"], COUNT_SQL);
    }

    #[tokio::test]
    async fn test_retrieve_passes_target_to_warehouse() {
        let warehouse = Arc::new(ScriptedWarehouse::succeeding_on(1, RowSet::default()));
        let retriever = retriever(warehouse.clone(), Arc::new(RecordingSleeper::default()));

        assert_ok!(
            retriever
                .retrieve("Count all orders", &RunContext::new("t-2"))
                .await
        );

        assert_eq!(
            warehouse.submissions(),
            vec![(
                COUNT_SQL.to_string(),
                "sales".to_string(),
                "s3://results/".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_retrieve_timeout_yields_sentinel() {
        let warehouse = Arc::new(ScriptedWarehouse::never_finishing());
        let sleeper = Arc::new(RecordingSleeper::default());
        let retriever = retriever(warehouse.clone(), sleeper.clone());

        let result = assert_ok!(
            retriever
                .retrieve("Count all orders", &RunContext::new("t-3"))
                .await
        );

        assert_eq!(result.data.content, NO_DATA_SENTINEL);
        assert!(!result.has_data());
        assert_eq!(result.metadata.query_state, QueryState::Running);
        assert_eq!(warehouse.poll_count(), 20);
        assert_eq!(warehouse.fetch_count(), 0);
        assert_eq!(sleeper.durations().len(), 20);
    }

    #[tokio::test]
    async fn test_retrieve_failed_query_keeps_state() {
        let warehouse = Arc::new(ScriptedWarehouse::new(vec![StatusResponse::with_state(
            QueryState::Failed,
        )]));
        let retriever = retriever(warehouse.clone(), Arc::new(RecordingSleeper::default()));

        let result = assert_ok!(
            retriever
                .retrieve("Count all orders", &RunContext::new("t-4"))
                .await
        );

        assert_eq!(result.data.content, NO_DATA_SENTINEL);
        assert_eq!(result.metadata.query_state, QueryState::Failed);
        assert_eq!(warehouse.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_submission_failure_propagates() {
        let warehouse = Arc::new(FailingWarehouse::new(FailurePoint::Submit, "access denied"));
        let retriever = retriever(warehouse, Arc::new(RecordingSleeper::default()));

        let err = assert_err!(
            retriever
                .retrieve("Count all orders", &RunContext::new("t-5"))
                .await
        );
        assert_eq!(err.category(), "Submission Error");
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        let warehouse = Arc::new(FailingWarehouse::new(FailurePoint::Fetch, "bucket gone"));
        let retriever = retriever(warehouse, Arc::new(RecordingSleeper::default()));

        let err = assert_err!(
            retriever
                .retrieve("Count all orders", &RunContext::new("t-6"))
                .await
        );
        assert_eq!(err.category(), "Fetch Error");
    }

    #[tokio::test]
    async fn test_generation_failure_skips_warehouse() {
        let warehouse = Arc::new(ScriptedWarehouse::succeeding_on(1, RowSet::default()));
        let generator = LlmSqlGenerator::new(Box::new(MockLlmClient::new().failing("offline")));
        let retriever = SqlRetriever::builder()
            .generator(Arc::new(generator))
            .warehouse(warehouse.clone())
            .sleeper(Arc::new(RecordingSleeper::default()))
            .build()
            .unwrap();

        let err = assert_err!(
            retriever
                .retrieve("Count all orders", &RunContext::new("t-7"))
                .await
        );
        assert_eq!(err.category(), "Generation Error");
        assert!(warehouse.submissions().is_empty());
    }

    #[test]
    fn test_builder_requires_generator() {
        let warehouse = Arc::new(ScriptedWarehouse::never_finishing());
        let err = SqlRetriever::builder()
            .warehouse(warehouse)
            .build()
            .err()
            .unwrap();
        assert_eq!(err.category(), "Configuration Error");
        assert!(err.to_string().contains("query generator"));
    }

    #[test]
    fn test_builder_requires_warehouse() {
        let err = SqlRetriever::builder()
            .generator(generator())
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().contains("warehouse client"));
    }

    #[test]
    fn test_builder_default_schedule() {
        let retriever = SqlRetriever::builder()
            .generator(generator())
            .warehouse(Arc::new(ScriptedWarehouse::never_finishing()))
            .build()
            .unwrap();
        assert_eq!(retriever.schedule(), PollSchedule::default());
    }

    #[test]
    fn test_generated_run_id() {
        let ctx = RunContext::generated();
        assert!(ctx.run_id.starts_with("run-"));
    }
}
