//! End-to-end retrieval tests through the public API.
//!
//! Mock LLM, in-memory SQLite warehouse, real tokio sleeps on a fast schedule.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use sqlrag::execution::{PollSchedule, NO_DATA_SENTINEL};
use sqlrag::generator::LlmSqlGenerator;
use sqlrag::llm::MockLlmClient;
use sqlrag::retriever::{RunContext, SqlRetriever};
use sqlrag::warehouse::{LocalWarehouse, QueryState, ScriptedWarehouse};

use super::common::{fast_schedule, SEED_SQL};

async fn seeded_warehouse() -> Arc<LocalWarehouse> {
    let warehouse = LocalWarehouse::open(":memory:").await.unwrap();
    warehouse.seed(SEED_SQL).await.unwrap();
    Arc::new(warehouse)
}

fn retriever_with(client: MockLlmClient, warehouse: Arc<LocalWarehouse>) -> SqlRetriever {
    SqlRetriever::builder()
        .generator(Arc::new(LlmSqlGenerator::new(Box::new(client))))
        .warehouse(warehouse)
        .schedule(fast_schedule())
        .database("shop")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_count_question_returns_scalar_row() {
    let retriever = retriever_with(MockLlmClient::new(), seeded_warehouse().await);

    let result = retriever
        .retrieve("Count all orders", &RunContext::new("it-count"))
        .await
        .unwrap();

    assert_eq!(result.data.content, "[3]");
    assert_eq!(result.metadata.query_state, QueryState::Succeeded);
    assert!(result.metadata.execution_id.as_str().starts_with("local-"));
}

#[tokio::test]
async fn test_multi_row_serialization() {
    let retriever = retriever_with(MockLlmClient::new(), seeded_warehouse().await);

    let result = retriever
        .retrieve("List the orders", &RunContext::new("it-rows"))
        .await
        .unwrap();

    assert_eq!(result.data.content, "[o1, 100.0][o2, 250.0][o3, 75.5]");

    let [data, metadata] = result.into_documents();
    assert_eq!(data.page_content, "[o1, 100.0][o2, 250.0][o3, 75.5]");
    assert!(data.metadata.is_empty());
    assert_eq!(metadata.page_content, "");
    assert_eq!(
        metadata.metadata["sqlQuery"],
        "SELECT order_id, order_total FROM orders ORDER BY order_id;"
    );
    assert_eq!(metadata.metadata["queryState"], "SUCCEEDED");
}

#[tokio::test]
async fn test_empty_result_is_not_sentinel() {
    let client = MockLlmClient::new().with_response(
        "cancelled",
        "SELECT order_id FROM orders WHERE order_status = 'cancelled'",
    );
    let retriever = retriever_with(client, seeded_warehouse().await);

    let result = retriever
        .retrieve("Which orders were cancelled?", &RunContext::new("it-empty"))
        .await
        .unwrap();

    assert_eq!(result.data.content, "");
    assert!(result.has_data());
}

#[tokio::test]
async fn test_failed_query_yields_sentinel_with_state() {
    let client = MockLlmClient::new().with_response("inventory", "SELECT * FROM inventory");
    let retriever = retriever_with(client, seeded_warehouse().await);

    let result = retriever
        .retrieve("How much inventory is left?", &RunContext::new("it-fail"))
        .await
        .unwrap();

    assert_eq!(result.data.content, NO_DATA_SENTINEL);
    assert_eq!(result.metadata.query_state, QueryState::Failed);
    assert_eq!(result.metadata.sql_query, "SELECT * FROM inventory");
}

#[tokio::test]
async fn test_budget_exhaustion_yields_sentinel() {
    let warehouse = Arc::new(ScriptedWarehouse::never_finishing());
    let retriever = SqlRetriever::builder()
        .generator(Arc::new(LlmSqlGenerator::new(Box::new(MockLlmClient::new()))))
        .warehouse(warehouse.clone())
        .schedule(PollSchedule {
            max_attempts: 3,
            ..fast_schedule()
        })
        .build()
        .unwrap();

    let result = retriever
        .retrieve("Count all orders", &RunContext::new("it-timeout"))
        .await
        .unwrap();

    assert_eq!(result.data.content, NO_DATA_SENTINEL);
    assert_eq!(result.metadata.query_state, QueryState::Running);
    assert_eq!(warehouse.poll_count(), 3);
    assert_eq!(warehouse.fetch_count(), 0);
}

#[tokio::test]
async fn test_concurrent_retrievals_are_independent() {
    let retriever = retriever_with(MockLlmClient::new(), seeded_warehouse().await);
    let first_ctx = RunContext::new("it-a");
    let second_ctx = RunContext::new("it-b");

    let (first, second) = tokio::join!(
        retriever.retrieve("Count all orders", &first_ctx),
        retriever.retrieve("List the orders", &second_ctx),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_ne!(first.metadata.execution_id, second.metadata.execution_id);
    assert_eq!(first.data.content, "[3]");
    assert_eq!(second.data.content, "[o1, 100.0][o2, 250.0][o3, 75.5]");
}
