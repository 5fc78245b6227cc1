//! Mock LLM client for testing.
//!
//! Provides deterministic SQL completions based on input patterns.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::{Result, RetrieverError};
use crate::llm::types::{last_user_content, CompletionParams, Message, Role};
use crate::llm::LlmClient;

/// Mock LLM client that returns canned responses based on input patterns.
///
/// Used for tests and offline runs without making real API calls.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    /// Custom response mappings (pattern -> response).
    custom_responses: Vec<(String, String)>,
    /// When set, every completion fails with this message.
    failure: Option<String>,
    /// Messages received by the most recent completion.
    last_messages: Mutex<Vec<Message>>,
}

impl MockLlmClient {
    /// Creates a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom response mapping.
    ///
    /// When the question contains `pattern`, the mock will return `response`.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// Makes every completion fail with a generation error.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Returns the system prompt of the most recent completion, if any.
    pub fn last_system_prompt(&self) -> Option<String> {
        self.last_messages.lock().ok().and_then(|messages| {
            messages
                .iter()
                .find(|m| m.role == Role::System)
                .map(|m| m.content.clone())
        })
    }

    /// Generates a mock response based on the question.
    fn mock_response(&self, input: &str) -> String {
        let input_lower = input.to_lowercase();

        // Check custom responses first
        for (pattern, response) in &self.custom_responses {
            if input_lower.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        if input_lower.contains("top") && input_lower.contains("customer") {
            return "```sql\nSELECT customer_id, count(distinct order_id) AS total_orders_placed\nFROM orders\nGROUP BY 1\nORDER BY total_orders_placed DESC\nLIMIT 5;\n```".to_string();
        }

        if input_lower.contains("refund") {
            return "SELECT payment_id, order_id, amount FROM payments WHERE payment_status = 'refunds'"
                .to_string();
        }

        if input_lower.contains("count") && input_lower.contains("orders") {
            return "```sql\nSELECT COUNT(*) AS total_orders FROM orders;\n```".to_string();
        }

        if input_lower.contains("review") {
            return "```sql\nSELECT review_id, product_id, rating FROM reviews ORDER BY rating DESC;\n```"
                .to_string();
        }

        if input_lower.contains("orders") {
            return "```sql\nSELECT order_id, order_total FROM orders ORDER BY order_id;\n```"
                .to_string();
        }

        "SELECT 'unanswerable' AS note".to_string()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message], _params: &CompletionParams) -> Result<String> {
        if let Ok(mut last) = self.last_messages.lock() {
            *last = messages.to_vec();
        }

        if let Some(message) = &self.failure {
            return Err(RetrieverError::generation(message.clone()));
        }

        Ok(self.mock_response(last_user_content(messages)))
    }
}
