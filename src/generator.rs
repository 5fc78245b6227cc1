//! SQL generation from natural-language questions.

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::llm::{build_messages, extract_sql, CompletionParams, LlmClient, PromptConfig};

/// Turns a question into a single SQL query string.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    /// Generates SQL for `question`.
    async fn generate_sql(&self, question: &str) -> Result<String>;
}

/// Generator backed by an LLM completion.
pub struct LlmSqlGenerator {
    client: Box<dyn LlmClient>,
    prompt: PromptConfig,
    params: CompletionParams,
}

impl LlmSqlGenerator {
    /// Creates a generator with the default prompt and completion parameters.
    pub fn new(client: Box<dyn LlmClient>) -> Self {
        Self {
            client,
            prompt: PromptConfig::default(),
            params: CompletionParams::default(),
        }
    }

    /// Replaces the prompt configuration.
    pub fn with_prompt(mut self, prompt: PromptConfig) -> Self {
        self.prompt = prompt;
        self
    }

    /// Replaces the completion parameters.
    pub fn with_params(mut self, params: CompletionParams) -> Self {
        self.params = params;
        self
    }
}

#[async_trait]
impl QueryGenerator for LlmSqlGenerator {
    async fn generate_sql(&self, question: &str) -> Result<String> {
        let messages = build_messages(&self.prompt, question);
        let completion = self.client.complete(&messages, &self.params).await?;
        let sql = extract_sql(&completion)?;
        debug!(dialect = %self.prompt.dialect, "Generated SQL: {}", sql);
        Ok(sql)
    }
}
