//! Prompt construction for SQL generation.
//!
//! Builds the system prompt from an immutable prompt configuration holding
//! the dialect, the allowed tables, their schema and few-shot examples.
//! Placeholders are substituted in a single pass, so configured values are
//! inserted literally even when they contain `{...}` text of their own.

use serde::{Deserialize, Serialize};

use crate::llm::types::Message;

/// System prompt template for SQL generation.
const SYSTEM_PROMPT_TEMPLATE: &str = r#"Transform the following natural language requests into valid {dialect} SQL queries on {engine}. You are only ALLOWED to use the following {table_count} tables {tables} and their schema: {schema}

Here are some examples for you to look at, see how a column name has table alias. You must define meaningful column names as well: {examples}

Provide the SQL query that would retrieve the data based on the natural language request, try to provide raw data as possible and not aggregate. Do not add preamble or additional information."#;

const DEFAULT_DIALECT: &str = "prestodb";

const DEFAULT_ENGINE: &str = "AWS Athena";

const DEFAULT_TABLES: &str = "orders, order_items, reviews, payments";

const DEFAULT_SCHEMA: &str = r#"
orders:
    - order_id STRING, -- Unique identifier for the order
    - customer_id STRING, -- Identifier of the customer who placed the order
    - order_total FLOAT, -- Total amount of the order
    - order_status STRING, -- Current status of the order, e.g., pending, shipped, delivered
    - payment_method STRING, -- Payment method used for the order
    - shipping_address STRING, -- Shipping address for the order
    - created_at BIGINT, -- Timestamp when the order was placed
    - updated_at BIGINT -- Timestamp when the order status was last updated

order_items:
    - order_item_id STRING, -- Unique identifier for the order item
    - order_id STRING, -- Identifier of the order this item belongs to
    - product_id STRING, -- Identifier of the product in this order item
    - quantity INT, -- Quantity of the product in this order item
    - price FLOAT -- Price of the product at the time of order

reviews:
    - review_id STRING, -- Unique identifier for the review
    - product_id STRING, -- Identifier of the product being reviewed
    - customer_id STRING, -- Identifier of the customer who wrote the review
    - rating INT, -- Rating given by the customer, e.g., 1-5 stars
    - created_at BIGINT -- Timestamp when the review was written

payments:
    - payment_id STRING, -- Unique identifier for the payment
    - order_id STRING, -- Identifier of the order this payment is for, must also be in order_items and orders table
    - customer_id STRING, -- Identifier of the customer who made the payment
    - amount FLOAT, -- Amount paid, always positive
    - payment_method STRING, -- Payment method used, e.g., credit card, PayPal
    - payment_status STRING, -- Status of the payment, e.g., success, failed, refunds
    - created_at BIGINT -- Timestamp when the payment was made
"#;

const DEFAULT_EXAMPLES: &str = r#"
-- Top 5 customers that placed most amount of orders
SELECT customer_id, count(distinct order_id) as total_orders_placed
FROM orders
GROUP BY 1
ORDER BY total_orders_placed DESC
LIMIT 5;

-- Find how many orders were refunded and whats the total number of orders placed by payment_method
SELECT payment_method, count(case when payment_status = 'refunds' then 1 else 0 end) as total_refund_orders,
count(distinct order_id) as total_orders_placed
FROM payments
GROUP BY payment_method;
"#;

/// Static prompt configuration for the SQL generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// SQL dialect the model must target (e.g., "prestodb").
    pub dialect: String,
    /// Query engine named in the prompt (e.g., "AWS Athena").
    pub engine: String,
    /// Comma-separated list of tables the model may use.
    pub tables: String,
    /// Column-level schema description of those tables.
    pub schema: String,
    /// Few-shot example queries.
    pub examples: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            dialect: DEFAULT_DIALECT.to_string(),
            engine: DEFAULT_ENGINE.to_string(),
            tables: DEFAULT_TABLES.to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
            examples: DEFAULT_EXAMPLES.to_string(),
        }
    }
}

/// Builds the system prompt for the given configuration.
pub fn build_system_prompt(config: &PromptConfig) -> String {
    let table_count = table_count(&config.tables);
    render(SYSTEM_PROMPT_TEMPLATE, |name| match name {
        "dialect" => Some(config.dialect.as_str()),
        "engine" => Some(config.engine.as_str()),
        "table_count" => Some(table_count.as_str()),
        "tables" => Some(config.tables.as_str()),
        "schema" => Some(config.schema.as_str()),
        "examples" => Some(config.examples.as_str()),
        _ => None,
    })
}

/// Substitutes `{name}` placeholders in one left-to-right scan.
///
/// Unknown names and unmatched braces are copied through unchanged.
fn render<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}').and_then(|close| {
            lookup(&after[..close]).map(|value| (value, close))
        }) {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Spells out the number of comma-separated table names.
fn table_count(tables: &str) -> String {
    const WORDS: [&str; 10] = [
        "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    ];
    let count = tables.split(',').filter(|t| !t.trim().is_empty()).count();
    match count.checked_sub(1).and_then(|i| WORDS.get(i)) {
        Some(word) => word.to_string(),
        None => count.to_string(),
    }
}

/// Builds the message list for one question: system prompt, then the
/// question verbatim.
pub fn build_messages(config: &PromptConfig, question: &str) -> Vec<Message> {
    vec![
        Message::system(build_system_prompt(config)),
        Message::user(question),
    ]
}
