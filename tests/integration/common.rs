//! Shared fixtures for integration tests.

use sqlrag::execution::PollSchedule;
use std::time::Duration;

/// Three orders across two customers.
pub const SEED_SQL: &str = "
CREATE TABLE orders (
    order_id TEXT PRIMARY KEY,
    customer_id TEXT NOT NULL,
    order_total REAL NOT NULL,
    order_status TEXT
);
INSERT INTO orders VALUES
    ('o1', 'c1', 100.0, 'delivered'),
    ('o2', 'c2', 250.0, 'shipped'),
    ('o3', 'c1', 75.5, NULL);
";

/// Polling schedule with millisecond sleeps so tests finish quickly.
pub fn fast_schedule() -> PollSchedule {
    PollSchedule {
        short_sleep: Duration::from_millis(25),
        long_sleep: Duration::from_millis(50),
        ..PollSchedule::default()
    }
}

/// Config file contents selecting the mock LLM, the local warehouse at
/// `db_path` and the fast polling schedule.
pub fn local_config_toml(db_path: &str) -> String {
    format!(
        r#"
[llm]
provider = "mock"

[warehouse]
backend = "local"
local_path = "{db_path}"

[polling]
long_sleep_ms = 50
short_sleep_ms = 25
"#
    )
}
