//! Query execution lifecycle.
//!
//! Submits one query, polls its status under a fixed attempt budget with a
//! two-tier sleep schedule, and fetches results once the query succeeds.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::warehouse::{ExecutionId, QueryExecutionClient, QueryState, RowSet};

/// Default number of status polls before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

/// Remaining-budget multiple that triggers a long sleep.
pub const DEFAULT_LONG_EVERY: u32 = 5;

/// Default long sleep.
pub const DEFAULT_LONG_SLEEP: Duration = Duration::from_secs(3);

/// Default short sleep.
pub const DEFAULT_SHORT_SLEEP: Duration = Duration::from_millis(500);

/// Fixed polling schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// Attempt ceiling; one status poll per attempt.
    pub max_attempts: u32,
    /// Sleep long whenever the remaining budget is a multiple of this.
    pub long_every: u32,
    /// Sleep after polls where the remaining budget is a multiple of `long_every`.
    pub long_sleep: Duration,
    /// Sleep after every other poll.
    pub short_sleep: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            long_every: DEFAULT_LONG_EVERY,
            long_sleep: DEFAULT_LONG_SLEEP,
            short_sleep: DEFAULT_SHORT_SLEEP,
        }
    }
}

impl PollSchedule {
    /// Returns the sleep following a poll that left `remaining` attempts.
    pub fn sleep_for(&self, remaining: u32) -> Duration {
        if self.long_every != 0 && remaining % self.long_every == 0 {
            self.long_sleep
        } else {
            self.short_sleep
        }
    }

    /// Upper bound on total sleeping across a full budget.
    pub fn worst_case_wait(&self) -> Duration {
        (0..self.max_attempts).map(|r| self.sleep_for(r)).sum()
    }
}

/// Suspends the polling loop between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Sleeps for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer; yields the task while waiting.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Outcome of one execution lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Identifier issued at submission.
    pub execution_id: ExecutionId,
    /// Last observed state.
    pub state: QueryState,
    /// Fetched rows; `None` unless the query succeeded within the budget.
    pub rows: Option<RowSet>,
    /// Number of status polls performed.
    pub polls: u32,
}

/// Drives submit, poll and fetch for a single query.
pub struct ExecutionPoller<'a> {
    client: &'a dyn QueryExecutionClient,
    sleeper: &'a dyn Sleeper,
    schedule: PollSchedule,
}

impl<'a> ExecutionPoller<'a> {
    /// Creates a poller over the given client.
    pub fn new(
        client: &'a dyn QueryExecutionClient,
        sleeper: &'a dyn Sleeper,
        schedule: PollSchedule,
    ) -> Self {
        Self {
            client,
            sleeper,
            schedule,
        }
    }

    /// Runs one query to success or budget exhaustion.
    ///
    /// Submission and fetch failures propagate. Exhausting the budget is not
    /// an error: the outcome carries `rows: None` and the last observed state.
    pub async fn execute(
        &self,
        sql: &str,
        database: &str,
        output_location: &str,
    ) -> Result<ExecutionOutcome> {
        let execution_id = self.client.submit(sql, database, output_location).await?;
        info!(%execution_id, database, "Submitted query");

        let mut state = QueryState::Running;
        let mut budget = self.schedule.max_attempts;
        let mut done = false;
        let mut polls = 0;

        while budget > 0 && !done {
            budget -= 1;
            polls += 1;

            let status = self.client.poll_status(&execution_id).await?;
            match status.state {
                Some(reported) => {
                    done = reported.is_success();
                    state = reported;
                }
                None => warn!(%execution_id, "Status response without a state; keeping {}", state),
            }
            if let Some(reason) = &status.reason {
                debug!(%execution_id, "State change reason: {}", reason);
            }
            debug!(%execution_id, remaining = budget, %state, "Polled execution status");

            self.sleeper.sleep(self.schedule.sleep_for(budget)).await;
        }

        let rows = if done {
            let rows = self.client.fetch_results(&execution_id).await?;
            info!(%execution_id, rows = rows.len(), polls, "Query succeeded");
            Some(rows)
        } else {
            warn!(%execution_id, %state, polls, "No results within the polling budget");
            None
        };

        Ok(ExecutionOutcome {
            execution_id,
            state,
            rows,
            polls,
        })
    }
}
