//! Async EXPLAIN execution with per-slot supersession.
//!
//! Compilation never waits on this: the runner owns the crate's only I/O.
//! Each query slot (a dashboard panel, a funnel-step debug view) tracks a
//! generation counter; issuing a new request for a slot invalidates any
//! in-flight one, whose result is discarded when it eventually lands.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::sql::Dialect;

use super::{parse_plan, ExplainError, ExplainOutcome, ExplainRequest, ExplainResult};

/// SQL-execution interface owned by the external database-driver layer.
///
/// Accepts a statement plus positional parameters and returns result rows
/// rendered as text lines (the shape EXPLAIN output arrives in).
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str, params: &[Value]) -> ExplainOutcome<Vec<String>>;
}

/// Runs EXPLAIN requests through an executor, one logical slot at a time.
pub struct ExplainRunner {
    executor: Arc<dyn SqlExecutor>,
    generations: DashMap<String, u64>,
    timeout: Duration,
}

impl ExplainRunner {
    pub fn new(executor: Arc<dyn SqlExecutor>) -> Self {
        Self {
            executor,
            generations: DashMap::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run EXPLAIN for a slot. A later call for the same slot supersedes
    /// this one; the stale result is dropped, not returned.
    pub async fn explain(
        &self,
        slot: &str,
        request: &ExplainRequest,
        dialect: Dialect,
    ) -> ExplainOutcome<ExplainResult> {
        let generation = {
            let mut entry = self.generations.entry(slot.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        let statement = explain_statement(dialect, request);
        let execution = self.executor.execute(&statement, &request.params);

        let rows = match tokio::time::timeout(self.timeout, execution).await {
            Ok(result) => result?,
            Err(_) => return Err(ExplainError::Timeout(self.timeout.as_millis() as u64)),
        };

        // A superseding request bumped the counter while we were waiting.
        let current = self.generations.get(slot).map(|g| *g).unwrap_or(0);
        if current != generation {
            return Err(ExplainError::Superseded);
        }

        Ok(parse_plan(dialect, rows.join("\n")))
    }
}

/// EXPLAIN prefix for the dialect.
fn explain_statement(dialect: Dialect, request: &ExplainRequest) -> String {
    match (dialect, request.analyze) {
        (Dialect::DuckDb, _) => format!("EXPLAIN {}", request.sql),
        (_, true) => format!("EXPLAIN ANALYZE {}", request.sql),
        (_, false) => format!("EXPLAIN {}", request.sql),
    }
}
