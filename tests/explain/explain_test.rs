use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cubist::explain::{
    parse_plan, ExplainError, ExplainOutcome, ExplainRequest, ExplainRunner, SqlExecutor,
};
use cubist::sql::Dialect;
use serde_json::Value;

const PG_PLAN: &str = "\
Hash Join  (cost=230.47..713.98 rows=101 width=488)
  Hash Cond: (orders.customer_id = customers.id)
  ->  Seq Scan on orders  (cost=0.00..445.00 rows=10000 width=244)
  ->  Index Scan using customers_pkey on customers  (cost=0.29..8.31 rows=1 width=4)
Planning Time: 0.364 ms
Execution Time: 4.791 ms";

#[test]
fn test_parse_postgres_plan() {
    let result = parse_plan(Dialect::Postgres, PG_PLAN.to_string());
    assert_eq!(result.summary.database, "postgres");
    assert!(result.summary.has_sequential_scan);
    assert_eq!(result.summary.used_indexes, vec!["customers_pkey"]);
    assert_eq!(result.summary.planning_time_ms, Some(0.364));
    assert_eq!(result.summary.execution_time_ms, Some(4.791));
    assert_eq!(result.summary.total_cost, Some(713.98));
    // The raw plan stays authoritative.
    assert_eq!(result.raw, PG_PLAN);
}

#[test]
fn test_parse_mysql_plan() {
    let raw = "\
           id: 1
        table: orders
         type: ALL
possible_keys: NULL
          key: NULL
           id: 1
        table: customers
         type: eq_ref
          key: PRIMARY";
    let result = parse_plan(Dialect::MySql, raw.to_string());
    assert!(result.summary.has_sequential_scan);
    assert_eq!(result.summary.used_indexes, vec!["PRIMARY"]);
}

#[test]
fn test_index_only_plan_has_no_seq_scan() {
    let raw = "Index Only Scan using orders_created_at_idx on orders  (cost=0.29..44.31 rows=90 width=8)";
    let result = parse_plan(Dialect::Postgres, raw.to_string());
    assert!(!result.summary.has_sequential_scan);
    assert_eq!(result.summary.used_indexes, vec!["orders_created_at_idx"]);
}

struct RecordingExecutor {
    calls: AtomicUsize,
    lines: Vec<String>,
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    async fn execute(&self, sql: &str, params: &[Value]) -> ExplainOutcome<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(sql.starts_with("EXPLAIN"));
        assert!(params.is_empty());
        Ok(self.lines.clone())
    }
}

fn request(analyze: bool) -> ExplainRequest {
    ExplainRequest {
        sql: "SELECT * FROM orders".into(),
        params: vec![],
        analyze,
    }
}

#[tokio::test]
async fn test_runner_executes_and_parses() {
    let executor = Arc::new(RecordingExecutor {
        calls: AtomicUsize::new(0),
        lines: PG_PLAN.lines().map(String::from).collect(),
    });
    let runner = ExplainRunner::new(executor.clone());

    let result = runner
        .explain("panel-1", &request(false), Dialect::Postgres)
        .await
        .unwrap();
    assert!(result.summary.has_sequential_scan);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
}

struct AnalyzeAssertingExecutor;

#[async_trait]
impl SqlExecutor for AnalyzeAssertingExecutor {
    async fn execute(&self, sql: &str, _params: &[Value]) -> ExplainOutcome<Vec<String>> {
        assert!(sql.starts_with("EXPLAIN ANALYZE "));
        Ok(vec!["Seq Scan on orders".into()])
    }
}

#[tokio::test]
async fn test_analyze_flag_changes_statement() {
    let runner = ExplainRunner::new(Arc::new(AnalyzeAssertingExecutor));
    runner
        .explain("panel-1", &request(true), Dialect::Postgres)
        .await
        .unwrap();
}

struct SlowThenFastExecutor {
    calls: AtomicUsize,
}

#[async_trait]
impl SqlExecutor for SlowThenFastExecutor {
    async fn execute(&self, _sql: &str, _params: &[Value]) -> ExplainOutcome<Vec<String>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        Ok(vec!["Seq Scan on orders".into()])
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_superseding_request_invalidates_prior_one() {
    let runner = Arc::new(ExplainRunner::new(Arc::new(SlowThenFastExecutor {
        calls: AtomicUsize::new(0),
    })));

    let first = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move {
            runner
                .explain("panel-1", &request(false), Dialect::Postgres)
                .await
        })
    };

    // Give the first request time to start waiting, then supersede it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = runner
        .explain("panel-1", &request(false), Dialect::Postgres)
        .await;
    assert!(second.is_ok());

    let first = first.await.unwrap();
    assert_eq!(first.unwrap_err(), ExplainError::Superseded);
}

struct NeverExecutor;

#[async_trait]
impl SqlExecutor for NeverExecutor {
    async fn execute(&self, _sql: &str, _params: &[Value]) -> ExplainOutcome<Vec<String>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(vec![])
    }
}

#[tokio::test]
async fn test_timeout_is_reported() {
    let runner =
        ExplainRunner::new(Arc::new(NeverExecutor)).with_timeout(Duration::from_millis(20));
    let err = runner
        .explain("panel-1", &request(false), Dialect::Postgres)
        .await
        .unwrap_err();
    assert!(matches!(err, ExplainError::Timeout(_)));
}

struct FailingExecutor;

#[async_trait]
impl SqlExecutor for FailingExecutor {
    async fn execute(&self, _sql: &str, _params: &[Value]) -> ExplainOutcome<Vec<String>> {
        Err(ExplainError::Execution("permission denied".into()))
    }
}

#[tokio::test]
async fn test_engine_rejection_is_independent_error() {
    let runner = ExplainRunner::new(Arc::new(FailingExecutor));
    let err = runner
        .explain("panel-1", &request(false), Dialect::Postgres)
        .await
        .unwrap_err();
    assert!(matches!(err, ExplainError::Execution(_)));
}
