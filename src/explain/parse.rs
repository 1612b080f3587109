//! Engine-specific plan-text parsing.
//!
//! Summaries are best-effort: anything the patterns miss stays visible in
//! the raw text, which is always returned untouched.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::sql::{Dialect, SqlDialect};

use super::{ExplainResult, ExplainSummary};

static PG_SEQ_SCAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Seq Scan").expect("pattern is valid"));
static PG_INDEX_SCAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Index(?: Only)? Scan(?: Backward)? using (\w+)").expect("pattern is valid")
});
static PG_PLANNING_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Planning Time: ([0-9.]+) ms").expect("pattern is valid"));
static PG_EXECUTION_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Execution Time: ([0-9.]+) ms").expect("pattern is valid"));
static PG_TOTAL_COST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"cost=[0-9.]+\.\.([0-9.]+)").expect("pattern is valid"));

static MYSQL_FULL_SCAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)(?:type:\s*ALL\b|\|\s*ALL\s*\|)").expect("pattern is valid"));
static MYSQL_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)key:\s*([A-Za-z0-9_]+)").expect("pattern is valid"));
static MYSQL_ANALYZE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"actual time=[0-9.]+\.\.([0-9.]+)").expect("pattern is valid")
});

/// Parse raw EXPLAIN output into the common summary.
pub fn parse_plan(dialect: Dialect, raw: String) -> ExplainResult {
    let summary = match dialect {
        Dialect::Postgres => parse_postgres(&raw),
        Dialect::MySql => parse_mysql(&raw),
        // No structured parsing; the raw plan is still useful.
        Dialect::DuckDb => ExplainSummary {
            database: dialect.name().to_string(),
            ..Default::default()
        },
    };
    ExplainResult { raw, summary }
}

fn parse_postgres(raw: &str) -> ExplainSummary {
    let mut used_indexes: Vec<String> = Vec::new();
    for caps in PG_INDEX_SCAN.captures_iter(raw) {
        let name = caps[1].to_string();
        if !used_indexes.contains(&name) {
            used_indexes.push(name);
        }
    }

    ExplainSummary {
        database: "postgres".to_string(),
        has_sequential_scan: PG_SEQ_SCAN.is_match(raw),
        used_indexes,
        planning_time_ms: capture_f64(&PG_PLANNING_TIME, raw),
        execution_time_ms: capture_f64(&PG_EXECUTION_TIME, raw),
        total_cost: capture_f64(&PG_TOTAL_COST, raw),
    }
}

fn parse_mysql(raw: &str) -> ExplainSummary {
    let mut used_indexes: Vec<String> = Vec::new();
    for caps in MYSQL_KEY.captures_iter(raw) {
        let name = caps[1].to_string();
        if name != "NULL" && !used_indexes.contains(&name) {
            used_indexes.push(name);
        }
    }

    ExplainSummary {
        database: "mysql".to_string(),
        has_sequential_scan: MYSQL_FULL_SCAN.is_match(raw),
        used_indexes,
        planning_time_ms: None,
        execution_time_ms: capture_f64(&MYSQL_ANALYZE_TIME, raw),
        total_cost: None,
    }
}

fn capture_f64(pattern: &Regex, raw: &str) -> Option<f64> {
    pattern
        .captures(raw)
        .and_then(|caps| caps[1].parse::<f64>().ok())
}
