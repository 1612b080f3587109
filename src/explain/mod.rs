//! Explain & analysis layer.
//!
//! The only part of the crate that performs I/O. It runs the target
//! engine's EXPLAIN (optionally ANALYZE) against already-compiled SQL
//! through a caller-supplied executor and condenses the engine-specific
//! plan text into a common summary. Purely derivative: it never re-plans
//! or alters the SQL it explains, and its failures are independent of
//! compilation success.

mod parse;
mod runner;

pub use parse::parse_plan;
pub use runner::{ExplainRunner, SqlExecutor};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type for explain operations.
pub type ExplainOutcome<T> = Result<T, ExplainError>;

/// Errors from EXPLAIN execution. These never invalidate a previously
/// compiled query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExplainError {
    /// The engine rejected the plan request.
    #[error("Explain execution failed: {0}")]
    Execution(String),

    /// A newer request for the same query slot superseded this one.
    #[error("Explain request was superseded by a newer request")]
    Superseded,

    /// The executor did not answer within the deadline.
    #[error("Explain timed out after {0} ms")]
    Timeout(u64),
}

/// An EXPLAIN request over compiled SQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    pub sql: String,
    #[serde(default)]
    pub params: Vec<Value>,
    /// Run EXPLAIN ANALYZE for execution timings.
    #[serde(default)]
    pub analyze: bool,
}

/// Parsed plan: raw text is authoritative, the summary is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainResult {
    pub raw: String,
    pub summary: ExplainSummary,
}

/// Engine-agnostic plan summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainSummary {
    /// Engine kind the plan came from ("postgres", "mysql", ...).
    pub database: String,
    pub has_sequential_scan: bool,
    pub used_indexes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planning_time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
}
