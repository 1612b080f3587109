//! SQL compilation - one compiler per analysis mode.
//!
//! [`compile`] is the single dispatch point over the closed
//! [`AnalysisRequest`] union. Every compiler is a pure, synchronous
//! function of {schema, request, dialect}: no shared state, no I/O, and a
//! typed error instead of partially emitted SQL on every failure path.

mod common;
mod filters;
pub mod flow;
pub mod funnel;
pub mod merge;
pub mod retention;
pub mod standard;

pub use flow::{compile_flow, FlowCompiled, FlowMetadata};
pub use funnel::{compile_funnel, FunnelCompiled, FunnelMetadata, FunnelStepMeta};
pub use merge::{compile_multi, MergedCompiled};
pub use retention::{compile_retention, RetentionCompiled, RetentionMetadata};
pub use standard::{compile_compare_ranges, compile_standard};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CompileResult;
use crate::planner::QueryAnalysis;
use crate::query::AnalysisRequest;
use crate::schema::Schema;
use crate::sql::Dialect;

/// A compiled standard query: SQL, positional parameters, and the
/// planning rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
    pub analysis: QueryAnalysis,
}

/// A bare parameterized statement (flow nodes/links, merge members).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Output of [`compile`], one variant per analysis mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Compiled {
    Query(CompiledQuery),
    Funnel(FunnelCompiled),
    Flow(FlowCompiled),
    Retention(RetentionCompiled),
}

/// Compile any analysis request. The single mode dispatch of the crate.
pub fn compile(
    schema: &Schema,
    request: &AnalysisRequest,
    dialect: Dialect,
) -> CompileResult<Compiled> {
    match request {
        AnalysisRequest::Query(query) => {
            compile_standard(schema, query, dialect).map(Compiled::Query)
        }
        AnalysisRequest::Funnel(funnel) => {
            compile_funnel(schema, funnel, dialect).map(Compiled::Funnel)
        }
        AnalysisRequest::Flow(flow) => compile_flow(schema, flow, dialect).map(Compiled::Flow),
        AnalysisRequest::Retention(retention) => {
            compile_retention(schema, retention, dialect).map(Compiled::Retention)
        }
    }
}
