//! # Cubist
//!
//! A semantic-layer query compiler: declarative analytics requests in,
//! parameterized multi-dialect SQL out.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        AnalysisRequest (query/funnel/flow/retention)     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner: primary cube]
//! ┌─────────────────────────────────────────────────────────┐
//! │     Primary-cube selection (deterministic ranking)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner: join paths]
//! ┌─────────────────────────────────────────────────────────┐
//! │   BFS over the cube relationship graph (cycle-safe)      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner: pre-aggregation]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Fan-out detection → pre-aggregation CTE planning       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compiler]
//! ┌─────────────────────────────────────────────────────────┐
//! │    SQL + positional params + QueryAnalysis rationale     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Compilation is a pure, synchronous function of (schema, request):
//! schemas are immutable versioned snapshots, so any number of
//! compilations run in parallel without locks. The EXPLAIN layer is the
//! only component that touches a database, through a caller-supplied
//! executor.

pub mod cache;
pub mod compiler;
pub mod error;
pub mod explain;
pub mod planner;
pub mod query;
pub mod schema;
pub mod sql;

pub use compiler::{compile, Compiled, CompiledQuery};
pub use error::{CompileError, CompileResult, SchemaError, SchemaResult};
pub use schema::Schema;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::cache::QueryCache;
    pub use crate::compiler::{
        compile, compile_flow, compile_funnel, compile_multi, compile_retention,
        compile_standard, Compiled, CompiledQuery, CompiledStatement, MergedCompiled,
    };
    pub use crate::error::{CompileError, CompileResult, SchemaError};
    pub use crate::explain::{
        ExplainRequest, ExplainResult, ExplainRunner, ExplainSummary, SqlExecutor,
    };
    pub use crate::planner::{plan_query, QueryAnalysis, SelectionReason};
    pub use crate::query::{
        AnalysisRequest, FilterNode, FilterOperator, FlowRequest, FunnelRequest, FunnelStep,
        Granularity, MergeStrategy, MultiQueryRequest, Query, RetentionKind, RetentionRequest,
        SortDirection, TimeDimension,
    };
    pub use crate::schema::{
        Aggregation, Cube, Dimension, Measure, Relationship, RelationshipKind, Schema, ValueType,
    };
    pub use crate::sql::Dialect;
}
