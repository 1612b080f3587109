//! Query request types - the JSON-shaped input the compiler accepts.
//!
//! Dashboard UIs and embedding applications build these descriptions; they
//! never see SQL. Requests are read-only inputs: compilation produces a new
//! artifact and leaves the request untouched.

mod duration;
mod filters;
mod request;

pub use duration::StepWindow;
pub use filters::{
    filters_for_server, filters_from_server, FilterCondition, FilterNode, FilterOperator, UiFilter,
};
pub use request::{
    AnalysisRequest, DateRange, FlowRequest, FunnelRequest, FunnelStep, Granularity,
    MergeStrategy, MultiQueryRequest, Query, RetentionKind, RetentionRequest, SortDirection,
    TimeDimension,
};
