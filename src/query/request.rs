//! Request shapes for the four analysis modes.

use serde::{Deserialize, Serialize};

use super::duration::StepWindow;
use super::filters::FilterNode;

/// A standard analytics query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Query {
    /// Qualified `Cube.field` measure references.
    pub measures: Vec<String>,
    /// Qualified dimension references.
    pub dimensions: Vec<String>,
    pub time_dimensions: Vec<TimeDimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterNode>,
    /// Ordered (field, direction) pairs.
    pub order: Vec<(String, SortDirection)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl Query {
    /// All qualified member references this query touches.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.measures
            .iter()
            .map(String::as_str)
            .chain(self.dimensions.iter().map(String::as_str))
            .chain(self.time_dimensions.iter().map(|t| t.dimension.as_str()))
    }
}

/// A time dimension request with optional bucketing and ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeDimension {
    pub dimension: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity: Option<Granularity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    /// Extra ranges to compile the same query against for comparison.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compare_date_range: Vec<DateRange>,
}

/// Either an absolute [from, to] pair or a relative description
/// such as `"last 30 days"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateRange {
    Absolute([String; 2]),
    Relative(String),
}

/// Time bucket granularities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Granularity {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Granularity {
    /// Lowercase SQL keyword for DATE_TRUNC-style functions.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Granularity::Second => "second",
            Granularity::Minute => "minute",
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Quarter => "quarter",
            Granularity::Year => "year",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A funnel specification: ordered steps correlated by a binding key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelRequest {
    pub steps: Vec<FunnelStep>,
    /// Dimension correlating entities across steps, e.g. `Events.userId`.
    pub binding_key: String,
    /// Shared event-time dimension, e.g. `Events.timestamp`.
    pub time_dimension: String,
}

/// One funnel step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Cube the step's qualifying events come from.
    pub cube: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterNode>,
    /// Maximum elapsed time from the previous step's qualifying event.
    /// Must be absent on step 0; absent on later steps means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_convert: Option<StepWindow>,
}

impl FunnelStep {
    /// Display name falling back to `step_<n>`.
    pub fn label(&self, index: usize) -> String {
        self.name.clone().unwrap_or_else(|| format!("step_{index}"))
    }
}

/// A flow specification: symmetric expansion around a starting event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRequest {
    /// Event cube the expansion runs over.
    pub cube: String,
    /// Filter selecting the starting events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_filters: Option<FilterNode>,
    /// Dimension naming the event, e.g. `Events.name`.
    pub event_dimension: String,
    pub binding_key: String,
    pub time_dimension: String,
    /// Hops to expand backwards from the starting event.
    #[serde(default)]
    pub steps_before: u32,
    /// Hops to expand forwards.
    #[serde(default)]
    pub steps_after: u32,
}

/// A retention specification: cohorts against subsequent activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionRequest {
    pub cube: String,
    pub binding_key: String,
    pub time_dimension: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort_filters: Option<FilterNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_filters: Option<FilterNode>,
    pub granularity: Granularity,
    /// Number of relative periods to report.
    pub periods: u32,
    #[serde(default)]
    pub retention_type: RetentionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RetentionKind {
    /// Entity counts per exact relative period.
    #[default]
    Classic,
    /// Entity counted at period k when any activity occurs at or after k.
    Rolling,
}

/// Multi-query request for the merge engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiQueryRequest {
    pub queries: Vec<Query>,
    pub strategy: MergeStrategy,
    /// Required by the legacy `funnel` strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_dimension: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeStrategy {
    /// Compile and execute each query independently; parallel series.
    Concat,
    /// Union all measure sets into one query sharing the first query's
    /// dimension cohort and one FROM/JOIN plan.
    Merge,
    /// Legacy alias: chain the queries as funnel steps.
    Funnel,
}

/// The closed set of analysis modes.
///
/// One compiler implementation per variant, selected by a single match at
/// the entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum AnalysisRequest {
    Query(Query),
    Funnel(FunnelRequest),
    Flow(FlowRequest),
    Retention(RetentionRequest),
}
