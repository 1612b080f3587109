//! Filter trees and the UI boundary transforms.
//!
//! The server wire shape nests `{"and": [...]}` / `{"or": [...]}` around
//! simple `{member, operator, values}` conditions. Query-builder UIs work
//! with an explicitly tagged shape instead; [`filters_from_server`] and
//! [`filters_for_server`] convert between the two and must round-trip
//! exactly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A filter tree node in the server wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterNode {
    And { and: Vec<FilterNode> },
    Or { or: Vec<FilterNode> },
    Condition(FilterCondition),
}

impl FilterNode {
    /// Every member referenced anywhere in the tree.
    pub fn members(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_members(&mut out);
        out
    }

    fn collect_members<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FilterNode::And { and } => and.iter().for_each(|n| n.collect_members(out)),
            FilterNode::Or { or } => or.iter().for_each(|n| n.collect_members(out)),
            FilterNode::Condition(c) => out.push(&c.member),
        }
    }
}

/// A simple filter condition on one member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCondition {
    pub member: String,
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
}

/// The full filter-operator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    /// IS NOT NULL
    Set,
    /// IS NULL
    NotSet,
    InDateRange,
    NotInDateRange,
    BeforeDate,
    AfterDate,
    /// Relative range such as `last 7 days`; single string value.
    InRelativeRange,
    Regex,
    NotRegex,
    ArrayContains,
    ArrayNotContains,
}

impl FilterOperator {
    /// Wire name of the operator (camelCase), for error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "notEquals",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Contains => "contains",
            FilterOperator::NotContains => "notContains",
            FilterOperator::StartsWith => "startsWith",
            FilterOperator::EndsWith => "endsWith",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "notIn",
            FilterOperator::Set => "set",
            FilterOperator::NotSet => "notSet",
            FilterOperator::InDateRange => "inDateRange",
            FilterOperator::NotInDateRange => "notInDateRange",
            FilterOperator::BeforeDate => "beforeDate",
            FilterOperator::AfterDate => "afterDate",
            FilterOperator::InRelativeRange => "inRelativeRange",
            FilterOperator::Regex => "regex",
            FilterOperator::NotRegex => "notRegex",
            FilterOperator::ArrayContains => "arrayContains",
            FilterOperator::ArrayNotContains => "arrayNotContains",
        }
    }
}

/// The tagged filter shape used by query-builder UIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UiFilter {
    And {
        filters: Vec<UiFilter>,
    },
    Or {
        filters: Vec<UiFilter>,
    },
    Condition {
        member: String,
        operator: FilterOperator,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        values: Vec<Value>,
    },
}

/// Convert a server filter tree into the UI shape.
pub fn filters_from_server(node: &FilterNode) -> UiFilter {
    match node {
        FilterNode::And { and } => UiFilter::And {
            filters: and.iter().map(filters_from_server).collect(),
        },
        FilterNode::Or { or } => UiFilter::Or {
            filters: or.iter().map(filters_from_server).collect(),
        },
        FilterNode::Condition(c) => UiFilter::Condition {
            member: c.member.clone(),
            operator: c.operator,
            values: c.values.clone(),
        },
    }
}

/// Convert a UI filter tree back into the server wire shape.
///
/// Exact inverse of [`filters_from_server`]:
/// `filters_for_server(&filters_from_server(f)) == f` for every tree `f`.
pub fn filters_for_server(ui: &UiFilter) -> FilterNode {
    match ui {
        UiFilter::And { filters } => FilterNode::And {
            and: filters.iter().map(filters_for_server).collect(),
        },
        UiFilter::Or { filters } => FilterNode::Or {
            or: filters.iter().map(filters_for_server).collect(),
        },
        UiFilter::Condition {
            member,
            operator,
            values,
        } => FilterNode::Condition(FilterCondition {
            member: member.clone(),
            operator: *operator,
            values: values.clone(),
        }),
    }
}
