//! Cube definitions - the user-facing analytic entities.
//!
//! A cube exposes measures and dimensions backed by a physical table or view,
//! plus typed relationships to other cubes. Definitions arrive from the
//! external cube-definition loader as JSON, so everything here derives serde
//! with camelCase field names at the boundary.

use serde::{Deserialize, Serialize};

/// A named analytic entity: measures and dimensions over one table/view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cube {
    pub name: String,
    /// Display title for query builders; falls back to the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Physical table or view backing this cube.
    pub table: String,
    /// Optional physical schema qualifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub measures: Vec<Measure>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Cube {
    /// Look up a measure by its unqualified field name.
    pub fn measure(&self, field: &str) -> Option<&Measure> {
        self.measures.iter().find(|m| m.name == field)
    }

    /// Look up a dimension by its unqualified field name.
    pub fn dimension(&self, field: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == field)
    }

    /// Look up a relationship by target cube name.
    pub fn relationship(&self, target: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.target == target)
    }
}

/// An aggregatable numeric field on a cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    /// Unqualified field name; queries reference it as `Cube.name`.
    pub name: String,
    pub aggregation: Aggregation,
    /// Source column the aggregate is computed over. `count` needs none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default = "ValueType::number")]
    pub value_type: ValueType,
}

/// Aggregation kinds a measure can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Aggregation {
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
    /// Windowed cumulative SUM over the query's time dimension order.
    RunningTotal,
    /// Pass-through expression already aggregated upstream.
    Calculated,
    /// Plain numeric column, selected without aggregation.
    Number,
}

impl Aggregation {
    /// Whether this kind emits an aggregate function call.
    pub fn is_aggregate(&self) -> bool {
        !matches!(self, Aggregation::Calculated | Aggregation::Number)
    }

    /// SQL function name for the aggregate kinds.
    pub fn function_name(&self) -> Option<&'static str> {
        match self {
            Aggregation::Count | Aggregation::CountDistinct => Some("COUNT"),
            Aggregation::Sum | Aggregation::RunningTotal => Some("SUM"),
            Aggregation::Avg => Some("AVG"),
            Aggregation::Min => Some("MIN"),
            Aggregation::Max => Some("MAX"),
            Aggregation::Calculated | Aggregation::Number => None,
        }
    }
}

/// A groupable/filterable attribute on a cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    pub name: String,
    /// Physical column; defaults to the dimension name when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub value_type: ValueType,
}

impl Dimension {
    /// Physical column backing this dimension.
    pub fn source_column(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    /// Time dimensions accept granularity bucketing.
    pub fn supports_granularity(&self) -> bool {
        self.value_type == ValueType::Time
    }
}

/// Value types a dimension or measure can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Time,
}

impl ValueType {
    fn number() -> Self {
        ValueType::Number
    }
}

/// A directed relationship edge declared on a cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// Target cube name.
    pub target: String,
    pub kind: RelationshipKind,
    /// Pairs of (source column, target column) the join equates.
    pub join_columns: Vec<JoinColumn>,
    /// Junction table for `belongsToMany`; None for all other kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub junction: Option<Junction>,
}

/// One (source column, target column) equality in a join condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinColumn {
    pub source_column: String,
    pub target_column: String,
}

impl JoinColumn {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source_column: source.into(),
            target_column: target.into(),
        }
    }
}

/// Junction table declaration for many-to-many relationships.
///
/// `source_columns` join the owning cube to the junction table and
/// `target_columns` join the junction table to the target cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Junction {
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub source_columns: Vec<JoinColumn>,
    pub target_columns: Vec<JoinColumn>,
}

/// Relationship kinds, as declared on the owning cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipKind {
    BelongsTo,
    HasOne,
    HasMany,
    BelongsToMany,
}

impl RelationshipKind {
    /// Wire name of the kind (camelCase), for reason strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::BelongsTo => "belongsTo",
            RelationshipKind::HasOne => "hasOne",
            RelationshipKind::HasMany => "hasMany",
            RelationshipKind::BelongsToMany => "belongsToMany",
        }
    }

    /// Cardinality viewed from the owning (declaring) cube.
    pub fn cardinality(&self) -> Cardinality {
        match self {
            RelationshipKind::BelongsTo => Cardinality::ManyToOne,
            RelationshipKind::HasOne => Cardinality::OneToOne,
            RelationshipKind::HasMany => Cardinality::OneToMany,
            RelationshipKind::BelongsToMany => Cardinality::ManyToMany,
        }
    }
}

/// Join cardinality between two cubes, direction-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// Swap the two sides of the relationship.
    pub fn reverse(self) -> Self {
        match self {
            Cardinality::OneToMany => Cardinality::ManyToOne,
            Cardinality::ManyToOne => Cardinality::OneToMany,
            Cardinality::OneToOne => Cardinality::OneToOne,
            Cardinality::ManyToMany => Cardinality::ManyToMany,
        }
    }

    /// True when a join in this direction can multiply left-side rows.
    pub fn causes_fanout(&self) -> bool {
        matches!(self, Cardinality::OneToMany | Cardinality::ManyToMany)
    }
}
