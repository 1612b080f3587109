//! Error types for schema loading and query compilation.
//!
//! Compilation never partially emits SQL: every failure path returns one of
//! these typed errors before any statement text reaches the caller. Explain
//! errors live in [`crate::explain`] because they are independent of
//! compilation success.

use thiserror::Error;

/// Result type for schema loading.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for query compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors detected while loading cube definitions. Fatal to that schema load.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Malformed cube definitions: {0}")]
    Malformed(String),

    #[error("Duplicate cube definition: '{0}'")]
    DuplicateCube(String),

    #[error("Cube '{cube}' declares a relationship to unknown cube '{target}'")]
    UnknownRelationshipTarget { cube: String, target: String },

    #[error("Relationship from '{cube}' to '{target}' has no join columns")]
    EmptyJoinColumns { cube: String, target: String },

    #[error("belongsToMany relationship from '{cube}' to '{target}' is missing its junction table")]
    MissingJunction { cube: String, target: String },

    #[error("Cube '{cube}' declares duplicate field '{field}'")]
    DuplicateField { cube: String, field: String },

    #[error("Cube '{0}' has no physical table")]
    MissingTable(String),
}

/// Errors raised while compiling a single query.
///
/// Ambiguous primary-cube choices are never errors: the selector resolves
/// them deterministically and reports the ranking in the analysis record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// No join path connects the primary cube to a required cube. Carries
    /// the cube names visited during the search, in dequeue order.
    #[error("No join path from '{from}' to '{to}' (visited: {})", visited.join(" -> "))]
    PathNotFound {
        from: String,
        to: String,
        visited: Vec<String>,
    },

    /// A filter uses an operator the member's value type does not support.
    #[error("Filter operator '{operator}' is not valid for '{member}': {reason}")]
    InvalidFilter {
        member: String,
        operator: String,
        reason: String,
    },

    /// A funnel/flow/retention request is missing a required field, or a
    /// merge request cannot be aligned. Raised before any SQL is generated.
    #[error("Incomplete request: {0}")]
    IncompleteSpec(String),

    /// A measure or dimension reference does not resolve against the schema.
    #[error("Unknown member: '{0}'")]
    UnknownMember(String),

    /// A member reference is not of the expected `Cube.field` form.
    #[error("Malformed member reference: '{0}' (expected 'Cube.field')")]
    MalformedMember(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}
