//! Schema model - the immutable in-memory representation of cubes.
//!
//! A [`Schema`] is loaded once from cube definitions, validated, versioned,
//! and then treated as read-only for the lifetime of every compilation that
//! references it. Reloading builds a fresh snapshot; nothing is mutated in
//! place, so in-flight compilations keep a consistent view.

mod cube;
pub mod graph;

pub use cube::{
    Aggregation, Cardinality, Cube, Dimension, JoinColumn, Junction, Measure, Relationship,
    RelationshipKind, ValueType,
};
pub use graph::{RelEdge, SchemaGraph};

use std::collections::HashMap;

use crate::cache::hash::compute_hash;
use crate::error::{CompileError, CompileResult, SchemaError, SchemaResult};

/// A validated, versioned snapshot of all cube definitions.
///
/// The version string is a content hash, so two loads of identical
/// definitions fingerprint identically for the compiled-SQL cache.
#[derive(Debug, Clone)]
pub struct Schema {
    version: String,
    cubes: HashMap<String, Cube>,
    /// Cube names in declaration order, for deterministic iteration.
    order: Vec<String>,
}

impl Schema {
    /// Validate and load cube definitions into a snapshot.
    pub fn load(cubes: Vec<Cube>) -> SchemaResult<Self> {
        let version = compute_hash(&cubes).unwrap_or_default();

        let mut map: HashMap<String, Cube> = HashMap::new();
        let mut order = Vec::with_capacity(cubes.len());

        for cube in &cubes {
            if cube.table.trim().is_empty() {
                return Err(SchemaError::MissingTable(cube.name.clone()));
            }

            let mut fields: Vec<&str> = Vec::new();
            for m in &cube.measures {
                if fields.contains(&m.name.as_str()) {
                    return Err(SchemaError::DuplicateField {
                        cube: cube.name.clone(),
                        field: m.name.clone(),
                    });
                }
                fields.push(&m.name);
            }
            for d in &cube.dimensions {
                if fields.contains(&d.name.as_str()) {
                    return Err(SchemaError::DuplicateField {
                        cube: cube.name.clone(),
                        field: d.name.clone(),
                    });
                }
                fields.push(&d.name);
            }

            if map.contains_key(&cube.name) {
                return Err(SchemaError::DuplicateCube(cube.name.clone()));
            }
            order.push(cube.name.clone());
            map.insert(cube.name.clone(), cube.clone());
        }

        // Relationship targets must resolve, join columns must be present,
        // and belongsToMany needs its junction table.
        for cube in map.values() {
            for rel in &cube.relationships {
                if !map.contains_key(&rel.target) {
                    return Err(SchemaError::UnknownRelationshipTarget {
                        cube: cube.name.clone(),
                        target: rel.target.clone(),
                    });
                }
                match rel.kind {
                    RelationshipKind::BelongsToMany => {
                        let junction = rel.junction.as_ref().ok_or_else(|| {
                            SchemaError::MissingJunction {
                                cube: cube.name.clone(),
                                target: rel.target.clone(),
                            }
                        })?;
                        if junction.source_columns.is_empty() || junction.target_columns.is_empty()
                        {
                            return Err(SchemaError::EmptyJoinColumns {
                                cube: cube.name.clone(),
                                target: rel.target.clone(),
                            });
                        }
                    }
                    _ => {
                        if rel.join_columns.is_empty() {
                            return Err(SchemaError::EmptyJoinColumns {
                                cube: cube.name.clone(),
                                target: rel.target.clone(),
                            });
                        }
                    }
                }
            }
        }

        Ok(Self {
            version,
            cubes: map,
            order,
        })
    }

    /// Load a schema from the JSON shape the cube-definition loader ships.
    pub fn from_json(json: &str) -> SchemaResult<Self> {
        let cubes: Vec<Cube> =
            serde_json::from_str(json).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        Self::load(cubes)
    }

    /// Content-hash version of this snapshot.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn cube(&self, name: &str) -> Option<&Cube> {
        self.cubes.get(name)
    }

    pub fn has_cube(&self, name: &str) -> bool {
        self.cubes.contains_key(name)
    }

    /// Cubes in declaration order.
    pub fn cubes(&self) -> impl Iterator<Item = &Cube> {
        self.order.iter().filter_map(|n| self.cubes.get(n))
    }

    pub fn cube_count(&self) -> usize {
        self.cubes.len()
    }

    /// Split a qualified `Cube.field` reference.
    pub fn split_member(member: &str) -> CompileResult<(&str, &str)> {
        match member.split_once('.') {
            Some((cube, field)) if !cube.is_empty() && !field.is_empty() => Ok((cube, field)),
            _ => Err(CompileError::MalformedMember(member.to_string())),
        }
    }

    /// Resolve a qualified member reference to its cube and field.
    pub fn resolve(&self, member: &str) -> CompileResult<ResolvedMember<'_>> {
        let (cube_name, field) = Self::split_member(member)?;
        let cube = self
            .cube(cube_name)
            .ok_or_else(|| CompileError::UnknownMember(member.to_string()))?;

        if let Some(measure) = cube.measure(field) {
            return Ok(ResolvedMember::Measure { cube, measure });
        }
        if let Some(dimension) = cube.dimension(field) {
            return Ok(ResolvedMember::Dimension { cube, dimension });
        }
        Err(CompileError::UnknownMember(member.to_string()))
    }

    /// Resolve a member that must be a dimension (binding keys, time
    /// dimensions, event dimensions).
    pub fn resolve_dimension(&self, member: &str) -> CompileResult<(&Cube, &Dimension)> {
        match self.resolve(member)? {
            ResolvedMember::Dimension { cube, dimension } => Ok((cube, dimension)),
            ResolvedMember::Measure { .. } => Err(CompileError::UnknownMember(format!(
                "{member} is a measure, expected a dimension"
            ))),
        }
    }

    /// Resolve a member that must be a measure.
    pub fn resolve_measure(&self, member: &str) -> CompileResult<(&Cube, &Measure)> {
        match self.resolve(member)? {
            ResolvedMember::Measure { cube, measure } => Ok((cube, measure)),
            ResolvedMember::Dimension { .. } => Err(CompileError::UnknownMember(format!(
                "{member} is a dimension, expected a measure"
            ))),
        }
    }
}

/// A qualified member resolved against the schema.
#[derive(Debug, Clone, Copy)]
pub enum ResolvedMember<'a> {
    Measure { cube: &'a Cube, measure: &'a Measure },
    Dimension { cube: &'a Cube, dimension: &'a Dimension },
}

impl<'a> ResolvedMember<'a> {
    pub fn cube(&self) -> &'a Cube {
        match self {
            ResolvedMember::Measure { cube, .. } => cube,
            ResolvedMember::Dimension { cube, .. } => cube,
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            ResolvedMember::Measure { measure, .. } => measure.value_type,
            ResolvedMember::Dimension { dimension, .. } => dimension.value_type,
        }
    }

    pub fn is_measure(&self) -> bool {
        matches!(self, ResolvedMember::Measure { .. })
    }
}
