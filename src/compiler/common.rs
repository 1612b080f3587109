//! Shared SQL-assembly helpers: aliasing conventions and join emission.
//!
//! Aliases are stable functions of schema names so repeated compilations
//! emit byte-identical SQL: cube aliases are snake_case cube names, output
//! columns are `cube__field`, pre-aggregation CTEs are `<cube>_agg`.

use std::collections::HashSet;

use inflector::Inflector;

use crate::error::CompileResult;
use crate::planner::path::find_path;
use crate::planner::{JoinHop, ResolvedJoinPath};
use crate::query::{FilterNode, Granularity};
use crate::schema::graph::SchemaGraph;
use crate::schema::{Cube, JoinColumn, Junction, Schema};
use crate::sql::expr::{table_col, Expr, ExprExt};
use crate::sql::{Dialect, Query, SqlDialect, TableRef};

/// SQL alias for a cube.
pub(crate) fn cube_alias(name: &str) -> String {
    name.to_snake_case()
}

/// Output-column alias for a qualified member: `orders__created_at`.
pub(crate) fn member_alias(member: &str) -> CompileResult<String> {
    let (cube, field) = Schema::split_member(member)?;
    Ok(format!("{}__{}", cube.to_snake_case(), field.to_snake_case()))
}

/// Output-column alias for a time dimension at a granularity.
pub(crate) fn time_member_alias(member: &str, granularity: &str) -> CompileResult<String> {
    Ok(format!("{}_{granularity}", member_alias(member)?))
}

/// Physical table reference for a cube, aliased to its cube alias.
pub(crate) fn table_ref_for(cube: &Cube) -> TableRef {
    TableRef::new(&cube.table)
        .with_schema(cube.schema.as_deref())
        .with_alias(&cube_alias(&cube.name))
}

/// Alias for a junction table.
pub(crate) fn junction_alias(junction: &Junction) -> String {
    junction.table.to_snake_case()
}

/// Equality conjunction for a set of join column pairs.
pub(crate) fn join_condition(left_alias: &str, right_alias: &str, columns: &[JoinColumn]) -> Expr {
    let mut condition: Option<Expr> = None;
    for pair in columns {
        let eq = table_col(left_alias, &pair.source_column)
            .eq(table_col(right_alias, &pair.target_column));
        condition = Some(match condition {
            None => eq,
            Some(acc) => acc.and(eq),
        });
    }
    condition.expect("schema validation guarantees non-empty join columns")
}

/// Append the joins for one hop, expanding belongsToMany hops through
/// their junction table.
///
/// A pre-aggregated target joins its CTE under the CTE's own alias, with
/// the same join columns the raw table would use (the CTE exports its join
/// keys under their original names). When another path continues through
/// that cube, the raw table is joined as well so downstream hops keep
/// their column references.
pub(crate) fn append_hop_joins(
    mut query: Query,
    schema: &Schema,
    hop: &JoinHop,
    seen: &mut HashSet<(String, String)>,
    cte_for: &dyn Fn(&str) -> Option<String>,
    needs_raw_table: bool,
) -> CompileResult<Query> {
    let key = (hop.from.clone(), hop.to.clone());
    if !seen.insert(key) {
        return Ok(query);
    }

    let from_alias = cube_alias(&hop.from);
    let to_cube = schema
        .cube(&hop.to)
        .ok_or_else(|| crate::error::CompileError::UnknownMember(hop.to.clone()))?;

    // (table, alias) pairs to join for this hop's target.
    let mut targets: Vec<(TableRef, String)> = Vec::new();
    match cte_for(&hop.to) {
        Some(cte_name) => {
            targets.push((TableRef::new(&cte_name), cte_name.clone()));
            if needs_raw_table {
                targets.push((table_ref_for(to_cube), cube_alias(&hop.to)));
            }
        }
        None => targets.push((table_ref_for(to_cube), cube_alias(&hop.to))),
    }

    match &hop.junction {
        Some(junction) => {
            let j_alias = junction_alias(junction);
            let junction_table = TableRef::new(&junction.table)
                .with_schema(junction.schema.as_deref())
                .with_alias(&j_alias);

            query = query.join(
                hop.join_type,
                junction_table,
                join_condition(&from_alias, &j_alias, &junction.source_columns),
            );
            for (table, alias) in targets {
                query = query.join(
                    hop.join_type,
                    table,
                    join_condition(&j_alias, &alias, &junction.target_columns),
                );
            }
        }
        None => {
            for (table, alias) in targets {
                query = query.join(
                    hop.join_type,
                    table,
                    join_condition(&from_alias, &alias, &hop.join_columns),
                );
            }
        }
    }

    Ok(query)
}

/// Compile-time date truncation through the dialect.
pub(crate) fn truncate(dialect: Dialect, granularity: Granularity, raw: Expr) -> Expr {
    let tokens = dialect.emit_date_trunc(granularity.as_sql(), &raw.to_tokens_for_dialect(dialect));
    Expr::Raw(tokens.serialize(dialect))
}

/// Resolve join paths for the cubes a filter tree references beyond the
/// anchor cube. Every referenced cube is required, so joins come out INNER.
pub(crate) fn filter_join_paths(
    schema: &Schema,
    graph: &SchemaGraph<'_>,
    anchor: &str,
    filters: Option<&FilterNode>,
) -> CompileResult<Vec<ResolvedJoinPath>> {
    let mut targets: Vec<String> = Vec::new();
    if let Some(filters) = filters {
        for member in filters.members() {
            let cube = schema.resolve(member)?.cube().name.clone();
            if cube != anchor && !targets.contains(&cube) {
                targets.push(cube);
            }
        }
    }
    targets.sort();

    let constrained: HashSet<String> = targets.iter().cloned().collect();
    let mut paths = Vec::new();
    for target in &targets {
        paths.push(find_path(graph, anchor, target, &constrained)?);
    }
    Ok(paths)
}

/// Append every hop of every resolved path, deduplicating hops shared by
/// multiple paths.
pub(crate) fn append_path_joins(
    mut query: Query,
    schema: &Schema,
    paths: &[ResolvedJoinPath],
    cte_for: &dyn Fn(&str) -> Option<String>,
) -> CompileResult<(Query, usize)> {
    // Cubes some path continues through; their raw table must stay joined
    // even when a pre-aggregation CTE replaces them as a measure source.
    let intermediates: HashSet<&str> = paths
        .iter()
        .flat_map(|p| p.hops.iter().map(|h| h.from.as_str()))
        .collect();

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut join_steps = 0;
    for path in paths {
        for hop in &path.hops {
            let before = query.joins.len();
            let needs_raw_table = intermediates.contains(hop.to.as_str());
            query = append_hop_joins(query, schema, hop, &mut seen, cte_for, needs_raw_table)?;
            join_steps += query.joins.len() - before;
        }
    }
    Ok((query, join_steps))
}
