//! Filter-tree compilation: validation, parameter binding, and the
//! partitioning that routes conditions to WHERE, HAVING, or a
//! pre-aggregation CTE.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{CompileError, CompileResult};
use crate::query::{FilterCondition, FilterNode, FilterOperator};
use crate::schema::{Schema, ValueType};
use crate::sql::expr::{Expr, ExprExt};
use crate::sql::{Dialect, ParamBinder, SqlDialect};

static RELATIVE_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^last\s+(\d+)\s+(second|minute|hour|day|week|month|quarter|year)s?$")
        .expect("relative range pattern is valid")
});

/// Filter conditions routed to their place in the statement.
#[derive(Debug, Default)]
pub(crate) struct PartitionedFilters {
    /// Dimension conditions for the outer WHERE.
    pub outer: Vec<FilterNode>,
    /// Measure conditions for HAVING.
    pub having: Vec<FilterNode>,
    /// Conditions owned entirely by one pre-aggregated cube; they must
    /// apply inside that cube's CTE, before aggregation.
    pub per_cube: BTreeMap<String, Vec<FilterNode>>,
}

/// Split a filter tree at its top-level AND seams.
///
/// Each branch must be attributable to one destination: a branch that mixes
/// measures with dimensions, or a pre-aggregated cube with any other cube,
/// under an OR cannot be routed soundly and aborts compilation.
pub(crate) fn partition_filters(
    schema: &Schema,
    node: &FilterNode,
    preagg_cubes: &HashSet<String>,
) -> CompileResult<PartitionedFilters> {
    let mut parts = PartitionedFilters::default();
    let mut branches = Vec::new();
    flatten_and(node, &mut branches);

    for branch in branches {
        let mut has_measure = false;
        let mut has_dimension = false;
        let mut cubes: HashSet<String> = HashSet::new();

        for member in branch.members() {
            let resolved = schema.resolve(member)?;
            cubes.insert(resolved.cube().name.clone());
            if resolved.is_measure() {
                has_measure = true;
            } else {
                has_dimension = true;
            }
        }

        if has_measure && has_dimension {
            return Err(CompileError::IncompleteSpec(
                "a filter branch cannot mix measures and dimensions; split it with AND".into(),
            ));
        }

        if has_measure {
            parts.having.push(branch.clone());
            continue;
        }

        let preagg_hits: Vec<&String> =
            cubes.iter().filter(|c| preagg_cubes.contains(*c)).collect();
        if preagg_hits.is_empty() {
            parts.outer.push(branch.clone());
        } else if cubes.len() == 1 {
            parts
                .per_cube
                .entry(preagg_hits[0].clone())
                .or_default()
                .push(branch.clone());
        } else {
            return Err(CompileError::IncompleteSpec(format!(
                "a filter branch combines pre-aggregated cube '{}' with other cubes; \
                 split it with AND",
                preagg_hits[0]
            )));
        }
    }

    Ok(parts)
}

fn flatten_and<'a>(node: &'a FilterNode, out: &mut Vec<&'a FilterNode>) {
    match node {
        FilterNode::And { and } => and.iter().for_each(|n| flatten_and(n, out)),
        other => out.push(other),
    }
}

/// Compile a filter tree to a predicate expression.
///
/// `member_expr` maps a qualified member to the column or aggregate
/// expression it denotes in the current scope (outer query or CTE body).
/// Parameters bind in tree order, which matches their textual position.
pub(crate) fn compile_filter(
    schema: &Schema,
    dialect: Dialect,
    node: &FilterNode,
    binder: &mut ParamBinder,
    member_expr: &dyn Fn(&str) -> CompileResult<Expr>,
) -> CompileResult<Expr> {
    match node {
        FilterNode::And { and } => combine(schema, dialect, and, binder, member_expr, true),
        FilterNode::Or { or } => combine(schema, dialect, or, binder, member_expr, false),
        FilterNode::Condition(condition) => {
            compile_condition(schema, dialect, condition, binder, member_expr)
        }
    }
}

fn combine(
    schema: &Schema,
    dialect: Dialect,
    nodes: &[FilterNode],
    binder: &mut ParamBinder,
    member_expr: &dyn Fn(&str) -> CompileResult<Expr>,
    conjunction: bool,
) -> CompileResult<Expr> {
    let mut compiled: Option<Expr> = None;
    for node in nodes {
        let expr = compile_filter(schema, dialect, node, binder, member_expr)?;
        compiled = Some(match compiled {
            None => expr,
            Some(acc) if conjunction => acc.and(expr),
            Some(acc) => acc.or(expr),
        });
    }
    compiled
        .map(|e| e.paren())
        .ok_or_else(|| CompileError::IncompleteSpec("empty filter group".into()))
}

/// Compile one condition, validating the operator against the member's
/// value type.
pub(crate) fn compile_condition(
    schema: &Schema,
    dialect: Dialect,
    condition: &FilterCondition,
    binder: &mut ParamBinder,
    member_expr: &dyn Fn(&str) -> CompileResult<Expr>,
) -> CompileResult<Expr> {
    let resolved = schema.resolve(&condition.member)?;
    let value_type = resolved.value_type();
    let op = condition.operator;

    check_operator(&condition.member, op, value_type)?;
    check_value_count(&condition.member, op, condition.values.len())?;

    let target = member_expr(&condition.member)?;
    let values = &condition.values;

    let expr = match op {
        FilterOperator::Equals | FilterOperator::NotEquals => {
            let negated = op == FilterOperator::NotEquals;
            if values.len() == 1 && values[0].is_null() {
                if negated {
                    target.is_not_null()
                } else {
                    target.is_null()
                }
            } else if values.len() == 1 {
                let p = binder.bind(values[0].clone());
                if negated {
                    target.ne(p)
                } else {
                    target.eq(p)
                }
            } else {
                let params = binder.bind_all(values);
                if negated {
                    target.not_in_list(params)
                } else {
                    target.in_list(params)
                }
            }
        }

        FilterOperator::Gt => target.gt(binder.bind(values[0].clone())),
        FilterOperator::Gte => target.gte(binder.bind(values[0].clone())),
        FilterOperator::Lt => target.lt(binder.bind(values[0].clone())),
        FilterOperator::Lte => target.lte(binder.bind(values[0].clone())),

        FilterOperator::Contains | FilterOperator::NotContains => {
            let pattern = binder.bind(wrap_pattern(&condition.member, op, &values[0], "%", "%")?);
            if op == FilterOperator::NotContains {
                target.not_like(pattern)
            } else {
                target.like(pattern)
            }
        }
        FilterOperator::StartsWith => {
            target.like(binder.bind(wrap_pattern(&condition.member, op, &values[0], "", "%")?))
        }
        FilterOperator::EndsWith => {
            target.like(binder.bind(wrap_pattern(&condition.member, op, &values[0], "%", "")?))
        }

        FilterOperator::In => target.in_list(binder.bind_all(values)),
        FilterOperator::NotIn => target.not_in_list(binder.bind_all(values)),

        FilterOperator::Set => target.is_not_null(),
        FilterOperator::NotSet => target.is_null(),

        FilterOperator::InDateRange | FilterOperator::NotInDateRange => {
            let low = binder.bind(values[0].clone());
            let high = binder.bind(values[1].clone());
            let between = target.between(low, high);
            if op == FilterOperator::NotInDateRange {
                between.not()
            } else {
                between
            }
        }
        FilterOperator::BeforeDate => target.lt(binder.bind(values[0].clone())),
        FilterOperator::AfterDate => target.gt(binder.bind(values[0].clone())),

        FilterOperator::InRelativeRange => {
            let text = values[0].as_str().ok_or_else(|| invalid(
                &condition.member,
                op,
                "expects a string such as 'last 7 days'",
            ))?;
            relative_range_expr(dialect, &condition.member, target, text)?
        }

        FilterOperator::Regex | FilterOperator::NotRegex => {
            let pattern = binder.bind(values[0].clone());
            let rendered = dialect.emit_regex_match(
                &target.to_tokens_for_dialect(dialect),
                &pattern.to_tokens_for_dialect(dialect),
                op == FilterOperator::NotRegex,
            );
            Expr::Raw(rendered.serialize(dialect))
        }

        FilterOperator::ArrayContains | FilterOperator::ArrayNotContains => {
            let value = binder.bind(values[0].clone());
            let rendered = dialect.emit_array_contains(
                &target.to_tokens_for_dialect(dialect),
                &value.to_tokens_for_dialect(dialect),
                op == FilterOperator::ArrayNotContains,
            );
            Expr::Raw(rendered.serialize(dialect))
        }
    };

    Ok(expr)
}

/// Compile a time dimension's date range into a predicate.
pub(crate) fn date_range_condition(
    dialect: Dialect,
    member: &str,
    target: Expr,
    range: &crate::query::DateRange,
    binder: &mut ParamBinder,
) -> CompileResult<Expr> {
    match range {
        crate::query::DateRange::Absolute([from, to]) => {
            let low = binder.bind(Value::String(from.clone()));
            let high = binder.bind(Value::String(to.clone()));
            Ok(target.between(low, high))
        }
        crate::query::DateRange::Relative(text) => {
            relative_range_expr(dialect, member, target, text)
        }
    }
}

/// Compile a relative-range lower bound: `col >= now - INTERVAL n unit`.
pub(crate) fn relative_range_expr(
    dialect: Dialect,
    member: &str,
    target: Expr,
    text: &str,
) -> CompileResult<Expr> {
    let caps = RELATIVE_RANGE_RE.captures(text.trim()).ok_or_else(|| {
        invalid(
            member,
            FilterOperator::InRelativeRange,
            "expects 'last <n> <unit>'",
        )
    })?;
    let count: i64 = caps[1].parse().map_err(|_| {
        invalid(
            member,
            FilterOperator::InRelativeRange,
            "count does not fit in an integer",
        )
    })?;
    let unit = caps[2].to_lowercase();

    let mut bound = dialect.emit_current_timestamp();
    bound.space().push(crate::sql::Token::Minus).space();
    bound.append(&dialect.emit_interval(count, &unit));

    Ok(target.gte(Expr::Raw(bound.serialize(dialect))))
}

fn wrap_pattern(
    member: &str,
    op: FilterOperator,
    value: &Value,
    prefix: &str,
    suffix: &str,
) -> CompileResult<Value> {
    let s = value
        .as_str()
        .ok_or_else(|| invalid(member, op, "pattern operators expect a string value"))?;
    Ok(Value::String(format!("{prefix}{s}{suffix}")))
}

fn check_operator(member: &str, op: FilterOperator, value_type: ValueType) -> CompileResult<()> {
    use FilterOperator::*;
    let ok = match op {
        Equals | NotEquals | In | NotIn | Set | NotSet => true,
        Gt | Gte | Lt | Lte => matches!(value_type, ValueType::Number | ValueType::Time),
        Contains | NotContains | StartsWith | EndsWith | Regex | NotRegex => {
            value_type == ValueType::String
        }
        InDateRange | NotInDateRange | BeforeDate | AfterDate | InRelativeRange => {
            value_type == ValueType::Time
        }
        ArrayContains | ArrayNotContains => {
            matches!(value_type, ValueType::String | ValueType::Number)
        }
    };
    if ok {
        Ok(())
    } else {
        Err(invalid(
            member,
            op,
            &format!("not supported for {value_type:?} members"),
        ))
    }
}

fn check_value_count(member: &str, op: FilterOperator, count: usize) -> CompileResult<()> {
    use FilterOperator::*;
    let expected: Option<(usize, &str)> = match op {
        Set | NotSet => Some((0, "no values")),
        Gt | Gte | Lt | Lte | Contains | NotContains | StartsWith | EndsWith | BeforeDate
        | AfterDate | InRelativeRange | Regex | NotRegex | ArrayContains | ArrayNotContains => {
            Some((1, "exactly one value"))
        }
        InDateRange | NotInDateRange => Some((2, "exactly two values")),
        Equals | NotEquals => {
            if count == 0 {
                return Err(invalid(member, op, "expects at least one value"));
            }
            None
        }
        In | NotIn => None,
    };
    match expected {
        Some((n, label)) if count != n => Err(invalid(member, op, &format!("expects {label}"))),
        _ => Ok(()),
    }
}

fn invalid(member: &str, op: FilterOperator, reason: &str) -> CompileError {
    CompileError::InvalidFilter {
        member: member.to_string(),
        operator: op.as_str().to_string(),
        reason: reason.to_string(),
    }
}
