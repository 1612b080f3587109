//! SQL Dialect definitions and formatting rules.
//!
//! A trait-based abstraction over the syntax differences between target
//! engines: identifier quoting, parameter placeholders, boolean literals,
//! date truncation/difference arithmetic, regex matching, and array
//! containment. The compiler emits dialect-agnostic tokens and defers every
//! engine-specific decision to an implementation of [`SqlDialect`].

mod duckdb;
pub mod helpers;
mod mysql;
mod postgres;

pub use duckdb::DuckDb;
pub use mysql::MySql;
pub use postgres::Postgres;

use serde::{Deserialize, Serialize};

use super::token::{Token, TokenStream};

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// Default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging and EXPLAIN summaries.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier / Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal. All supported dialects use single quotes
    /// with `''` for escaping.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str;

    // =========================================================================
    // Parameters
    // =========================================================================

    /// Render a positional placeholder for the 0-based parameter index.
    ///
    /// - Postgres: `$1`, `$2`, ...
    /// - MySQL / DuckDB: `?`
    fn format_placeholder(&self, index: usize) -> String {
        let _ = index;
        "?".into()
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Emit LIMIT/OFFSET. All supported dialects share the ANSI form.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        let mut ts = TokenStream::new();

        if let Some(lim) = limit {
            ts.push(Token::Limit)
                .space()
                .push(Token::LitInt(lim as i64));
        }

        if let Some(off) = offset {
            if limit.is_some() {
                ts.space();
            }
            ts.push(Token::Offset)
                .space()
                .push(Token::LitInt(off as i64));
        }

        ts
    }

    // =========================================================================
    // Operators
    // =========================================================================

    /// String concatenation operator.
    fn concat_operator(&self) -> &'static str {
        "||"
    }

    /// Whether this dialect supports the `||` concat operator.
    /// MySQL uses `||` as logical OR by default.
    fn supports_concat_operator(&self) -> bool {
        true
    }

    /// Whether this dialect supports NULLS FIRST/LAST in ORDER BY.
    fn supports_nulls_ordering(&self) -> bool {
        true
    }

    // =========================================================================
    // Date / Time Arithmetic
    // =========================================================================

    /// Truncate a timestamp expression to a granularity.
    ///
    /// `grain` is a validated lowercase keyword (`second` ... `year`),
    /// never user input.
    fn emit_date_trunc(&self, grain: &str, inner: &TokenStream) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("DATE_TRUNC".into()));
        ts.lparen();
        ts.push(Token::LitString(grain.into()));
        ts.comma().space();
        ts.append(inner);
        ts.rparen();
        ts
    }

    /// Emit an interval of `count` units. Both operands come from validated
    /// durations, so the raw fragment is injection-safe.
    fn emit_interval(&self, count: i64, unit: &str) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Raw(format!("INTERVAL '{count} {unit}'")));
        ts
    }

    /// Whole-unit difference `to - from` at a granularity. Inputs are
    /// expected to be pre-truncated to that granularity.
    fn emit_date_diff(&self, grain: &str, from: &TokenStream, to: &TokenStream) -> TokenStream;

    /// Current timestamp expression.
    fn emit_current_timestamp(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Raw("CURRENT_TIMESTAMP".into()));
        ts
    }

    // =========================================================================
    // Pattern / Containment Predicates
    // =========================================================================

    /// Regular-expression match predicate.
    fn emit_regex_match(
        &self,
        expr: &TokenStream,
        pattern: &TokenStream,
        negated: bool,
    ) -> TokenStream;

    /// Array-containment predicate: does `array` contain `value`?
    fn emit_array_contains(
        &self,
        array: &TokenStream,
        value: &TokenStream,
        negated: bool,
    ) -> TokenStream;

    // =========================================================================
    // Function Remapping
    // =========================================================================

    /// Remap a function name for this dialect. Matched case-insensitively;
    /// `None` keeps the original.
    fn remap_function(&self, name: &str) -> Option<&'static str> {
        let _ = name;
        None
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    MySql,
    DuckDb,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Postgres => &Postgres,
            Dialect::MySql => &MySql,
            Dialect::DuckDb => &DuckDb,
        }
    }
}

// Implement SqlDialect for the enum by delegating to concrete types.
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn format_placeholder(&self, index: usize) -> String {
        self.dialect().format_placeholder(index)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn concat_operator(&self) -> &'static str {
        self.dialect().concat_operator()
    }

    fn supports_concat_operator(&self) -> bool {
        self.dialect().supports_concat_operator()
    }

    fn supports_nulls_ordering(&self) -> bool {
        self.dialect().supports_nulls_ordering()
    }

    fn emit_date_trunc(&self, grain: &str, inner: &TokenStream) -> TokenStream {
        self.dialect().emit_date_trunc(grain, inner)
    }

    fn emit_interval(&self, count: i64, unit: &str) -> TokenStream {
        self.dialect().emit_interval(count, unit)
    }

    fn emit_date_diff(&self, grain: &str, from: &TokenStream, to: &TokenStream) -> TokenStream {
        self.dialect().emit_date_diff(grain, from, to)
    }

    fn emit_current_timestamp(&self) -> TokenStream {
        self.dialect().emit_current_timestamp()
    }

    fn emit_regex_match(
        &self,
        expr: &TokenStream,
        pattern: &TokenStream,
        negated: bool,
    ) -> TokenStream {
        self.dialect().emit_regex_match(expr, pattern, negated)
    }

    fn emit_array_contains(
        &self,
        array: &TokenStream,
        value: &TokenStream,
        negated: bool,
    ) -> TokenStream {
        self.dialect().emit_array_contains(array, value, negated)
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        self.dialect().remap_function(name)
    }
}
