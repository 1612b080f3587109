//! DuckDB SQL dialect.
//!
//! DuckDB tracks PostgreSQL closely: ANSI quoting, native booleans and
//! DATE_TRUNC. It differs in placeholders (`?`), a native DATE_DIFF, and
//! list functions for containment.

use super::helpers;
use super::SqlDialect;
use crate::sql::token::{Token, TokenStream};

/// DuckDB SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    // Uses default `?` placeholders, DATE_TRUNC, and interval emission.

    fn emit_date_diff(&self, grain: &str, from: &TokenStream, to: &TokenStream) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("DATE_DIFF".into()));
        ts.lparen();
        ts.push(Token::LitString(grain.into()));
        ts.comma().space();
        ts.append(from);
        ts.comma().space();
        ts.append(to);
        ts.rparen();
        ts
    }

    fn emit_regex_match(
        &self,
        expr: &TokenStream,
        pattern: &TokenStream,
        negated: bool,
    ) -> TokenStream {
        let mut ts = TokenStream::new();
        if negated {
            ts.push(Token::Not).space();
        }
        ts.push(Token::FunctionName("REGEXP_MATCHES".into()));
        ts.lparen();
        ts.append(expr);
        ts.comma().space();
        ts.append(pattern);
        ts.rparen();
        ts
    }

    fn emit_array_contains(
        &self,
        array: &TokenStream,
        value: &TokenStream,
        negated: bool,
    ) -> TokenStream {
        let mut ts = TokenStream::new();
        if negated {
            ts.push(Token::Not).space();
        }
        ts.push(Token::FunctionName("LIST_CONTAINS".into()));
        ts.lparen();
        ts.append(array);
        ts.comma().space();
        ts.append(value);
        ts.rparen();
        ts
    }
}
