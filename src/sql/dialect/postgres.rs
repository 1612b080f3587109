//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features used here:
//! - ANSI identifier quoting (`"`)
//! - Native boolean type (true/false)
//! - `$n` parameter placeholders
//! - Native DATE_TRUNC
//! - `~` regex operator
//! - `= ANY(array)` containment

use super::helpers;
use super::SqlDialect;
use crate::sql::token::{Token, TokenStream};

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn format_placeholder(&self, index: usize) -> String {
        format!("${}", index + 1)
    }

    // Uses default emit_date_trunc (native DATE_TRUNC) and emit_interval.

    fn emit_date_diff(&self, grain: &str, from: &TokenStream, to: &TokenStream) -> TokenStream {
        let mut ts = TokenStream::new();
        match grain {
            // Sub-month grains: epoch difference divided by the unit width.
            "second" | "minute" | "hour" | "day" | "week" => {
                let divisor: i64 = match grain {
                    "second" => 1,
                    "minute" => 60,
                    "hour" => 3_600,
                    "day" => 86_400,
                    _ => 604_800,
                };
                ts.push(Token::FunctionName("FLOOR".into()));
                ts.lparen();
                ts.push(Token::Raw("EXTRACT(EPOCH FROM ".into()));
                ts.lparen();
                ts.append(to);
                ts.space().push(Token::Minus).space();
                ts.append(from);
                ts.rparen();
                ts.rparen();
                ts.space().push(Token::Div).space();
                ts.push(Token::LitInt(divisor));
                ts.rparen();
            }
            // Calendar grains: year/month extraction arithmetic. Inputs are
            // pre-truncated, so the result is exact.
            "month" | "quarter" => {
                let mut months = TokenStream::new();
                months.lparen();
                months.push(Token::Raw("EXTRACT(YEAR FROM ".into()));
                months.append(to);
                months.rparen();
                months.space().push(Token::Minus).space();
                months.push(Token::Raw("EXTRACT(YEAR FROM ".into()));
                months.append(from);
                months.rparen();
                months.rparen();
                months.space().push(Token::Mul).space();
                months.push(Token::LitInt(12));
                months.space().push(Token::Plus).space();
                months.lparen();
                months.push(Token::Raw("EXTRACT(MONTH FROM ".into()));
                months.append(to);
                months.rparen();
                months.space().push(Token::Minus).space();
                months.push(Token::Raw("EXTRACT(MONTH FROM ".into()));
                months.append(from);
                months.rparen();
                months.rparen();

                if grain == "month" {
                    ts.lparen();
                    ts.append(&months);
                    ts.rparen();
                } else {
                    ts.push(Token::FunctionName("FLOOR".into()));
                    ts.lparen();
                    ts.lparen();
                    ts.append(&months);
                    ts.rparen();
                    ts.space().push(Token::Div).space();
                    ts.push(Token::LitInt(3));
                    ts.rparen();
                }
            }
            _ => {
                // year
                ts.lparen();
                ts.push(Token::Raw("EXTRACT(YEAR FROM ".into()));
                ts.append(to);
                ts.rparen();
                ts.space().push(Token::Minus).space();
                ts.push(Token::Raw("EXTRACT(YEAR FROM ".into()));
                ts.append(from);
                ts.rparen();
                ts.rparen();
            }
        }
        ts
    }

    fn emit_regex_match(
        &self,
        expr: &TokenStream,
        pattern: &TokenStream,
        negated: bool,
    ) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.append(expr);
        ts.space();
        ts.push(Token::Raw(if negated { "!~" } else { "~" }.into()));
        ts.space();
        ts.append(pattern);
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
        ts.lparen();
        ts.append(value);
        ts.space().push(Token::Eq).space();
        ts.push(Token::Raw("ANY".into()));
        ts.lparen();
        ts.append(array);
        ts.rparen();
        ts.rparen();
        ts
    }
}
