//! MySQL SQL dialect.
//!
//! MySQL differences handled here:
//! - Backtick identifier quoting
//! - Numeric booleans (1/0)
//! - `?` placeholders
//! - No DATE_TRUNC: emulated with DATE_FORMAT / date arithmetic
//! - TIMESTAMPDIFF for date differences
//! - REGEXP operator, JSON_CONTAINS for array containment
//! - `||` is logical OR, so CONCAT() is used for string concatenation

use super::helpers;
use super::SqlDialect;
use crate::sql::token::{Token, TokenStream};

/// MySQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn supports_concat_operator(&self) -> bool {
        false
    }

    fn supports_nulls_ordering(&self) -> bool {
        false
    }

    fn emit_date_trunc(&self, grain: &str, inner: &TokenStream) -> TokenStream {
        let mut ts = TokenStream::new();
        match grain {
            "second" | "minute" | "hour" => {
                let fmt = match grain {
                    "second" => "%Y-%m-%d %H:%i:%s",
                    "minute" => "%Y-%m-%d %H:%i:00",
                    _ => "%Y-%m-%d %H:00:00",
                };
                ts.push(Token::FunctionName("DATE_FORMAT".into()));
                ts.lparen();
                ts.append(inner);
                ts.comma().space();
                ts.push(Token::LitString(fmt.into()));
                ts.rparen();
            }
            "day" => {
                ts.push(Token::FunctionName("DATE".into()));
                ts.lparen();
                ts.append(inner);
                ts.rparen();
            }
            "week" => {
                // Monday-start weeks, matching DATE_TRUNC('week', ...)
                ts.push(Token::FunctionName("DATE_SUB".into()));
                ts.lparen();
                ts.push(Token::FunctionName("DATE".into()));
                ts.lparen();
                ts.append(inner);
                ts.rparen();
                ts.comma().space();
                ts.push(Token::Raw("INTERVAL WEEKDAY(".into()));
                ts.append(inner);
                ts.push(Token::Raw(") DAY".into()));
                ts.rparen();
            }
            "month" => {
                ts.push(Token::FunctionName("DATE_FORMAT".into()));
                ts.lparen();
                ts.append(inner);
                ts.comma().space();
                ts.push(Token::LitString("%Y-%m-01".into()));
                ts.rparen();
            }
            "quarter" => {
                ts.push(Token::FunctionName("MAKEDATE".into()));
                ts.lparen();
                ts.push(Token::Raw("YEAR(".into()));
                ts.append(inner);
                ts.rparen();
                ts.comma().space();
                ts.push(Token::LitInt(1));
                ts.rparen();
                ts.space().push(Token::Plus).space();
                ts.push(Token::Raw("INTERVAL (QUARTER(".into()));
                ts.append(inner);
                ts.push(Token::Raw(") - 1) QUARTER".into()));
            }
            _ => {
                // year
                ts.push(Token::FunctionName("DATE_FORMAT".into()));
                ts.lparen();
                ts.append(inner);
                ts.comma().space();
                ts.push(Token::LitString("%Y-01-01".into()));
                ts.rparen();
            }
        }
        ts
    }

    fn emit_interval(&self, count: i64, unit: &str) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Raw(format!(
            "INTERVAL {count} {}",
            unit.to_uppercase()
        )));
        ts
    }

    fn emit_date_diff(&self, grain: &str, from: &TokenStream, to: &TokenStream) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("TIMESTAMPDIFF".into()));
        ts.lparen();
        ts.push(Token::Raw(grain.to_uppercase()));
        ts.comma().space();
        ts.append(from);
        ts.comma().space();
        ts.append(to);
        ts.rparen();
        ts
    }

    fn emit_current_timestamp(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Raw("NOW()".into()));
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
        if negated {
            ts.push(Token::Not).space();
        }
        ts.push(Token::Raw("REGEXP".into()));
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
        ts.push(Token::FunctionName("JSON_CONTAINS".into()));
        ts.lparen();
        ts.append(array);
        ts.comma().space();
        ts.push(Token::FunctionName("JSON_QUOTE".into()));
        ts.lparen();
        ts.append(value);
        ts.rparen();
        ts.rparen();
        ts
    }
}
