//! Positional parameter binding.
//!
//! User-supplied filter values never appear in SQL text. The binder
//! allocates a placeholder expression per value and accumulates the values
//! in order, yielding the positional array returned alongside the SQL.

use serde_json::Value;

use super::expr::{param, Expr};

/// Collects parameter values in placeholder order.
#[derive(Debug, Default)]
pub struct ParamBinder {
    values: Vec<Value>,
}

impl ParamBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind one value, returning its placeholder expression.
    pub fn bind(&mut self, value: Value) -> Expr {
        let index = self.values.len();
        self.values.push(value);
        param(index)
    }

    /// Bind a list of values, returning placeholder expressions in order.
    pub fn bind_all(&mut self, values: &[Value]) -> Vec<Expr> {
        values.iter().map(|v| self.bind(v.clone())).collect()
    }

    /// Number of values bound so far.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consume the binder, yielding the positional parameter array.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}
