//! SQL assembly: tokens, expressions, query builder, dialects, parameters.
//!
//! The compiler layers sit on top of this module. Everything here is
//! dialect-agnostic until serialization time; engine differences live
//! behind the [`dialect::SqlDialect`] trait.

pub mod dialect;
pub mod expr;
pub mod params;
pub mod query;
pub mod token;

pub use dialect::{Dialect, SqlDialect};
pub use expr::{Expr, ExprExt, WindowExt};
pub use params::ParamBinder;
pub use query::{Cte, Join, JoinType, OrderByExpr, Query, SelectExpr, TableRef, Union};
pub use token::{Token, TokenStream};
