//! Abstract syntax tree for CQL expressions and libraries
//!
//! This crate defines the typed expression tree the evaluator consumes and
//! the library model (definitions, functions, terminology declarations,
//! parameters, includes). A parser front-end produces these nodes; the
//! evaluator never re-parses source text.

mod expression;
mod library;
mod literal;
mod operator;
mod query;
mod types;

pub use expression::*;
pub use library::*;
pub use literal::*;
pub use operator::*;
pub use query::*;
pub use types::*;

pub use lumen_cql_diagnostics::{Span, Spanned};

/// Type alias for boxed expressions
pub type BoxExpr = Box<Expr>;

/// Type alias for optional boxed expressions
pub type OptBoxExpr = Option<Box<Expr>>;

/// Access modifier for definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessModifier {
    /// Public access (default)
    #[default]
    Public,
    /// Private access
    Private,
}
