//! Clinical Quality Language (CQL) evaluation engine
//!
//! A two-layer expression-evaluation engine for healthcare analytics:
//! FHIRPath-style navigation over hierarchical clinical resources and the
//! CQL value model, interval algebra and query pipeline built on top of
//! it. Textual CQL is compiled by an external parser into the typed AST
//! of [`ast`]; this crate evaluates named definitions against clinical
//! resources and aggregates measure reports over a population.
//!
//! The crates compose as:
//!
//! - [`diagnostics`] — source spans and message severities
//! - [`ast`] — the expression tree and library model
//! - [`types`] — the runtime value model and calendar arithmetic
//! - [`eval`] — the evaluator, query pipeline, library resolution,
//!   terminology integration and measure evaluation

pub use lumen_cql_ast as ast;
pub use lumen_cql_diagnostics as diagnostics;
pub use lumen_cql_eval as eval;
pub use lumen_cql_types as types;

pub use lumen_cql_ast::{Expr, ExprKind, Library, Query, Retrieve};
pub use lumen_cql_eval::{
    CqlEvaluator, DataSource, EvalError, EvalResult, EvaluationContext, InMemoryDataSource,
    InMemoryTerminologyProvider, LibraryManager, MeasureEvaluator, MeasureReport,
    TerminologyAdapter, TerminologyProvider,
};
pub use lumen_cql_types::{CqlValue, Truth};
