//! CQL expression evaluation
//!
//! A tree-walking interpreter over the typed AST: the value model's
//! operators, three-valued logic, interval algebra, the query pipeline
//! (multi-source joins, with/without semi-joins, let, where, aggregate,
//! sort), library resolution with memoization and cycle detection,
//! clinical data retrieves, terminology integration, and measure
//! evaluation over a population.
//!
//! # Example
//!
//! ```
//! use lumen_cql_ast::{Expr, ExpressionDefinition, Library};
//! use lumen_cql_eval::{CqlEvaluator, EvaluationContext};
//! use lumen_cql_types::CqlValue;
//! use std::sync::Arc;
//!
//! let mut library = Library::new("Demo");
//! library.add_definition(ExpressionDefinition::new(
//!     "Three",
//!     Expr::binary(
//!         lumen_cql_ast::BinaryOp::Add,
//!         Expr::integer(1),
//!         Expr::integer(2),
//!     ),
//! ));
//!
//! let evaluator = CqlEvaluator::new();
//! let mut ctx = EvaluationContext::new().with_library(Arc::new(library));
//! let value = evaluator.evaluate_definition("Three", &mut ctx).unwrap();
//! assert_eq!(value, CqlValue::integer(3));
//! ```
//!
//! # Three-valued logic
//!
//! Operations return true, false, or null; null reads as "unknown".
//! Comparisons of partial-precision temporals below their common prefix
//! are null, `and`/`or` follow the Kleene tables, and boolean coercion to
//! `bool` happens only at well-defined boundaries (where-clause filters,
//! population membership).

pub mod context;
pub mod datasource;
pub mod engine;
pub mod error;
pub mod library;
pub mod measure;
pub mod navigation;
pub mod operators;
pub mod plugins;
pub mod query;
pub mod registry;
pub mod terminology;
pub mod units;

pub use context::{CollectingMessageSink, EvaluationContext, LogMessageSink, MessageSink};
pub use datasource::{
    DataSource, EmptyDataSource, InMemoryDataSource, RetrieveParameters, default_code_path,
};
pub use engine::CqlEvaluator;
pub use error::{EvalError, EvalErrorKind, EvalResult};
pub use library::{
    CompileFn, CompositeLibraryResolver, FileLibraryResolver, InMemoryLibraryResolver,
    LibraryManager, LibraryResolver,
};
pub use measure::{
    GroupResult, MeasureEvaluator, MeasureGroup, MeasurePopulation, MeasureReport,
    MeasureScoring, PatientResult, PopulationCount, PopulationType, StratifierResult,
};
pub use plugins::{PluginFn, PluginRegistry};
pub use query::extract_codes;
pub use registry::{BuiltinFn, FunctionRegistry};
pub use terminology::{
    InMemoryTerminologyProvider, Subsumption, TerminologyAdapter, TerminologyProvider,
};
pub use units::{StandardUnitConverter, UnitConverter};

// Commonly used operator helpers
pub use operators::comparison::{cql_compare, cql_equal, cql_equivalent};
pub use operators::logical::value_to_truth;
pub use terminology::{code_in_codes, codes_equivalent, concept_in_codes};
