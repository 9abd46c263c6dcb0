//! Diagnostic primitives for the CQL engine
//!
//! This crate provides source-location tracking shared by the AST and the
//! evaluator, plus the severity levels used by runtime diagnostics.

mod severity;
mod span;

pub use severity::*;
pub use span::*;
