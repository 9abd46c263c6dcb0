//! Evaluation errors
//!
//! Hard failures raise one of the kinds below, annotated with the node's
//! source span when one is available; cross-library failures carry the
//! originating library name. Soft failures (division by zero, comparison
//! at incomparable precision, missing properties) yield null values and
//! never surface here.

use lumen_cql_diagnostics::Span;
use std::fmt;
use thiserror::Error;

/// Result type for evaluation operations
pub type EvalResult<T> = Result<T, EvalError>;

/// An evaluation failure with optional source annotation
#[derive(Debug, Clone)]
pub struct EvalError {
    /// What went wrong
    pub kind: EvalErrorKind,
    /// Source span of the node that raised, when known
    pub span: Option<Span>,
    /// The library being evaluated when the error was raised
    pub library: Option<String>,
}

impl EvalError {
    /// Attach a source span if none is recorded yet
    pub fn with_span(mut self, span: Option<Span>) -> Self {
        if self.span.is_none() {
            self.span = span;
        }
        self
    }

    /// Record the originating library if none is recorded yet
    pub fn in_library(mut self, library: &str) -> Self {
        if self.library.is_none() {
            self.library = Some(library.to_string());
        }
        self
    }

    // --- constructor helpers, mirroring the kinds used most often ---

    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        EvalErrorKind::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
        .into()
    }

    pub fn invalid_operand(operator: impl Into<String>, message: impl Into<String>) -> Self {
        EvalErrorKind::InvalidOperand {
            operator: operator.into(),
            message: message.into(),
        }
        .into()
    }

    pub fn incompatible_units(left: impl Into<String>, right: impl Into<String>) -> Self {
        EvalErrorKind::IncompatibleUnits {
            left: left.into(),
            right: right.into(),
        }
        .into()
    }

    pub fn undefined_expression(name: impl Into<String>) -> Self {
        EvalErrorKind::UndefinedExpression { name: name.into() }.into()
    }

    pub fn undefined_function(name: impl Into<String>) -> Self {
        EvalErrorKind::UndefinedFunction { name: name.into() }.into()
    }

    pub fn undefined_parameter(name: impl Into<String>) -> Self {
        EvalErrorKind::UndefinedParameter { name: name.into() }.into()
    }

    pub fn undefined_alias(name: impl Into<String>) -> Self {
        EvalErrorKind::UndefinedAlias { name: name.into() }.into()
    }

    pub fn undefined_library(name: impl Into<String>) -> Self {
        EvalErrorKind::UndefinedLibrary { name: name.into() }.into()
    }

    pub fn undefined_terminology(name: impl Into<String>) -> Self {
        EvalErrorKind::UndefinedTerminology { name: name.into() }.into()
    }

    pub fn cycle_detected(name: impl Into<String>) -> Self {
        EvalErrorKind::CycleDetected { name: name.into() }.into()
    }

    pub fn overflow(operation: impl Into<String>) -> Self {
        EvalErrorKind::Overflow {
            operation: operation.into(),
        }
        .into()
    }

    pub fn conversion(from: impl Into<String>, to: impl Into<String>) -> Self {
        EvalErrorKind::Conversion {
            from: from.into(),
            to: to.into(),
        }
        .into()
    }

    pub fn cast(from: impl Into<String>, to: impl Into<String>) -> Self {
        EvalErrorKind::Cast {
            from: from.into(),
            to: to.into(),
        }
        .into()
    }

    pub fn retrieve_failed(message: impl Into<String>) -> Self {
        EvalErrorKind::RetrieveFailed {
            message: message.into(),
        }
        .into()
    }

    pub fn terminology(message: impl Into<String>) -> Self {
        EvalErrorKind::Terminology {
            message: message.into(),
        }
        .into()
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EvalErrorKind::Internal {
            message: message.into(),
        }
        .into()
    }
}

impl From<EvalErrorKind> for EvalError {
    fn from(kind: EvalErrorKind) -> Self {
        Self {
            kind,
            span: None,
            library: None,
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(library) = &self.library {
            write!(f, "[{library}] ")?;
        }
        write!(f, "{}", self.kind)?;
        if let Some(span) = &self.span {
            write!(f, " (at {span})")?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

/// The failure taxonomy
#[derive(Debug, Error, Clone)]
pub enum EvalErrorKind {
    /// Operand type incompatible with an operator or function
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Operand value invalid for an operator
    #[error("invalid operand for {operator}: {message}")]
    InvalidOperand { operator: String, message: String },

    /// Quantity comparison or arithmetic across non-convertible units
    #[error("incompatible units: '{left}' and '{right}'")]
    IncompatibleUnits { left: String, right: String },

    /// Named expression not found
    #[error("undefined expression: {name}")]
    UndefinedExpression { name: String },

    /// Function not found by name and arity
    #[error("undefined function: {name}")]
    UndefinedFunction { name: String },

    /// Parameter not bound and without a default
    #[error("undefined parameter: {name}")]
    UndefinedParameter { name: String },

    /// Query alias, let binding or operand not in scope
    #[error("undefined alias: {name}")]
    UndefinedAlias { name: String },

    /// Library not resolvable
    #[error("undefined library: {name}")]
    UndefinedLibrary { name: String },

    /// Code, codesystem, valueset or concept definition not found
    #[error("undefined terminology definition: {name}")]
    UndefinedTerminology { name: String },

    /// A definition transitively referenced itself
    #[error("cycle detected while evaluating definition: {name}")]
    CycleDetected { name: String },

    /// The include graph contains a cycle
    #[error("cyclic library include: {name}")]
    LibraryCycle { name: String },

    /// Evaluator recursion limit exceeded
    #[error("maximum recursion depth exceeded")]
    RecursionLimit,

    /// Arithmetic overflow
    #[error("arithmetic overflow in {operation}")]
    Overflow { operation: String },

    /// SingletonFrom applied to a list with more than one element
    #[error("singleton required, list has {count} elements")]
    SingletonRequired { count: usize },

    /// Invalid regular expression pattern
    #[error("invalid regex pattern: {pattern}")]
    InvalidRegex { pattern: String },

    /// Date/time component out of range
    #[error("invalid {component}: {value}")]
    InvalidDateTimeComponent { component: String, value: String },

    /// Value not convertible to the target type
    #[error("cannot convert {from} to {to}")]
    Conversion { from: String, to: String },

    /// Strict cast failure
    #[error("cannot cast {from} to {to}")]
    Cast { from: String, to: String },

    /// DataSource retrieve failed
    #[error("retrieve failed: {message}")]
    RetrieveFailed { message: String },

    /// Terminology provider failed or unavailable
    #[error("terminology error: {message}")]
    Terminology { message: String },

    /// A Message operator raised at error severity
    #[error("message [{code}]: {message}")]
    MessageRaised { code: String, message: String },

    /// Internal invariant violation
    #[error("internal evaluation error: {message}")]
    Internal { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_annotation() {
        let err = EvalError::undefined_expression("Foo")
            .with_span(Some(Span::new(10, 13)))
            .in_library("Common");
        let rendered = err.to_string();
        assert!(rendered.contains("[Common]"));
        assert!(rendered.contains("Foo"));
        assert!(rendered.contains("10..13"));
    }

    #[test]
    fn test_annotation_does_not_overwrite() {
        let err = EvalError::undefined_expression("Foo")
            .in_library("Inner")
            .in_library("Outer");
        assert_eq!(err.library.as_deref(), Some("Inner"));
    }
}
