//! Expression tree nodes
//!
//! Every node the evaluator recognizes lives in [`ExprKind`]. An [`Expr`]
//! pairs a node with its optional source span so runtime errors can point
//! back at the offending text.

use crate::{
    BinaryOp, BoxExpr, ConversionTarget, DateLiteral, DateTimeLiteral, Literal, OptBoxExpr,
    QuantityLiteral, Query, RatioLiteral, RelationOp, Retrieve, TemporalPrecision, TimeLiteral,
    TypeSpecifier, UnaryOp,
};
use lumen_cql_diagnostics::Span;
use rust_decimal::Decimal;

/// An expression node with an optional source locator
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// The node kind
    pub kind: ExprKind,
    /// Source span, when the parser provided one
    pub span: Option<Span>,
}

impl Expr {
    /// Create an expression without span information
    pub fn new(kind: ExprKind) -> Self {
        Self { kind, span: None }
    }

    /// Attach a source span
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Box this expression
    pub fn boxed(self) -> BoxExpr {
        Box::new(self)
    }

    // --- literal constructors, used heavily by tests and AST builders ---

    pub fn null() -> Self {
        Self::new(ExprKind::Null)
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(ExprKind::Literal(Literal::Boolean(value)))
    }

    pub fn integer(value: i64) -> Self {
        Self::new(ExprKind::Literal(Literal::Integer(value)))
    }

    pub fn decimal(value: Decimal) -> Self {
        Self::new(ExprKind::Literal(Literal::Decimal(value)))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ExprKind::Literal(Literal::String(value.into())))
    }

    pub fn date(literal: DateLiteral) -> Self {
        Self::new(ExprKind::Literal(Literal::Date(literal)))
    }

    pub fn datetime(literal: DateTimeLiteral) -> Self {
        Self::new(ExprKind::Literal(Literal::DateTime(literal)))
    }

    pub fn time(literal: TimeLiteral) -> Self {
        Self::new(ExprKind::Literal(Literal::Time(literal)))
    }

    pub fn quantity(value: Decimal, unit: impl Into<String>) -> Self {
        Self::new(ExprKind::Quantity(QuantityLiteral::new(value).with_unit(unit)))
    }

    // --- structural constructors ---

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::Binary(BinaryExpr {
            op,
            left: left.boxed(),
            right: right.boxed(),
        }))
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Self::new(ExprKind::Unary(UnaryExpr {
            op,
            operand: operand.boxed(),
        }))
    }

    pub fn relation(op: RelationOp, left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::Relation(RelationExpr {
            op,
            left: left.boxed(),
            right: right.boxed(),
            precision: None,
        }))
    }

    pub fn relation_at(
        op: RelationOp,
        left: Expr,
        right: Expr,
        precision: TemporalPrecision,
    ) -> Self {
        Self::new(ExprKind::Relation(RelationExpr {
            op,
            left: left.boxed(),
            right: right.boxed(),
            precision: Some(precision),
        }))
    }

    pub fn list(elements: Vec<Expr>) -> Self {
        Self::new(ExprKind::List(ListSelector { elements }))
    }

    pub fn interval(low: Expr, low_closed: bool, high: Expr, high_closed: bool) -> Self {
        Self::new(ExprKind::Interval(IntervalSelector {
            low: low.boxed(),
            high: high.boxed(),
            low_closed,
            high_closed,
        }))
    }

    pub fn if_then_else(condition: Expr, then: Expr, else_: Expr) -> Self {
        Self::new(ExprKind::If(IfExpr {
            condition: condition.boxed(),
            then: then.boxed(),
            else_: else_.boxed(),
        }))
    }

    // --- reference constructors ---

    pub fn alias_ref(name: impl Into<String>) -> Self {
        Self::new(ExprKind::AliasRef(NameRef { name: name.into() }))
    }

    pub fn expression_ref(name: impl Into<String>) -> Self {
        Self::new(ExprKind::ExpressionRef(Ref {
            name: name.into(),
            library: None,
        }))
    }

    pub fn library_expression_ref(library: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ExprKind::ExpressionRef(Ref {
            name: name.into(),
            library: Some(library.into()),
        }))
    }

    pub fn parameter_ref(name: impl Into<String>) -> Self {
        Self::new(ExprKind::ParameterRef(Ref {
            name: name.into(),
            library: None,
        }))
    }

    pub fn identifier_ref(name: impl Into<String>) -> Self {
        Self::new(ExprKind::IdentifierRef(NameRef { name: name.into() }))
    }

    pub fn property(source: Expr, path: impl Into<String>) -> Self {
        Self::new(ExprKind::Property(PropertyExpr {
            source: Some(source.boxed()),
            scope: None,
            path: path.into(),
        }))
    }

    pub fn scoped_property(scope: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(ExprKind::Property(PropertyExpr {
            source: None,
            scope: Some(scope.into()),
            path: path.into(),
        }))
    }

    pub fn function(name: impl Into<String>, operands: Vec<Expr>) -> Self {
        Self::new(ExprKind::FunctionRef(FunctionRefExpr {
            name: name.into(),
            library: None,
            operands,
        }))
    }

    pub fn library_function(
        library: impl Into<String>,
        name: impl Into<String>,
        operands: Vec<Expr>,
    ) -> Self {
        Self::new(ExprKind::FunctionRef(FunctionRefExpr {
            name: name.into(),
            library: Some(library.into()),
            operands,
        }))
    }

    pub fn retrieve(retrieve: Retrieve) -> Self {
        Self::new(ExprKind::Retrieve(Box::new(retrieve)))
    }

    pub fn query(query: Query) -> Self {
        Self::new(ExprKind::Query(Box::new(query)))
    }
}

/// All expression node kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    // === Selectors ===
    /// Null literal
    Null,
    /// Scalar literal
    Literal(Literal),
    /// Quantity selector
    Quantity(QuantityLiteral),
    /// Ratio selector
    Ratio(RatioLiteral),
    /// Interval selector; closure flags come from the bracketing syntax
    Interval(IntervalSelector),
    /// List selector
    List(ListSelector),
    /// Tuple selector
    Tuple(TupleSelector),
    /// Instance selector (typed tuple carrying a resourceType)
    Instance(InstanceSelector),
    /// Direct code selector
    Code(CodeSelector),
    /// Direct concept selector
    Concept(ConceptSelector),

    // === Operators ===
    /// Binary operation
    Binary(BinaryExpr),
    /// Unary operation
    Unary(UnaryExpr),
    /// Membership / inclusion / timing relation
    Relation(RelationExpr),
    /// Conditional
    If(IfExpr),
    /// Case expression, with or without comparand
    Case(CaseExpr),
    /// First non-null of the operands
    Coalesce(Vec<Expr>),

    // === Type operations ===
    /// Type test (`is`)
    Is(IsExpr),
    /// Type cast (`as` / `cast ... as`)
    As(AsExpr),
    /// `To*` conversion or `ConvertsTo*` predicate
    Convert(ConvertExpr),
    /// Quantity unit conversion through the UCUM provider
    ConvertQuantity(ConvertQuantityExpr),
    /// Minimum representable value of a type
    MinValue(TypeSpecifier),
    /// Maximum representable value of a type
    MaxValue(TypeSpecifier),

    // === Temporal ===
    /// Whole completed calendar units between two values
    DurationBetween(BetweenExpr),
    /// Boundary-count difference between two values
    DifferenceBetween(BetweenExpr),
    /// Extract a single component of a Date/DateTime/Time
    DateTimeComponentFrom(ComponentExpr),
    /// Current DateTime (fixed per evaluation)
    Now,
    /// Current Date (fixed per evaluation)
    Today,
    /// Current Time (fixed per evaluation)
    TimeOfDay,

    // === Interval set operations ===
    /// Sweep-merge a list of intervals
    Collapse(CollapseExpr),
    /// Enumerate sub-intervals of a given width
    Expand(ExpandExpr),

    // === References ===
    /// Named expression reference, optionally library-qualified
    ExpressionRef(Ref),
    /// Function invocation, optionally library-qualified
    FunctionRef(FunctionRefExpr),
    /// Parameter reference
    ParameterRef(Ref),
    /// Function operand reference
    OperandRef(NameRef),
    /// Query alias reference
    AliasRef(NameRef),
    /// Query let binding reference
    QueryLetRef(NameRef),
    /// Unresolved identifier; resolved at evaluation time
    IdentifierRef(NameRef),
    /// Property access
    Property(PropertyExpr),

    // === Queries ===
    /// Full query pipeline
    Query(Box<Query>),
    /// Clinical data retrieve
    Retrieve(Box<Retrieve>),
    /// Map an expression over a source with `$this` bound
    ForEach(IterationExpr),
    /// Filter a source by a condition with `$this` bound
    Filter(IterationExpr),
    /// Repeated projection until a fixpoint
    Repeat(IterationExpr),
    /// Cartesian product of two tuple lists
    Times(TimesExpr),

    // === Clinical / terminology ===
    /// Code definition reference
    CodeRef(Ref),
    /// Codesystem definition reference
    CodeSystemRef(Ref),
    /// Valueset definition reference
    ValueSetRef(Ref),
    /// Concept definition reference
    ConceptRef(Ref),
    /// Code-in-valueset membership test
    InValueSet(InValueSetExpr),
    /// Code-in-codesystem membership test
    InCodeSystem(InCodeSystemExpr),
    /// Age from a birth value to the evaluation clock
    CalculateAge(AgeExpr),
    /// Age from a birth value to an explicit as-of value
    CalculateAgeAt(AgeAtExpr),

    // === Iteration variables ===
    /// `$this`
    This,
    /// `$index`
    IndexVar,
    /// `$total`
    TotalVar,

    // === Observability ===
    /// Diagnostic message; passes its source value through unchanged
    Message(MessageExpr),
}

/// Interval selector
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalSelector {
    pub low: BoxExpr,
    pub high: BoxExpr,
    pub low_closed: bool,
    pub high_closed: bool,
}

/// List selector
#[derive(Debug, Clone, PartialEq)]
pub struct ListSelector {
    pub elements: Vec<Expr>,
}

/// Tuple selector
#[derive(Debug, Clone, PartialEq)]
pub struct TupleSelector {
    pub elements: Vec<TupleElement>,
}

/// One named element of a tuple or instance selector
#[derive(Debug, Clone, PartialEq)]
pub struct TupleElement {
    pub name: String,
    pub value: Expr,
}

/// Instance selector: a tuple tagged with a class type
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceSelector {
    /// The declared class, e.g. `FHIR.Quantity` or `Patient`
    pub class_type: String,
    pub elements: Vec<TupleElement>,
}

/// Direct code selector.
///
/// `system` names a codesystem definition in the current library; the
/// evaluator resolves it to a URI.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeSelector {
    pub code: String,
    pub system: String,
    pub display: Option<String>,
    pub version: Option<String>,
}

/// Direct concept selector
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptSelector {
    pub codes: Vec<CodeSelector>,
    pub display: Option<String>,
}

/// Binary operation
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: BoxExpr,
    pub right: BoxExpr,
}

/// Unary operation
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: BoxExpr,
}

/// Membership / timing relation with optional temporal precision
#[derive(Debug, Clone, PartialEq)]
pub struct RelationExpr {
    pub op: RelationOp,
    pub left: BoxExpr,
    pub right: BoxExpr,
    pub precision: Option<TemporalPrecision>,
}

/// If-then-else
#[derive(Debug, Clone, PartialEq)]
pub struct IfExpr {
    pub condition: BoxExpr,
    pub then: BoxExpr,
    pub else_: BoxExpr,
}

/// Case expression
#[derive(Debug, Clone, PartialEq)]
pub struct CaseExpr {
    /// When present, each item's `when` compares against this value
    pub comparand: OptBoxExpr,
    pub items: Vec<CaseItem>,
    pub else_: BoxExpr,
}

/// One `when ... then ...` arm of a case expression
#[derive(Debug, Clone, PartialEq)]
pub struct CaseItem {
    pub when: Expr,
    pub then: Expr,
}

/// Type test
#[derive(Debug, Clone, PartialEq)]
pub struct IsExpr {
    pub operand: BoxExpr,
    pub type_specifier: TypeSpecifier,
}

/// Type cast
#[derive(Debug, Clone, PartialEq)]
pub struct AsExpr {
    pub operand: BoxExpr,
    pub type_specifier: TypeSpecifier,
    /// Strict casts raise on failure; non-strict yield null
    pub strict: bool,
}

/// `To*` conversion or `ConvertsTo*` predicate
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertExpr {
    pub operand: BoxExpr,
    pub target: ConversionTarget,
    /// When set, the node is the `ConvertsTo*` predicate form
    pub test_only: bool,
}

/// Quantity unit conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertQuantityExpr {
    pub operand: BoxExpr,
    pub unit: BoxExpr,
}

/// Duration / difference operands with target precision
#[derive(Debug, Clone, PartialEq)]
pub struct BetweenExpr {
    pub low: BoxExpr,
    pub high: BoxExpr,
    pub precision: TemporalPrecision,
}

/// Component extraction from a temporal value
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentExpr {
    pub operand: BoxExpr,
    pub component: TemporalPrecision,
}

/// Collapse a list of intervals, optionally honouring a per-width
#[derive(Debug, Clone, PartialEq)]
pub struct CollapseExpr {
    pub source: BoxExpr,
    pub per: OptBoxExpr,
}

/// Expand an interval (or list of intervals) into per-width sub-intervals
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandExpr {
    pub source: BoxExpr,
    pub per: OptBoxExpr,
}

/// A name reference with an optional library qualifier
#[derive(Debug, Clone, PartialEq)]
pub struct Ref {
    pub name: String,
    pub library: Option<String>,
}

/// A bare name reference
#[derive(Debug, Clone, PartialEq)]
pub struct NameRef {
    pub name: String,
}

/// Function invocation
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionRefExpr {
    pub name: String,
    pub library: Option<String>,
    pub operands: Vec<Expr>,
}

/// Property access; exactly one of `source` / `scope` is set
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyExpr {
    pub source: OptBoxExpr,
    pub scope: Option<String>,
    pub path: String,
}

/// ForEach / Filter / Repeat payload
#[derive(Debug, Clone, PartialEq)]
pub struct IterationExpr {
    pub source: BoxExpr,
    /// The element expression (ForEach/Repeat) or condition (Filter)
    pub body: BoxExpr,
}

/// Cartesian product of two tuple lists
#[derive(Debug, Clone, PartialEq)]
pub struct TimesExpr {
    pub left: BoxExpr,
    pub right: BoxExpr,
}

/// Code-in-valueset test; the valueset is a definition reference
#[derive(Debug, Clone, PartialEq)]
pub struct InValueSetExpr {
    pub code: BoxExpr,
    pub valueset: Ref,
}

/// Code-in-codesystem test
#[derive(Debug, Clone, PartialEq)]
pub struct InCodeSystemExpr {
    pub code: BoxExpr,
    pub codesystem: Ref,
}

/// CalculateAge payload
#[derive(Debug, Clone, PartialEq)]
pub struct AgeExpr {
    pub birth: BoxExpr,
    pub precision: Option<TemporalPrecision>,
}

/// CalculateAgeAt payload
#[derive(Debug, Clone, PartialEq)]
pub struct AgeAtExpr {
    pub birth: BoxExpr,
    pub as_of: BoxExpr,
    pub precision: Option<TemporalPrecision>,
}

/// Message operator payload
#[derive(Debug, Clone, PartialEq)]
pub struct MessageExpr {
    pub source: BoxExpr,
    pub condition: BoxExpr,
    pub code: BoxExpr,
    pub severity: BoxExpr,
    pub message: BoxExpr,
}
