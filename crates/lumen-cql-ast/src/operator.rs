//! Operator enums shared by expression nodes

use std::fmt;

/// Binary operators with value semantics independent of temporal precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    TruncatedDivide,
    Modulo,
    Power,
    /// String concatenation (`&`), treating null as the empty string
    Concatenate,

    // Comparison
    Equal,
    NotEqual,
    Equivalent,
    NotEquivalent,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,

    // Logical
    And,
    Or,
    Xor,
    Implies,

    // Set operations (lists and intervals)
    Union,
    Intersect,
    Except,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "Add",
            Self::Subtract => "Subtract",
            Self::Multiply => "Multiply",
            Self::Divide => "Divide",
            Self::TruncatedDivide => "TruncatedDivide",
            Self::Modulo => "Modulo",
            Self::Power => "Power",
            Self::Concatenate => "Concatenate",
            Self::Equal => "Equal",
            Self::NotEqual => "NotEqual",
            Self::Equivalent => "Equivalent",
            Self::NotEquivalent => "NotEquivalent",
            Self::Less => "Less",
            Self::LessOrEqual => "LessOrEqual",
            Self::Greater => "Greater",
            Self::GreaterOrEqual => "GreaterOrEqual",
            Self::And => "And",
            Self::Or => "Or",
            Self::Xor => "Xor",
            Self::Implies => "Implies",
            Self::Union => "Union",
            Self::Intersect => "Intersect",
            Self::Except => "Except",
        };
        write!(f, "{name}")
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    Not,
    IsNull,
    IsTrue,
    IsFalse,
    Exists,
    /// Interval low boundary accessor
    Start,
    /// Interval high boundary accessor
    End,
    Width,
    Size,
    PointFrom,
    Predecessor,
    Successor,
    SingletonFrom,
    Distinct,
    Flatten,
    DateFrom,
    TimeFrom,
    TimezoneOffsetFrom,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Negate => "Negate",
            Self::Not => "Not",
            Self::IsNull => "IsNull",
            Self::IsTrue => "IsTrue",
            Self::IsFalse => "IsFalse",
            Self::Exists => "Exists",
            Self::Start => "Start",
            Self::End => "End",
            Self::Width => "Width",
            Self::Size => "Size",
            Self::PointFrom => "PointFrom",
            Self::Predecessor => "Predecessor",
            Self::Successor => "Successor",
            Self::SingletonFrom => "SingletonFrom",
            Self::Distinct => "Distinct",
            Self::Flatten => "Flatten",
            Self::DateFrom => "DateFrom",
            Self::TimeFrom => "TimeFrom",
            Self::TimezoneOffsetFrom => "TimezoneOffsetFrom",
        };
        write!(f, "{name}")
    }
}

/// Membership, inclusion and timing relations.
///
/// These dispatch over lists, intervals and points at evaluation time; the
/// optional precision of the enclosing node applies to temporal operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationOp {
    In,
    Contains,
    Includes,
    IncludedIn,
    ProperIn,
    ProperContains,
    ProperIncludes,
    ProperIncludedIn,
    Before,
    After,
    Meets,
    MeetsBefore,
    MeetsAfter,
    Overlaps,
    OverlapsBefore,
    OverlapsAfter,
    Starts,
    Ends,
    SameAs,
    SameOrBefore,
    SameOrAfter,
}

impl fmt::Display for RelationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::In => "In",
            Self::Contains => "Contains",
            Self::Includes => "Includes",
            Self::IncludedIn => "IncludedIn",
            Self::ProperIn => "ProperIn",
            Self::ProperContains => "ProperContains",
            Self::ProperIncludes => "ProperIncludes",
            Self::ProperIncludedIn => "ProperIncludedIn",
            Self::Before => "Before",
            Self::After => "After",
            Self::Meets => "Meets",
            Self::MeetsBefore => "MeetsBefore",
            Self::MeetsAfter => "MeetsAfter",
            Self::Overlaps => "Overlaps",
            Self::OverlapsBefore => "OverlapsBefore",
            Self::OverlapsAfter => "OverlapsAfter",
            Self::Starts => "Starts",
            Self::Ends => "Ends",
            Self::SameAs => "SameAs",
            Self::SameOrBefore => "SameOrBefore",
            Self::SameOrAfter => "SameOrAfter",
        };
        write!(f, "{name}")
    }
}

/// Temporal precision qualifier for duration, difference and timing nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TemporalPrecision {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl fmt::Display for TemporalPrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Week => "week",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
            Self::Millisecond => "millisecond",
        };
        write!(f, "{name}")
    }
}

/// Target type of a `To*` / `ConvertsTo*` conversion node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionTarget {
    Boolean,
    Integer,
    /// Long is an alias of the 64-bit Integer representation
    Long,
    Decimal,
    String,
    Date,
    DateTime,
    Time,
    Quantity,
    Ratio,
    Concept,
}

impl fmt::Display for ConversionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "Boolean",
            Self::Integer => "Integer",
            Self::Long => "Long",
            Self::Decimal => "Decimal",
            Self::String => "String",
            Self::Date => "Date",
            Self::DateTime => "DateTime",
            Self::Time => "Time",
            Self::Quantity => "Quantity",
            Self::Ratio => "Ratio",
            Self::Concept => "Concept",
        };
        write!(f, "{name}")
    }
}
