//! Runtime value types
//!
//! [`CqlValue`] is the tagged union every expression evaluates to. Values
//! are logically immutable; operations that "modify" a value produce a new
//! one.

use crate::{CqlDate, CqlDateTime, CqlTime};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// The primary runtime value type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CqlValue {
    /// Absence of a value; distinct from an empty list
    Null,
    /// Boolean value; three-valued together with Null
    Boolean(bool),
    /// 64-bit signed integer
    Integer(i64),
    /// Arbitrary-precision decimal
    Decimal(Decimal),
    /// Unicode string
    String(String),
    /// Date with partial precision
    Date(CqlDate),
    /// DateTime with partial precision and optional timezone offset
    DateTime(CqlDateTime),
    /// Time of day with partial precision
    Time(CqlTime),
    /// Quantity with value and unit
    Quantity(CqlQuantity),
    /// Ratio of two quantities
    Ratio(CqlRatio),
    /// Code from a code system
    Code(CqlCode),
    /// Concept: a set of codes naming one notion
    Concept(CqlConcept),
    /// Interval between two points
    Interval(CqlInterval),
    /// Record with named elements
    Tuple(CqlTuple),
    /// Ordered sequence of values; may contain nulls
    List(CqlList),
    /// Opaque hierarchical clinical document
    Resource(CqlResource),
}

impl CqlValue {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if this value is exactly `true`
    pub fn is_true(&self) -> bool {
        matches!(self, Self::Boolean(true))
    }

    /// Check if this value is exactly `false`
    pub fn is_false(&self) -> bool {
        matches!(self, Self::Boolean(false))
    }

    /// The name of this value's type, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Boolean(_) => "Boolean",
            Self::Integer(_) => "Integer",
            Self::Decimal(_) => "Decimal",
            Self::String(_) => "String",
            Self::Date(_) => "Date",
            Self::DateTime(_) => "DateTime",
            Self::Time(_) => "Time",
            Self::Quantity(_) => "Quantity",
            Self::Ratio(_) => "Ratio",
            Self::Code(_) => "Code",
            Self::Concept(_) => "Concept",
            Self::Interval(_) => "Interval",
            Self::Tuple(_) => "Tuple",
            Self::List(_) => "List",
            Self::Resource(_) => "Resource",
        }
    }

    /// Try to get as Boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as Integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as Decimal, promoting Integer
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            Self::Integer(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    /// Try to get as String
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as List
    pub fn as_list(&self) -> Option<&CqlList> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Try to get as Interval
    pub fn as_interval(&self) -> Option<&CqlInterval> {
        match self {
            Self::Interval(i) => Some(i),
            _ => None,
        }
    }

    /// Try to get as Tuple
    pub fn as_tuple(&self) -> Option<&CqlTuple> {
        match self {
            Self::Tuple(t) => Some(t),
            _ => None,
        }
    }

    /// Try to get as Resource
    pub fn as_resource(&self) -> Option<&CqlResource> {
        match self {
            Self::Resource(r) => Some(r),
            _ => None,
        }
    }

    /// Create a boolean value
    pub fn boolean(value: bool) -> Self {
        Self::Boolean(value)
    }

    /// Create an integer value
    pub fn integer(value: i64) -> Self {
        Self::Integer(value)
    }

    /// Create a decimal value
    pub fn decimal(value: Decimal) -> Self {
        Self::Decimal(value)
    }

    /// Create a string value
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Create a list value from elements
    pub fn list(elements: Vec<CqlValue>) -> Self {
        Self::List(CqlList::from_elements(elements))
    }

    /// An empty list
    pub fn empty_list() -> Self {
        Self::List(CqlList::default())
    }
}

impl fmt::Display for CqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(d) => {
                let s = d.to_string();
                if s.contains('.') {
                    write!(f, "{s}")
                } else {
                    write!(f, "{s}.0")
                }
            }
            Self::String(s) => write!(f, "'{s}'"),
            Self::Date(d) => write!(f, "@{d}"),
            Self::DateTime(dt) => write!(f, "@{dt}"),
            Self::Time(t) => write!(f, "@T{t}"),
            Self::Quantity(q) => write!(f, "{q}"),
            Self::Ratio(r) => write!(f, "{r}"),
            Self::Code(c) => write!(f, "{c}"),
            Self::Concept(c) => write!(f, "{c}"),
            Self::Interval(i) => write!(f, "{i}"),
            Self::Tuple(t) => write!(f, "{t}"),
            Self::List(l) => write!(f, "{l}"),
            Self::Resource(r) => write!(f, "{r}"),
        }
    }
}

impl PartialEq for CqlValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Decimal(a), Self::Decimal(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::Time(a), Self::Time(b)) => a == b,
            (Self::Quantity(a), Self::Quantity(b)) => a == b,
            (Self::Ratio(a), Self::Ratio(b)) => a == b,
            (Self::Code(a), Self::Code(b)) => a == b,
            (Self::Concept(a), Self::Concept(b)) => a == b,
            (Self::Interval(a), Self::Interval(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Resource(a), Self::Resource(b)) => a == b,
            // Cross-type numeric comparisons
            (Self::Integer(a), Self::Decimal(b)) => Decimal::from(*a) == *b,
            (Self::Decimal(a), Self::Integer(b)) => *a == Decimal::from(*b),
            _ => false,
        }
    }
}

impl Eq for CqlValue {}

// ============================================================================
// Quantity and Ratio
// ============================================================================

/// A measured value with a unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CqlQuantity {
    /// Numeric value
    pub value: Decimal,
    /// UCUM code or calendar unit name
    pub unit: Option<String>,
    /// The unit as originally written, when normalization rewrote it
    pub original_unit: Option<String>,
}

impl CqlQuantity {
    /// Create a new quantity
    pub fn new(value: Decimal, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: Some(unit.into()),
            original_unit: None,
        }
    }

    /// Create a unitless quantity
    pub fn unitless(value: Decimal) -> Self {
        Self {
            value,
            unit: None,
            original_unit: None,
        }
    }

    /// The effective unit, reading absent and "1" as dimensionless
    pub fn unit_or_default(&self) -> &str {
        self.unit.as_deref().unwrap_or("1")
    }
}

impl PartialEq for CqlQuantity {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.unit_or_default() == other.unit_or_default()
    }
}

impl Eq for CqlQuantity {}

impl PartialOrd for CqlQuantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.unit_or_default() == other.unit_or_default() {
            self.value.partial_cmp(&other.value)
        } else {
            None
        }
    }
}

impl fmt::Display for CqlQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)?;
        if let Some(unit) = &self.unit {
            write!(f, " '{unit}'")?;
        }
        Ok(())
    }
}

/// A ratio of two quantities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CqlRatio {
    pub numerator: CqlQuantity,
    pub denominator: CqlQuantity,
}

impl CqlRatio {
    pub fn new(numerator: CqlQuantity, denominator: CqlQuantity) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// The decimal quotient, when the denominator is non-zero and the
    /// units cancel
    pub fn to_decimal(&self) -> Option<Decimal> {
        if self.denominator.value.is_zero() {
            return None;
        }
        if self.numerator.unit_or_default() != self.denominator.unit_or_default() {
            return None;
        }
        self.numerator.value.checked_div(self.denominator.value)
    }
}

impl fmt::Display for CqlRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.numerator, self.denominator)
    }
}

// ============================================================================
// Code and Concept
// ============================================================================

/// A code from a code system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CqlCode {
    /// Code value
    pub code: String,
    /// Code system URI
    pub system: String,
    /// Code system version (optional)
    pub version: Option<String>,
    /// Display string (optional)
    pub display: Option<String>,
}

impl CqlCode {
    pub fn new(code: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            system: system.into(),
            version: None,
            display: None,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Equivalence ignores display and version
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.code == other.code && self.system == other.system
    }
}

impl fmt::Display for CqlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code '{}' from \"{}\"", self.code, self.system)?;
        if let Some(display) = &self.display {
            write!(f, " display '{display}'")?;
        }
        Ok(())
    }
}

/// A concept: codes from one or more systems naming the same notion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CqlConcept {
    /// Codes in this concept
    pub codes: SmallVec<[CqlCode; 2]>,
    /// Display string (optional)
    pub display: Option<String>,
}

impl CqlConcept {
    pub fn new(codes: impl IntoIterator<Item = CqlCode>, display: Option<String>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
            display,
        }
    }

    /// Wrap a single code
    pub fn from_code(code: CqlCode) -> Self {
        let display = code.display.clone();
        Self {
            codes: smallvec::smallvec![code],
            display,
        }
    }

    /// Whether any member code is equivalent to the given code
    pub fn contains_equivalent(&self, code: &CqlCode) -> bool {
        self.codes.iter().any(|c| c.is_equivalent(code))
    }
}

impl fmt::Display for CqlConcept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Concept {{")?;
        for (i, code) in self.codes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{code}")?;
        }
        write!(f, "}}")?;
        if let Some(display) = &self.display {
            write!(f, " display '{display}'")?;
        }
        Ok(())
    }
}

// ============================================================================
// Interval
// ============================================================================

/// A range between two points of the same ordered type.
///
/// A `None` (or explicit null) bound means unbounded on that side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CqlInterval {
    /// Low bound
    pub low: Option<Box<CqlValue>>,
    /// Whether the low bound is inclusive
    pub low_closed: bool,
    /// High bound
    pub high: Option<Box<CqlValue>>,
    /// Whether the high bound is inclusive
    pub high_closed: bool,
}

impl CqlInterval {
    /// Create an interval from bounds and closure flags
    pub fn new(
        low: Option<CqlValue>,
        low_closed: bool,
        high: Option<CqlValue>,
        high_closed: bool,
    ) -> Self {
        Self {
            low: low.map(Box::new),
            low_closed,
            high: high.map(Box::new),
            high_closed,
        }
    }

    /// Closed interval `[low, high]`
    pub fn closed(low: CqlValue, high: CqlValue) -> Self {
        Self::new(Some(low), true, Some(high), true)
    }

    /// Open interval `(low, high)`
    pub fn open(low: CqlValue, high: CqlValue) -> Self {
        Self::new(Some(low), false, Some(high), false)
    }

    /// Half-open interval `[low, high)`
    pub fn closed_open(low: CqlValue, high: CqlValue) -> Self {
        Self::new(Some(low), true, Some(high), false)
    }

    /// Half-open interval `(low, high]`
    pub fn open_closed(low: CqlValue, high: CqlValue) -> Self {
        Self::new(Some(low), false, Some(high), true)
    }

    /// The low bound; a null bound reads as unbounded
    pub fn low(&self) -> Option<&CqlValue> {
        match self.low.as_deref() {
            Some(CqlValue::Null) | None => None,
            other => other,
        }
    }

    /// The high bound; a null bound reads as unbounded
    pub fn high(&self) -> Option<&CqlValue> {
        match self.high.as_deref() {
            Some(CqlValue::Null) | None => None,
            other => other,
        }
    }

    /// The raw low bound including explicit nulls
    pub fn low_raw(&self) -> Option<&CqlValue> {
        self.low.as_deref()
    }

    /// The raw high bound including explicit nulls
    pub fn high_raw(&self) -> Option<&CqlValue> {
        self.high.as_deref()
    }

    /// A point interval: both bounds closed on the same value
    pub fn is_point(&self) -> bool {
        match (self.low(), self.high()) {
            (Some(l), Some(h)) => self.low_closed && self.high_closed && l == h,
            _ => false,
        }
    }
}

impl PartialEq for CqlInterval {
    fn eq(&self, other: &Self) -> bool {
        self.low == other.low
            && self.low_closed == other.low_closed
            && self.high == other.high
            && self.high_closed == other.high_closed
    }
}

impl Eq for CqlInterval {}

impl fmt::Display for CqlInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interval{}", if self.low_closed { "[" } else { "(" })?;
        match &self.low {
            Some(l) => write!(f, "{l}")?,
            None => write!(f, "null")?,
        }
        write!(f, ", ")?;
        match &self.high {
            Some(h) => write!(f, "{h}")?,
            None => write!(f, "null")?,
        }
        write!(f, "{}", if self.high_closed { "]" } else { ")" })
    }
}

// ============================================================================
// Tuple and List
// ============================================================================

/// A record with named elements; element order is not significant for
/// equality
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CqlTuple {
    /// Named elements, in insertion order
    pub elements: IndexMap<String, CqlValue>,
}

impl CqlTuple {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (name, value) pairs
    pub fn from_elements(
        elements: impl IntoIterator<Item = (impl Into<String>, CqlValue)>,
    ) -> Self {
        Self {
            elements: elements.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CqlValue> {
        self.elements.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: CqlValue) {
        self.elements.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CqlValue)> {
        self.elements.iter()
    }
}

impl PartialEq for CqlTuple {
    fn eq(&self, other: &Self) -> bool {
        if self.elements.len() != other.elements.len() {
            return false;
        }
        self.elements
            .iter()
            .all(|(k, v)| other.elements.get(k) == Some(v))
    }
}

impl Eq for CqlTuple {}

impl fmt::Display for CqlTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tuple {{")?;
        for (i, (name, value)) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}

/// An ordered sequence of values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CqlList {
    /// List elements
    pub elements: Vec<CqlValue>,
}

impl CqlList {
    /// Build from elements
    pub fn from_elements(elements: Vec<CqlValue>) -> Self {
        Self { elements }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn get(&self, index: usize) -> Option<&CqlValue> {
        self.elements.get(index)
    }

    pub fn first(&self) -> Option<&CqlValue> {
        self.elements.first()
    }

    pub fn last(&self) -> Option<&CqlValue> {
        self.elements.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CqlValue> {
        self.elements.iter()
    }
}

impl PartialEq for CqlList {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl Eq for CqlList {}

impl FromIterator<CqlValue> for CqlList {
    fn from_iter<I: IntoIterator<Item = CqlValue>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for CqlList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, elem) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{elem}")?;
        }
        write!(f, "}}")
    }
}

// ============================================================================
// Resource
// ============================================================================

/// An opaque hierarchical document from the data source.
///
/// The payload is shared; retrieves hand the same underlying document to
/// every row that references it.
#[derive(Debug, Clone)]
pub struct CqlResource {
    /// The resource type, read from the document's `resourceType`
    pub resource_type: String,
    /// The raw document
    pub data: Arc<serde_json::Value>,
}

impl Serialize for CqlResource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.data.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CqlResource {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let data = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::from_json(data))
    }
}

impl CqlResource {
    /// Wrap a JSON document, reading `resourceType` when present
    pub fn from_json(data: serde_json::Value) -> Self {
        let resource_type = data
            .get("resourceType")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Self {
            resource_type,
            data: Arc::new(data),
        }
    }

    /// The document's logical id
    pub fn id(&self) -> Option<&str> {
        self.data.get("id").and_then(|v| v.as_str())
    }

    /// Raw field access on the document
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.data.get(field)
    }
}

impl PartialEq for CqlResource {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for CqlResource {}

impl fmt::Display for CqlResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "{}/{}", self.resource_type, id),
            None => write!(f, "{}", self.resource_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_value_display() {
        assert_eq!(CqlValue::integer(42).to_string(), "42");
        assert_eq!(CqlValue::decimal(Decimal::new(35, 1)).to_string(), "3.5");
        assert_eq!(CqlValue::decimal(Decimal::from(4)).to_string(), "4.0");
        assert_eq!(CqlValue::string("ok").to_string(), "'ok'");
        assert_eq!(CqlValue::Date(CqlDate::year_month(2020, 6)).to_string(), "@2020-06");
    }

    #[test]
    fn test_cross_type_numeric_equality() {
        assert_eq!(CqlValue::integer(3), CqlValue::Decimal(Decimal::from(3)));
        assert_ne!(CqlValue::integer(3), CqlValue::string("3"));
    }

    #[test]
    fn test_quantity_comparison_requires_same_unit() {
        let mg = CqlQuantity::new(Decimal::from(5), "mg");
        let g = CqlQuantity::new(Decimal::from(5), "g");
        assert_eq!(mg.partial_cmp(&g), None);
        assert_eq!(
            mg.partial_cmp(&CqlQuantity::new(Decimal::from(7), "mg")),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_unitless_quantity_is_dimensionless() {
        let bare = CqlQuantity::unitless(Decimal::from(2));
        let one = CqlQuantity::new(Decimal::from(2), "1");
        assert_eq!(bare, one);
    }

    #[test]
    fn test_tuple_equality_ignores_order() {
        let a = CqlTuple::from_elements([
            ("x", CqlValue::integer(1)),
            ("y", CqlValue::integer(2)),
        ]);
        let b = CqlTuple::from_elements([
            ("y", CqlValue::integer(2)),
            ("x", CqlValue::integer(1)),
        ]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_interval_null_bound_is_unbounded() {
        let iv = CqlInterval::new(Some(CqlValue::Null), true, Some(CqlValue::integer(5)), true);
        assert_eq!(iv.low(), None);
        assert_eq!(iv.high(), Some(&CqlValue::integer(5)));
        assert!(iv.low_raw().is_some());
    }

    #[test]
    fn test_interval_display() {
        let iv = CqlInterval::closed_open(CqlValue::integer(3), CqlValue::integer(5));
        assert_eq!(iv.to_string(), "Interval[3, 5)");
    }

    #[test]
    fn test_ratio_to_decimal() {
        let r = CqlRatio::new(
            CqlQuantity::new(Decimal::from(10), "mg"),
            CqlQuantity::new(Decimal::from(4), "mg"),
        );
        assert_eq!(r.to_decimal(), Some(Decimal::new(25, 1)));

        let mixed = CqlRatio::new(
            CqlQuantity::new(Decimal::from(10), "mg"),
            CqlQuantity::new(Decimal::from(4), "mL"),
        );
        assert_eq!(mixed.to_decimal(), None);
    }

    #[test]
    fn test_resource_from_json() {
        let r = CqlResource::from_json(serde_json::json!({
            "resourceType": "Patient",
            "id": "p1",
        }));
        assert_eq!(r.resource_type, "Patient");
        assert_eq!(r.id(), Some("p1"));
        assert_eq!(r.to_string(), "Patient/p1");
    }

    #[test]
    fn test_code_equivalence_ignores_display_and_version() {
        let a = CqlCode::new("123", "http://example.org").with_display("A");
        let b = CqlCode::new("123", "http://example.org").with_version("2");
        assert!(a.is_equivalent(&b));
        assert_ne!(a, b);
    }
}
