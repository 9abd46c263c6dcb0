//! Comparison operators
//!
//! Equality, equivalence and ordering with three-valued results. Null
//! propagates through `=` and the ordering operators; `~` treats null as
//! comparable. Cross-precision temporal comparisons below the common
//! prefix are unknown, not false.

use crate::context::EvaluationContext;
use crate::engine::CqlEvaluator;
use crate::error::{EvalError, EvalResult};
use crate::navigation::unwrap_primitive;
use crate::units::UnitConverter;
use lumen_cql_ast::{BinaryExpr, BinaryOp};
use lumen_cql_types::{CqlDateTime, CqlValue, Truth};
use rust_decimal::Decimal;
use std::cmp::Ordering;

impl CqlEvaluator {
    /// Equal, NotEqual, Equivalent, NotEquivalent and the orderings
    pub(crate) fn eval_comparison(
        &self,
        op: BinaryOp,
        expr: &BinaryExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let left = self.eval_operand(&expr.left, ctx)?;
        let right = self.eval_operand(&expr.right, ctx)?;

        match op {
            BinaryOp::Equivalent => Ok(CqlValue::Boolean(cql_equivalent(
                &left,
                &right,
                ctx.units(),
            ))),
            BinaryOp::NotEquivalent => Ok(CqlValue::Boolean(!cql_equivalent(
                &left,
                &right,
                ctx.units(),
            ))),
            BinaryOp::Equal | BinaryOp::NotEqual => {
                if left.is_null() || right.is_null() {
                    return Ok(CqlValue::Null);
                }
                match cql_equal(&left, &right, ctx.units()) {
                    Some(result) => Ok(CqlValue::Boolean(if op == BinaryOp::Equal {
                        result
                    } else {
                        !result
                    })),
                    None => Ok(CqlValue::Null),
                }
            }
            _ => {
                if left.is_null() || right.is_null() {
                    return Ok(CqlValue::Null);
                }
                let ordering = cql_compare(&left, &right, ctx.units())?;
                let truth: Truth = match ordering {
                    None => Truth::Unknown,
                    Some(ordering) => Truth::from(match op {
                        BinaryOp::Less => ordering == Ordering::Less,
                        BinaryOp::LessOrEqual => ordering != Ordering::Greater,
                        BinaryOp::Greater => ordering == Ordering::Greater,
                        BinaryOp::GreaterOrEqual => ordering != Ordering::Less,
                        _ => unreachable!("non-comparison operator {op}"),
                    }),
                };
                Ok(truth_to_value(truth))
            }
        }
    }
}

/// Convert a truth value to its runtime representation
pub fn truth_to_value(truth: Truth) -> CqlValue {
    match truth {
        Truth::True => CqlValue::Boolean(true),
        Truth::False => CqlValue::Boolean(false),
        Truth::Unknown => CqlValue::Null,
    }
}

/// Structural equality.
///
/// `None` means the comparison is unknown (null elements, incomparable
/// temporal precision). Callers handle top-level nulls before calling.
pub fn cql_equal(left: &CqlValue, right: &CqlValue, units: &dyn UnitConverter) -> Option<bool> {
    let left = unwrap_primitive(left);
    let right = unwrap_primitive(right);

    match (left, right) {
        (CqlValue::Boolean(a), CqlValue::Boolean(b)) => Some(a == b),
        (CqlValue::Integer(a), CqlValue::Integer(b)) => Some(a == b),
        (CqlValue::Decimal(a), CqlValue::Decimal(b)) => Some(a == b),
        (CqlValue::String(a), CqlValue::String(b)) => Some(a == b),

        // Cross-type numeric comparisons
        (CqlValue::Integer(a), CqlValue::Decimal(b)) => Some(Decimal::from(*a) == *b),
        (CqlValue::Decimal(a), CqlValue::Integer(b)) => Some(*a == Decimal::from(*b)),

        // Temporal equality is three-valued across precisions
        (CqlValue::Date(a), CqlValue::Date(b)) => {
            a.partial_cmp(b).map(|ordering| ordering == Ordering::Equal)
        }
        (CqlValue::DateTime(a), CqlValue::DateTime(b)) => {
            a.partial_cmp(b).map(|ordering| ordering == Ordering::Equal)
        }
        (CqlValue::Time(a), CqlValue::Time(b)) => {
            a.partial_cmp(b).map(|ordering| ordering == Ordering::Equal)
        }
        (CqlValue::Date(a), CqlValue::DateTime(b)) => CqlDateTime::from_date(*a)
            .partial_cmp(b)
            .map(|ordering| ordering == Ordering::Equal),
        (CqlValue::DateTime(a), CqlValue::Date(b)) => a
            .partial_cmp(&CqlDateTime::from_date(*b))
            .map(|ordering| ordering == Ordering::Equal),

        // Quantities equal after converting right into left's unit
        (CqlValue::Quantity(a), CqlValue::Quantity(b)) => {
            match units.convert(b.value, b.unit_or_default(), a.unit_or_default()) {
                Some(converted) => Some(a.value == converted),
                None => Some(false),
            }
        }

        (CqlValue::Ratio(a), CqlValue::Ratio(b)) => {
            // Compare decimal equivalents when units cancel, else pairwise
            match (a.to_decimal(), b.to_decimal()) {
                (Some(da), Some(db)) => Some(da == db),
                _ => Some(a == b),
            }
        }

        // Codes compare on all fields for equality
        (CqlValue::Code(a), CqlValue::Code(b)) => Some(a == b),
        (CqlValue::Concept(a), CqlValue::Concept(b)) => Some(a == b),

        // Lists compare pairwise; unequal length is definitely false
        (CqlValue::List(a), CqlValue::List(b)) => {
            if a.len() != b.len() {
                return Some(false);
            }
            let mut unknown = false;
            for (ea, eb) in a.iter().zip(b.iter()) {
                match (ea.is_null(), eb.is_null()) {
                    (true, true) => continue,
                    (true, false) | (false, true) => {
                        unknown = true;
                        continue;
                    }
                    (false, false) => match cql_equal(ea, eb, units) {
                        Some(false) => return Some(false),
                        Some(true) => {}
                        None => unknown = true,
                    },
                }
            }
            if unknown { None } else { Some(true) }
        }

        (CqlValue::Interval(a), CqlValue::Interval(b)) => {
            let low = bound_equal(a.low(), b.low(), a.low_closed, b.low_closed, units)?;
            let high = bound_equal(a.high(), b.high(), a.high_closed, b.high_closed, units)?;
            Some(low && high)
        }

        // Tuples compare by name; element order is not significant
        (CqlValue::Tuple(a), CqlValue::Tuple(b)) => {
            if a.len() != b.len() {
                return Some(false);
            }
            let mut unknown = false;
            for (name, va) in a.iter() {
                match b.get(name) {
                    None => return Some(false),
                    Some(vb) => match (va.is_null(), vb.is_null()) {
                        (true, true) => continue,
                        (true, false) | (false, true) => {
                            unknown = true;
                            continue;
                        }
                        (false, false) => match cql_equal(va, vb, units) {
                            Some(false) => return Some(false),
                            Some(true) => {}
                            None => unknown = true,
                        },
                    },
                }
            }
            if unknown { None } else { Some(true) }
        }

        (CqlValue::Resource(a), CqlValue::Resource(b)) => Some(a == b),

        _ => Some(false),
    }
}

fn bound_equal(
    a: Option<&CqlValue>,
    b: Option<&CqlValue>,
    a_closed: bool,
    b_closed: bool,
    units: &dyn UnitConverter,
) -> Option<bool> {
    if a_closed != b_closed {
        return Some(false);
    }
    match (a, b) {
        (None, None) => Some(true),
        (Some(a), Some(b)) => cql_equal(a, b, units),
        _ => Some(false),
    }
}

/// Equivalence (`~`): null-aware, system-aware equality.
///
/// Null ~ Null is true; strings compare case-insensitively; Codes compare
/// on code + system; lists compare as multisets ignoring order.
pub fn cql_equivalent(left: &CqlValue, right: &CqlValue, units: &dyn UnitConverter) -> bool {
    let left = unwrap_primitive(left);
    let right = unwrap_primitive(right);

    match (left, right) {
        (CqlValue::Null, CqlValue::Null) => true,
        (CqlValue::Null, _) | (_, CqlValue::Null) => false,

        (CqlValue::String(a), CqlValue::String(b)) => a.eq_ignore_ascii_case(b),

        (CqlValue::Code(a), CqlValue::Code(b)) => a.is_equivalent(b),

        // Concepts are equivalent when their code sets agree, ignoring
        // display and version
        (CqlValue::Concept(a), CqlValue::Concept(b)) => {
            a.codes.iter().all(|c| b.contains_equivalent(c))
                && b.codes.iter().all(|c| a.contains_equivalent(c))
        }
        (CqlValue::Code(a), CqlValue::Concept(b)) | (CqlValue::Concept(b), CqlValue::Code(a)) => {
            b.contains_equivalent(a)
        }

        // Lists are multisets under equivalence
        (CqlValue::List(a), CqlValue::List(b)) => {
            if a.len() != b.len() {
                return false;
            }
            let mut used = vec![false; b.len()];
            'outer: for ea in a.iter() {
                for (i, eb) in b.iter().enumerate() {
                    if !used[i] && cql_equivalent(ea, eb, units) {
                        used[i] = true;
                        continue 'outer;
                    }
                }
                return false;
            }
            true
        }

        (CqlValue::Tuple(a), CqlValue::Tuple(b)) => {
            a.len() == b.len()
                && a.iter().all(|(name, va)| {
                    b.get(name)
                        .is_some_and(|vb| cql_equivalent(va, vb, units))
                })
        }

        (CqlValue::Interval(a), CqlValue::Interval(b)) => {
            a.low_closed == b.low_closed
                && a.high_closed == b.high_closed
                && equivalent_bound(a.low(), b.low(), units)
                && equivalent_bound(a.high(), b.high(), units)
        }

        // Everything else: equivalent iff definitely equal
        _ => cql_equal(left, right, units) == Some(true),
    }
}

fn equivalent_bound(
    a: Option<&CqlValue>,
    b: Option<&CqlValue>,
    units: &dyn UnitConverter,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => cql_equivalent(a, b, units),
        _ => false,
    }
}

/// Ordering over comparable values.
///
/// `Ok(None)` means the ordering is unknown (temporal precision);
/// incompatible quantity units are a type error.
pub fn cql_compare(
    left: &CqlValue,
    right: &CqlValue,
    units: &dyn UnitConverter,
) -> EvalResult<Option<Ordering>> {
    let left = unwrap_primitive(left);
    let right = unwrap_primitive(right);

    match (left, right) {
        (CqlValue::Integer(a), CqlValue::Integer(b)) => Ok(Some(a.cmp(b))),
        (CqlValue::Decimal(a), CqlValue::Decimal(b)) => Ok(a.partial_cmp(b)),
        (CqlValue::Integer(a), CqlValue::Decimal(b)) => Ok(Decimal::from(*a).partial_cmp(b)),
        (CqlValue::Decimal(a), CqlValue::Integer(b)) => Ok(a.partial_cmp(&Decimal::from(*b))),

        // Unicode code-point ordering
        (CqlValue::String(a), CqlValue::String(b)) => Ok(Some(a.cmp(b))),

        (CqlValue::Boolean(a), CqlValue::Boolean(b)) => Ok(Some(a.cmp(b))),

        (CqlValue::Date(a), CqlValue::Date(b)) => Ok(a.partial_cmp(b)),
        (CqlValue::DateTime(a), CqlValue::DateTime(b)) => Ok(a.partial_cmp(b)),
        (CqlValue::Time(a), CqlValue::Time(b)) => Ok(a.partial_cmp(b)),
        (CqlValue::Date(a), CqlValue::DateTime(b)) => {
            Ok(CqlDateTime::from_date(*a).partial_cmp(b))
        }
        (CqlValue::DateTime(a), CqlValue::Date(b)) => {
            Ok(a.partial_cmp(&CqlDateTime::from_date(*b)))
        }

        (CqlValue::Quantity(a), CqlValue::Quantity(b)) => {
            match units.convert(b.value, b.unit_or_default(), a.unit_or_default()) {
                Some(converted) => Ok(a.value.partial_cmp(&converted)),
                None => Err(EvalError::incompatible_units(
                    a.unit_or_default(),
                    b.unit_or_default(),
                )),
            }
        }

        _ => Err(EvalError::type_mismatch(
            left.type_name(),
            right.type_name(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::StandardUnitConverter;
    use lumen_cql_types::{CqlCode, CqlConcept, CqlDate, CqlQuantity};

    fn units() -> StandardUnitConverter {
        StandardUnitConverter::new()
    }

    #[test]
    fn test_numeric_cross_type_equality() {
        assert_eq!(
            cql_equal(&CqlValue::integer(3), &CqlValue::Decimal(Decimal::from(3)), &units()),
            Some(true)
        );
    }

    #[test]
    fn test_partial_date_equality_is_unknown() {
        let a = CqlValue::Date(CqlDate::year_only(2020));
        let b = CqlValue::Date(CqlDate::year_month(2020, 6));
        assert_eq!(cql_equal(&a, &b, &units()), None);
    }

    #[test]
    fn test_quantity_equality_converts_units() {
        let kg = CqlValue::Quantity(CqlQuantity::new(Decimal::ONE, "kg"));
        let g = CqlValue::Quantity(CqlQuantity::new(Decimal::from(1000), "g"));
        assert_eq!(cql_equal(&kg, &g, &units()), Some(true));

        let cm = CqlValue::Quantity(CqlQuantity::new(Decimal::from(1000), "cm"));
        assert_eq!(cql_equal(&kg, &cm, &units()), Some(false));
    }

    #[test]
    fn test_quantity_ordering_requires_convertible_units() {
        let kg = CqlValue::Quantity(CqlQuantity::new(Decimal::ONE, "kg"));
        let g = CqlValue::Quantity(CqlQuantity::new(Decimal::from(500), "g"));
        assert_eq!(cql_compare(&kg, &g, &units()).unwrap(), Some(Ordering::Greater));

        let cm = CqlValue::Quantity(CqlQuantity::new(Decimal::from(500), "cm"));
        assert!(cql_compare(&kg, &cm, &units()).is_err());
    }

    #[test]
    fn test_list_equality_with_null_elements() {
        let a = CqlValue::list(vec![CqlValue::integer(1), CqlValue::Null]);
        let b = CqlValue::list(vec![CqlValue::integer(1), CqlValue::Null]);
        assert_eq!(cql_equal(&a, &b, &units()), Some(true));

        let c = CqlValue::list(vec![CqlValue::integer(1), CqlValue::integer(2)]);
        assert_eq!(cql_equal(&a, &c, &units()), None);

        let d = CqlValue::list(vec![CqlValue::integer(2), CqlValue::Null]);
        assert_eq!(cql_equal(&a, &d, &units()), Some(false));
    }

    #[test]
    fn test_equivalence_of_strings_is_case_insensitive() {
        assert!(cql_equivalent(
            &CqlValue::string("Hello"),
            &CqlValue::string("hello"),
            &units()
        ));
    }

    #[test]
    fn test_equivalence_of_nulls() {
        assert!(cql_equivalent(&CqlValue::Null, &CqlValue::Null, &units()));
        assert!(!cql_equivalent(&CqlValue::Null, &CqlValue::integer(1), &units()));
    }

    #[test]
    fn test_code_equivalence_ignores_display() {
        let a = CqlValue::Code(CqlCode::new("1", "s").with_display("One"));
        let b = CqlValue::Code(CqlCode::new("1", "s").with_display("Uno"));
        assert!(cql_equivalent(&a, &b, &units()));
        assert_eq!(cql_equal(&a, &b, &units()), Some(false));
    }

    #[test]
    fn test_concept_equivalence_is_set_based() {
        let c1 = CqlCode::new("1", "s");
        let c2 = CqlCode::new("2", "s");
        let a = CqlValue::Concept(CqlConcept::new([c1.clone(), c2.clone()], None));
        let b = CqlValue::Concept(CqlConcept::new([c2, c1], Some("x".into())));
        assert!(cql_equivalent(&a, &b, &units()));
    }

    #[test]
    fn test_list_equivalence_is_multiset() {
        let a = CqlValue::list(vec![CqlValue::integer(1), CqlValue::integer(2)]);
        let b = CqlValue::list(vec![CqlValue::integer(2), CqlValue::integer(1)]);
        assert!(cql_equivalent(&a, &b, &units()));
        assert_eq!(cql_equal(&a, &b, &units()), Some(false));
    }

    #[test]
    fn test_string_ordering_by_code_point() {
        assert_eq!(
            cql_compare(&CqlValue::string("abc"), &CqlValue::string("abd"), &units()).unwrap(),
            Some(Ordering::Less)
        );
    }
}
