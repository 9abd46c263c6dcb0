//! List operators and aggregate functions
//!
//! Aggregates skip null elements; an all-null (or empty) argument yields
//! null except where the specification pins a value (Count of empty is 0,
//! Exists of empty is false, AllTrue of empty is true). Membership is
//! three-valued: a null element with no definite match makes the answer
//! unknown.

use crate::error::{EvalError, EvalErrorKind, EvalResult};
use crate::operators::arithmetic::{add_values, multiply_values, truncate_division};
use crate::operators::comparison::{cql_compare, cql_equal};
use crate::units::UnitConverter;
use lumen_cql_types::{CqlList, CqlValue, Truth};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::cmp::Ordering;

fn expect_list<'a>(value: &'a CqlValue, function: &str) -> EvalResult<Option<&'a CqlList>> {
    match value {
        CqlValue::Null => Ok(None),
        CqlValue::List(list) => Ok(Some(list)),
        other => Err(EvalError::invalid_operand(
            function,
            format!("expected List, found {}", other.type_name()),
        )),
    }
}

/// Non-null elements of a list argument
fn non_null_elements<'a>(
    value: &'a CqlValue,
    function: &str,
) -> EvalResult<Option<Vec<&'a CqlValue>>> {
    Ok(expect_list(value, function)?
        .map(|list| list.iter().filter(|v| !v.is_null()).collect()))
}

// ============================================================================
// Structural list operations
// ============================================================================

/// First element, null for empty
pub fn first(value: &CqlValue) -> EvalResult<CqlValue> {
    match expect_list(value, "First")? {
        None => Ok(CqlValue::Null),
        Some(list) => Ok(list.first().cloned().unwrap_or(CqlValue::Null)),
    }
}

/// Last element, null for empty
pub fn last(value: &CqlValue) -> EvalResult<CqlValue> {
    match expect_list(value, "Last")? {
        None => Ok(CqlValue::Null),
        Some(list) => Ok(list.last().cloned().unwrap_or(CqlValue::Null)),
    }
}

/// All but the first element
pub fn tail(value: &CqlValue) -> EvalResult<CqlValue> {
    match expect_list(value, "Tail")? {
        None => Ok(CqlValue::Null),
        Some(list) => Ok(CqlValue::list(
            list.iter().skip(1).cloned().collect(),
        )),
    }
}

/// The first `count` elements
pub fn take(value: &CqlValue, count: &CqlValue) -> EvalResult<CqlValue> {
    let Some(list) = expect_list(value, "Take")? else {
        return Ok(CqlValue::Null);
    };
    let count = match count {
        CqlValue::Null => return Ok(CqlValue::empty_list()),
        CqlValue::Integer(i) => (*i).max(0) as usize,
        other => {
            return Err(EvalError::invalid_operand(
                "Take",
                format!("expected Integer, found {}", other.type_name()),
            ));
        }
    };
    Ok(CqlValue::list(list.iter().take(count).cloned().collect()))
}

/// All elements after the first `count`
pub fn skip(value: &CqlValue, count: &CqlValue) -> EvalResult<CqlValue> {
    let Some(list) = expect_list(value, "Skip")? else {
        return Ok(CqlValue::Null);
    };
    let count = match count {
        CqlValue::Null => 0,
        CqlValue::Integer(i) => (*i).max(0) as usize,
        other => {
            return Err(EvalError::invalid_operand(
                "Skip",
                format!("expected Integer, found {}", other.type_name()),
            ));
        }
    };
    Ok(CqlValue::list(list.iter().skip(count).cloned().collect()))
}

/// Elements from `start` (inclusive) to `end` (exclusive)
pub fn slice(value: &CqlValue, start: &CqlValue, end: &CqlValue) -> EvalResult<CqlValue> {
    let Some(list) = expect_list(value, "Slice")? else {
        return Ok(CqlValue::Null);
    };
    let (CqlValue::Integer(start), CqlValue::Integer(end)) = (start, end) else {
        return Ok(CqlValue::Null);
    };
    let start = (*start).max(0) as usize;
    let end = (*end).max(0) as usize;
    if start >= end || start >= list.len() {
        return Ok(CqlValue::empty_list());
    }
    Ok(CqlValue::list(
        list.elements[start..end.min(list.len())].to_vec(),
    ))
}

/// Reversed copy
pub fn reverse(value: &CqlValue) -> EvalResult<CqlValue> {
    match expect_list(value, "Reverse")? {
        None => Ok(CqlValue::Null),
        Some(list) => Ok(CqlValue::list(
            list.elements.iter().rev().cloned().collect(),
        )),
    }
}

/// Length of a list
pub fn list_length(value: &CqlValue) -> EvalResult<CqlValue> {
    match expect_list(value, "Length")? {
        None => Ok(CqlValue::Integer(0)),
        Some(list) => Ok(CqlValue::Integer(list.len() as i64)),
    }
}

/// Whether a list has any non-null element; empty and null are false
pub fn exists(value: &CqlValue) -> EvalResult<CqlValue> {
    match value {
        CqlValue::Null => Ok(CqlValue::Boolean(false)),
        CqlValue::List(list) => Ok(CqlValue::Boolean(
            list.iter().any(|v| !v.is_null()),
        )),
        // A single value exists
        _ => Ok(CqlValue::Boolean(true)),
    }
}

/// Flatten one level of nesting
pub fn flatten(value: &CqlValue) -> EvalResult<CqlValue> {
    let Some(list) = expect_list(value, "Flatten")? else {
        return Ok(CqlValue::Null);
    };
    let mut result = Vec::new();
    for element in list.iter() {
        match element {
            CqlValue::List(inner) => result.extend(inner.elements.iter().cloned()),
            other => result.push(other.clone()),
        }
    }
    Ok(CqlValue::list(result))
}

/// Distinct elements, first occurrence preserved
pub fn distinct(value: &CqlValue, units: &dyn UnitConverter) -> EvalResult<CqlValue> {
    let Some(list) = expect_list(value, "Distinct")? else {
        return Ok(CqlValue::Null);
    };
    Ok(CqlValue::list(dedupe(list.elements.clone(), units)))
}

/// Deduplicate by definite equality; nulls collapse to a single null
pub fn dedupe(values: Vec<CqlValue>, units: &dyn UnitConverter) -> Vec<CqlValue> {
    let mut result: Vec<CqlValue> = Vec::new();
    for value in values {
        let duplicate = result.iter().any(|existing| {
            (existing.is_null() && value.is_null())
                || cql_equal(existing, &value, units) == Some(true)
        });
        if !duplicate {
            result.push(value);
        }
    }
    result
}

/// Natural ascending sort; nulls sort last
pub fn sort_values(value: &CqlValue, units: &dyn UnitConverter) -> EvalResult<CqlValue> {
    let Some(list) = expect_list(value, "Sort")? else {
        return Ok(CqlValue::Null);
    };
    let mut elements = list.elements.clone();
    elements.sort_by(|a, b| compare_for_sort(a, b, units));
    Ok(CqlValue::list(elements))
}

/// Total order for sorting: nulls last, incomparables equal
pub fn compare_for_sort(a: &CqlValue, b: &CqlValue, units: &dyn UnitConverter) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => cql_compare(a, b, units)
            .ok()
            .flatten()
            .unwrap_or(Ordering::Equal),
    }
}

/// 0-based index of the first equal element, -1 when absent
pub fn index_of(value: &CqlValue, element: &CqlValue, units: &dyn UnitConverter) -> EvalResult<CqlValue> {
    let Some(list) = expect_list(value, "IndexOf")? else {
        return Ok(CqlValue::Null);
    };
    if element.is_null() {
        return Ok(CqlValue::Null);
    }
    for (i, candidate) in list.iter().enumerate() {
        if cql_equal(candidate, element, units) == Some(true) {
            return Ok(CqlValue::Integer(i as i64));
        }
    }
    Ok(CqlValue::Integer(-1))
}

/// The single element of a list; more than one raises
pub fn singleton_from(value: &CqlValue) -> EvalResult<CqlValue> {
    match value {
        CqlValue::Null => Ok(CqlValue::Null),
        CqlValue::List(list) => match list.len() {
            0 => Ok(CqlValue::Null),
            1 => Ok(list.elements[0].clone()),
            count => Err(EvalErrorKind::SingletonRequired { count }.into()),
        },
        other => Ok(other.clone()),
    }
}

// ============================================================================
// Membership and set operations
// ============================================================================

/// Three-valued membership of an element in a list
pub fn element_in_list(
    element: &CqlValue,
    list: &CqlList,
    units: &dyn UnitConverter,
) -> Truth {
    if element.is_null() {
        return Truth::Unknown;
    }
    let mut unknown = false;
    for candidate in list.iter() {
        if candidate.is_null() {
            unknown = true;
            continue;
        }
        match cql_equal(candidate, element, units) {
            Some(true) => return Truth::True,
            Some(false) => {}
            None => unknown = true,
        }
    }
    if unknown { Truth::Unknown } else { Truth::False }
}

/// Whether every element of `sub` appears in `list`
pub fn list_includes_list(
    list: &CqlList,
    sub: &CqlList,
    units: &dyn UnitConverter,
) -> Truth {
    let mut result = Truth::True;
    for element in sub.iter() {
        result = result.and(element_in_list(element, list, units));
        if result == Truth::False {
            return Truth::False;
        }
    }
    result
}

/// Union: all elements of both lists, deduplicated
pub fn list_union(a: &CqlList, b: &CqlList, units: &dyn UnitConverter) -> CqlValue {
    let mut combined = a.elements.clone();
    combined.extend(b.elements.iter().cloned());
    CqlValue::list(dedupe(combined, units))
}

/// Intersect: elements of `a` also present in `b`, deduplicated
pub fn list_intersect(a: &CqlList, b: &CqlList, units: &dyn UnitConverter) -> CqlValue {
    let kept: Vec<CqlValue> = a
        .elements
        .iter()
        .filter(|element| element_in_list(element, b, units) == Truth::True)
        .cloned()
        .collect();
    CqlValue::list(dedupe(kept, units))
}

/// Except: elements of `a` not present in `b`, deduplicated
pub fn list_except(a: &CqlList, b: &CqlList, units: &dyn UnitConverter) -> CqlValue {
    let kept: Vec<CqlValue> = a
        .elements
        .iter()
        .filter(|element| element_in_list(element, b, units) != Truth::True)
        .cloned()
        .collect();
    CqlValue::list(dedupe(kept, units))
}

// ============================================================================
// Aggregates
// ============================================================================

/// Count of non-null elements; empty and null are 0
pub fn count(value: &CqlValue) -> EvalResult<CqlValue> {
    match non_null_elements(value, "Count")? {
        None => Ok(CqlValue::Integer(0)),
        Some(elements) => Ok(CqlValue::Integer(elements.len() as i64)),
    }
}

/// Sum of the non-null elements
pub fn sum(value: &CqlValue, units: &dyn UnitConverter) -> EvalResult<CqlValue> {
    let Some(elements) = non_null_elements(value, "Sum")? else {
        return Ok(CqlValue::Null);
    };
    if elements.is_empty() {
        return Ok(CqlValue::Null);
    }
    let mut total = elements[0].clone();
    for element in &elements[1..] {
        total = add_values(&total, element, units)?;
    }
    Ok(total)
}

/// Product of the non-null elements
pub fn product(value: &CqlValue, units: &dyn UnitConverter) -> EvalResult<CqlValue> {
    let Some(elements) = non_null_elements(value, "Product")? else {
        return Ok(CqlValue::Null);
    };
    if elements.is_empty() {
        return Ok(CqlValue::Null);
    }
    let mut total = elements[0].clone();
    for element in &elements[1..] {
        total = multiply_values(&total, element, units)?;
    }
    Ok(total)
}

/// Arithmetic mean of the non-null elements
pub fn avg(value: &CqlValue, units: &dyn UnitConverter) -> EvalResult<CqlValue> {
    let Some(elements) = non_null_elements(value, "Avg")? else {
        return Ok(CqlValue::Null);
    };
    if elements.is_empty() {
        return Ok(CqlValue::Null);
    }
    let total = sum(value, units)?;
    let divisor = Decimal::from(elements.len());
    match total {
        CqlValue::Integer(i) => Ok(CqlValue::Decimal(truncate_division(
            Decimal::from(i) / divisor,
        ))),
        CqlValue::Decimal(d) => Ok(CqlValue::Decimal(truncate_division(d / divisor))),
        CqlValue::Quantity(q) => Ok(CqlValue::Quantity(lumen_cql_types::CqlQuantity {
            value: truncate_division(q.value / divisor),
            unit: q.unit,
            original_unit: None,
        })),
        other => Ok(other),
    }
}

/// Minimum of the non-null elements
pub fn min(value: &CqlValue, units: &dyn UnitConverter) -> EvalResult<CqlValue> {
    extremum(value, units, Ordering::Less, "Min")
}

/// Maximum of the non-null elements
pub fn max(value: &CqlValue, units: &dyn UnitConverter) -> EvalResult<CqlValue> {
    extremum(value, units, Ordering::Greater, "Max")
}

fn extremum(
    value: &CqlValue,
    units: &dyn UnitConverter,
    keep: Ordering,
    function: &str,
) -> EvalResult<CqlValue> {
    let Some(elements) = non_null_elements(value, function)? else {
        return Ok(CqlValue::Null);
    };
    let Some(mut best) = elements.first().map(|v| (*v).clone()) else {
        return Ok(CqlValue::Null);
    };
    for element in &elements[1..] {
        if cql_compare(element, &best, units)? == Some(keep) {
            best = (*element).clone();
        }
    }
    Ok(best)
}

/// Median of the non-null numeric elements
pub fn median(value: &CqlValue, units: &dyn UnitConverter) -> EvalResult<CqlValue> {
    let decimals = numeric_elements(value, "Median")?;
    let Some(mut decimals) = decimals else {
        return Ok(CqlValue::Null);
    };
    if decimals.is_empty() {
        return Ok(CqlValue::Null);
    }
    decimals.sort();
    let mid = decimals.len() / 2;
    let result = if decimals.len() % 2 == 1 {
        decimals[mid]
    } else {
        truncate_division((decimals[mid - 1] + decimals[mid]) / Decimal::from(2))
    };
    let _ = units;
    Ok(CqlValue::Decimal(result))
}

/// Most frequent element; ties resolve to the smallest
pub fn mode(value: &CqlValue, units: &dyn UnitConverter) -> EvalResult<CqlValue> {
    let Some(elements) = non_null_elements(value, "Mode")? else {
        return Ok(CqlValue::Null);
    };
    if elements.is_empty() {
        return Ok(CqlValue::Null);
    }

    let mut best: Option<(&CqlValue, usize)> = None;
    for candidate in &elements {
        let frequency = elements
            .iter()
            .filter(|other| cql_equal(candidate, other, units) == Some(true))
            .count();
        best = match best {
            None => Some((candidate, frequency)),
            Some((current, current_frequency)) => {
                if frequency > current_frequency
                    || (frequency == current_frequency
                        && cql_compare(candidate, current, units)? == Some(Ordering::Less))
                {
                    Some((candidate, frequency))
                } else {
                    Some((current, current_frequency))
                }
            }
        };
    }
    Ok(best.map(|(v, _)| v.clone()).unwrap_or(CqlValue::Null))
}

fn numeric_elements(value: &CqlValue, function: &str) -> EvalResult<Option<Vec<Decimal>>> {
    let Some(elements) = non_null_elements(value, function)? else {
        return Ok(None);
    };
    let mut decimals = Vec::with_capacity(elements.len());
    for element in elements {
        match element.as_decimal() {
            Some(d) => decimals.push(d),
            None => {
                return Err(EvalError::invalid_operand(
                    function,
                    format!("expected numeric elements, found {}", element.type_name()),
                ));
            }
        }
    }
    Ok(Some(decimals))
}

fn variance_impl(value: &CqlValue, population: bool, function: &str) -> EvalResult<CqlValue> {
    let Some(decimals) = numeric_elements(value, function)? else {
        return Ok(CqlValue::Null);
    };
    let n = decimals.len();
    if n < 2 && !population {
        return Ok(CqlValue::Null);
    }
    if n == 0 {
        return Ok(CqlValue::Null);
    }
    let count = Decimal::from(n);
    let mean = decimals.iter().copied().sum::<Decimal>() / count;
    let squares: Decimal = decimals
        .iter()
        .map(|d| {
            let delta = *d - mean;
            delta * delta
        })
        .sum();
    let divisor = if population {
        count
    } else {
        Decimal::from(n - 1)
    };
    Ok(CqlValue::Decimal(truncate_division(squares / divisor)))
}

/// Sample variance
pub fn variance(value: &CqlValue) -> EvalResult<CqlValue> {
    variance_impl(value, false, "Variance")
}

/// Population variance
pub fn population_variance(value: &CqlValue) -> EvalResult<CqlValue> {
    variance_impl(value, true, "PopulationVariance")
}

fn stddev_impl(value: &CqlValue, population: bool, function: &str) -> EvalResult<CqlValue> {
    match variance_impl(value, population, function)? {
        CqlValue::Decimal(var) => {
            let f = var.to_f64().unwrap_or(f64::NAN);
            Ok(Decimal::from_f64(f.sqrt())
                .map(|d| CqlValue::Decimal(truncate_division(d)))
                .unwrap_or(CqlValue::Null))
        }
        other => Ok(other),
    }
}

/// Sample standard deviation
pub fn stddev(value: &CqlValue) -> EvalResult<CqlValue> {
    stddev_impl(value, false, "StdDev")
}

/// Population standard deviation
pub fn population_stddev(value: &CqlValue) -> EvalResult<CqlValue> {
    stddev_impl(value, true, "PopulationStdDev")
}

/// Geometric mean of the non-null positive elements
pub fn geometric_mean(value: &CqlValue) -> EvalResult<CqlValue> {
    let Some(decimals) = numeric_elements(value, "GeometricMean")? else {
        return Ok(CqlValue::Null);
    };
    if decimals.is_empty() {
        return Ok(CqlValue::Null);
    }
    let mut log_sum = 0.0f64;
    for d in &decimals {
        let f = d.to_f64().unwrap_or(f64::NAN);
        if f <= 0.0 {
            return Ok(CqlValue::Null);
        }
        log_sum += f.ln();
    }
    let mean = (log_sum / decimals.len() as f64).exp();
    Ok(Decimal::from_f64(mean)
        .map(|d| CqlValue::Decimal(truncate_division(d)))
        .unwrap_or(CqlValue::Null))
}

fn boolean_aggregate(
    value: &CqlValue,
    function: &str,
    fold: impl Fn(bool, bool) -> bool,
    start: bool,
) -> EvalResult<CqlValue> {
    let Some(elements) = non_null_elements(value, function)? else {
        return Ok(CqlValue::Boolean(start));
    };
    let mut acc = start;
    for element in elements {
        match element {
            CqlValue::Boolean(b) => acc = fold(acc, *b),
            other => {
                return Err(EvalError::invalid_operand(
                    function,
                    format!("expected Boolean elements, found {}", other.type_name()),
                ));
            }
        }
    }
    Ok(CqlValue::Boolean(acc))
}

/// True when every non-null element is true; vacuously true
pub fn all_true(value: &CqlValue) -> EvalResult<CqlValue> {
    boolean_aggregate(value, "AllTrue", |acc, b| acc && b, true)
}

/// True when any non-null element is true
pub fn any_true(value: &CqlValue) -> EvalResult<CqlValue> {
    boolean_aggregate(value, "AnyTrue", |acc, b| acc || b, false)
}

/// True when every non-null element is false; vacuously true
pub fn all_false(value: &CqlValue) -> EvalResult<CqlValue> {
    boolean_aggregate(value, "AllFalse", |acc, b| acc && !b, true)
}

/// True when any non-null element is false
pub fn any_false(value: &CqlValue) -> EvalResult<CqlValue> {
    boolean_aggregate(value, "AnyFalse", |acc, b| acc || !b, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::StandardUnitConverter;
    use pretty_assertions::assert_eq;

    fn units() -> StandardUnitConverter {
        StandardUnitConverter::new()
    }

    fn ints(values: &[i64]) -> CqlValue {
        CqlValue::list(values.iter().map(|i| CqlValue::integer(*i)).collect())
    }

    #[test]
    fn test_first_last_tail() {
        let list = ints(&[1, 2, 3]);
        assert_eq!(first(&list).unwrap(), CqlValue::integer(1));
        assert_eq!(last(&list).unwrap(), CqlValue::integer(3));
        assert_eq!(tail(&list).unwrap(), ints(&[2, 3]));
        assert_eq!(first(&CqlValue::empty_list()).unwrap(), CqlValue::Null);
    }

    #[test]
    fn test_take_skip() {
        let list = ints(&[1, 2, 3, 4]);
        assert_eq!(take(&list, &CqlValue::integer(2)).unwrap(), ints(&[1, 2]));
        assert_eq!(skip(&list, &CqlValue::integer(2)).unwrap(), ints(&[3, 4]));
    }

    #[test]
    fn test_distinct() {
        let list = ints(&[1, 2, 2, 3, 3, 3]);
        assert_eq!(distinct(&list, &units()).unwrap(), ints(&[1, 2, 3]));
    }

    #[test]
    fn test_membership_null_semantics() {
        let list = CqlValue::list(vec![CqlValue::integer(1), CqlValue::Null]);
        let CqlValue::List(list) = &list else { unreachable!() };

        // A match wins even with a null present
        assert_eq!(element_in_list(&CqlValue::integer(1), list, &units()), Truth::True);
        // No match plus a null element: unknown, not false
        assert_eq!(
            element_in_list(&CqlValue::integer(9), list, &units()),
            Truth::Unknown
        );

        let plain = CqlList::from_elements(vec![CqlValue::integer(1)]);
        assert_eq!(
            element_in_list(&CqlValue::integer(9), &plain, &units()),
            Truth::False
        );
    }

    #[test]
    fn test_set_operations() {
        let CqlValue::List(a) = ints(&[1, 2, 3]) else { unreachable!() };
        let CqlValue::List(b) = ints(&[2, 3, 4]) else { unreachable!() };
        assert_eq!(list_union(&a, &b, &units()), ints(&[1, 2, 3, 4]));
        assert_eq!(list_intersect(&a, &b, &units()), ints(&[2, 3]));
        assert_eq!(list_except(&a, &b, &units()), ints(&[1]));
    }

    #[test]
    fn test_singleton_from() {
        assert_eq!(singleton_from(&ints(&[7])).unwrap(), CqlValue::integer(7));
        assert_eq!(singleton_from(&CqlValue::empty_list()).unwrap(), CqlValue::Null);
        assert!(singleton_from(&ints(&[1, 2])).is_err());
    }

    #[test]
    fn test_aggregates_skip_nulls() {
        let list = CqlValue::list(vec![
            CqlValue::integer(1),
            CqlValue::Null,
            CqlValue::integer(2),
        ]);
        assert_eq!(count(&list).unwrap(), CqlValue::integer(2));
        assert_eq!(sum(&list, &units()).unwrap(), CqlValue::integer(3));
    }

    #[test]
    fn test_avg() {
        let list = ints(&[1, 2, 3, 4]);
        assert_eq!(
            avg(&list, &units()).unwrap(),
            CqlValue::Decimal(Decimal::new(25, 1))
        );
    }

    #[test]
    fn test_median() {
        assert_eq!(
            median(&ints(&[3, 1, 2]), &units()).unwrap(),
            CqlValue::Decimal(Decimal::from(2))
        );
        assert_eq!(
            median(&ints(&[1, 2, 3, 4]), &units()).unwrap(),
            CqlValue::Decimal(Decimal::new(25, 1))
        );
    }

    #[test]
    fn test_mode() {
        assert_eq!(
            mode(&ints(&[1, 2, 2, 3]), &units()).unwrap(),
            CqlValue::integer(2)
        );
    }

    #[test]
    fn test_variance_and_stddev() {
        let list = ints(&[2, 4, 4, 4, 5, 5, 7, 9]);
        assert_eq!(
            population_variance(&list).unwrap(),
            CqlValue::Decimal(Decimal::from(4))
        );
        assert_eq!(
            population_stddev(&list).unwrap(),
            CqlValue::Decimal(Decimal::from(2))
        );
        // Sample variance uses n-1
        assert_eq!(
            variance(&ints(&[1, 2, 3])).unwrap(),
            CqlValue::Decimal(Decimal::from(1))
        );
    }

    #[test]
    fn test_boolean_aggregates() {
        let mixed = CqlValue::list(vec![
            CqlValue::Boolean(true),
            CqlValue::Null,
            CqlValue::Boolean(false),
        ]);
        assert_eq!(all_true(&mixed).unwrap(), CqlValue::Boolean(false));
        assert_eq!(any_true(&mixed).unwrap(), CqlValue::Boolean(true));
        assert_eq!(all_false(&mixed).unwrap(), CqlValue::Boolean(false));
        assert_eq!(any_false(&mixed).unwrap(), CqlValue::Boolean(true));

        // Vacuous truths on empty input
        assert_eq!(all_true(&CqlValue::empty_list()).unwrap(), CqlValue::Boolean(true));
        assert_eq!(any_true(&CqlValue::empty_list()).unwrap(), CqlValue::Boolean(false));
    }

    #[test]
    fn test_sort_nulls_last() {
        let list = CqlValue::list(vec![
            CqlValue::integer(3),
            CqlValue::Null,
            CqlValue::integer(1),
        ]);
        assert_eq!(
            sort_values(&list, &units()).unwrap(),
            CqlValue::list(vec![
                CqlValue::integer(1),
                CqlValue::integer(3),
                CqlValue::Null,
            ])
        );
    }

    #[test]
    fn test_index_of() {
        let list = ints(&[5, 6, 7]);
        assert_eq!(index_of(&list, &CqlValue::integer(6), &units()).unwrap(), CqlValue::integer(1));
        assert_eq!(index_of(&list, &CqlValue::integer(9), &units()).unwrap(), CqlValue::integer(-1));
    }
}
