//! Comparison operator tests: equality, equivalence, orderings,
//! three-valued results across precisions

use super::{date, dec, eval, int, text};
use lumen_cql_ast::{BinaryOp, DateLiteral, Expr};
use lumen_cql_types::CqlValue;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

#[test]
fn test_equal_and_not_equal() {
    assert_eq!(eval(Expr::binary(BinaryOp::Equal, int(3), int(3))), CqlValue::Boolean(true));
    assert_eq!(eval(Expr::binary(BinaryOp::Equal, int(3), int(4))), CqlValue::Boolean(false));
    assert_eq!(eval(Expr::binary(BinaryOp::NotEqual, int(3), int(4))), CqlValue::Boolean(true));
}

#[test]
fn test_equal_with_null_is_null() {
    assert_eq!(eval(Expr::binary(BinaryOp::Equal, int(3), Expr::null())), CqlValue::Null);
    // null = null is null, not true
    assert_eq!(
        eval(Expr::binary(BinaryOp::Equal, Expr::null(), Expr::null())),
        CqlValue::Null
    );
}

#[test]
fn test_equivalent_with_nulls() {
    assert_eq!(
        eval(Expr::binary(BinaryOp::Equivalent, Expr::null(), Expr::null())),
        CqlValue::Boolean(true)
    );
    assert_eq!(
        eval(Expr::binary(BinaryOp::Equivalent, int(1), Expr::null())),
        CqlValue::Boolean(false)
    );
}

#[test]
fn test_cross_type_numeric_equality() {
    assert_eq!(
        eval(Expr::binary(BinaryOp::Equal, int(3), dec("3.0"))),
        CqlValue::Boolean(true)
    );
}

#[test]
fn test_orderings() {
    assert_eq!(eval(Expr::binary(BinaryOp::Less, int(1), int(2))), CqlValue::Boolean(true));
    assert_eq!(
        eval(Expr::binary(BinaryOp::GreaterOrEqual, int(2), int(2))),
        CqlValue::Boolean(true)
    );
    assert_eq!(
        eval(Expr::binary(BinaryOp::Greater, text("apple"), text("banana"))),
        CqlValue::Boolean(false)
    );
}

#[test]
fn test_date_cross_precision_equality_is_null() {
    // @2020 = @2020-06 is null: different precision, equal prefix
    let year_only = Expr::date(DateLiteral::new(2020));
    let year_month = Expr::date(DateLiteral::new(2020).with_month(6));
    assert_eq!(
        eval(Expr::binary(BinaryOp::Equal, year_only, year_month)),
        CqlValue::Null
    );
}

#[test]
fn test_date_ordering_decided_above_precision() {
    let earlier = Expr::date(DateLiteral::new(2019));
    let later = Expr::date(DateLiteral::new(2020).with_month(6));
    assert_eq!(
        eval(Expr::binary(BinaryOp::Less, earlier, later)),
        CqlValue::Boolean(true)
    );
}

#[test]
fn test_date_equality_at_full_precision() {
    assert_eq!(
        eval(Expr::binary(BinaryOp::Equal, date(2024, 3, 1), date(2024, 3, 1))),
        CqlValue::Boolean(true)
    );
}

#[test]
fn test_quantity_comparison_with_conversion() {
    let kg = Expr::quantity(Decimal::from(1), "kg");
    let g = Expr::quantity(Decimal::from(900), "g");
    assert_eq!(eval(Expr::binary(BinaryOp::Greater, kg, g)), CqlValue::Boolean(true));
}

#[test]
fn test_list_equality() {
    let a = super::int_list(&[1, 2, 3]);
    let b = super::int_list(&[1, 2, 3]);
    assert_eq!(eval(Expr::binary(BinaryOp::Equal, a, b)), CqlValue::Boolean(true));

    let shorter = super::int_list(&[1, 2]);
    assert_eq!(
        eval(Expr::binary(BinaryOp::Equal, super::int_list(&[1, 2, 3]), shorter)),
        CqlValue::Boolean(false)
    );
}

#[test]
fn test_string_equivalence_ignores_case() {
    assert_eq!(
        eval(Expr::binary(BinaryOp::Equivalent, text("ABC"), text("abc"))),
        CqlValue::Boolean(true)
    );
    assert_eq!(
        eval(Expr::binary(BinaryOp::Equal, text("ABC"), text("abc"))),
        CqlValue::Boolean(false)
    );
}
