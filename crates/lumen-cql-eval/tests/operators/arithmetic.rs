//! Arithmetic operator tests

use super::{dec, eval, int};
use lumen_cql_ast::{BinaryOp, Expr, UnaryOp};
use lumen_cql_types::CqlValue;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use std::str::FromStr;

#[test]
fn test_precedence_free_arithmetic() {
    // 2 + 3 * 4 built as Add(2, Multiply(3, 4))
    let expr = Expr::binary(
        BinaryOp::Add,
        int(2),
        Expr::binary(BinaryOp::Multiply, int(3), int(4)),
    );
    assert_eq!(eval(expr), CqlValue::integer(14));
}

#[test]
fn test_integer_division_is_decimal() {
    let expr = Expr::binary(BinaryOp::Divide, int(10), int(3));
    assert_eq!(
        eval(expr),
        CqlValue::Decimal(Decimal::from_str("3.33333333").unwrap())
    );
}

#[test]
fn test_truncated_divide() {
    assert_eq!(
        eval(Expr::binary(BinaryOp::TruncatedDivide, int(10), int(3))),
        CqlValue::integer(3)
    );
    assert_eq!(
        eval(Expr::binary(BinaryOp::TruncatedDivide, int(-10), int(3))),
        CqlValue::integer(-3)
    );
}

#[test]
fn test_modulo_keeps_dividend_sign() {
    assert_eq!(
        eval(Expr::binary(BinaryOp::Modulo, int(-7), int(3))),
        CqlValue::integer(-1)
    );
    assert_eq!(
        eval(Expr::binary(BinaryOp::Modulo, int(7), int(3))),
        CqlValue::integer(1)
    );
}

#[test]
fn test_division_by_zero_is_null() {
    assert_eq!(eval(Expr::binary(BinaryOp::Divide, int(1), int(0))), CqlValue::Null);
    assert_eq!(
        eval(Expr::binary(BinaryOp::TruncatedDivide, int(1), int(0))),
        CqlValue::Null
    );
    assert_eq!(eval(Expr::binary(BinaryOp::Modulo, int(1), int(0))), CqlValue::Null);
}

#[test]
fn test_overflow_is_an_error() {
    let expr = Expr::binary(BinaryOp::Add, int(i64::MAX), int(1));
    assert!(super::evaluator().evaluate(&expr, &mut super::ctx()).is_err());
}

#[test]
fn test_null_propagation() {
    assert_eq!(
        eval(Expr::binary(BinaryOp::Add, int(3), Expr::null())),
        CqlValue::Null
    );
    assert_eq!(
        eval(Expr::binary(BinaryOp::Multiply, Expr::null(), int(3))),
        CqlValue::Null
    );
}

#[test]
fn test_power() {
    assert_eq!(eval(Expr::binary(BinaryOp::Power, int(2), int(10))), CqlValue::integer(1024));
    assert_eq!(
        eval(Expr::binary(BinaryOp::Power, dec("2.0"), int(2))),
        CqlValue::Decimal(Decimal::from(4))
    );
}

#[test]
fn test_negate() {
    assert_eq!(eval(Expr::unary(UnaryOp::Negate, int(7))), CqlValue::integer(-7));
    assert_eq!(
        eval(Expr::unary(UnaryOp::Negate, dec("1.5"))),
        CqlValue::Decimal(Decimal::from_str("-1.5").unwrap())
    );
}

#[test]
fn test_decimal_addition() {
    assert_eq!(
        eval(Expr::binary(BinaryOp::Add, dec("1.5"), dec("2.25"))),
        CqlValue::Decimal(Decimal::from_str("3.75").unwrap())
    );
}

#[test]
fn test_quantity_addition_converts_units() {
    let expr = Expr::binary(
        BinaryOp::Add,
        Expr::quantity(Decimal::from(1), "g"),
        Expr::quantity(Decimal::from(500), "mg"),
    );
    match eval(expr) {
        CqlValue::Quantity(q) => {
            assert_eq!(q.value, Decimal::from_str("1.5").unwrap());
            assert_eq!(q.unit.as_deref(), Some("g"));
        }
        other => panic!("expected quantity, got {other:?}"),
    }
}

#[test]
fn test_quantity_multiplication_combines_units() {
    let expr = Expr::binary(
        BinaryOp::Multiply,
        Expr::quantity(Decimal::from(3), "cm"),
        Expr::quantity(Decimal::from(4), "cm"),
    );
    match eval(expr) {
        CqlValue::Quantity(q) => {
            assert_eq!(q.value, Decimal::from(12));
            assert_eq!(q.unit.as_deref(), Some("cm2"));
        }
        other => panic!("expected quantity, got {other:?}"),
    }
}

#[test]
fn test_quantity_division_cancels_units() {
    let expr = Expr::binary(
        BinaryOp::Divide,
        Expr::quantity(Decimal::from(10), "mg"),
        Expr::quantity(Decimal::from(4), "mg"),
    );
    match eval(expr) {
        CqlValue::Quantity(q) => {
            assert_eq!(q.value, Decimal::from_str("2.5").unwrap());
            assert_eq!(q.unit.as_deref(), Some("1"));
        }
        other => panic!("expected quantity, got {other:?}"),
    }
}

#[test]
fn test_incompatible_quantity_addition_is_an_error() {
    let expr = Expr::binary(
        BinaryOp::Add,
        Expr::quantity(Decimal::from(1), "g"),
        Expr::quantity(Decimal::from(1), "cm"),
    );
    assert!(super::evaluator().evaluate(&expr, &mut super::ctx()).is_err());
}

#[test]
fn test_concatenate_treats_null_as_empty() {
    let expr = Expr::binary(BinaryOp::Concatenate, super::text("ab"), Expr::null());
    assert_eq!(eval(expr), CqlValue::string("ab"));
}

#[test]
fn test_string_plus_requires_non_null() {
    let expr = Expr::binary(BinaryOp::Add, super::text("ab"), Expr::null());
    assert_eq!(eval(expr), CqlValue::Null);
}

#[test]
fn test_math_functions_via_registry() {
    assert_eq!(eval(Expr::function("Abs", vec![int(-4)])), CqlValue::integer(4));
    assert_eq!(eval(Expr::function("Ceiling", vec![dec("1.1")])), CqlValue::integer(2));
    assert_eq!(eval(Expr::function("Floor", vec![dec("1.9")])), CqlValue::integer(1));
    assert_eq!(eval(Expr::function("Truncate", vec![dec("-1.9")])), CqlValue::integer(-1));
    assert_eq!(
        eval(Expr::function("Round", vec![dec("2.5")])),
        CqlValue::Decimal(Decimal::from(3))
    );
    assert_eq!(
        eval(Expr::function("Sqrt", vec![dec("16")])),
        CqlValue::Decimal(Decimal::from(4))
    );
}

#[test]
fn test_boundary_functions() {
    // LowBoundary(1.587, 8) pads with zeros; HighBoundary with nines
    let low = eval(Expr::function("LowBoundary", vec![dec("1.587"), int(8)]));
    assert_eq!(low, CqlValue::Decimal(Decimal::from_str("1.58700000").unwrap()));
    let high = eval(Expr::function("HighBoundary", vec![dec("1.587"), int(8)]));
    assert_eq!(high, CqlValue::Decimal(Decimal::from_str("1.58799999").unwrap()));
}

#[test]
fn test_successor_predecessor_roundtrip() {
    let expr = Expr::unary(UnaryOp::Successor, Expr::unary(UnaryOp::Predecessor, int(5)));
    assert_eq!(eval(expr), CqlValue::integer(5));

    assert_eq!(
        eval(Expr::unary(UnaryOp::Successor, dec("1.0"))),
        CqlValue::Decimal(Decimal::from_str("1.00000001").unwrap())
    );
}
