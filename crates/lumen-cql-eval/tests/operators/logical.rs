//! Logical operator tests: Kleene truth tables, conditionals,
//! short-circuit branch selection

use super::{eval, int};
use lumen_cql_ast::{BinaryOp, CaseExpr, CaseItem, Expr, ExprKind, UnaryOp};
use lumen_cql_types::CqlValue;
use pretty_assertions::assert_eq;

fn b(value: bool) -> Expr {
    Expr::boolean(value)
}

#[test]
fn test_and_truth_table() {
    assert_eq!(eval(Expr::binary(BinaryOp::And, b(true), b(true))), CqlValue::Boolean(true));
    assert_eq!(eval(Expr::binary(BinaryOp::And, b(true), Expr::null())), CqlValue::Null);
    // false dominates null
    assert_eq!(
        eval(Expr::binary(BinaryOp::And, b(false), Expr::null())),
        CqlValue::Boolean(false)
    );
}

#[test]
fn test_or_truth_table() {
    // true dominates null
    assert_eq!(
        eval(Expr::binary(BinaryOp::Or, b(true), Expr::null())),
        CqlValue::Boolean(true)
    );
    assert_eq!(eval(Expr::binary(BinaryOp::Or, b(false), Expr::null())), CqlValue::Null);
    assert_eq!(
        eval(Expr::binary(BinaryOp::Or, b(false), b(false))),
        CqlValue::Boolean(false)
    );
}

#[test]
fn test_xor_and_implies() {
    assert_eq!(eval(Expr::binary(BinaryOp::Xor, b(true), b(false))), CqlValue::Boolean(true));
    assert_eq!(eval(Expr::binary(BinaryOp::Xor, b(true), Expr::null())), CqlValue::Null);

    assert_eq!(
        eval(Expr::binary(BinaryOp::Implies, b(false), Expr::null())),
        CqlValue::Boolean(true)
    );
    assert_eq!(
        eval(Expr::binary(BinaryOp::Implies, Expr::null(), b(true))),
        CqlValue::Boolean(true)
    );
    assert_eq!(
        eval(Expr::binary(BinaryOp::Implies, Expr::null(), b(false))),
        CqlValue::Null
    );
}

#[test]
fn test_not() {
    assert_eq!(eval(Expr::unary(UnaryOp::Not, b(true))), CqlValue::Boolean(false));
    assert_eq!(eval(Expr::unary(UnaryOp::Not, Expr::null())), CqlValue::Null);
}

#[test]
fn test_null_tests_never_return_null() {
    assert_eq!(eval(Expr::unary(UnaryOp::IsNull, Expr::null())), CqlValue::Boolean(true));
    assert_eq!(eval(Expr::unary(UnaryOp::IsTrue, Expr::null())), CqlValue::Boolean(false));
    assert_eq!(eval(Expr::unary(UnaryOp::IsFalse, b(false))), CqlValue::Boolean(true));
}

#[test]
fn test_coalesce() {
    let expr = Expr::new(ExprKind::Coalesce(vec![Expr::null(), Expr::null(), int(7), int(9)]));
    assert_eq!(eval(expr), CqlValue::integer(7));

    let all_null = Expr::new(ExprKind::Coalesce(vec![Expr::null(), Expr::null()]));
    assert_eq!(eval(all_null), CqlValue::Null);
}

#[test]
fn test_if_selects_branch() {
    assert_eq!(
        eval(Expr::if_then_else(b(true), int(1), int(2))),
        CqlValue::integer(1)
    );
    // null condition selects the else branch
    assert_eq!(
        eval(Expr::if_then_else(Expr::null(), int(1), int(2))),
        CqlValue::integer(2)
    );
}

#[test]
fn test_if_does_not_evaluate_unselected_branch() {
    // The unselected branch would raise on evaluation
    let failing = Expr::expression_ref("BOOM");
    assert_eq!(
        eval(Expr::if_then_else(b(true), int(1), failing)),
        CqlValue::integer(1)
    );
}

#[test]
fn test_case_with_comparand() {
    let expr = Expr::new(ExprKind::Case(CaseExpr {
        comparand: Some(int(2).boxed()),
        items: vec![
            CaseItem { when: int(1), then: Expr::string("one") },
            CaseItem { when: int(2), then: Expr::string("two") },
        ],
        else_: Expr::string("other").boxed(),
    }));
    assert_eq!(eval(expr), CqlValue::string("two"));
}

#[test]
fn test_case_without_comparand_falls_to_else() {
    let expr = Expr::new(ExprKind::Case(CaseExpr {
        comparand: None,
        items: vec![CaseItem { when: b(false), then: int(1) }],
        else_: int(99).boxed(),
    }));
    assert_eq!(eval(expr), CqlValue::integer(99));
}
