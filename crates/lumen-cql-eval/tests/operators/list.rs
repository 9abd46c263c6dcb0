//! List operator tests through the AST and registry functions

use super::{eval, int, int_list};
use lumen_cql_ast::{BinaryOp, Expr, ExprKind, IterationExpr, UnaryOp};
use lumen_cql_types::CqlValue;
use pretty_assertions::assert_eq;

fn ints(values: &[i64]) -> CqlValue {
    CqlValue::list(values.iter().map(|i| CqlValue::integer(*i)).collect())
}

#[test]
fn test_exists() {
    assert_eq!(
        eval(Expr::unary(UnaryOp::Exists, int_list(&[1]))),
        CqlValue::Boolean(true)
    );
    assert_eq!(
        eval(Expr::unary(UnaryOp::Exists, Expr::list(vec![]))),
        CqlValue::Boolean(false)
    );
    // A list of nulls has nothing
    assert_eq!(
        eval(Expr::unary(UnaryOp::Exists, Expr::list(vec![Expr::null()]))),
        CqlValue::Boolean(false)
    );
}

#[test]
fn test_distinct_invariants() {
    // Distinct(L).Length <= L.Length, every element of Distinct(L) in L
    let distinct = eval(Expr::unary(UnaryOp::Distinct, int_list(&[3, 1, 3, 2, 1])));
    assert_eq!(distinct, ints(&[3, 1, 2]));
}

#[test]
fn test_flatten() {
    let nested = Expr::list(vec![int_list(&[1, 2]), int_list(&[3]), int_list(&[])]);
    assert_eq!(eval(Expr::unary(UnaryOp::Flatten, nested)), ints(&[1, 2, 3]));
}

#[test]
fn test_singleton_from() {
    assert_eq!(
        eval(Expr::unary(UnaryOp::SingletonFrom, int_list(&[5]))),
        CqlValue::integer(5)
    );
    let multi = Expr::unary(UnaryOp::SingletonFrom, int_list(&[1, 2]));
    assert!(super::evaluator().evaluate(&multi, &mut super::ctx()).is_err());
}

#[test]
fn test_list_set_operations() {
    assert_eq!(
        eval(Expr::binary(BinaryOp::Union, int_list(&[1, 2]), int_list(&[2, 3]))),
        ints(&[1, 2, 3])
    );
    assert_eq!(
        eval(Expr::binary(BinaryOp::Intersect, int_list(&[1, 2, 3]), int_list(&[2, 3, 4]))),
        ints(&[2, 3])
    );
    assert_eq!(
        eval(Expr::binary(BinaryOp::Except, int_list(&[1, 2, 3]), int_list(&[2]))),
        ints(&[1, 3])
    );
}

#[test]
fn test_first_last_via_registry() {
    assert_eq!(eval(Expr::function("First", vec![int_list(&[7, 8])])), CqlValue::integer(7));
    assert_eq!(eval(Expr::function("Last", vec![int_list(&[7, 8])])), CqlValue::integer(8));
    assert_eq!(eval(Expr::function("Tail", vec![int_list(&[7, 8, 9])])), ints(&[8, 9]));
    assert_eq!(
        eval(Expr::function("Take", vec![int_list(&[7, 8, 9]), int(2)])),
        ints(&[7, 8])
    );
    assert_eq!(
        eval(Expr::function("Skip", vec![int_list(&[7, 8, 9]), int(1)])),
        ints(&[8, 9])
    );
    assert_eq!(
        eval(Expr::function("Reverse", vec![int_list(&[1, 2, 3])])),
        ints(&[3, 2, 1])
    );
    assert_eq!(
        eval(Expr::function("IndexOf", vec![int_list(&[5, 6]), int(6)])),
        CqlValue::integer(1)
    );
    assert_eq!(
        eval(Expr::function("Slice", vec![int_list(&[1, 2, 3, 4]), int(1), int(3)])),
        ints(&[2, 3])
    );
}

#[test]
fn test_length_dispatches_on_type() {
    assert_eq!(
        eval(Expr::function("Length", vec![int_list(&[1, 2, 3])])),
        CqlValue::integer(3)
    );
    assert_eq!(
        eval(Expr::function("Length", vec![Expr::string("héllo")])),
        CqlValue::integer(5)
    );
}

#[test]
fn test_sort_function_nulls_last() {
    let list = Expr::list(vec![int(3), Expr::null(), int(1)]);
    assert_eq!(
        eval(Expr::function("Sort", vec![list])),
        CqlValue::list(vec![CqlValue::integer(1), CqlValue::integer(3), CqlValue::Null])
    );
}

#[test]
fn test_for_each_binds_this_and_index() {
    // ForEach([10, 20], $this + $index)
    let body = Expr::binary(
        BinaryOp::Add,
        Expr::new(ExprKind::This),
        Expr::new(ExprKind::IndexVar),
    );
    let expr = Expr::new(ExprKind::ForEach(IterationExpr {
        source: int_list(&[10, 20]).boxed(),
        body: body.boxed(),
    }));
    assert_eq!(eval(expr), ints(&[10, 21]));
}

#[test]
fn test_filter_keeps_definite_matches() {
    // Filter([1, 2, 3, 4], $this > 2)
    let body = Expr::binary(BinaryOp::Greater, Expr::new(ExprKind::This), int(2));
    let expr = Expr::new(ExprKind::Filter(IterationExpr {
        source: int_list(&[1, 2, 3, 4]).boxed(),
        body: body.boxed(),
    }));
    assert_eq!(eval(expr), ints(&[3, 4]));
}
