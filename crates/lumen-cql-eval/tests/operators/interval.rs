//! Interval operator tests through the AST: relations, set operations,
//! collapse and accessors

use super::{eval, int, int_list};
use lumen_cql_ast::{BinaryOp, CollapseExpr, Expr, ExprKind, RelationOp, UnaryOp};
use lumen_cql_types::{CqlInterval, CqlValue};
use pretty_assertions::assert_eq;

fn iv(low: i64, high: i64) -> Expr {
    Expr::interval(int(low), true, int(high), true)
}

fn iv_value(low: i64, high: i64) -> CqlValue {
    CqlValue::Interval(CqlInterval::closed(
        CqlValue::integer(low),
        CqlValue::integer(high),
    ))
}

#[test]
fn test_contains_and_in() {
    assert_eq!(
        eval(Expr::relation(RelationOp::Contains, iv(3, 5), int(4))),
        CqlValue::Boolean(true)
    );
    assert_eq!(
        eval(Expr::relation(RelationOp::In, int(6), iv(3, 5))),
        CqlValue::Boolean(false)
    );
}

#[test]
fn test_membership_in_list_with_null() {
    // A null element with no match makes membership unknown
    let list = Expr::list(vec![int(1), Expr::null()]);
    assert_eq!(
        eval(Expr::relation(RelationOp::In, int(9), list)),
        CqlValue::Null
    );
    let list = Expr::list(vec![int(1), Expr::null()]);
    assert_eq!(
        eval(Expr::relation(RelationOp::In, int(1), list)),
        CqlValue::Boolean(true)
    );
}

#[test]
fn test_overlaps_boundary_cases() {
    // Interval[3,5] overlaps Interval[5,7]
    assert_eq!(
        eval(Expr::relation(RelationOp::Overlaps, iv(3, 5), iv(5, 7))),
        CqlValue::Boolean(true)
    );
    // Interval[3,5) does not
    let half_open = Expr::interval(int(3), true, int(5), false);
    assert_eq!(
        eval(Expr::relation(RelationOp::Overlaps, half_open, iv(5, 7))),
        CqlValue::Boolean(false)
    );
}

#[test]
fn test_before_after_meets() {
    assert_eq!(
        eval(Expr::relation(RelationOp::Before, iv(1, 2), iv(4, 5))),
        CqlValue::Boolean(true)
    );
    assert_eq!(
        eval(Expr::relation(RelationOp::After, iv(4, 5), iv(1, 2))),
        CqlValue::Boolean(true)
    );
    assert_eq!(
        eval(Expr::relation(RelationOp::Meets, iv(1, 2), iv(3, 4))),
        CqlValue::Boolean(true)
    );
}

#[test]
fn test_includes_family() {
    assert_eq!(
        eval(Expr::relation(RelationOp::Includes, iv(1, 10), iv(2, 5))),
        CqlValue::Boolean(true)
    );
    assert_eq!(
        eval(Expr::relation(RelationOp::IncludedIn, iv(2, 5), iv(1, 10))),
        CqlValue::Boolean(true)
    );
    assert_eq!(
        eval(Expr::relation(RelationOp::ProperIncludes, iv(1, 10), iv(1, 10))),
        CqlValue::Boolean(false)
    );
}

#[test]
fn test_list_includes() {
    assert_eq!(
        eval(Expr::relation(
            RelationOp::Includes,
            int_list(&[1, 2, 3]),
            int_list(&[2, 3])
        )),
        CqlValue::Boolean(true)
    );
    assert_eq!(
        eval(Expr::relation(
            RelationOp::ProperIncludes,
            int_list(&[1, 2, 3]),
            int_list(&[1, 2, 3])
        )),
        CqlValue::Boolean(false)
    );
}

#[test]
fn test_union_of_touching_intervals() {
    // Interval[3,5] union Interval[5,7] = Interval[3,7]
    assert_eq!(
        eval(Expr::binary(BinaryOp::Union, iv(3, 5), iv(5, 7))),
        iv_value(3, 7)
    );
    // Disjoint: null
    assert_eq!(
        eval(Expr::binary(BinaryOp::Union, iv(1, 2), iv(5, 7))),
        CqlValue::Null
    );
}

#[test]
fn test_intersect_and_except() {
    assert_eq!(
        eval(Expr::binary(BinaryOp::Intersect, iv(1, 5), iv(3, 8))),
        iv_value(3, 5)
    );
    let except = eval(Expr::binary(BinaryOp::Except, iv(1, 10), iv(5, 15)));
    assert_eq!(
        except,
        CqlValue::Interval(CqlInterval::closed_open(
            CqlValue::integer(1),
            CqlValue::integer(5)
        ))
    );
}

#[test]
fn test_collapse() {
    let source = Expr::list(vec![iv(1, 3), iv(2, 4), iv(10, 12)]);
    let expr = Expr::new(ExprKind::Collapse(CollapseExpr {
        source: source.boxed(),
        per: None,
    }));
    assert_eq!(
        eval(expr),
        CqlValue::list(vec![iv_value(1, 4), iv_value(10, 12)])
    );
}

#[test]
fn test_accessors() {
    assert_eq!(eval(Expr::unary(UnaryOp::Start, iv(3, 9))), CqlValue::integer(3));
    assert_eq!(eval(Expr::unary(UnaryOp::End, iv(3, 9))), CqlValue::integer(9));
    assert_eq!(eval(Expr::unary(UnaryOp::Width, iv(3, 9))), CqlValue::integer(6));
    assert_eq!(eval(Expr::unary(UnaryOp::Size, iv(3, 9))), CqlValue::integer(7));
    assert_eq!(
        eval(Expr::unary(UnaryOp::PointFrom, iv(4, 4))),
        CqlValue::integer(4)
    );
}

#[test]
fn test_relation_with_null_endpoint_is_unknown() {
    let unknown_high = Expr::interval(int(1), true, Expr::null(), true);
    assert_eq!(
        eval(Expr::relation(RelationOp::Before, unknown_high, iv(10, 12))),
        CqlValue::Null
    );
}

#[test]
fn test_point_timing_via_unit_interval() {
    // Point before interval
    assert_eq!(
        eval(Expr::relation(RelationOp::Before, int(1), iv(5, 9))),
        CqlValue::Boolean(true)
    );
    // Interval after point
    assert_eq!(
        eval(Expr::relation(RelationOp::After, iv(5, 9), int(1))),
        CqlValue::Boolean(true)
    );
}
