//! Query pipeline integration tests
//!
//! Single and multi-source queries, let bindings, with/without
//! semi-joins, where filtering, return/aggregate selection and sort.

use lumen_cql_ast::{
    AggregateClause, BinaryOp, Expr, Query, RelatedSource, RelationshipClause, SortClause,
    SortDirection,
};
use lumen_cql_eval::{CqlEvaluator, EvaluationContext};
use lumen_cql_types::CqlValue;
use pretty_assertions::assert_eq;

fn eval_query(query: Query) -> CqlValue {
    CqlEvaluator::new()
        .evaluate(&Expr::query(query), &mut EvaluationContext::new())
        .unwrap()
}

fn int_list(values: &[i64]) -> Expr {
    Expr::list(values.iter().map(|i| Expr::integer(*i)).collect())
}

fn ints(values: &[i64]) -> CqlValue {
    CqlValue::list(values.iter().map(|i| CqlValue::integer(*i)).collect())
}

#[test]
fn test_simple_return() {
    let query = Query::from_source(int_list(&[1, 2, 3]), "X").with_return(Expr::alias_ref("X"));
    assert_eq!(eval_query(query), ints(&[1, 2, 3]));
}

#[test]
fn test_no_return_single_source_yields_elements() {
    // No row wrappers without a return clause
    let query = Query::from_source(int_list(&[4, 5]), "X")
        .with_where(Expr::binary(BinaryOp::Greater, Expr::alias_ref("X"), Expr::integer(4)));
    assert_eq!(eval_query(query), ints(&[5]));
}

#[test]
fn test_where_filters_null_and_false() {
    // X > null is null for every row: all rows drop
    let query = Query::from_source(int_list(&[1, 2]), "X")
        .with_where(Expr::binary(BinaryOp::Greater, Expr::alias_ref("X"), Expr::null()));
    assert_eq!(eval_query(query), ints(&[]));
}

#[test]
fn test_let_bindings_are_visible_downstream() {
    // from [1,2,3] X let Y: X * 10 where Y > 15 return Y
    let query = Query::from_source(int_list(&[1, 2, 3]), "X")
        .with_let(
            "Y",
            Expr::binary(BinaryOp::Multiply, Expr::alias_ref("X"), Expr::integer(10)),
        )
        .with_where(Expr::binary(
            BinaryOp::Greater,
            Expr::alias_ref("Y"),
            Expr::integer(15),
        ))
        .with_return(Expr::alias_ref("Y"));
    assert_eq!(eval_query(query), ints(&[20, 30]));
}

#[test]
fn test_let_sees_earlier_lets() {
    let query = Query::from_source(int_list(&[1]), "X")
        .with_let(
            "A",
            Expr::binary(BinaryOp::Add, Expr::alias_ref("X"), Expr::integer(1)),
        )
        .with_let(
            "B",
            Expr::binary(BinaryOp::Add, Expr::alias_ref("A"), Expr::integer(1)),
        )
        .with_return(Expr::alias_ref("B"));
    assert_eq!(eval_query(query), ints(&[3]));
}

#[test]
fn test_multi_source_cartesian_product() {
    let query = Query::from_source(int_list(&[1, 2]), "A")
        .with_source(int_list(&[10, 20]), "B")
        .with_return_all(Expr::binary(
            BinaryOp::Add,
            Expr::alias_ref("A"),
            Expr::alias_ref("B"),
        ));
    assert_eq!(eval_query(query), ints(&[11, 21, 12, 22]));
}

#[test]
fn test_return_deduplicates_by_default() {
    let query = Query::from_source(int_list(&[1, 2, 2, 3, 3]), "X")
        .with_return(Expr::alias_ref("X"));
    assert_eq!(eval_query(query), ints(&[1, 2, 3]));
}

#[test]
fn test_return_all_keeps_duplicates() {
    let query = Query::from_source(int_list(&[1, 2, 2]), "X")
        .with_return_all(Expr::alias_ref("X"));
    assert_eq!(eval_query(query), ints(&[1, 2, 2]));
}

#[test]
fn test_with_clause_is_a_semi_join() {
    // from [1,2,3] X with [2,3,4] R such that R = X
    // Rows keep or drop; they never duplicate
    let query = Query::from_source(int_list(&[1, 2, 3]), "X")
        .with_relationship(RelationshipClause::With(RelatedSource {
            expression: int_list(&[2, 3, 4]).boxed(),
            alias: "R".to_string(),
            such_that: Expr::binary(
                BinaryOp::Equal,
                Expr::alias_ref("R"),
                Expr::alias_ref("X"),
            )
            .boxed(),
        }))
        .with_return_all(Expr::alias_ref("X"));
    assert_eq!(eval_query(query), ints(&[2, 3]));
}

#[test]
fn test_without_clause_keeps_non_matching_rows() {
    let query = Query::from_source(int_list(&[1, 2, 3]), "X")
        .with_relationship(RelationshipClause::Without(RelatedSource {
            expression: int_list(&[2, 3, 4]).boxed(),
            alias: "R".to_string(),
            such_that: Expr::binary(
                BinaryOp::Equal,
                Expr::alias_ref("R"),
                Expr::alias_ref("X"),
            )
            .boxed(),
        }))
        .with_return_all(Expr::alias_ref("X"));
    assert_eq!(eval_query(query), ints(&[1]));
}

#[test]
fn test_sort_descending() {
    let query = Query::from_source(int_list(&[3, 1, 2]), "X")
        .with_return_all(Expr::alias_ref("X"))
        .with_sort(SortClause::natural(SortDirection::Descending));
    assert_eq!(eval_query(query), ints(&[3, 2, 1]));
}

#[test]
fn test_sort_by_expression_with_this() {
    use lumen_cql_ast::ExprKind;
    // sort by -$this ascending = descending values
    let key = Expr::unary(lumen_cql_ast::UnaryOp::Negate, Expr::new(ExprKind::This));
    let query = Query::from_source(int_list(&[1, 3, 2]), "X")
        .with_return_all(Expr::alias_ref("X"))
        .with_sort(SortClause::by_expression(key, SortDirection::Ascending));
    assert_eq!(eval_query(query), ints(&[3, 2, 1]));
}

#[test]
fn test_sort_places_nulls_last() {
    let source = Expr::list(vec![Expr::integer(2), Expr::null(), Expr::integer(1)]);
    let query = Query::from_source(source, "X")
        .with_return_all(Expr::alias_ref("X"))
        .with_sort(SortClause::natural(SortDirection::Ascending));
    assert_eq!(
        eval_query(query),
        CqlValue::list(vec![CqlValue::integer(1), CqlValue::integer(2), CqlValue::Null])
    );
}

#[test]
fn test_aggregate_folds_rows() {
    // aggregate Total starting 0: Total + X
    let query = Query::from_source(int_list(&[1, 2, 3, 4]), "X").with_aggregate(AggregateClause {
        identifier: "Total".to_string(),
        starting: Some(Expr::integer(0).boxed()),
        expression: Expr::binary(
            BinaryOp::Add,
            Expr::alias_ref("Total"),
            Expr::alias_ref("X"),
        )
        .boxed(),
        distinct: false,
    });
    assert_eq!(eval_query(query), CqlValue::integer(10));
}

#[test]
fn test_aggregate_distinct_deduplicates_rows() {
    let query = Query::from_source(int_list(&[5, 5, 5]), "X").with_aggregate(AggregateClause {
        identifier: "Total".to_string(),
        starting: Some(Expr::integer(0).boxed()),
        expression: Expr::binary(
            BinaryOp::Add,
            Expr::alias_ref("Total"),
            Expr::alias_ref("X"),
        )
        .boxed(),
        distinct: true,
    });
    assert_eq!(eval_query(query), CqlValue::integer(5));
}

#[test]
fn test_aggregate_without_starting_begins_null() {
    use lumen_cql_ast::ExprKind;
    // Coalesce(Total, 0) + X sums while tolerating the null start
    let body = Expr::binary(
        BinaryOp::Add,
        Expr::new(ExprKind::Coalesce(vec![
            Expr::alias_ref("Total"),
            Expr::integer(0),
        ])),
        Expr::alias_ref("X"),
    );
    let query = Query::from_source(int_list(&[1, 2]), "X").with_aggregate(AggregateClause {
        identifier: "Total".to_string(),
        starting: None,
        expression: body.boxed(),
        distinct: false,
    });
    assert_eq!(eval_query(query), CqlValue::integer(3));
}

#[test]
fn test_empty_source_yields_empty_list() {
    let query = Query::from_source(Expr::list(vec![]), "X").with_return(Expr::alias_ref("X"));
    assert_eq!(eval_query(query), ints(&[]));
}

#[test]
fn test_null_source_is_empty() {
    let query = Query::from_source(Expr::null(), "X").with_return(Expr::alias_ref("X"));
    assert_eq!(eval_query(query), ints(&[]));
}
