//! Aggregate function tests

use super::{eval, int_list};
use lumen_cql_ast::Expr;
use lumen_cql_types::CqlValue;
use pretty_assertions::assert_eq;
use rstest::rstest;
use rust_decimal::Decimal;
use std::str::FromStr;

fn agg(name: &str, source: Expr) -> CqlValue {
    eval(Expr::function(name, vec![source]))
}

#[test]
fn test_count_sum_avg() {
    assert_eq!(agg("Count", int_list(&[1, 2, 3])), CqlValue::integer(3));
    assert_eq!(agg("Sum", int_list(&[1, 2, 3])), CqlValue::integer(6));
    assert_eq!(
        agg("Avg", int_list(&[1, 2, 3, 4])),
        CqlValue::Decimal(Decimal::from_str("2.5").unwrap())
    );
}

#[test]
fn test_aggregates_skip_nulls() {
    let list = Expr::list(vec![Expr::integer(2), Expr::null(), Expr::integer(4)]);
    assert_eq!(agg("Count", list), CqlValue::integer(2));
    let list = Expr::list(vec![Expr::integer(2), Expr::null(), Expr::integer(4)]);
    assert_eq!(agg("Sum", list), CqlValue::integer(6));
}

#[test]
fn test_empty_aggregates() {
    assert_eq!(agg("Count", Expr::list(vec![])), CqlValue::integer(0));
    assert_eq!(agg("Sum", Expr::list(vec![])), CqlValue::Null);
    assert_eq!(agg("Max", Expr::list(vec![])), CqlValue::Null);
}

#[test]
fn test_min_max() {
    assert_eq!(agg("Min", int_list(&[5, 1, 9])), CqlValue::integer(1));
    assert_eq!(agg("Max", int_list(&[5, 1, 9])), CqlValue::integer(9));
}

#[rstest]
#[case(&[3, 1, 2], "2")]
#[case(&[1, 2, 3, 4], "2.5")]
fn test_median(#[case] values: &[i64], #[case] expected: &str) {
    assert_eq!(
        agg("Median", int_list(values)),
        CqlValue::Decimal(Decimal::from_str(expected).unwrap())
    );
}

#[test]
fn test_mode() {
    assert_eq!(agg("Mode", int_list(&[1, 2, 2, 3])), CqlValue::integer(2));
}

#[test]
fn test_variance_family() {
    let list = int_list(&[2, 4, 4, 4, 5, 5, 7, 9]);
    assert_eq!(
        agg("PopulationVariance", list),
        CqlValue::Decimal(Decimal::from(4))
    );
    assert_eq!(
        agg("PopulationStdDev", int_list(&[2, 4, 4, 4, 5, 5, 7, 9])),
        CqlValue::Decimal(Decimal::from(2))
    );
    assert_eq!(
        agg("Variance", int_list(&[1, 2, 3])),
        CqlValue::Decimal(Decimal::from(1))
    );
}

#[test]
fn test_product_and_geometric_mean() {
    assert_eq!(agg("Product", int_list(&[2, 3, 4])), CqlValue::integer(24));
    assert_eq!(
        agg("GeometricMean", int_list(&[2, 8])),
        CqlValue::Decimal(Decimal::from(4))
    );
}

#[test]
fn test_boolean_aggregates() {
    let mixed = Expr::list(vec![Expr::boolean(true), Expr::null(), Expr::boolean(false)]);
    assert_eq!(agg("AllTrue", mixed), CqlValue::Boolean(false));
    let mixed = Expr::list(vec![Expr::boolean(true), Expr::null(), Expr::boolean(false)]);
    assert_eq!(agg("AnyTrue", mixed), CqlValue::Boolean(true));
    let trues = Expr::list(vec![Expr::boolean(true), Expr::null()]);
    assert_eq!(agg("AllTrue", trues), CqlValue::Boolean(true));
    assert_eq!(agg("AnyFalse", Expr::list(vec![])), CqlValue::Boolean(false));
}
