//! Temporal operator tests: literals, arithmetic, durations,
//! components, timing relations

use super::{date, eval, int};
use lumen_cql_ast::{
    BetweenExpr, BinaryOp, ComponentExpr, DateLiteral, Expr, ExprKind, RelationOp,
    TemporalPrecision,
};
use lumen_cql_eval::{CqlEvaluator, EvaluationContext};
use lumen_cql_types::{CqlDate, CqlDateTime, CqlValue};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

fn duration(low: Expr, high: Expr, precision: TemporalPrecision) -> Expr {
    Expr::new(ExprKind::DurationBetween(BetweenExpr {
        low: low.boxed(),
        high: high.boxed(),
        precision,
    }))
}

#[test]
fn test_year_component_of_partial_date() {
    // year from @2020-06
    let expr = Expr::new(ExprKind::DateTimeComponentFrom(ComponentExpr {
        operand: Expr::date(DateLiteral::new(2020).with_month(6)).boxed(),
        component: TemporalPrecision::Year,
    }));
    assert_eq!(eval(expr), CqlValue::integer(2020));
}

#[test]
fn test_missing_component_is_null() {
    let expr = Expr::new(ExprKind::DateTimeComponentFrom(ComponentExpr {
        operand: Expr::date(DateLiteral::new(2020).with_month(6)).boxed(),
        component: TemporalPrecision::Day,
    }));
    assert_eq!(eval(expr), CqlValue::Null);
}

#[test]
fn test_leap_day_year_arithmetic() {
    // @2020-02-29 + 1 year = @2021-02-28
    let expr = Expr::binary(
        BinaryOp::Add,
        date(2020, 2, 29),
        Expr::quantity(Decimal::from(1), "year"),
    );
    assert_eq!(eval(expr), CqlValue::Date(CqlDate::new(2021, 2, 28)));
}

#[test]
fn test_add_then_subtract_year_is_identity() {
    let plus = Expr::binary(
        BinaryOp::Add,
        date(2019, 6, 15),
        Expr::quantity(Decimal::from(1), "year"),
    );
    let round_trip = Expr::binary(
        BinaryOp::Subtract,
        plus,
        Expr::quantity(Decimal::from(1), "year"),
    );
    assert_eq!(eval(round_trip), CqlValue::Date(CqlDate::new(2019, 6, 15)));
}

#[test]
fn test_ucum_unit_aliases_in_date_arithmetic() {
    let expr = Expr::binary(
        BinaryOp::Add,
        date(2024, 1, 1),
        Expr::quantity(Decimal::from(2), "wk"),
    );
    assert_eq!(eval(expr), CqlValue::Date(CqlDate::new(2024, 1, 15)));
}

#[test]
fn test_duration_between_completed_years() {
    assert_eq!(
        eval(duration(date(2000, 1, 15), date(2001, 1, 14), TemporalPrecision::Year)),
        CqlValue::integer(0)
    );
    assert_eq!(
        eval(duration(date(2000, 1, 15), date(2001, 1, 15), TemporalPrecision::Year)),
        CqlValue::integer(1)
    );
}

#[test]
fn test_duration_between_days_and_weeks() {
    assert_eq!(
        eval(duration(date(2024, 1, 1), date(2024, 2, 1), TemporalPrecision::Day)),
        CqlValue::integer(31)
    );
    assert_eq!(
        eval(duration(date(2024, 1, 1), date(2024, 1, 29), TemporalPrecision::Week)),
        CqlValue::integer(4)
    );
}

#[test]
fn test_difference_counts_boundaries() {
    let expr = Expr::new(ExprKind::DifferenceBetween(BetweenExpr {
        low: date(2023, 12, 31).boxed(),
        high: date(2024, 1, 1).boxed(),
        precision: TemporalPrecision::Year,
    }));
    assert_eq!(eval(expr), CqlValue::integer(1));
}

#[test]
fn test_timing_relations_with_precision() {
    // same year as
    assert_eq!(
        eval(Expr::relation_at(
            RelationOp::SameAs,
            date(2024, 1, 1),
            date(2024, 12, 31),
            TemporalPrecision::Year
        )),
        CqlValue::Boolean(true)
    );
    // before at month precision
    assert_eq!(
        eval(Expr::relation_at(
            RelationOp::Before,
            date(2024, 1, 31),
            date(2024, 2, 1),
            TemporalPrecision::Month
        )),
        CqlValue::Boolean(true)
    );
    // same month: before at month precision is false
    assert_eq!(
        eval(Expr::relation_at(
            RelationOp::Before,
            date(2024, 2, 1),
            date(2024, 2, 28),
            TemporalPrecision::Month
        )),
        CqlValue::Boolean(false)
    );
}

#[test]
fn test_today_now_are_fixed_per_context() {
    let fixed = CqlDateTime::new(2024, 6, 1, 12, 0, 0, 0, Some(0));
    let evaluator = CqlEvaluator::new();
    let mut ctx = EvaluationContext::new().with_now(fixed);

    let today = evaluator.evaluate(&Expr::new(ExprKind::Today), &mut ctx).unwrap();
    assert_eq!(today, CqlValue::Date(CqlDate::new(2024, 6, 1)));

    let now = evaluator.evaluate(&Expr::new(ExprKind::Now), &mut ctx).unwrap();
    assert_eq!(now, CqlValue::DateTime(fixed));
}

#[test]
fn test_datetime_constructor_function() {
    let expr = Expr::function(
        "DateTime",
        vec![int(2024), int(3), int(15), int(10), int(30)],
    );
    match eval(expr) {
        CqlValue::DateTime(dt) => {
            assert_eq!(dt.year, 2024);
            assert_eq!(dt.minute, Some(30));
            assert_eq!(dt.second, None);
        }
        other => panic!("expected datetime, got {other:?}"),
    }
}

#[test]
fn test_invalid_constructor_component_is_an_error() {
    let expr = Expr::function("Date", vec![int(2024), int(13)]);
    assert!(CqlEvaluator::new()
        .evaluate(&expr, &mut EvaluationContext::new())
        .is_err());
}
