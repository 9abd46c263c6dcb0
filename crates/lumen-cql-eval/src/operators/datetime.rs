//! Temporal operators
//!
//! Duration and difference between temporal values, component extraction,
//! precision-qualified timing comparison, and the Date/DateTime/Time
//! constructor functions.

use crate::context::EvaluationContext;
use crate::engine::CqlEvaluator;
use crate::error::{EvalError, EvalErrorKind, EvalResult};
use lumen_cql_ast::{BetweenExpr, ComponentExpr, TemporalPrecision, UnaryExpr};
use lumen_cql_types::{
    difference_between_dates, difference_between_datetimes, difference_between_times,
    duration_between_dates, duration_between_datetimes, duration_between_times, CalendarUnit,
    CqlDate, CqlDateTime, CqlTime, CqlValue, DateTimePrecision, days_in_month,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// AST precision to the value-model precision (week maps to day)
pub fn convert_precision(precision: TemporalPrecision) -> DateTimePrecision {
    match precision {
        TemporalPrecision::Year => DateTimePrecision::Year,
        TemporalPrecision::Month => DateTimePrecision::Month,
        TemporalPrecision::Week | TemporalPrecision::Day => DateTimePrecision::Day,
        TemporalPrecision::Hour => DateTimePrecision::Hour,
        TemporalPrecision::Minute => DateTimePrecision::Minute,
        TemporalPrecision::Second => DateTimePrecision::Second,
        TemporalPrecision::Millisecond => DateTimePrecision::Millisecond,
    }
}

/// AST precision to the calendar unit used by durations
pub fn precision_unit(precision: TemporalPrecision) -> CalendarUnit {
    match precision {
        TemporalPrecision::Year => CalendarUnit::Year,
        TemporalPrecision::Month => CalendarUnit::Month,
        TemporalPrecision::Week => CalendarUnit::Week,
        TemporalPrecision::Day => CalendarUnit::Day,
        TemporalPrecision::Hour => CalendarUnit::Hour,
        TemporalPrecision::Minute => CalendarUnit::Minute,
        TemporalPrecision::Second => CalendarUnit::Second,
        TemporalPrecision::Millisecond => CalendarUnit::Millisecond,
    }
}

impl CqlEvaluator {
    /// Whole completed units between two temporal values
    pub(crate) fn eval_duration_between(
        &self,
        expr: &BetweenExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let low = self.eval_scalar_operand(&expr.low, ctx)?;
        let high = self.eval_scalar_operand(&expr.high, ctx)?;
        if low.is_null() || high.is_null() {
            return Ok(CqlValue::Null);
        }
        duration_between_values(&low, &high, precision_unit(expr.precision))
    }

    /// Boundary-count difference between two temporal values
    pub(crate) fn eval_difference_between(
        &self,
        expr: &BetweenExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let low = self.eval_scalar_operand(&expr.low, ctx)?;
        let high = self.eval_scalar_operand(&expr.high, ctx)?;
        if low.is_null() || high.is_null() {
            return Ok(CqlValue::Null);
        }
        difference_between_values(&low, &high, precision_unit(expr.precision))
    }

    /// `year from x`, `month from x`, ... component extraction
    pub(crate) fn eval_component_from(
        &self,
        expr: &ComponentExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let operand = self.eval_scalar_operand(&expr.operand, ctx)?;
        if operand.is_null() {
            return Ok(CqlValue::Null);
        }
        component_from(&operand, convert_precision(expr.component))
    }

    /// `date from x`
    pub(crate) fn eval_date_from(
        &self,
        expr: &UnaryExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        match self.eval_scalar_operand(&expr.operand, ctx)? {
            CqlValue::Null => Ok(CqlValue::Null),
            CqlValue::DateTime(dt) => Ok(CqlValue::Date(dt.date())),
            CqlValue::Date(d) => Ok(CqlValue::Date(d)),
            other => Err(EvalError::type_mismatch("DateTime", other.type_name())),
        }
    }

    /// `time from x`
    pub(crate) fn eval_time_from(
        &self,
        expr: &UnaryExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        match self.eval_scalar_operand(&expr.operand, ctx)? {
            CqlValue::Null => Ok(CqlValue::Null),
            CqlValue::DateTime(dt) => Ok(dt
                .time()
                .map(CqlValue::Time)
                .unwrap_or(CqlValue::Null)),
            CqlValue::Time(t) => Ok(CqlValue::Time(t)),
            other => Err(EvalError::type_mismatch("DateTime", other.type_name())),
        }
    }

    /// `timezoneoffset from x`, as decimal hours
    pub(crate) fn eval_timezone_offset_from(
        &self,
        expr: &UnaryExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        match self.eval_scalar_operand(&expr.operand, ctx)? {
            CqlValue::Null => Ok(CqlValue::Null),
            CqlValue::DateTime(dt) => Ok(dt
                .timezone_offset
                .map(|minutes| {
                    CqlValue::Decimal(Decimal::from(minutes) / Decimal::from(60))
                })
                .unwrap_or(CqlValue::Null)),
            other => Err(EvalError::type_mismatch("DateTime", other.type_name())),
        }
    }
}

/// Duration dispatch over value pairs; Date operands promote to DateTime
/// when mixed
pub fn duration_between_values(
    low: &CqlValue,
    high: &CqlValue,
    unit: CalendarUnit,
) -> EvalResult<CqlValue> {
    let result = match (low, high) {
        (CqlValue::Date(a), CqlValue::Date(b)) => duration_between_dates(a, b, unit),
        (CqlValue::DateTime(a), CqlValue::DateTime(b)) => {
            duration_between_datetimes(a, b, unit)
        }
        // Mixed operands compare at date precision
        (CqlValue::Date(a), CqlValue::DateTime(b)) => {
            duration_between_dates(a, &b.normalized_to_utc().date(), unit)
        }
        (CqlValue::DateTime(a), CqlValue::Date(b)) => {
            duration_between_dates(&a.normalized_to_utc().date(), b, unit)
        }
        (CqlValue::Time(a), CqlValue::Time(b)) => duration_between_times(a, b, unit),
        _ => {
            return Err(EvalError::type_mismatch(
                "temporal value",
                format!("{} and {}", low.type_name(), high.type_name()),
            ));
        }
    };
    Ok(result.map(CqlValue::Integer).unwrap_or(CqlValue::Null))
}

/// Difference dispatch over value pairs
pub fn difference_between_values(
    low: &CqlValue,
    high: &CqlValue,
    unit: CalendarUnit,
) -> EvalResult<CqlValue> {
    let result = match (low, high) {
        (CqlValue::Date(a), CqlValue::Date(b)) => difference_between_dates(a, b, unit),
        (CqlValue::DateTime(a), CqlValue::DateTime(b)) => {
            difference_between_datetimes(a, b, unit)
        }
        // Mixed operands compare at date precision
        (CqlValue::Date(a), CqlValue::DateTime(b)) => {
            difference_between_dates(a, &b.normalized_to_utc().date(), unit)
        }
        (CqlValue::DateTime(a), CqlValue::Date(b)) => {
            difference_between_dates(&a.normalized_to_utc().date(), b, unit)
        }
        (CqlValue::Time(a), CqlValue::Time(b)) => difference_between_times(a, b, unit),
        _ => {
            return Err(EvalError::type_mismatch(
                "temporal value",
                format!("{} and {}", low.type_name(), high.type_name()),
            ));
        }
    };
    Ok(result.map(CqlValue::Integer).unwrap_or(CqlValue::Null))
}

/// Extract one component of a temporal value; components beyond the
/// value's precision are null
pub fn component_from(value: &CqlValue, component: DateTimePrecision) -> EvalResult<CqlValue> {
    let extracted: Option<i64> = match value {
        CqlValue::Date(d) => match component {
            DateTimePrecision::Year => Some(d.year as i64),
            DateTimePrecision::Month => d.month.map(i64::from),
            DateTimePrecision::Day => d.day.map(i64::from),
            _ => None,
        },
        CqlValue::DateTime(dt) => match component {
            DateTimePrecision::Year => Some(dt.year as i64),
            DateTimePrecision::Month => dt.month.map(i64::from),
            DateTimePrecision::Day => dt.day.map(i64::from),
            DateTimePrecision::Hour => dt.hour.map(i64::from),
            DateTimePrecision::Minute => dt.minute.map(i64::from),
            DateTimePrecision::Second => dt.second.map(i64::from),
            DateTimePrecision::Millisecond => dt.millisecond.map(i64::from),
        },
        CqlValue::Time(t) => match component {
            DateTimePrecision::Hour => Some(t.hour as i64),
            DateTimePrecision::Minute => t.minute.map(i64::from),
            DateTimePrecision::Second => t.second.map(i64::from),
            DateTimePrecision::Millisecond => t.millisecond.map(i64::from),
            _ => None,
        },
        other => {
            return Err(EvalError::type_mismatch(
                "temporal value",
                other.type_name(),
            ));
        }
    };
    Ok(extracted.map(CqlValue::Integer).unwrap_or(CqlValue::Null))
}

/// Truncate a temporal value to a precision, for qualified timing
/// comparisons
pub fn truncate_temporal(value: &CqlValue, precision: DateTimePrecision) -> CqlValue {
    match value {
        CqlValue::Date(d) => {
            let mut d = *d;
            if precision < DateTimePrecision::Day {
                d.day = None;
            }
            if precision < DateTimePrecision::Month {
                d.month = None;
            }
            CqlValue::Date(d)
        }
        CqlValue::DateTime(dt) => {
            let mut dt = dt.normalized_to_utc();
            if precision < DateTimePrecision::Millisecond {
                dt.millisecond = None;
            }
            if precision < DateTimePrecision::Second {
                dt.second = None;
            }
            if precision < DateTimePrecision::Minute {
                dt.minute = None;
            }
            if precision < DateTimePrecision::Hour {
                dt.hour = None;
            }
            if precision < DateTimePrecision::Day {
                dt.day = None;
            }
            if precision < DateTimePrecision::Month {
                dt.month = None;
            }
            CqlValue::DateTime(dt)
        }
        CqlValue::Time(t) => {
            let mut t = *t;
            if precision < DateTimePrecision::Millisecond {
                t.millisecond = None;
            }
            if precision < DateTimePrecision::Second {
                t.second = None;
            }
            if precision < DateTimePrecision::Minute {
                t.minute = None;
            }
            CqlValue::Time(t)
        }
        other => other.clone(),
    }
}

/// Precision-qualified ordering between temporal values; `None` when the
/// operands do not reach the precision
pub fn temporal_compare_at(
    left: &CqlValue,
    right: &CqlValue,
    precision: Option<DateTimePrecision>,
) -> Option<Ordering> {
    let (left, right) = match precision {
        Some(p) => (truncate_temporal(left, p), truncate_temporal(right, p)),
        None => (left.clone(), right.clone()),
    };
    match (&left, &right) {
        (CqlValue::Date(a), CqlValue::Date(b)) => a.partial_cmp(b),
        (CqlValue::DateTime(a), CqlValue::DateTime(b)) => a.partial_cmp(b),
        (CqlValue::Date(a), CqlValue::DateTime(b)) => {
            CqlDateTime::from_date(*a).partial_cmp(b)
        }
        (CqlValue::DateTime(a), CqlValue::Date(b)) => {
            a.partial_cmp(&CqlDateTime::from_date(*b))
        }
        (CqlValue::Time(a), CqlValue::Time(b)) => a.partial_cmp(b),
        _ => None,
    }
}

// ============================================================================
// Constructor functions
// ============================================================================

fn optional_component(args: &[CqlValue], index: usize, name: &str) -> EvalResult<Option<i64>> {
    match args.get(index) {
        None | Some(CqlValue::Null) => Ok(None),
        Some(CqlValue::Integer(i)) => Ok(Some(*i)),
        Some(other) => Err(EvalErrorKind::InvalidDateTimeComponent {
            component: name.to_string(),
            value: other.to_string(),
        }
        .into()),
    }
}

fn check_range(value: i64, low: i64, high: i64, component: &str) -> EvalResult<()> {
    if (low..=high).contains(&value) {
        Ok(())
    } else {
        Err(EvalErrorKind::InvalidDateTimeComponent {
            component: component.to_string(),
            value: value.to_string(),
        }
        .into())
    }
}

/// `Date(year, month?, day?)`
pub fn build_date(args: &[CqlValue]) -> EvalResult<CqlValue> {
    let Some(year) = optional_component(args, 0, "year")? else {
        return Ok(CqlValue::Null);
    };
    check_range(year, 1, 9999, "year")?;
    let month = optional_component(args, 1, "month")?;
    let day = optional_component(args, 2, "day")?;
    if let Some(m) = month {
        check_range(m, 1, 12, "month")?;
    }
    if let Some(d) = day {
        let max = month
            .map(|m| days_in_month(year as i32, m as u8) as i64)
            .unwrap_or(31);
        check_range(d, 1, max, "day")?;
    }
    Ok(CqlValue::Date(CqlDate {
        year: year as i32,
        month: month.map(|m| m as u8),
        day: day.map(|d| d as u8),
    }))
}

/// `DateTime(year, ..., timezoneOffset?)`; the offset argument is in
/// decimal hours
pub fn build_datetime(args: &[CqlValue]) -> EvalResult<CqlValue> {
    let date = match build_date(&args[..args.len().min(3)])? {
        CqlValue::Date(d) => d,
        _ => return Ok(CqlValue::Null),
    };
    let hour = optional_component(args, 3, "hour")?;
    let minute = optional_component(args, 4, "minute")?;
    let second = optional_component(args, 5, "second")?;
    let millisecond = optional_component(args, 6, "millisecond")?;
    if let Some(h) = hour {
        check_range(h, 0, 23, "hour")?;
    }
    if let Some(m) = minute {
        check_range(m, 0, 59, "minute")?;
    }
    if let Some(s) = second {
        check_range(s, 0, 59, "second")?;
    }
    if let Some(ms) = millisecond {
        check_range(ms, 0, 999, "millisecond")?;
    }
    let timezone_offset = match args.get(7) {
        None | Some(CqlValue::Null) => None,
        Some(CqlValue::Decimal(hours)) => {
            Some(((*hours * Decimal::from(60)).round()).to_i64().unwrap_or(0) as i16)
        }
        Some(CqlValue::Integer(hours)) => Some((*hours * 60) as i16),
        Some(other) => return Err(EvalError::type_mismatch("Decimal", other.type_name())),
    };

    Ok(CqlValue::DateTime(CqlDateTime {
        year: date.year,
        month: date.month,
        day: date.day,
        hour: hour.map(|v| v as u8),
        minute: minute.map(|v| v as u8),
        second: second.map(|v| v as u8),
        millisecond: millisecond.map(|v| v as u16),
        timezone_offset,
    }))
}

/// `Time(hour, minute?, second?, millisecond?)`
pub fn build_time(args: &[CqlValue]) -> EvalResult<CqlValue> {
    let Some(hour) = optional_component(args, 0, "hour")? else {
        return Ok(CqlValue::Null);
    };
    check_range(hour, 0, 23, "hour")?;
    let minute = optional_component(args, 1, "minute")?;
    let second = optional_component(args, 2, "second")?;
    let millisecond = optional_component(args, 3, "millisecond")?;
    if let Some(m) = minute {
        check_range(m, 0, 59, "minute")?;
    }
    if let Some(s) = second {
        check_range(s, 0, 59, "second")?;
    }
    if let Some(ms) = millisecond {
        check_range(ms, 0, 999, "millisecond")?;
    }
    Ok(CqlValue::Time(CqlTime {
        hour: hour as u8,
        minute: minute.map(|v| v as u8),
        second: second.map(|v| v as u8),
        millisecond: millisecond.map(|v| v as u16),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_component_from() {
        let date = CqlValue::Date(CqlDate::year_month(2020, 6));
        assert_eq!(
            component_from(&date, DateTimePrecision::Year).unwrap(),
            CqlValue::Integer(2020)
        );
        assert_eq!(
            component_from(&date, DateTimePrecision::Month).unwrap(),
            CqlValue::Integer(6)
        );
        assert_eq!(
            component_from(&date, DateTimePrecision::Day).unwrap(),
            CqlValue::Null
        );
    }

    #[test]
    fn test_build_date_validates() {
        assert!(build_date(&[CqlValue::integer(2024), CqlValue::integer(13)]).is_err());
        assert!(build_date(&[
            CqlValue::integer(2023),
            CqlValue::integer(2),
            CqlValue::integer(29)
        ])
        .is_err());
        assert_eq!(
            build_date(&[CqlValue::integer(2024), CqlValue::integer(2), CqlValue::integer(29)])
                .unwrap(),
            CqlValue::Date(CqlDate::new(2024, 2, 29))
        );
    }

    #[test]
    fn test_temporal_compare_at_precision() {
        let a = CqlValue::Date(CqlDate::new(2024, 3, 10));
        let b = CqlValue::Date(CqlDate::new(2024, 5, 2));
        assert_eq!(
            temporal_compare_at(&a, &b, Some(DateTimePrecision::Year)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            temporal_compare_at(&a, &b, Some(DateTimePrecision::Month)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_duration_between_values_mixed() {
        let d = CqlValue::Date(CqlDate::new(2024, 1, 1));
        let dt = CqlValue::DateTime(CqlDateTime::new(2024, 3, 1, 0, 0, 0, 0, None));
        assert_eq!(
            duration_between_values(&d, &dt, CalendarUnit::Month).unwrap(),
            CqlValue::Integer(2)
        );
    }

    #[test]
    fn test_timezone_offset_in_datetime_constructor() {
        let result = build_datetime(&[
            CqlValue::integer(2024),
            CqlValue::integer(1),
            CqlValue::integer(15),
            CqlValue::integer(10),
            CqlValue::integer(30),
            CqlValue::Null,
            CqlValue::Null,
            CqlValue::Decimal(Decimal::new(-55, 1)), // -5.5 hours
        ])
        .unwrap();
        match result {
            CqlValue::DateTime(dt) => assert_eq!(dt.timezone_offset, Some(-330)),
            other => panic!("expected datetime, got {other:?}"),
        }
    }
}
