//! Arithmetic operators and math functions
//!
//! Null propagates through every operator. Division by zero yields null;
//! integer overflow raises. Decimal division truncates the result to 8
//! fractional digits. Quantity arithmetic converts the right operand into
//! the left operand's unit; multiplication combines units and division
//! cancels identical units to dimensionless "1".

use crate::context::EvaluationContext;
use crate::engine::CqlEvaluator;
use crate::error::{EvalError, EvalResult};
use crate::units::UnitConverter;
use lumen_cql_ast::{BinaryExpr, BinaryOp, UnaryExpr};
use lumen_cql_types::{CalendarUnit, CqlDate, CqlDateTime, CqlQuantity, CqlTime, CqlValue};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Fractional digits kept by decimal division
pub const DIVISION_SCALE: u32 = 8;

/// The successor/predecessor step for decimals and quantities
pub fn decimal_step() -> Decimal {
    Decimal::new(1, 8)
}

impl CqlEvaluator {
    /// Add / Subtract / Multiply / Divide / TruncatedDivide / Modulo /
    /// Power / Concatenate
    pub(crate) fn eval_arithmetic(
        &self,
        op: BinaryOp,
        expr: &BinaryExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let left = self.eval_scalar_operand(&expr.left, ctx)?;
        let right = self.eval_scalar_operand(&expr.right, ctx)?;

        // `&` treats null as the empty string; everything else propagates
        if op == BinaryOp::Concatenate {
            return concatenate_values(&left, &right);
        }
        if left.is_null() || right.is_null() {
            return Ok(CqlValue::Null);
        }

        match op {
            BinaryOp::Add => add_values(&left, &right, ctx.units()),
            BinaryOp::Subtract => subtract_values(&left, &right, ctx.units()),
            BinaryOp::Multiply => multiply_values(&left, &right, ctx.units()),
            BinaryOp::Divide => divide_values(&left, &right, ctx.units()),
            BinaryOp::TruncatedDivide => truncated_divide_values(&left, &right),
            BinaryOp::Modulo => modulo_values(&left, &right),
            BinaryOp::Power => power_values(&left, &right),
            _ => unreachable!("non-arithmetic operator {op}"),
        }
    }

    /// Unary minus
    pub(crate) fn eval_negate(
        &self,
        expr: &UnaryExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let operand = self.eval_scalar_operand(&expr.operand, ctx)?;
        negate_value(&operand)
    }

    /// Successor / Predecessor at the value's natural granularity
    pub(crate) fn eval_step(
        &self,
        forward: bool,
        expr: &UnaryExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let operand = self.eval_scalar_operand(&expr.operand, ctx)?;
        if forward {
            successor_value(&operand)
        } else {
            predecessor_value(&operand)
        }
    }
}

/// `&` concatenation: null reads as the empty string
pub fn concatenate_values(left: &CqlValue, right: &CqlValue) -> EvalResult<CqlValue> {
    let render = |v: &CqlValue| -> EvalResult<String> {
        match v {
            CqlValue::Null => Ok(String::new()),
            CqlValue::String(s) => Ok(s.clone()),
            other => Err(EvalError::type_mismatch("String", other.type_name())),
        }
    };
    Ok(CqlValue::String(format!("{}{}", render(left)?, render(right)?)))
}

/// Addition; `+` on strings requires both sides non-null
pub fn add_values(
    left: &CqlValue,
    right: &CqlValue,
    units: &dyn UnitConverter,
) -> EvalResult<CqlValue> {
    match (left, right) {
        (CqlValue::Integer(a), CqlValue::Integer(b)) => a
            .checked_add(*b)
            .map(CqlValue::Integer)
            .ok_or_else(|| EvalError::overflow("Add")),
        (CqlValue::String(a), CqlValue::String(b)) => {
            Ok(CqlValue::String(format!("{a}{b}")))
        }
        (CqlValue::Quantity(a), CqlValue::Quantity(b)) => {
            let converted = units
                .convert(b.value, b.unit_or_default(), a.unit_or_default())
                .ok_or_else(|| {
                    EvalError::incompatible_units(a.unit_or_default(), b.unit_or_default())
                })?;
            let value = a
                .value
                .checked_add(converted)
                .ok_or_else(|| EvalError::overflow("Add"))?;
            Ok(CqlValue::Quantity(CqlQuantity {
                value,
                unit: a.unit.clone(),
                original_unit: None,
            }))
        }
        (CqlValue::Date(d), CqlValue::Quantity(q)) => temporal_shift_date(d, q, 1),
        (CqlValue::DateTime(dt), CqlValue::Quantity(q)) => temporal_shift_datetime(dt, q, 1),
        (CqlValue::Time(t), CqlValue::Quantity(q)) => temporal_shift_time(t, q, 1),
        _ => both_decimal(left, right, "Add").and_then(|(a, b)| {
            a.checked_add(b)
                .map(CqlValue::Decimal)
                .ok_or_else(|| EvalError::overflow("Add"))
        }),
    }
}

/// Subtraction
pub fn subtract_values(
    left: &CqlValue,
    right: &CqlValue,
    units: &dyn UnitConverter,
) -> EvalResult<CqlValue> {
    match (left, right) {
        (CqlValue::Integer(a), CqlValue::Integer(b)) => a
            .checked_sub(*b)
            .map(CqlValue::Integer)
            .ok_or_else(|| EvalError::overflow("Subtract")),
        (CqlValue::Quantity(a), CqlValue::Quantity(b)) => {
            let converted = units
                .convert(b.value, b.unit_or_default(), a.unit_or_default())
                .ok_or_else(|| {
                    EvalError::incompatible_units(a.unit_or_default(), b.unit_or_default())
                })?;
            let value = a
                .value
                .checked_sub(converted)
                .ok_or_else(|| EvalError::overflow("Subtract"))?;
            Ok(CqlValue::Quantity(CqlQuantity {
                value,
                unit: a.unit.clone(),
                original_unit: None,
            }))
        }
        (CqlValue::Date(d), CqlValue::Quantity(q)) => temporal_shift_date(d, q, -1),
        (CqlValue::DateTime(dt), CqlValue::Quantity(q)) => temporal_shift_datetime(dt, q, -1),
        (CqlValue::Time(t), CqlValue::Quantity(q)) => temporal_shift_time(t, q, -1),
        _ => both_decimal(left, right, "Subtract").and_then(|(a, b)| {
            a.checked_sub(b)
                .map(CqlValue::Decimal)
                .ok_or_else(|| EvalError::overflow("Subtract"))
        }),
    }
}

/// Multiplication; quantity units combine
pub fn multiply_values(
    left: &CqlValue,
    right: &CqlValue,
    _units: &dyn UnitConverter,
) -> EvalResult<CqlValue> {
    match (left, right) {
        (CqlValue::Integer(a), CqlValue::Integer(b)) => a
            .checked_mul(*b)
            .map(CqlValue::Integer)
            .ok_or_else(|| EvalError::overflow("Multiply")),
        (CqlValue::Quantity(a), CqlValue::Quantity(b)) => {
            let value = a
                .value
                .checked_mul(b.value)
                .ok_or_else(|| EvalError::overflow("Multiply"))?;
            Ok(CqlValue::Quantity(CqlQuantity {
                value,
                unit: Some(combine_product_units(a.unit_or_default(), b.unit_or_default())),
                original_unit: None,
            }))
        }
        (CqlValue::Quantity(q), scalar) | (scalar, CqlValue::Quantity(q))
            if scalar.as_decimal().is_some() =>
        {
            let factor = scalar.as_decimal().unwrap();
            let value = q
                .value
                .checked_mul(factor)
                .ok_or_else(|| EvalError::overflow("Multiply"))?;
            Ok(CqlValue::Quantity(CqlQuantity {
                value,
                unit: q.unit.clone(),
                original_unit: None,
            }))
        }
        _ => both_decimal(left, right, "Multiply").and_then(|(a, b)| {
            a.checked_mul(b)
                .map(CqlValue::Decimal)
                .ok_or_else(|| EvalError::overflow("Multiply"))
        }),
    }
}

/// Division; always decimal-valued, truncated to 8 fractional digits.
/// Division by zero is null.
pub fn divide_values(
    left: &CqlValue,
    right: &CqlValue,
    _units: &dyn UnitConverter,
) -> EvalResult<CqlValue> {
    match (left, right) {
        (CqlValue::Quantity(a), CqlValue::Quantity(b)) => {
            if b.value.is_zero() {
                return Ok(CqlValue::Null);
            }
            let value = match a.value.checked_div(b.value) {
                Some(v) => truncate_division(v),
                None => return Ok(CqlValue::Null),
            };
            Ok(CqlValue::Quantity(CqlQuantity {
                value,
                unit: Some(combine_quotient_units(a.unit_or_default(), b.unit_or_default())),
                original_unit: None,
            }))
        }
        (CqlValue::Quantity(q), scalar) if scalar.as_decimal().is_some() => {
            let divisor = scalar.as_decimal().unwrap();
            if divisor.is_zero() {
                return Ok(CqlValue::Null);
            }
            let value = match q.value.checked_div(divisor) {
                Some(v) => truncate_division(v),
                None => return Ok(CqlValue::Null),
            };
            Ok(CqlValue::Quantity(CqlQuantity {
                value,
                unit: q.unit.clone(),
                original_unit: None,
            }))
        }
        _ => {
            let (a, b) = both_decimal(left, right, "Divide")?;
            if b.is_zero() {
                return Ok(CqlValue::Null);
            }
            match a.checked_div(b) {
                Some(v) => Ok(CqlValue::Decimal(truncate_division(v))),
                None => Ok(CqlValue::Null),
            }
        }
    }
}

/// `div`: truncate toward zero; division by zero is null
pub fn truncated_divide_values(left: &CqlValue, right: &CqlValue) -> EvalResult<CqlValue> {
    match (left, right) {
        (CqlValue::Integer(a), CqlValue::Integer(b)) => {
            if *b == 0 {
                return Ok(CqlValue::Null);
            }
            a.checked_div(*b)
                .map(CqlValue::Integer)
                .ok_or_else(|| EvalError::overflow("TruncatedDivide"))
        }
        _ => {
            let (a, b) = both_decimal(left, right, "TruncatedDivide")?;
            if b.is_zero() {
                return Ok(CqlValue::Null);
            }
            match a.checked_div(b) {
                Some(v) => Ok(CqlValue::Decimal(v.trunc())),
                None => Ok(CqlValue::Null),
            }
        }
    }
}

/// `mod`: remainder with the dividend's sign; modulo zero is null
pub fn modulo_values(left: &CqlValue, right: &CqlValue) -> EvalResult<CqlValue> {
    match (left, right) {
        (CqlValue::Integer(a), CqlValue::Integer(b)) => {
            if *b == 0 {
                return Ok(CqlValue::Null);
            }
            a.checked_rem(*b)
                .map(CqlValue::Integer)
                .ok_or_else(|| EvalError::overflow("Modulo"))
        }
        _ => {
            let (a, b) = both_decimal(left, right, "Modulo")?;
            if b.is_zero() {
                return Ok(CqlValue::Null);
            }
            match a.checked_rem(b) {
                Some(v) => Ok(CqlValue::Decimal(v)),
                None => Ok(CqlValue::Null),
            }
        }
    }
}

/// Exponentiation
pub fn power_values(left: &CqlValue, right: &CqlValue) -> EvalResult<CqlValue> {
    match (left, right) {
        (CqlValue::Integer(base), CqlValue::Integer(exp)) if *exp >= 0 => {
            let exp = u32::try_from(*exp).map_err(|_| EvalError::overflow("Power"))?;
            base.checked_pow(exp)
                .map(CqlValue::Integer)
                .ok_or_else(|| EvalError::overflow("Power"))
        }
        _ => {
            let (base, exp) = both_decimal(left, right, "Power")?;
            decimal_power(base, exp).map(CqlValue::Decimal)
        }
    }
}

fn decimal_power(base: Decimal, exp: Decimal) -> EvalResult<Decimal> {
    // Integral exponents compute exactly by squaring
    if exp.fract().is_zero() {
        if let Some(mut n) = exp.abs().to_i64() {
            let mut result = Decimal::ONE;
            let mut factor = base;
            while n > 0 {
                if n & 1 == 1 {
                    result = result
                        .checked_mul(factor)
                        .ok_or_else(|| EvalError::overflow("Power"))?;
                }
                n >>= 1;
                if n > 0 {
                    factor = factor
                        .checked_mul(factor)
                        .ok_or_else(|| EvalError::overflow("Power"))?;
                }
            }
            if exp.is_sign_negative() {
                if result.is_zero() {
                    return Err(EvalError::overflow("Power"));
                }
                result = Decimal::ONE
                    .checked_div(result)
                    .ok_or_else(|| EvalError::overflow("Power"))?
                    .round_dp_with_strategy(DIVISION_SCALE, RoundingStrategy::ToZero);
            }
            return Ok(result);
        }
    }

    // Fractional exponents go through f64
    let base_f = base.to_f64().ok_or_else(|| EvalError::overflow("Power"))?;
    let exp_f = exp.to_f64().ok_or_else(|| EvalError::overflow("Power"))?;
    let result = base_f.powf(exp_f);
    Decimal::from_f64(result).ok_or_else(|| EvalError::overflow("Power"))
}

/// Unary minus
pub fn negate_value(value: &CqlValue) -> EvalResult<CqlValue> {
    match value {
        CqlValue::Null => Ok(CqlValue::Null),
        CqlValue::Integer(i) => i
            .checked_neg()
            .map(CqlValue::Integer)
            .ok_or_else(|| EvalError::overflow("Negate")),
        CqlValue::Decimal(d) => Ok(CqlValue::Decimal(-d)),
        CqlValue::Quantity(q) => Ok(CqlValue::Quantity(CqlQuantity {
            value: -q.value,
            unit: q.unit.clone(),
            original_unit: None,
        })),
        other => Err(EvalError::type_mismatch("number", other.type_name())),
    }
}

/// Successor at the value's natural granularity
pub fn successor_value(value: &CqlValue) -> EvalResult<CqlValue> {
    match value {
        CqlValue::Null => Ok(CqlValue::Null),
        CqlValue::Integer(i) => i
            .checked_add(1)
            .map(CqlValue::Integer)
            .ok_or_else(|| EvalError::overflow("Successor")),
        CqlValue::Decimal(d) => Ok(CqlValue::Decimal(d + decimal_step())),
        CqlValue::Quantity(q) => Ok(CqlValue::Quantity(CqlQuantity {
            value: q.value + decimal_step(),
            unit: q.unit.clone(),
            original_unit: None,
        })),
        CqlValue::Date(d) => Ok(CqlValue::Date(d.successor())),
        CqlValue::DateTime(dt) => Ok(CqlValue::DateTime(dt.successor())),
        CqlValue::Time(t) => Ok(CqlValue::Time(t.successor())),
        other => Err(EvalError::type_mismatch("ordered value", other.type_name())),
    }
}

/// Predecessor at the value's natural granularity
pub fn predecessor_value(value: &CqlValue) -> EvalResult<CqlValue> {
    match value {
        CqlValue::Null => Ok(CqlValue::Null),
        CqlValue::Integer(i) => i
            .checked_sub(1)
            .map(CqlValue::Integer)
            .ok_or_else(|| EvalError::overflow("Predecessor")),
        CqlValue::Decimal(d) => Ok(CqlValue::Decimal(d - decimal_step())),
        CqlValue::Quantity(q) => Ok(CqlValue::Quantity(CqlQuantity {
            value: q.value - decimal_step(),
            unit: q.unit.clone(),
            original_unit: None,
        })),
        CqlValue::Date(d) => Ok(CqlValue::Date(d.predecessor())),
        CqlValue::DateTime(dt) => Ok(CqlValue::DateTime(dt.predecessor())),
        CqlValue::Time(t) => Ok(CqlValue::Time(t.predecessor())),
        other => Err(EvalError::type_mismatch("ordered value", other.type_name())),
    }
}

/// Truncate a division result to the standard scale
pub fn truncate_division(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DIVISION_SCALE, RoundingStrategy::ToZero)
}

fn both_decimal(left: &CqlValue, right: &CqlValue, op: &str) -> EvalResult<(Decimal, Decimal)> {
    match (left.as_decimal(), right.as_decimal()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(EvalError::invalid_operand(
            op,
            format!("{} and {}", left.type_name(), right.type_name()),
        )),
    }
}

fn quantity_amount(q: &CqlQuantity) -> EvalResult<(i64, CalendarUnit)> {
    let unit = q
        .unit
        .as_deref()
        .and_then(CalendarUnit::parse)
        .ok_or_else(|| {
            EvalError::invalid_operand("Add", format!("'{}' is not a duration unit", q.unit_or_default()))
        })?;
    let amount = q
        .value
        .trunc()
        .to_i64()
        .ok_or_else(|| EvalError::overflow("Add"))?;
    Ok((amount, unit))
}

fn temporal_shift_date(date: &CqlDate, q: &CqlQuantity, sign: i64) -> EvalResult<CqlValue> {
    let (amount, unit) = quantity_amount(q)?;
    match date.add(sign * amount, unit) {
        Some(result) => Ok(CqlValue::Date(result)),
        None => Err(EvalError::overflow("date arithmetic")),
    }
}

fn temporal_shift_datetime(
    dt: &CqlDateTime,
    q: &CqlQuantity,
    sign: i64,
) -> EvalResult<CqlValue> {
    let (amount, unit) = quantity_amount(q)?;
    match dt.add(sign * amount, unit) {
        Some(result) => Ok(CqlValue::DateTime(result)),
        None => Err(EvalError::overflow("datetime arithmetic")),
    }
}

fn temporal_shift_time(t: &CqlTime, q: &CqlQuantity, sign: i64) -> EvalResult<CqlValue> {
    let (amount, unit) = quantity_amount(q)?;
    match t.add(sign * amount, unit) {
        Some(result) => Ok(CqlValue::Time(result)),
        None => Err(EvalError::invalid_operand(
            "time arithmetic",
            format!("'{}' is not an exact unit", q.unit_or_default()),
        )),
    }
}

fn combine_product_units(left: &str, right: &str) -> String {
    match (left, right) {
        ("1", unit) | (unit, "1") => unit.to_string(),
        (a, b) if a == b => format!("{a}2"),
        (a, b) => format!("{a}.{b}"),
    }
}

fn combine_quotient_units(left: &str, right: &str) -> String {
    match (left, right) {
        (a, b) if a == b => "1".to_string(),
        (a, "1") => a.to_string(),
        (a, b) => format!("{a}/{b}"),
    }
}

// ============================================================================
// Math functions
// ============================================================================

/// Abs
pub fn abs_value(value: &CqlValue) -> EvalResult<CqlValue> {
    match value {
        CqlValue::Null => Ok(CqlValue::Null),
        CqlValue::Integer(i) => i
            .checked_abs()
            .map(CqlValue::Integer)
            .ok_or_else(|| EvalError::overflow("Abs")),
        CqlValue::Decimal(d) => Ok(CqlValue::Decimal(d.abs())),
        CqlValue::Quantity(q) => Ok(CqlValue::Quantity(CqlQuantity {
            value: q.value.abs(),
            unit: q.unit.clone(),
            original_unit: None,
        })),
        other => Err(EvalError::type_mismatch("number", other.type_name())),
    }
}

/// Ceiling: least integer >= the argument
pub fn ceiling_value(value: &CqlValue) -> EvalResult<CqlValue> {
    match value {
        CqlValue::Null => Ok(CqlValue::Null),
        CqlValue::Integer(i) => Ok(CqlValue::Integer(*i)),
        CqlValue::Decimal(d) => d
            .ceil()
            .to_i64()
            .map(CqlValue::Integer)
            .ok_or_else(|| EvalError::overflow("Ceiling")),
        other => Err(EvalError::type_mismatch("number", other.type_name())),
    }
}

/// Floor: greatest integer <= the argument
pub fn floor_value(value: &CqlValue) -> EvalResult<CqlValue> {
    match value {
        CqlValue::Null => Ok(CqlValue::Null),
        CqlValue::Integer(i) => Ok(CqlValue::Integer(*i)),
        CqlValue::Decimal(d) => d
            .floor()
            .to_i64()
            .map(CqlValue::Integer)
            .ok_or_else(|| EvalError::overflow("Floor")),
        other => Err(EvalError::type_mismatch("number", other.type_name())),
    }
}

/// Truncate toward zero
pub fn truncate_value(value: &CqlValue) -> EvalResult<CqlValue> {
    match value {
        CqlValue::Null => Ok(CqlValue::Null),
        CqlValue::Integer(i) => Ok(CqlValue::Integer(*i)),
        CqlValue::Decimal(d) => d
            .trunc()
            .to_i64()
            .map(CqlValue::Integer)
            .ok_or_else(|| EvalError::overflow("Truncate")),
        other => Err(EvalError::type_mismatch("number", other.type_name())),
    }
}

/// Round half away from zero, to an optional number of fractional digits
pub fn round_value(value: &CqlValue, digits: Option<i64>) -> EvalResult<CqlValue> {
    let digits = digits.unwrap_or(0);
    if !(0..=28).contains(&digits) {
        return Err(EvalError::invalid_operand("Round", "precision out of range"));
    }
    match value {
        CqlValue::Null => Ok(CqlValue::Null),
        CqlValue::Integer(i) => Ok(CqlValue::Integer(*i)),
        CqlValue::Decimal(d) => Ok(CqlValue::Decimal(d.round_dp_with_strategy(
            digits as u32,
            RoundingStrategy::MidpointAwayFromZero,
        ))),
        other => Err(EvalError::type_mismatch("number", other.type_name())),
    }
}

/// Natural logarithm; non-positive arguments are null
pub fn ln_value(value: &CqlValue) -> EvalResult<CqlValue> {
    match value.as_decimal() {
        None if value.is_null() => Ok(CqlValue::Null),
        None => Err(EvalError::type_mismatch("number", value.type_name())),
        Some(d) => {
            let f = d.to_f64().unwrap_or(f64::NAN);
            if f <= 0.0 {
                return Ok(CqlValue::Null);
            }
            Ok(Decimal::from_f64(f.ln())
                .map(CqlValue::Decimal)
                .unwrap_or(CqlValue::Null))
        }
    }
}

/// Logarithm of `value` in base `base`
pub fn log_value(value: &CqlValue, base: &CqlValue) -> EvalResult<CqlValue> {
    if value.is_null() || base.is_null() {
        return Ok(CqlValue::Null);
    }
    let (v, b) = both_decimal(value, base, "Log")?;
    let v = v.to_f64().unwrap_or(f64::NAN);
    let b = b.to_f64().unwrap_or(f64::NAN);
    if v <= 0.0 || b <= 0.0 || b == 1.0 {
        return Ok(CqlValue::Null);
    }
    Ok(Decimal::from_f64(v.log(b))
        .map(CqlValue::Decimal)
        .unwrap_or(CqlValue::Null))
}

/// e^x
pub fn exp_value(value: &CqlValue) -> EvalResult<CqlValue> {
    match value.as_decimal() {
        None if value.is_null() => Ok(CqlValue::Null),
        None => Err(EvalError::type_mismatch("number", value.type_name())),
        Some(d) => {
            let f = d.to_f64().unwrap_or(f64::NAN);
            Decimal::from_f64(f.exp())
                .map(CqlValue::Decimal)
                .ok_or_else(|| EvalError::overflow("Exp"))
        }
    }
}

/// Square root; negative arguments are null
pub fn sqrt_value(value: &CqlValue) -> EvalResult<CqlValue> {
    match value.as_decimal() {
        None if value.is_null() => Ok(CqlValue::Null),
        None => Err(EvalError::type_mismatch("number", value.type_name())),
        Some(d) => {
            let f = d.to_f64().unwrap_or(f64::NAN);
            if f < 0.0 {
                return Ok(CqlValue::Null);
            }
            Ok(Decimal::from_f64(f.sqrt())
                .map(CqlValue::Decimal)
                .unwrap_or(CqlValue::Null))
        }
    }
}

/// Precision: fractional digits for decimals, digit counts for temporals
pub fn precision_of(value: &CqlValue) -> EvalResult<CqlValue> {
    match value {
        CqlValue::Null => Ok(CqlValue::Null),
        CqlValue::Decimal(d) => Ok(CqlValue::Integer(d.scale() as i64)),
        CqlValue::Integer(_) => Ok(CqlValue::Integer(0)),
        CqlValue::Date(d) => Ok(CqlValue::Integer(d.precision_digits())),
        CqlValue::DateTime(dt) => Ok(CqlValue::Integer(dt.precision_digits())),
        CqlValue::Time(t) => Ok(CqlValue::Integer(t.precision_digits())),
        other => Err(EvalError::type_mismatch(
            "Decimal or temporal value",
            other.type_name(),
        )),
    }
}

/// LowBoundary / HighBoundary to a target precision
pub fn boundary_of(value: &CqlValue, precision: Option<i64>, high: bool) -> EvalResult<CqlValue> {
    use lumen_cql_types::DateTimePrecision;

    match value {
        CqlValue::Null => Ok(CqlValue::Null),
        CqlValue::Decimal(d) => {
            let target = precision.unwrap_or(DIVISION_SCALE as i64);
            if !(0..=28).contains(&target) || (target as u32) < d.scale() {
                return Ok(CqlValue::Null);
            }
            let mut low = *d;
            low.rescale(target as u32);
            if high {
                // Fill the added fractional digits with nines
                let ulp_in = Decimal::new(1, d.scale());
                let ulp_out = Decimal::new(1, target as u32);
                Ok(CqlValue::Decimal(low + ulp_in - ulp_out))
            } else {
                Ok(CqlValue::Decimal(low))
            }
        }
        CqlValue::Date(d) => {
            let target = match precision {
                Some(p) => DateTimePrecision::from_date_digits(p),
                None => Some(DateTimePrecision::Day),
            };
            match target {
                Some(p) => Ok(CqlValue::Date(d.boundary(p, high))),
                None => Ok(CqlValue::Null),
            }
        }
        CqlValue::DateTime(dt) => {
            let target = match precision {
                Some(p) => DateTimePrecision::from_datetime_digits(p),
                None => Some(DateTimePrecision::Millisecond),
            };
            match target {
                Some(p) => Ok(CqlValue::DateTime(dt.boundary(p, high))),
                None => Ok(CqlValue::Null),
            }
        }
        CqlValue::Time(t) => {
            let target = match precision {
                Some(p) => DateTimePrecision::from_time_digits(p),
                None => Some(DateTimePrecision::Millisecond),
            };
            match target {
                Some(p) => Ok(CqlValue::Time(t.boundary(p, high))),
                None => Ok(CqlValue::Null),
            }
        }
        other => Err(EvalError::type_mismatch(
            "Decimal or temporal value",
            other.type_name(),
        )),
    }
}

/// MinValue / MaxValue for a named type
pub fn extreme_value(type_name: &str, max: bool) -> EvalResult<CqlValue> {
    match type_name {
        "Integer" | "Long" => Ok(CqlValue::Integer(if max { i64::MAX } else { i64::MIN })),
        "Decimal" => Ok(CqlValue::Decimal(if max { Decimal::MAX } else { Decimal::MIN })),
        "Date" => Ok(CqlValue::Date(if max { CqlDate::MAX } else { CqlDate::MIN })),
        "DateTime" => Ok(CqlValue::DateTime(if max {
            CqlDateTime::MAX
        } else {
            CqlDateTime::MIN
        })),
        "Time" => Ok(CqlValue::Time(if max { CqlTime::MAX } else { CqlTime::MIN })),
        other => Err(EvalError::invalid_operand(
            if max { "MaxValue" } else { "MinValue" },
            format!("no extreme values for type {other}"),
        )),
    }
}
