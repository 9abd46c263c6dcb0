//! Logical operators and conditionals
//!
//! And, Or, Xor, Implies, Not over three-valued logic, the null tests,
//! Coalesce, If and Case. Branch expressions of If and Case evaluate only
//! when selected.

use crate::context::EvaluationContext;
use crate::engine::CqlEvaluator;
use crate::error::{EvalError, EvalResult};
use crate::navigation::unwrap_primitive;
use crate::operators::comparison::{cql_equal, truth_to_value};
use lumen_cql_ast::{BinaryExpr, BinaryOp, CaseExpr, Expr, IfExpr, UnaryExpr, UnaryOp};
use lumen_cql_types::{CqlValue, Truth};

/// Read a value as a truth value.
///
/// Null is unknown; an empty list coerces to unknown as well (the
/// null/empty boolean boundary); other non-booleans are type errors.
pub fn value_to_truth(value: &CqlValue) -> EvalResult<Truth> {
    match unwrap_primitive(value) {
        CqlValue::Boolean(true) => Ok(Truth::True),
        CqlValue::Boolean(false) => Ok(Truth::False),
        CqlValue::Null => Ok(Truth::Unknown),
        CqlValue::List(list) if list.is_empty() => Ok(Truth::Unknown),
        CqlValue::List(list) if list.len() == 1 => value_to_truth(&list.elements[0]),
        other => Err(EvalError::type_mismatch("Boolean", other.type_name())),
    }
}

impl CqlEvaluator {
    /// And / Or / Xor / Implies
    pub(crate) fn eval_logical(
        &self,
        op: BinaryOp,
        expr: &BinaryExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let left = value_to_truth(&self.eval_operand(&expr.left, ctx)?)?;
        let right = value_to_truth(&self.eval_operand(&expr.right, ctx)?)?;

        let result = match op {
            BinaryOp::And => left.and(right),
            BinaryOp::Or => left.or(right),
            BinaryOp::Xor => left.xor(right),
            BinaryOp::Implies => left.implies(right),
            _ => unreachable!("non-logical operator {op}"),
        };
        Ok(truth_to_value(result))
    }

    /// Not / IsNull / IsTrue / IsFalse
    pub(crate) fn eval_null_test(
        &self,
        op: UnaryOp,
        expr: &UnaryExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let operand = self.eval_operand(&expr.operand, ctx)?;
        match op {
            UnaryOp::Not => {
                let truth = value_to_truth(&operand)?;
                Ok(truth_to_value(truth.not()))
            }
            // The Is* tests never return null
            UnaryOp::IsNull => Ok(CqlValue::Boolean(operand.is_null())),
            UnaryOp::IsTrue => Ok(CqlValue::Boolean(operand.is_true())),
            UnaryOp::IsFalse => Ok(CqlValue::Boolean(operand.is_false())),
            _ => unreachable!("non-null-test operator {op}"),
        }
    }

    /// First non-null operand
    pub(crate) fn eval_coalesce(
        &self,
        operands: &[Expr],
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        for operand in operands {
            let value = self.evaluate(operand, ctx)?;
            if !value.is_null() {
                return Ok(value);
            }
        }
        Ok(CqlValue::Null)
    }

    /// If-then-else; only the selected branch evaluates
    pub(crate) fn eval_if(
        &self,
        expr: &IfExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let condition = self.eval_operand(&expr.condition, ctx)?;
        if value_to_truth(&condition)?.is_true() {
            self.evaluate(&expr.then, ctx)
        } else {
            self.evaluate(&expr.else_, ctx)
        }
    }

    /// Case with or without comparand; only the selected arm evaluates
    pub(crate) fn eval_case(
        &self,
        expr: &CaseExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        match &expr.comparand {
            Some(comparand_expr) => {
                let comparand = self.eval_operand(comparand_expr, ctx)?;
                for item in &expr.items {
                    let when = self.eval_operand(&item.when, ctx)?;
                    if !comparand.is_null()
                        && !when.is_null()
                        && cql_equal(&comparand, &when, ctx.units()) == Some(true)
                    {
                        return self.evaluate(&item.then, ctx);
                    }
                }
            }
            None => {
                for item in &expr.items {
                    let when = self.eval_operand(&item.when, ctx)?;
                    if value_to_truth(&when)?.is_true() {
                        return self.evaluate(&item.then, ctx);
                    }
                }
            }
        }
        self.evaluate(&expr.else_, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_to_truth() {
        assert_eq!(value_to_truth(&CqlValue::Boolean(true)).unwrap(), Truth::True);
        assert_eq!(value_to_truth(&CqlValue::Null).unwrap(), Truth::Unknown);
        assert_eq!(value_to_truth(&CqlValue::empty_list()).unwrap(), Truth::Unknown);
        assert_eq!(
            value_to_truth(&CqlValue::list(vec![CqlValue::Boolean(false)])).unwrap(),
            Truth::False
        );
        assert!(value_to_truth(&CqlValue::integer(1)).is_err());
    }
}
