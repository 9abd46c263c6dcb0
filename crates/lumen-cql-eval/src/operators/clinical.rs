//! Clinical and terminology operators
//!
//! Code / concept / valueset definition references, valueset and
//! codesystem membership, and the age calculations.

use crate::context::EvaluationContext;
use crate::engine::CqlEvaluator;
use crate::error::{EvalError, EvalResult};
use crate::operators::datetime::{duration_between_values, precision_unit};
use lumen_cql_ast::{AgeAtExpr, AgeExpr, InCodeSystemExpr, InValueSetExpr, Ref, TemporalPrecision};
use lumen_cql_types::{CqlCode, CqlConcept, CqlTuple, CqlValue};

impl CqlEvaluator {
    /// A code definition reference resolves to its Code value
    pub(crate) fn eval_code_ref(
        &self,
        r: &Ref,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        self.with_ref_library(r.library.as_deref(), ctx, |_, ctx| {
            let library = ctx
                .current_library()
                .ok_or_else(|| EvalError::internal("no library in scope"))?;
            let resolved = library
                .resolve_code(&r.name)
                .ok_or_else(|| EvalError::undefined_terminology(&r.name))?;
            let mut code = CqlCode::new(resolved.code, resolved.system);
            code.display = resolved.display;
            code.version = resolved.version;
            Ok(CqlValue::Code(code))
        })
    }

    /// A concept definition reference resolves to its Concept value
    pub(crate) fn eval_concept_ref(
        &self,
        r: &Ref,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        self.with_ref_library(r.library.as_deref(), ctx, |_, ctx| {
            let library = ctx
                .current_library()
                .ok_or_else(|| EvalError::internal("no library in scope"))?;
            let (codes, display) = library
                .resolve_concept(&r.name)
                .ok_or_else(|| EvalError::undefined_terminology(&r.name))?;
            let codes: Vec<CqlCode> = codes
                .into_iter()
                .map(|resolved| {
                    let mut code = CqlCode::new(resolved.code, resolved.system);
                    code.display = resolved.display;
                    code.version = resolved.version;
                    code
                })
                .collect();
            Ok(CqlValue::Concept(CqlConcept::new(codes, display)))
        })
    }

    /// A codesystem reference resolves to a { name, uri } tuple
    pub(crate) fn eval_codesystem_ref(
        &self,
        r: &Ref,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        self.with_ref_library(r.library.as_deref(), ctx, |_, ctx| {
            let library = ctx
                .current_library()
                .ok_or_else(|| EvalError::internal("no library in scope"))?;
            let uri = library
                .codesystem_uri(&r.name)
                .ok_or_else(|| EvalError::undefined_terminology(&r.name))?;
            Ok(CqlValue::Tuple(CqlTuple::from_elements([
                ("name", CqlValue::string(&r.name)),
                ("uri", CqlValue::string(uri)),
            ])))
        })
    }

    /// A valueset reference expands to its code list
    pub(crate) fn eval_valueset_ref(
        &self,
        r: &Ref,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let url = self.resolve_valueset_url(r, ctx)?;
        let adapter = ctx
            .terminology()
            .ok_or_else(|| EvalError::terminology("no terminology provider configured"))?
            .clone();
        let codes = adapter.expand(&url)?;
        Ok(CqlValue::list(codes.into_iter().map(CqlValue::Code).collect()))
    }

    /// The canonical URL a valueset reference names
    pub(crate) fn resolve_valueset_url(
        &self,
        r: &Ref,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<String> {
        self.with_ref_library(r.library.as_deref(), ctx, |_, ctx| {
            let library = ctx
                .current_library()
                .ok_or_else(|| EvalError::internal("no library in scope"))?;
            library
                .valuesets
                .get(&r.name)
                .map(|vs| vs.uri.clone())
                .ok_or_else(|| EvalError::undefined_terminology(&r.name))
        })
    }

    /// `code in "ValueSet"` membership through the terminology adapter
    pub(crate) fn eval_in_valueset(
        &self,
        expr: &InValueSetExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let code = self.eval_operand(&expr.code, ctx)?;
        if code.is_null() {
            return Ok(CqlValue::Null);
        }
        let url = self.resolve_valueset_url(&expr.valueset, ctx)?;
        let adapter = ctx
            .terminology()
            .ok_or_else(|| EvalError::terminology("no terminology provider configured"))?
            .clone();
        Ok(CqlValue::Boolean(adapter.value_in_valueset(&code, &url)?))
    }

    /// `code in "CodeSystem"`: system equality, with a terminology lookup
    /// confirming membership when a provider is present
    pub(crate) fn eval_in_codesystem(
        &self,
        expr: &InCodeSystemExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let code = self.eval_operand(&expr.code, ctx)?;
        if code.is_null() {
            return Ok(CqlValue::Null);
        }
        let uri = self.with_ref_library(expr.codesystem.library.as_deref(), ctx, |_, ctx| {
            let library = ctx
                .current_library()
                .ok_or_else(|| EvalError::internal("no library in scope"))?;
            library
                .codesystem_uri(&expr.codesystem.name)
                .map(str::to_string)
                .ok_or_else(|| EvalError::undefined_terminology(&expr.codesystem.name))
        })?;

        let result = match &code {
            CqlValue::Code(c) => c.system == uri,
            CqlValue::Concept(concept) => concept.codes.iter().any(|c| c.system == uri),
            CqlValue::String(s) => ctx
                .terminology()
                .is_some_and(|adapter| adapter.lookup(&uri, s).is_some()),
            other => {
                return Err(EvalError::type_mismatch("Code", other.type_name()));
            }
        };
        Ok(CqlValue::Boolean(result))
    }

    /// CalculateAge: completed calendar units from a birth value to the
    /// evaluation clock
    pub(crate) fn eval_calculate_age(
        &self,
        expr: &AgeExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let birth = self.eval_scalar_operand(&expr.birth, ctx)?;
        if birth.is_null() {
            return Ok(CqlValue::Null);
        }
        let as_of = CqlValue::Date(ctx.today());
        let precision = expr.precision.unwrap_or(TemporalPrecision::Year);
        duration_between_values(&birth, &as_of, precision_unit(precision))
    }

    /// CalculateAgeAt: completed calendar units from a birth value to an
    /// explicit as-of value
    pub(crate) fn eval_calculate_age_at(
        &self,
        expr: &AgeAtExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let birth = self.eval_scalar_operand(&expr.birth, ctx)?;
        let as_of = self.eval_scalar_operand(&expr.as_of, ctx)?;
        if birth.is_null() || as_of.is_null() {
            return Ok(CqlValue::Null);
        }
        let precision = expr.precision.unwrap_or(TemporalPrecision::Year);
        duration_between_values(&birth, &as_of, precision_unit(precision))
    }
}
