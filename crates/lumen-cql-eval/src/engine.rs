//! The tree-walking evaluator
//!
//! One dispatching routine keyed on node kind. Reference resolution,
//! selectors, function invocation and the Message operator live here;
//! operator semantics live in the `operators` modules and the query
//! pipeline in `query`.

use crate::context::EvaluationContext;
use crate::error::{EvalError, EvalErrorKind, EvalResult};
use crate::navigation::{self, unwrap_primitive};
use crate::operators::logical::value_to_truth;
use crate::operators::{arithmetic, comparison, interval, list, type_ops};
use crate::registry::FunctionRegistry;
use lumen_cql_ast::{
    BinaryOp, CodeSelector, ConceptSelector, Expr, ExprKind, FunctionDefinition, FunctionRefExpr,
    InstanceSelector, IntervalSelector, Library, ListSelector, Literal, MessageExpr, NameRef,
    PropertyExpr, QuantityLiteral, RatioLiteral, Ref, RelationExpr, RelationOp, TupleSelector,
    UnaryOp,
};
use lumen_cql_diagnostics::Severity;
use lumen_cql_types::{
    CqlCode, CqlConcept, CqlDate, CqlDateTime, CqlInterval, CqlQuantity, CqlRatio, CqlTime,
    CqlTuple, CqlValue, Truth,
};
use std::sync::Arc;

/// The expression evaluator.
///
/// Holds the built-in function registry; all per-evaluation state lives
/// on the [`EvaluationContext`].
pub struct CqlEvaluator {
    registry: FunctionRegistry,
}

impl Default for CqlEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl CqlEvaluator {
    /// An evaluator with the standard built-in functions
    pub fn new() -> Self {
        Self {
            registry: FunctionRegistry::with_standard_functions(),
        }
    }

    /// An evaluator with a custom registry
    pub fn with_registry(registry: FunctionRegistry) -> Self {
        Self { registry }
    }

    /// The built-in registry
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Evaluate every public definition of the context's library
    pub fn evaluate_library(
        &self,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<indexmap::IndexMap<String, CqlValue>> {
        let library = ctx
            .current_library()
            .cloned()
            .ok_or_else(|| EvalError::internal("no library in scope"))?;
        let mut results = indexmap::IndexMap::new();
        for (name, def) in &library.definitions {
            if def.access == lumen_cql_ast::AccessModifier::Private {
                continue;
            }
            let value = self.evaluate_definition(name, ctx)?;
            results.insert(name.clone(), value);
        }
        Ok(results)
    }

    /// Evaluate a named definition of the current library, memoized per
    /// context with cycle detection across library boundaries
    pub fn evaluate_definition(
        &self,
        name: &str,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let library = ctx
            .current_library()
            .cloned()
            .ok_or_else(|| EvalError::internal("no library in scope"))?;
        let key = format!("{}.{}", library.name, name);

        if let Some(cached) = ctx.get_cached(&key) {
            return Ok(cached.clone());
        }
        let def = library
            .definition(name)
            .ok_or_else(|| EvalError::undefined_expression(name).in_library(&library.name))?;

        if !ctx.begin_evaluation(&key) {
            return Err(EvalError::cycle_detected(&key).in_library(&library.name));
        }
        let result = self.evaluate(&def.expression, ctx);
        ctx.end_evaluation(&key);

        // Only fully evaluated results are cached
        let value = result.map_err(|e| e.in_library(&library.name))?;
        ctx.cache_result(key, value.clone());
        Ok(value)
    }

    /// The main dispatcher
    pub fn evaluate(&self, expr: &Expr, ctx: &mut EvaluationContext) -> EvalResult<CqlValue> {
        if !ctx.enter_recursion() {
            return Err(EvalError::from(EvalErrorKind::RecursionLimit).with_span(expr.span));
        }
        let result = self.dispatch(expr, ctx).map_err(|e| e.with_span(expr.span));
        ctx.exit_recursion();
        result
    }

    fn dispatch(&self, expr: &Expr, ctx: &mut EvaluationContext) -> EvalResult<CqlValue> {
        match &expr.kind {
            // === Selectors ===
            ExprKind::Null => Ok(CqlValue::Null),
            ExprKind::Literal(literal) => Ok(eval_literal(literal)),
            ExprKind::Quantity(q) => Ok(eval_quantity_literal(q)),
            ExprKind::Ratio(r) => Ok(eval_ratio_literal(r)),
            ExprKind::Interval(selector) => self.eval_interval_selector(selector, ctx),
            ExprKind::List(selector) => self.eval_list_selector(selector, ctx),
            ExprKind::Tuple(selector) => self.eval_tuple_selector(selector, ctx),
            ExprKind::Instance(selector) => self.eval_instance_selector(selector, ctx),
            ExprKind::Code(selector) => self.eval_code_selector(selector, ctx),
            ExprKind::Concept(selector) => self.eval_concept_selector(selector, ctx),

            // === Operators ===
            ExprKind::Binary(binary) => match binary.op {
                BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::Implies => {
                    self.eval_logical(binary.op, binary, ctx)
                }
                BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Equivalent
                | BinaryOp::NotEquivalent
                | BinaryOp::Less
                | BinaryOp::LessOrEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterOrEqual => self.eval_comparison(binary.op, binary, ctx),
                BinaryOp::Union | BinaryOp::Intersect | BinaryOp::Except => {
                    self.eval_set_op(binary.op, binary, ctx)
                }
                _ => self.eval_arithmetic(binary.op, binary, ctx),
            },
            ExprKind::Unary(unary) => match unary.op {
                UnaryOp::Not | UnaryOp::IsNull | UnaryOp::IsTrue | UnaryOp::IsFalse => {
                    self.eval_null_test(unary.op, unary, ctx)
                }
                UnaryOp::Negate => self.eval_negate(unary, ctx),
                UnaryOp::Successor => self.eval_step(true, unary, ctx),
                UnaryOp::Predecessor => self.eval_step(false, unary, ctx),
                UnaryOp::Exists => {
                    let operand = self.eval_operand(&unary.operand, ctx)?;
                    list::exists(&operand)
                }
                UnaryOp::Distinct => {
                    let operand = self.eval_operand(&unary.operand, ctx)?;
                    list::distinct(&operand, ctx.units())
                }
                UnaryOp::Flatten => {
                    let operand = self.eval_operand(&unary.operand, ctx)?;
                    list::flatten(&operand)
                }
                UnaryOp::SingletonFrom => {
                    let operand = self.eval_operand(&unary.operand, ctx)?;
                    list::singleton_from(&operand)
                }
                UnaryOp::Start | UnaryOp::End | UnaryOp::Width | UnaryOp::Size
                | UnaryOp::PointFrom => self.eval_interval_accessor(unary.op, unary, ctx),
                UnaryOp::DateFrom => self.eval_date_from(unary, ctx),
                UnaryOp::TimeFrom => self.eval_time_from(unary, ctx),
                UnaryOp::TimezoneOffsetFrom => self.eval_timezone_offset_from(unary, ctx),
            },
            ExprKind::Relation(relation) => self.eval_relation(relation, ctx),
            ExprKind::If(if_expr) => self.eval_if(if_expr, ctx),
            ExprKind::Case(case) => self.eval_case(case, ctx),
            ExprKind::Coalesce(operands) => self.eval_coalesce(operands, ctx),

            // === Type operations ===
            ExprKind::Is(is_expr) => {
                let operand = self.eval_operand(&is_expr.operand, ctx)?;
                if operand.is_null() {
                    return Ok(CqlValue::Boolean(false));
                }
                Ok(CqlValue::Boolean(type_ops::value_matches_type(
                    &operand,
                    &is_expr.type_specifier,
                )))
            }
            ExprKind::As(as_expr) => {
                let operand = self.eval_operand(&as_expr.operand, ctx)?;
                type_ops::cast_value(&operand, &as_expr.type_specifier, as_expr.strict)
            }
            ExprKind::Convert(convert) => {
                let operand = self.eval_scalar_operand(&convert.operand, ctx)?;
                if convert.test_only {
                    type_ops::converts_to(&operand, convert.target)
                } else {
                    type_ops::convert_value(&operand, convert.target)
                }
            }
            ExprKind::ConvertQuantity(convert) => {
                let operand = self.eval_scalar_operand(&convert.operand, ctx)?;
                let unit = self.eval_scalar_operand(&convert.unit, ctx)?;
                type_ops::convert_quantity(&operand, &unit, ctx.units())
            }
            ExprKind::MinValue(specifier) => {
                arithmetic::extreme_value(specifier.simple_name().unwrap_or_default(), false)
            }
            ExprKind::MaxValue(specifier) => {
                arithmetic::extreme_value(specifier.simple_name().unwrap_or_default(), true)
            }

            // === Temporal ===
            ExprKind::DurationBetween(between) => self.eval_duration_between(between, ctx),
            ExprKind::DifferenceBetween(between) => self.eval_difference_between(between, ctx),
            ExprKind::DateTimeComponentFrom(component) => {
                self.eval_component_from(component, ctx)
            }
            ExprKind::Now => Ok(CqlValue::DateTime(ctx.now())),
            ExprKind::Today => Ok(CqlValue::Date(ctx.today())),
            ExprKind::TimeOfDay => Ok(CqlValue::Time(ctx.time_of_day())),

            // === Interval set operations ===
            ExprKind::Collapse(collapse) => {
                let source = self.eval_operand(&collapse.source, ctx)?;
                match source {
                    CqlValue::Null => Ok(CqlValue::Null),
                    CqlValue::List(values) => {
                        interval::collapse_intervals(&values.elements, ctx.units())
                    }
                    CqlValue::Interval(iv) => {
                        Ok(CqlValue::list(vec![CqlValue::Interval(iv)]))
                    }
                    other => Err(EvalError::type_mismatch("List<Interval>", other.type_name())),
                }
            }
            ExprKind::Expand(expand) => {
                let source = self.eval_operand(&expand.source, ctx)?;
                let per = match &expand.per {
                    Some(per) => Some(self.eval_scalar_operand(per, ctx)?),
                    None => None,
                };
                match source {
                    CqlValue::Null => Ok(CqlValue::Null),
                    CqlValue::Interval(iv) => {
                        interval::expand_interval(&iv, per.as_ref(), ctx.units())
                    }
                    CqlValue::List(values) => {
                        let mut result = Vec::new();
                        for value in values.iter() {
                            match value {
                                CqlValue::Interval(iv) => {
                                    if let CqlValue::List(expanded) =
                                        interval::expand_interval(iv, per.as_ref(), ctx.units())?
                                    {
                                        result.extend(expanded.elements);
                                    }
                                }
                                CqlValue::Null => {}
                                other => {
                                    return Err(EvalError::type_mismatch(
                                        "Interval",
                                        other.type_name(),
                                    ));
                                }
                            }
                        }
                        Ok(CqlValue::list(result))
                    }
                    other => Err(EvalError::type_mismatch("Interval", other.type_name())),
                }
            }

            // === References ===
            ExprKind::ExpressionRef(r) => self.eval_expression_ref(r, ctx),
            ExprKind::FunctionRef(f) => self.eval_function_ref(f, ctx),
            ExprKind::ParameterRef(r) => self.eval_parameter_ref(r, ctx),
            ExprKind::OperandRef(r) => self.eval_operand_ref(r, ctx),
            ExprKind::AliasRef(r) => self.eval_alias_ref(r, ctx),
            ExprKind::QueryLetRef(r) => self.eval_alias_ref(r, ctx),
            ExprKind::IdentifierRef(r) => self.eval_identifier_ref(r, ctx),
            ExprKind::Property(p) => self.eval_property(p, ctx),

            // === Queries ===
            ExprKind::Query(query) => self.eval_query(query, ctx),
            ExprKind::Retrieve(retrieve) => self.eval_retrieve(retrieve, ctx),
            ExprKind::ForEach(iteration) => self.eval_for_each(iteration, ctx),
            ExprKind::Filter(iteration) => self.eval_filter(iteration, ctx),
            ExprKind::Repeat(iteration) => self.eval_repeat(iteration, ctx),
            ExprKind::Times(times) => self.eval_times(times, ctx),

            // === Clinical ===
            ExprKind::CodeRef(r) => self.eval_code_ref(r, ctx),
            ExprKind::CodeSystemRef(r) => self.eval_codesystem_ref(r, ctx),
            ExprKind::ValueSetRef(r) => self.eval_valueset_ref(r, ctx),
            ExprKind::ConceptRef(r) => self.eval_concept_ref(r, ctx),
            ExprKind::InValueSet(iv) => self.eval_in_valueset(iv, ctx),
            ExprKind::InCodeSystem(ics) => self.eval_in_codesystem(ics, ctx),
            ExprKind::CalculateAge(age) => self.eval_calculate_age(age, ctx),
            ExprKind::CalculateAgeAt(age) => self.eval_calculate_age_at(age, ctx),

            // === Iteration variables ===
            ExprKind::This => Ok(ctx
                .current_this()
                .cloned()
                .unwrap_or(CqlValue::Null)),
            ExprKind::IndexVar => Ok(ctx
                .current_index()
                .map(CqlValue::Integer)
                .unwrap_or(CqlValue::Null)),
            ExprKind::TotalVar => Ok(ctx
                .current_total()
                .cloned()
                .unwrap_or(CqlValue::Null)),

            // === Observability ===
            ExprKind::Message(message) => self.eval_message(message, ctx),
        }
    }

    // =========================================================================
    // Operand helpers
    // =========================================================================

    /// Evaluate an operand and see through primitive-extension wrappers
    pub(crate) fn eval_operand(
        &self,
        expr: &Expr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let value = self.evaluate(expr, ctx)?;
        Ok(unwrap_primitive(&value).clone())
    }

    /// Evaluate an operand for an operator expecting a single value: a
    /// singleton list is interchangeable with its element
    pub(crate) fn eval_scalar_operand(
        &self,
        expr: &Expr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let value = self.eval_operand(expr, ctx)?;
        match value {
            CqlValue::List(list) if list.len() == 1 => {
                Ok(unwrap_primitive(&list.elements[0]).clone())
            }
            CqlValue::List(list) if list.is_empty() => Ok(CqlValue::Null),
            other => Ok(other),
        }
    }

    /// Run `f` with name resolution switched to an included library
    pub(crate) fn with_ref_library<T>(
        &self,
        alias: Option<&str>,
        ctx: &mut EvaluationContext,
        f: impl FnOnce(&Self, &mut EvaluationContext) -> EvalResult<T>,
    ) -> EvalResult<T> {
        match alias {
            None => f(self, ctx),
            Some(alias) => {
                let library = self.resolve_included_library(alias, ctx)?;
                ctx.push_library(library);
                let result = f(self, ctx);
                ctx.pop_library();
                result
            }
        }
    }

    fn resolve_included_library(
        &self,
        alias: &str,
        ctx: &EvaluationContext,
    ) -> EvalResult<Arc<Library>> {
        let current = ctx
            .current_library()
            .ok_or_else(|| EvalError::internal("no library in scope"))?;
        let include = current
            .include_by_alias(alias)
            .ok_or_else(|| EvalError::undefined_library(alias))?;
        let manager = ctx
            .library_manager()
            .ok_or_else(|| EvalError::undefined_library(&include.library))?;
        manager
            .get_library(&include.library, include.version.as_deref())?
            .ok_or_else(|| EvalError::undefined_library(&include.library))
    }

    // =========================================================================
    // References
    // =========================================================================

    fn eval_expression_ref(
        &self,
        r: &Ref,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        self.with_ref_library(r.library.as_deref(), ctx, |eval, ctx| {
            eval.evaluate_definition(&r.name, ctx)
        })
    }

    fn eval_function_ref(
        &self,
        f: &FunctionRefExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        // Arguments evaluate in the caller's environment
        let args: Vec<CqlValue> = f
            .operands
            .iter()
            .map(|operand| self.evaluate(operand, ctx))
            .collect::<EvalResult<Vec<_>>>()?;

        self.with_ref_library(f.library.as_deref(), ctx, |eval, ctx| {
            eval.invoke_function(&f.name, &args, ctx)
        })
    }

    /// Resolution order: user function in the current library, plugin
    /// function, built-in
    pub(crate) fn invoke_function(
        &self,
        name: &str,
        args: &[CqlValue],
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let user_function = ctx
            .current_library()
            .and_then(|library| library.function(name, args.len()))
            .cloned();

        if let Some(def) = user_function {
            if def.body.is_some() {
                return self.call_user_function(&def, args, ctx);
            }
            if def.external {
                // External declarations must have a plugin implementation
                if ctx.plugins().has(name) {
                    return ctx.plugins().call(name, args);
                }
                return Err(EvalError::undefined_function(format!(
                    "{name} (declared external, no plugin registered)"
                )));
            }
        }

        if ctx.plugins().has(name) {
            return ctx.plugins().call(name, args);
        }

        if let Some(builtin) = self.registry.get(name, args.len()) {
            return builtin(ctx, args);
        }

        Err(EvalError::undefined_function(name))
    }

    /// Execute a user-defined function body in a fresh top-level scope
    fn call_user_function(
        &self,
        def: &FunctionDefinition,
        args: &[CqlValue],
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let body = def
            .body
            .as_ref()
            .ok_or_else(|| EvalError::undefined_function(&def.name))?
            .clone();

        ctx.push_function_scope();
        for (parameter, value) in def.parameters.iter().zip(args.iter()) {
            ctx.set_alias(&parameter.name, value.clone());
        }
        let result = self.evaluate(&body, ctx);
        ctx.pop_scope();
        result
    }

    fn eval_parameter_ref(&self, r: &Ref, ctx: &mut EvaluationContext) -> EvalResult<CqlValue> {
        self.with_ref_library(r.library.as_deref(), ctx, |eval, ctx| {
            if let Some(value) = ctx.get_parameter(&r.name) {
                return Ok(value.clone());
            }
            let library = ctx
                .current_library()
                .cloned()
                .ok_or_else(|| EvalError::internal("no library in scope"))?;
            let Some(parameter) = library.parameters.get(&r.name) else {
                return Err(EvalError::undefined_parameter(&r.name));
            };
            match &parameter.default {
                // Defaults evaluate lazily at first reference, then stick
                Some(default) => {
                    let value = eval.evaluate(default, ctx)?;
                    ctx.set_parameter(&r.name, value.clone());
                    Ok(value)
                }
                None => Ok(CqlValue::Null),
            }
        })
    }

    fn eval_operand_ref(&self, r: &NameRef, ctx: &mut EvaluationContext) -> EvalResult<CqlValue> {
        ctx.get_alias(&r.name)
            .cloned()
            .ok_or_else(|| EvalError::undefined_alias(&r.name))
    }

    fn eval_alias_ref(&self, r: &NameRef, ctx: &mut EvaluationContext) -> EvalResult<CqlValue> {
        ctx.get_alias(&r.name)
            .cloned()
            .ok_or_else(|| EvalError::undefined_alias(&r.name))
    }

    /// Unresolved identifier: query alias, context resource, parameter,
    /// then current-library definition
    fn eval_identifier_ref(
        &self,
        r: &NameRef,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        if let Some(value) = ctx.get_alias(&r.name) {
            return Ok(value.clone());
        }
        if ctx.context_name() == Some(r.name.as_str()) {
            if let Some(resource) = ctx.context_resource() {
                return Ok(resource.clone());
            }
        }
        if let Some(value) = ctx.get_parameter(&r.name) {
            return Ok(value.clone());
        }
        let has_parameter = ctx
            .current_library()
            .is_some_and(|library| library.parameters.contains_key(&r.name));
        if has_parameter {
            return self.eval_parameter_ref(
                &Ref {
                    name: r.name.clone(),
                    library: None,
                },
                ctx,
            );
        }
        let has_definition = ctx
            .current_library()
            .is_some_and(|library| library.definition(&r.name).is_some());
        if has_definition {
            return self.evaluate_definition(&r.name, ctx);
        }
        Err(EvalError::undefined_alias(&r.name))
    }

    fn eval_property(&self, p: &PropertyExpr, ctx: &mut EvaluationContext) -> EvalResult<CqlValue> {
        let source = if let Some(scope) = &p.scope {
            ctx.get_alias(scope)
                .cloned()
                .ok_or_else(|| EvalError::undefined_alias(scope))?
        } else if let Some(source) = &p.source {
            // `Alias.Definition` where the alias names an include resolves
            // as a cross-library expression reference
            if let ExprKind::IdentifierRef(name_ref) = &source.kind {
                let is_include = ctx.get_alias(&name_ref.name).is_none()
                    && ctx
                        .current_library()
                        .is_some_and(|library| library.include_by_alias(&name_ref.name).is_some());
                if is_include {
                    return self.with_ref_library(Some(&name_ref.name), ctx, |eval, ctx| {
                        eval.evaluate_definition(&p.path, ctx)
                    });
                }
            }
            self.evaluate(source, ctx)?
        } else {
            return Err(EvalError::internal("property without source or scope"));
        };

        Ok(navigation::navigate(&source, &p.path))
    }

    // =========================================================================
    // Selectors
    // =========================================================================

    fn eval_interval_selector(
        &self,
        selector: &IntervalSelector,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let low = self.eval_scalar_operand(&selector.low, ctx)?;
        let high = self.eval_scalar_operand(&selector.high, ctx)?;
        Ok(CqlValue::Interval(CqlInterval::new(
            Some(low),
            selector.low_closed,
            Some(high),
            selector.high_closed,
        )))
    }

    fn eval_list_selector(
        &self,
        selector: &ListSelector,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let elements = selector
            .elements
            .iter()
            .map(|element| self.evaluate(element, ctx))
            .collect::<EvalResult<Vec<_>>>()?;
        Ok(CqlValue::list(elements))
    }

    fn eval_tuple_selector(
        &self,
        selector: &TupleSelector,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let mut tuple = CqlTuple::new();
        for element in &selector.elements {
            let value = self.evaluate(&element.value, ctx)?;
            tuple.set(element.name.clone(), value);
        }
        Ok(CqlValue::Tuple(tuple))
    }

    fn eval_instance_selector(
        &self,
        selector: &InstanceSelector,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let mut tuple = CqlTuple::new();
        for element in &selector.elements {
            let value = self.evaluate(&element.value, ctx)?;
            tuple.set(element.name.clone(), value);
        }
        let class_name = selector
            .class_type
            .rsplit('.')
            .next()
            .unwrap_or(&selector.class_type);
        tuple.set("resourceType", CqlValue::string(class_name));
        Ok(CqlValue::Tuple(tuple))
    }

    fn eval_code_selector(
        &self,
        selector: &CodeSelector,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        // The system names a codesystem definition; a bare URI passes
        // through
        let (system, version) = match ctx
            .current_library()
            .and_then(|library| library.codesystems.get(&selector.system))
        {
            Some(cs) => (cs.uri.clone(), cs.version.clone()),
            None => (selector.system.clone(), None),
        };
        let mut code = CqlCode::new(selector.code.clone(), system);
        code.display = selector.display.clone();
        code.version = selector.version.clone().or(version);
        Ok(CqlValue::Code(code))
    }

    fn eval_concept_selector(
        &self,
        selector: &ConceptSelector,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let mut codes = Vec::with_capacity(selector.codes.len());
        for code_selector in &selector.codes {
            match self.eval_code_selector(code_selector, ctx)? {
                CqlValue::Code(code) => codes.push(code),
                _ => unreachable!("code selector yields a code"),
            }
        }
        Ok(CqlValue::Concept(CqlConcept::new(
            codes,
            selector.display.clone(),
        )))
    }

    // =========================================================================
    // Relations, set operations, interval accessors
    // =========================================================================

    fn eval_relation(
        &self,
        relation: &RelationExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        use crate::operators::datetime::{convert_precision, temporal_compare_at};
        use std::cmp::Ordering;

        let left = self.eval_operand(&relation.left, ctx)?;
        let right = self.eval_operand(&relation.right, ctx)?;
        let precision = relation.precision.map(convert_precision);

        let is_temporal = |v: &CqlValue| {
            matches!(v, CqlValue::Date(_) | CqlValue::DateTime(_) | CqlValue::Time(_))
        };

        let truth: Truth = match relation.op {
            RelationOp::In => match &right {
                CqlValue::Null => Truth::Unknown,
                CqlValue::List(list_value) => {
                    list::element_in_list(&left, list_value, ctx.units())
                }
                CqlValue::Interval(iv) => {
                    interval::point_in_interval_at(&left, iv, precision, ctx.units())?
                }
                other => {
                    return Err(EvalError::type_mismatch(
                        "List or Interval",
                        other.type_name(),
                    ));
                }
            },
            RelationOp::Contains => match &left {
                CqlValue::Null => Truth::Unknown,
                CqlValue::List(list_value) => {
                    list::element_in_list(&right, list_value, ctx.units())
                }
                CqlValue::Interval(iv) => {
                    interval::point_in_interval_at(&right, iv, precision, ctx.units())?
                }
                other => {
                    return Err(EvalError::type_mismatch(
                        "List or Interval",
                        other.type_name(),
                    ));
                }
            },
            RelationOp::ProperIn => match &right {
                CqlValue::Interval(iv) => {
                    interval::point_properly_in_interval(&left, iv, precision, ctx.units())?
                }
                CqlValue::List(list_value) => {
                    list::element_in_list(&left, list_value, ctx.units())
                }
                _ => Truth::Unknown,
            },
            RelationOp::ProperContains => match &left {
                CqlValue::Interval(iv) => {
                    interval::point_properly_in_interval(&right, iv, precision, ctx.units())?
                }
                CqlValue::List(list_value) => {
                    list::element_in_list(&right, list_value, ctx.units())
                }
                _ => Truth::Unknown,
            },
            RelationOp::Includes => self.relation_includes(&left, &right, precision, ctx)?,
            RelationOp::IncludedIn => self.relation_includes(&right, &left, precision, ctx)?,
            RelationOp::ProperIncludes => {
                self.relation_proper_includes(&left, &right, precision, ctx)?
            }
            RelationOp::ProperIncludedIn => {
                self.relation_proper_includes(&right, &left, precision, ctx)?
            }
            RelationOp::Before
            | RelationOp::After
            | RelationOp::SameAs
            | RelationOp::SameOrBefore
            | RelationOp::SameOrAfter
                if is_temporal(&left) && is_temporal(&right) =>
            {
                match temporal_compare_at(&left, &right, precision) {
                    None => Truth::Unknown,
                    Some(ordering) => Truth::from(match relation.op {
                        RelationOp::Before => ordering == Ordering::Less,
                        RelationOp::After => ordering == Ordering::Greater,
                        RelationOp::SameAs => ordering == Ordering::Equal,
                        RelationOp::SameOrBefore => ordering != Ordering::Greater,
                        RelationOp::SameOrAfter => ordering != Ordering::Less,
                        _ => unreachable!(),
                    }),
                }
            }
            RelationOp::Before => {
                let (a, b) = (to_interval(&left), to_interval(&right));
                match (a, b) {
                    (Some(a), Some(b)) => {
                        interval::interval_before(&a, &b, precision, ctx.units())?
                    }
                    _ => Truth::Unknown,
                }
            }
            RelationOp::After => {
                let (a, b) = (to_interval(&left), to_interval(&right));
                match (a, b) {
                    (Some(a), Some(b)) => {
                        interval::interval_after(&a, &b, precision, ctx.units())?
                    }
                    _ => Truth::Unknown,
                }
            }
            RelationOp::SameAs | RelationOp::SameOrBefore | RelationOp::SameOrAfter => {
                if left.is_null() || right.is_null() {
                    Truth::Unknown
                } else {
                    match comparison::cql_compare(&left, &right, ctx.units())? {
                        None => Truth::Unknown,
                        Some(ordering) => Truth::from(match relation.op {
                            RelationOp::SameAs => ordering == Ordering::Equal,
                            RelationOp::SameOrBefore => ordering != Ordering::Greater,
                            RelationOp::SameOrAfter => ordering != Ordering::Less,
                            _ => unreachable!(),
                        }),
                    }
                }
            }
            RelationOp::Meets
            | RelationOp::MeetsBefore
            | RelationOp::MeetsAfter
            | RelationOp::Overlaps
            | RelationOp::OverlapsBefore
            | RelationOp::OverlapsAfter
            | RelationOp::Starts
            | RelationOp::Ends => {
                let (Some(a), Some(b)) = (to_interval(&left), to_interval(&right)) else {
                    return Ok(CqlValue::Null);
                };
                match relation.op {
                    RelationOp::Meets => interval::meets(&a, &b, precision, ctx.units())?,
                    RelationOp::MeetsBefore => {
                        interval::meets_before(&a, &b, precision, ctx.units())?
                    }
                    RelationOp::MeetsAfter => {
                        interval::meets_after(&a, &b, precision, ctx.units())?
                    }
                    RelationOp::Overlaps => interval::overlaps_at(&a, &b, precision, ctx.units())?,
                    RelationOp::OverlapsBefore => {
                        interval::overlaps_before(&a, &b, precision, ctx.units())?
                    }
                    RelationOp::OverlapsAfter => {
                        interval::overlaps_after(&a, &b, precision, ctx.units())?
                    }
                    RelationOp::Starts => {
                        interval::interval_starts(&a, &b, precision, ctx.units())?
                    }
                    RelationOp::Ends => interval::interval_ends(&a, &b, precision, ctx.units())?,
                    _ => unreachable!(),
                }
            }
        };

        Ok(comparison::truth_to_value(truth))
    }

    fn relation_includes(
        &self,
        container: &CqlValue,
        contained: &CqlValue,
        precision: Option<lumen_cql_types::DateTimePrecision>,
        ctx: &EvaluationContext,
    ) -> EvalResult<Truth> {
        match (container, contained) {
            (CqlValue::Null, _) | (_, CqlValue::Null) => Ok(Truth::Unknown),
            (CqlValue::List(a), CqlValue::List(b)) => {
                Ok(list::list_includes_list(a, b, ctx.units()))
            }
            (CqlValue::List(a), element) => Ok(list::element_in_list(element, a, ctx.units())),
            (CqlValue::Interval(a), CqlValue::Interval(b)) => {
                interval::interval_includes(a, b, precision, ctx.units())
            }
            (CqlValue::Interval(a), point) => {
                interval::point_in_interval_at(point, a, precision, ctx.units())
            }
            (other, _) => Err(EvalError::type_mismatch(
                "List or Interval",
                other.type_name(),
            )),
        }
    }

    fn relation_proper_includes(
        &self,
        container: &CqlValue,
        contained: &CqlValue,
        precision: Option<lumen_cql_types::DateTimePrecision>,
        ctx: &EvaluationContext,
    ) -> EvalResult<Truth> {
        match (container, contained) {
            (CqlValue::Null, _) | (_, CqlValue::Null) => Ok(Truth::Unknown),
            (CqlValue::List(a), CqlValue::List(b)) => {
                let forward = list::list_includes_list(a, b, ctx.units());
                let backward = list::list_includes_list(b, a, ctx.units());
                Ok(forward.and(backward.not()))
            }
            (CqlValue::Interval(a), CqlValue::Interval(b)) => {
                interval::interval_properly_includes(a, b, precision, ctx.units())
            }
            (CqlValue::Interval(a), point) => {
                interval::point_properly_in_interval(point, a, precision, ctx.units())
            }
            (other, _) => Err(EvalError::type_mismatch(
                "List or Interval",
                other.type_name(),
            )),
        }
    }

    fn eval_set_op(
        &self,
        op: BinaryOp,
        expr: &lumen_cql_ast::BinaryExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let left = self.eval_operand(&expr.left, ctx)?;
        let right = self.eval_operand(&expr.right, ctx)?;

        match (&left, &right) {
            (CqlValue::Interval(a), CqlValue::Interval(b)) => match op {
                BinaryOp::Union => interval::interval_union(a, b, ctx.units()),
                BinaryOp::Intersect => interval::interval_intersect(a, b, ctx.units()),
                BinaryOp::Except => interval::interval_except(a, b, ctx.units()),
                _ => unreachable!(),
            },
            (CqlValue::List(a), CqlValue::List(b)) => Ok(match op {
                BinaryOp::Union => list::list_union(a, b, ctx.units()),
                BinaryOp::Intersect => list::list_intersect(a, b, ctx.units()),
                BinaryOp::Except => list::list_except(a, b, ctx.units()),
                _ => unreachable!(),
            }),
            // Union tolerates one null side for lists
            (CqlValue::Null, CqlValue::List(b)) if op == BinaryOp::Union => {
                Ok(CqlValue::List(b.clone()))
            }
            (CqlValue::List(a), CqlValue::Null) if op == BinaryOp::Union => {
                Ok(CqlValue::List(a.clone()))
            }
            (CqlValue::Null, _) | (_, CqlValue::Null) => Ok(CqlValue::Null),
            _ => Err(EvalError::type_mismatch(
                "List or Interval",
                format!("{} and {}", left.type_name(), right.type_name()),
            )),
        }
    }

    fn eval_interval_accessor(
        &self,
        op: UnaryOp,
        unary: &lumen_cql_ast::UnaryExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let operand = self.eval_scalar_operand(&unary.operand, ctx)?;
        let interval_value = match &operand {
            CqlValue::Null => return Ok(CqlValue::Null),
            CqlValue::Interval(iv) => iv,
            other => {
                return Err(EvalError::type_mismatch("Interval", other.type_name()));
            }
        };
        match op {
            UnaryOp::Start => interval::start_of(interval_value),
            UnaryOp::End => interval::end_of(interval_value),
            UnaryOp::Width => interval::width_of(interval_value, ctx.units()),
            UnaryOp::Size => interval::size_of(interval_value, ctx.units()),
            UnaryOp::PointFrom => interval::point_from(interval_value),
            _ => unreachable!(),
        }
    }

    // =========================================================================
    // Message
    // =========================================================================

    fn eval_message(
        &self,
        message: &MessageExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let source = self.evaluate(&message.source, ctx)?;
        let condition = self.evaluate(&message.condition, ctx)?;
        if !value_to_truth(&condition)?.is_true() {
            return Ok(source);
        }

        let code = match self.eval_scalar_operand(&message.code, ctx)? {
            CqlValue::Null => String::new(),
            CqlValue::String(s) => s,
            other => other.to_string(),
        };
        let severity = match self.eval_scalar_operand(&message.severity, ctx)? {
            CqlValue::String(s) => s.parse::<Severity>().unwrap_or(Severity::Debug),
            _ => Severity::Debug,
        };
        let text = match self.eval_scalar_operand(&message.message, ctx)? {
            CqlValue::Null => String::new(),
            CqlValue::String(s) => s,
            other => other.to_string(),
        };

        ctx.message_sink().emit(severity, &code, &text);
        if severity.is_fatal() {
            return Err(EvalErrorKind::MessageRaised {
                code,
                message: text,
            }
            .into());
        }
        // The source value passes through unchanged
        Ok(source)
    }
}

/// A point value read as a unit interval for interval relations
fn to_interval(value: &CqlValue) -> Option<CqlInterval> {
    match value {
        CqlValue::Interval(iv) => Some(iv.clone()),
        CqlValue::Null => None,
        point => Some(CqlInterval::closed(point.clone(), point.clone())),
    }
}

// ============================================================================
// Literal evaluation
// ============================================================================

fn eval_literal(literal: &Literal) -> CqlValue {
    match literal {
        Literal::Boolean(b) => CqlValue::Boolean(*b),
        Literal::Integer(i) => CqlValue::Integer(*i),
        Literal::Decimal(d) => CqlValue::Decimal(*d),
        Literal::String(s) => CqlValue::string(s.clone()),
        Literal::Date(d) => CqlValue::Date(CqlDate {
            year: d.year,
            month: d.month,
            day: d.day,
        }),
        Literal::DateTime(dt) => CqlValue::DateTime(CqlDateTime {
            year: dt.date.year,
            month: dt.date.month,
            day: dt.date.day,
            hour: dt.hour,
            minute: dt.minute,
            second: dt.second,
            millisecond: dt.millisecond,
            timezone_offset: dt.timezone_offset,
        }),
        Literal::Time(t) => CqlValue::Time(CqlTime {
            hour: t.hour,
            minute: t.minute,
            second: t.second,
            millisecond: t.millisecond,
        }),
    }
}

fn eval_quantity_literal(q: &QuantityLiteral) -> CqlValue {
    CqlValue::Quantity(match &q.unit {
        Some(unit) => CqlQuantity::new(q.value, unit.clone()),
        None => CqlQuantity::unitless(q.value),
    })
}

fn eval_ratio_literal(r: &RatioLiteral) -> CqlValue {
    let make = |q: &QuantityLiteral| match &q.unit {
        Some(unit) => CqlQuantity::new(q.value, unit.clone()),
        None => CqlQuantity::unitless(q.value),
    };
    CqlValue::Ratio(CqlRatio::new(make(&r.numerator), make(&r.denominator)))
}
