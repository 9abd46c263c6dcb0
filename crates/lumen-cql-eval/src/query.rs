//! Query pipeline evaluation
//!
//! Execution order is fixed: source cross-product, let bindings,
//! with/without semi-joins, where, then exactly one of aggregate or
//! return, then sort. Let values are computed once per row and carried in
//! the row. A query without a return clause and a single source yields
//! the bare elements.

use crate::context::EvaluationContext;
use crate::datasource::{default_code_path, RetrieveParameters};
use crate::engine::CqlEvaluator;
use crate::error::{EvalError, EvalResult};
use crate::operators::comparison::cql_equal;
use crate::operators::list::{compare_for_sort, dedupe};
use crate::operators::logical::value_to_truth;
use lumen_cql_ast::{
    AggregateClause, ExprKind, IterationExpr, LetBinding, Query, QuerySelection, RelatedSource,
    RelationshipClause, Retrieve, SortClause, SortDirection, SortKey, TimesExpr,
};
use lumen_cql_types::{CqlCode, CqlTuple, CqlValue};

/// One row of the pipeline: alias (and let) bindings in binding order
type QueryRow = Vec<(String, CqlValue)>;

impl CqlEvaluator {
    /// Evaluate a query expression
    pub(crate) fn eval_query(
        &self,
        query: &Query,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let mut rows = self.evaluate_sources(query, ctx)?;

        if !query.lets.is_empty() {
            rows = self.apply_lets(rows, &query.lets, ctx)?;
        }

        for clause in &query.relationships {
            rows = self.apply_relationship(rows, clause, ctx)?;
        }

        if let Some(where_clause) = &query.where_clause {
            let mut kept = Vec::new();
            for row in rows {
                self.bind_row(&row, ctx);
                let condition = self.evaluate(where_clause, ctx);
                ctx.pop_scope();
                // Keep the row only when the predicate is definitely true
                if value_to_truth(&condition?)?.is_true() {
                    kept.push(row);
                }
            }
            rows = kept;
        }

        match &query.selection {
            Some(QuerySelection::Aggregate(aggregate)) => {
                if let Some(sort) = &query.sort {
                    rows = self.sort_rows(rows, sort, query, ctx)?;
                }
                self.apply_aggregate(rows, aggregate, ctx)
            }
            Some(QuerySelection::Return(return_clause)) => {
                let mut results = Vec::with_capacity(rows.len());
                for row in &rows {
                    self.bind_row(row, ctx);
                    let value = self.evaluate(&return_clause.expression, ctx);
                    ctx.pop_scope();
                    results.push(value?);
                }
                // return deduplicates unless `all` is requested
                if !return_clause.all {
                    results = dedupe(results, ctx.units());
                }
                if let Some(sort) = &query.sort {
                    results = self.sort_values_by(results, sort, ctx)?;
                }
                Ok(CqlValue::list(results))
            }
            None => {
                let single_source = query.sources.len() == 1;
                let mut results: Vec<CqlValue> = rows
                    .into_iter()
                    .map(|row| {
                        if single_source {
                            // Bare elements, not row wrappers
                            row.into_iter()
                                .next()
                                .map(|(_, value)| value)
                                .unwrap_or(CqlValue::Null)
                        } else {
                            CqlValue::Tuple(CqlTuple::from_elements(row))
                        }
                    })
                    .collect();
                if let Some(sort) = &query.sort {
                    results = self.sort_values_by(results, sort, ctx)?;
                }
                Ok(CqlValue::list(results))
            }
        }
    }

    /// Evaluate the sources left to right; additional sources multiply
    /// the row set (Cartesian product)
    fn evaluate_sources(
        &self,
        query: &Query,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<Vec<QueryRow>> {
        let mut rows: Option<Vec<QueryRow>> = None;

        for source in &query.sources {
            let elements = self.source_elements(&source.expression, ctx)?;
            rows = Some(match rows {
                None => elements
                    .into_iter()
                    .map(|value| vec![(source.alias.clone(), value)])
                    .collect(),
                Some(existing) => {
                    let mut combined = Vec::with_capacity(existing.len() * elements.len());
                    for row in &existing {
                        for value in &elements {
                            let mut next = row.clone();
                            next.push((source.alias.clone(), value.clone()));
                            combined.push(next);
                        }
                    }
                    combined
                }
            });
        }

        Ok(rows.unwrap_or_default())
    }

    /// A source expression coerced to its element list
    fn source_elements(
        &self,
        expression: &lumen_cql_ast::Expr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<Vec<CqlValue>> {
        Ok(match self.evaluate(expression, ctx)? {
            CqlValue::List(list) => list.elements,
            CqlValue::Null => Vec::new(),
            single => vec![single],
        })
    }

    /// Push a scope holding all of a row's bindings
    fn bind_row(&self, row: &QueryRow, ctx: &mut EvaluationContext) {
        ctx.push_scope();
        for (name, value) in row {
            ctx.set_alias(name, value.clone());
        }
    }

    /// Evaluate let bindings once per row; bindings see earlier lets
    fn apply_lets(
        &self,
        rows: Vec<QueryRow>,
        lets: &[LetBinding],
        ctx: &mut EvaluationContext,
    ) -> EvalResult<Vec<QueryRow>> {
        let mut result = Vec::with_capacity(rows.len());
        for mut row in rows {
            for binding in lets {
                self.bind_row(&row, ctx);
                let value = self.evaluate(&binding.expression, ctx);
                ctx.pop_scope();
                row.push((binding.name.clone(), value?));
            }
            result.push(row);
        }
        Ok(result)
    }

    /// Semi-join: keep rows with (with) or without (without) a related
    /// element satisfying the such-that predicate
    fn apply_relationship(
        &self,
        rows: Vec<QueryRow>,
        clause: &RelationshipClause,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<Vec<QueryRow>> {
        let (related, keep_on_match) = match clause {
            RelationshipClause::With(related) => (related, true),
            RelationshipClause::Without(related) => (related, false),
        };
        let related_elements = self.source_elements(&related.expression, ctx)?;

        let mut result = Vec::new();
        for row in rows {
            let matched = self.any_related_match(&row, related, &related_elements, ctx)?;
            if matched == keep_on_match {
                result.push(row);
            }
        }
        Ok(result)
    }

    fn any_related_match(
        &self,
        row: &QueryRow,
        related: &RelatedSource,
        elements: &[CqlValue],
        ctx: &mut EvaluationContext,
    ) -> EvalResult<bool> {
        for element in elements {
            self.bind_row(row, ctx);
            ctx.set_alias(&related.alias, element.clone());
            let condition = self.evaluate(&related.such_that, ctx);
            ctx.pop_scope();
            if value_to_truth(&condition?)?.is_true() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Fold the rows through the aggregate body
    fn apply_aggregate(
        &self,
        rows: Vec<QueryRow>,
        aggregate: &AggregateClause,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let mut accumulator = match &aggregate.starting {
            Some(starting) => self.evaluate(starting, ctx)?,
            None => CqlValue::Null,
        };

        let rows = if aggregate.distinct {
            dedupe_rows(rows, ctx)
        } else {
            rows
        };

        for row in rows {
            self.bind_row(&row, ctx);
            ctx.set_alias(&aggregate.identifier, accumulator.clone());
            ctx.push_total(accumulator.clone());
            let result = self.evaluate(&aggregate.expression, ctx);
            ctx.pop_total();
            ctx.pop_scope();
            accumulator = result?;
        }

        Ok(accumulator)
    }

    /// Order result values by the sort items; nulls sort last and
    /// direction defaults to ascending
    fn sort_values_by(
        &self,
        mut values: Vec<CqlValue>,
        sort: &SortClause,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<Vec<CqlValue>> {
        for item in sort.items.iter().rev() {
            // Compute each element's key with $this bound to the item
            let mut keyed: Vec<(CqlValue, CqlValue)> = Vec::with_capacity(values.len());
            for value in values {
                let key = match &item.key {
                    SortKey::Natural => value.clone(),
                    SortKey::Expression(key_expr) => {
                        ctx.push_scope();
                        ctx.push_this(value.clone());
                        let key = self.evaluate(key_expr, ctx);
                        ctx.pop_this();
                        ctx.pop_scope();
                        key?
                    }
                };
                keyed.push((key, value));
            }
            keyed.sort_by(|(ka, _), (kb, _)| {
                let ordering = compare_for_sort(ka, kb, ctx.units());
                match item.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
            values = keyed.into_iter().map(|(_, value)| value).collect();
        }
        Ok(values)
    }

    /// Order rows ahead of aggregation. Only single-source rows have a
    /// natural item to sort by.
    fn sort_rows(
        &self,
        rows: Vec<QueryRow>,
        sort: &SortClause,
        query: &Query,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<Vec<QueryRow>> {
        if query.sources.len() != 1 {
            return Ok(rows);
        }
        let values: Vec<CqlValue> = rows
            .iter()
            .map(|row| row.first().map(|(_, v)| v.clone()).unwrap_or(CqlValue::Null))
            .collect();
        let sorted = self.sort_values_by(values, sort, ctx)?;

        // Reorder the rows to follow their sorted source elements
        let mut remaining = rows;
        let mut result = Vec::with_capacity(remaining.len());
        for value in sorted {
            if let Some(pos) = remaining.iter().position(|row| {
                row.first()
                    .map(|(_, v)| cql_equal(v, &value, ctx.units()) == Some(true) || v == &value)
                    .unwrap_or(false)
            }) {
                result.push(remaining.remove(pos));
            }
        }
        result.extend(remaining);
        Ok(result)
    }

    // =========================================================================
    // Retrieve
    // =========================================================================

    /// Evaluate a retrieve: resolve the terminology filter, consult the
    /// data source, and wrap the results
    pub(crate) fn eval_retrieve(
        &self,
        retrieve: &Retrieve,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let mut code_filter: Option<Vec<CqlCode>> = None;
        let mut valueset_url: Option<String> = None;

        if let Some(codes_expr) = &retrieve.codes {
            match &codes_expr.kind {
                // A valueset reference expands through the adapter first
                ExprKind::ValueSetRef(r) => {
                    let url = self.resolve_valueset_url(r, ctx)?;
                    if let Some(adapter) = ctx.terminology().cloned() {
                        code_filter = Some(adapter.expand(&url)?);
                    }
                    valueset_url = Some(url);
                }
                _ => {
                    let value = self.evaluate(codes_expr, ctx)?;
                    code_filter = Some(extract_codes(&value));
                }
            }
        }

        let date_range = match &retrieve.date_range {
            Some(range_expr) => match self.eval_scalar_operand(range_expr, ctx)? {
                CqlValue::Interval(interval) => Some(interval),
                CqlValue::Null => None,
                other => {
                    return Err(EvalError::type_mismatch("Interval", other.type_name()));
                }
            },
            None => None,
        };

        let source = ctx
            .data_source()
            .cloned()
            .ok_or_else(|| EvalError::retrieve_failed("no data source configured"))?;

        let context_resource = match ctx.context_resource() {
            Some(CqlValue::Resource(resource)) => Some(resource.clone()),
            _ => None,
        };

        let code_path = retrieve
            .code_property
            .as_deref()
            .or_else(|| default_code_path(&retrieve.data_type));

        let params = RetrieveParameters {
            resource_type: &retrieve.data_type,
            context: context_resource.as_ref(),
            code_path,
            codes: code_filter.as_deref(),
            valueset: valueset_url.as_deref(),
            date_path: retrieve.date_property.as_deref(),
            date_range: date_range.as_ref(),
        };

        let resources = source
            .retrieve(&params)
            .map_err(EvalError::retrieve_failed)?;

        Ok(CqlValue::list(
            resources.into_iter().map(CqlValue::Resource).collect(),
        ))
    }

    // =========================================================================
    // Iteration nodes
    // =========================================================================

    /// Map an expression over a source with `$this` and `$index` bound
    pub(crate) fn eval_for_each(
        &self,
        iteration: &IterationExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let elements = self.source_elements(&iteration.source, ctx)?;
        let mut results = Vec::with_capacity(elements.len());
        for (index, element) in elements.into_iter().enumerate() {
            ctx.push_this(element);
            ctx.push_index(index as i64);
            let value = self.evaluate(&iteration.body, ctx);
            ctx.pop_index();
            ctx.pop_this();
            results.push(value?);
        }
        Ok(CqlValue::list(results))
    }

    /// Keep elements whose condition is definitely true
    pub(crate) fn eval_filter(
        &self,
        iteration: &IterationExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let elements = self.source_elements(&iteration.source, ctx)?;
        let mut results = Vec::new();
        for (index, element) in elements.into_iter().enumerate() {
            ctx.push_this(element.clone());
            ctx.push_index(index as i64);
            let condition = self.evaluate(&iteration.body, ctx);
            ctx.pop_index();
            ctx.pop_this();
            if value_to_truth(&condition?)?.is_true() {
                results.push(element);
            }
        }
        Ok(CqlValue::list(results))
    }

    /// Apply the projection repeatedly until no new elements appear
    pub(crate) fn eval_repeat(
        &self,
        iteration: &IterationExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let mut frontier = self.source_elements(&iteration.source, ctx)?;
        let mut collected: Vec<CqlValue> = Vec::new();

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for element in frontier {
                ctx.push_this(element);
                let value = self.evaluate(&iteration.body, ctx);
                ctx.pop_this();
                match value? {
                    CqlValue::Null => {}
                    CqlValue::List(list) => next.extend(list.elements),
                    single => next.push(single),
                }
            }
            frontier = Vec::new();
            for candidate in next {
                let seen = collected
                    .iter()
                    .any(|existing| cql_equal(existing, &candidate, ctx.units()) == Some(true));
                if !seen {
                    collected.push(candidate.clone());
                    frontier.push(candidate);
                }
            }
        }

        Ok(CqlValue::list(collected))
    }

    /// Cartesian product of two tuple lists, merging elements per pair
    pub(crate) fn eval_times(
        &self,
        times: &TimesExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let left = self.source_elements(&times.left, ctx)?;
        let right = self.source_elements(&times.right, ctx)?;

        let mut results = Vec::with_capacity(left.len() * right.len());
        for l in &left {
            let CqlValue::Tuple(lt) = l else {
                return Err(EvalError::type_mismatch("Tuple", l.type_name()));
            };
            for r in &right {
                let CqlValue::Tuple(rt) = r else {
                    return Err(EvalError::type_mismatch("Tuple", r.type_name()));
                };
                let mut merged = lt.clone();
                for (name, value) in rt.iter() {
                    merged.set(name.clone(), value.clone());
                }
                results.push(CqlValue::Tuple(merged));
            }
        }
        Ok(CqlValue::list(results))
    }
}

/// Deduplicate rows by pairwise value equality
fn dedupe_rows(rows: Vec<QueryRow>, ctx: &EvaluationContext) -> Vec<QueryRow> {
    let mut result: Vec<QueryRow> = Vec::new();
    for row in rows {
        let duplicate = result.iter().any(|existing| {
            existing.len() == row.len()
                && existing
                    .iter()
                    .zip(row.iter())
                    .all(|((_, a), (_, b))| cql_equal(a, b, ctx.units()) == Some(true))
        });
        if !duplicate {
            result.push(row);
        }
    }
    result
}

/// Collect the codes carried by a value (Code, Concept, or a list)
pub fn extract_codes(value: &CqlValue) -> Vec<CqlCode> {
    match value {
        CqlValue::Code(code) => vec![code.clone()],
        CqlValue::Concept(concept) => concept.codes.to_vec(),
        CqlValue::List(list) => list.iter().flat_map(extract_codes).collect(),
        _ => Vec::new(),
    }
}
