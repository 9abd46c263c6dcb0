//! Built-in function registry
//!
//! Maps `(name, arity)` to implementations covering the arithmetic,
//! string, list, aggregate, datetime and conversion categories. User
//! library functions and host plugins resolve ahead of this table; see
//! the evaluator's resolution order.

use crate::context::EvaluationContext;
use crate::error::{EvalError, EvalResult};
use crate::navigation::{extensions_of, unwrap_primitive};
use crate::operators::{arithmetic, list, string, type_ops};
use lumen_cql_ast::ConversionTarget;
use lumen_cql_types::CqlValue;
use std::collections::HashMap;

/// A built-in function implementation
pub type BuiltinFn = fn(&mut EvaluationContext, &[CqlValue]) -> EvalResult<CqlValue>;

/// Registry of built-in functions keyed by name and arity
#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<(String, usize), BuiltinFn>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with every standard function registered
    pub fn with_standard_functions() -> Self {
        let mut registry = Self::new();
        registry.register_standard_functions();
        registry
    }

    /// Register a function under a name and arity
    pub fn register(&mut self, name: impl Into<String>, arity: usize, function: BuiltinFn) {
        self.functions.insert((name.into(), arity), function);
    }

    /// Register one function for a range of arities
    pub fn register_arities(
        &mut self,
        name: &str,
        arities: std::ops::RangeInclusive<usize>,
        function: BuiltinFn,
    ) {
        for arity in arities {
            self.register(name, arity, function);
        }
    }

    /// Look up a function by name and arity
    pub fn get(&self, name: &str, arity: usize) -> Option<&BuiltinFn> {
        self.functions.get(&(name.to_string(), arity))
    }

    /// Whether any overload exists under a name
    pub fn has(&self, name: &str) -> bool {
        self.functions.keys().any(|(n, _)| n == name)
    }

    fn register_standard_functions(&mut self) {
        // --- arithmetic & math ---
        self.register("Abs", 1, |_, args| arithmetic::abs_value(scalar(args, 0)));
        self.register("Ceiling", 1, |_, args| {
            arithmetic::ceiling_value(scalar(args, 0))
        });
        self.register("Floor", 1, |_, args| {
            arithmetic::floor_value(scalar(args, 0))
        });
        self.register("Truncate", 1, |_, args| {
            arithmetic::truncate_value(scalar(args, 0))
        });
        self.register("Round", 1, |_, args| {
            arithmetic::round_value(scalar(args, 0), None)
        });
        self.register("Round", 2, |_, args| {
            let digits = match scalar(args, 1) {
                CqlValue::Integer(i) => Some(*i),
                CqlValue::Null => None,
                other => {
                    return Err(EvalError::type_mismatch("Integer", other.type_name()));
                }
            };
            arithmetic::round_value(scalar(args, 0), digits)
        });
        self.register("Ln", 1, |_, args| arithmetic::ln_value(scalar(args, 0)));
        self.register("Log", 2, |_, args| {
            arithmetic::log_value(scalar(args, 0), scalar(args, 1))
        });
        self.register("Exp", 1, |_, args| arithmetic::exp_value(scalar(args, 0)));
        self.register("Power", 2, |_, args| {
            let (base, exp) = (scalar(args, 0), scalar(args, 1));
            if base.is_null() || exp.is_null() {
                return Ok(CqlValue::Null);
            }
            arithmetic::power_values(base, exp)
        });
        self.register("Sqrt", 1, |_, args| arithmetic::sqrt_value(scalar(args, 0)));
        self.register("Precision", 1, |_, args| {
            arithmetic::precision_of(scalar(args, 0))
        });
        self.register("LowBoundary", 2, |_, args| {
            arithmetic::boundary_of(scalar(args, 0), integer_or_none(args, 1)?, false)
        });
        self.register("HighBoundary", 2, |_, args| {
            arithmetic::boundary_of(scalar(args, 0), integer_or_none(args, 1)?, true)
        });
        self.register("MinValue", 1, |_, args| match scalar(args, 0) {
            CqlValue::String(name) => arithmetic::extreme_value(name, false),
            other => Err(EvalError::type_mismatch("String", other.type_name())),
        });
        self.register("MaxValue", 1, |_, args| match scalar(args, 0) {
            CqlValue::String(name) => arithmetic::extreme_value(name, true),
            other => Err(EvalError::type_mismatch("String", other.type_name())),
        });
        self.register("Successor", 1, |_, args| {
            arithmetic::successor_value(scalar(args, 0))
        });
        self.register("Predecessor", 1, |_, args| {
            arithmetic::predecessor_value(scalar(args, 0))
        });

        // --- string ---
        self.register("Concatenate", 2, |_, args| {
            string::concatenate(scalar(args, 0), scalar(args, 1))
        });
        self.register("Combine", 1, |_, args| string::combine(arg(args, 0), None));
        self.register("Combine", 2, |_, args| {
            string::combine(arg(args, 0), Some(scalar(args, 1)))
        });
        self.register("Split", 2, |_, args| {
            string::split(scalar(args, 0), scalar(args, 1))
        });
        self.register("Upper", 1, |_, args| string::upper(scalar(args, 0)));
        self.register("Lower", 1, |_, args| string::lower(scalar(args, 0)));
        self.register("Substring", 2, |_, args| {
            string::substring(scalar(args, 0), scalar(args, 1), None)
        });
        self.register("Substring", 3, |_, args| {
            string::substring(scalar(args, 0), scalar(args, 1), Some(scalar(args, 2)))
        });
        self.register("StartsWith", 2, |_, args| {
            string::starts_with(scalar(args, 0), scalar(args, 1))
        });
        self.register("EndsWith", 2, |_, args| {
            string::ends_with(scalar(args, 0), scalar(args, 1))
        });
        self.register("Matches", 2, |_, args| {
            string::matches(scalar(args, 0), scalar(args, 1))
        });
        self.register("ReplaceMatches", 3, |_, args| {
            string::replace_matches(scalar(args, 0), scalar(args, 1), scalar(args, 2))
        });
        self.register("Replace", 3, |_, args| {
            string::replace(scalar(args, 0), scalar(args, 1), scalar(args, 2))
        });
        self.register("Indexer", 2, |_, args| {
            string::indexer(scalar(args, 0), scalar(args, 1))
        });
        self.register("PositionOf", 2, |_, args| {
            string::position_of(scalar(args, 0), scalar(args, 1))
        });
        self.register("LastPositionOf", 2, |_, args| {
            string::last_position_of(scalar(args, 0), scalar(args, 1))
        });
        self.register("Trim", 1, |_, args| string::trim(scalar(args, 0)));
        // Contains covers both substring and list membership
        self.register("Contains", 2, |ctx, args| match arg(args, 0) {
            CqlValue::List(list_value) => Ok(crate::operators::comparison::truth_to_value(
                list::element_in_list(scalar(args, 1), list_value, ctx.units()),
            )),
            _ => string::string_contains(scalar(args, 0), scalar(args, 1)),
        });

        // --- list ---
        self.register("First", 1, |_, args| list::first(arg(args, 0)));
        self.register("Last", 1, |_, args| list::last(arg(args, 0)));
        self.register("Tail", 1, |_, args| list::tail(arg(args, 0)));
        self.register("Take", 2, |_, args| {
            list::take(arg(args, 0), scalar(args, 1))
        });
        self.register("Skip", 2, |_, args| {
            list::skip(arg(args, 0), scalar(args, 1))
        });
        // Length covers both strings and lists
        self.register("Length", 1, |_, args| match arg(args, 0) {
            CqlValue::String(_) => string::string_length(scalar(args, 0)),
            other => list::list_length(other),
        });
        self.register("Exists", 1, |_, args| list::exists(arg(args, 0)));
        self.register("Flatten", 1, |_, args| list::flatten(arg(args, 0)));
        self.register("Distinct", 1, |ctx, args| {
            list::distinct(arg(args, 0), ctx.units())
        });
        self.register("Sort", 1, |ctx, args| {
            list::sort_values(arg(args, 0), ctx.units())
        });
        self.register("IndexOf", 2, |ctx, args| {
            list::index_of(arg(args, 0), scalar(args, 1), ctx.units())
        });
        self.register("Singleton", 1, |_, args| list::singleton_from(arg(args, 0)));
        self.register("SingletonFrom", 1, |_, args| {
            list::singleton_from(arg(args, 0))
        });
        self.register("Reverse", 1, |_, args| list::reverse(arg(args, 0)));
        self.register("Slice", 3, |_, args| {
            list::slice(arg(args, 0), scalar(args, 1), scalar(args, 2))
        });
        self.register("Union", 2, set_union);
        self.register("Intersect", 2, set_intersect);
        self.register("Except", 2, set_except);

        // --- aggregates ---
        self.register("Count", 1, |_, args| list::count(arg(args, 0)));
        self.register("Sum", 1, |ctx, args| list::sum(arg(args, 0), ctx.units()));
        self.register("Avg", 1, |ctx, args| list::avg(arg(args, 0), ctx.units()));
        self.register("Min", 1, |ctx, args| list::min(arg(args, 0), ctx.units()));
        self.register("Max", 1, |ctx, args| list::max(arg(args, 0), ctx.units()));
        self.register("Median", 1, |ctx, args| {
            list::median(arg(args, 0), ctx.units())
        });
        self.register("Mode", 1, |ctx, args| list::mode(arg(args, 0), ctx.units()));
        self.register("Variance", 1, |_, args| list::variance(arg(args, 0)));
        self.register("PopulationVariance", 1, |_, args| {
            list::population_variance(arg(args, 0))
        });
        self.register("StdDev", 1, |_, args| list::stddev(arg(args, 0)));
        self.register("PopulationStdDev", 1, |_, args| {
            list::population_stddev(arg(args, 0))
        });
        self.register("AllTrue", 1, |_, args| list::all_true(arg(args, 0)));
        self.register("AnyTrue", 1, |_, args| list::any_true(arg(args, 0)));
        self.register("AllFalse", 1, |_, args| list::all_false(arg(args, 0)));
        self.register("AnyFalse", 1, |_, args| list::any_false(arg(args, 0)));
        self.register("Product", 1, |ctx, args| {
            list::product(arg(args, 0), ctx.units())
        });
        self.register("GeometricMean", 1, |_, args| {
            list::geometric_mean(arg(args, 0))
        });

        // --- datetime ---
        self.register_arities("Date", 1..=3, |_, args| {
            crate::operators::datetime::build_date(&scalar_args(args))
        });
        self.register_arities("DateTime", 1..=8, |_, args| {
            crate::operators::datetime::build_datetime(&scalar_args(args))
        });
        self.register_arities("Time", 1..=4, |_, args| {
            crate::operators::datetime::build_time(&scalar_args(args))
        });
        self.register("Today", 0, |ctx, _| Ok(CqlValue::Date(ctx.today())));
        self.register("Now", 0, |ctx, _| Ok(CqlValue::DateTime(ctx.now())));
        self.register("TimeOfDay", 0, |ctx, _| Ok(CqlValue::Time(ctx.time_of_day())));

        // --- conversion ---
        self.register("ToString", 1, |_, args| {
            Ok(type_ops::convert_value(scalar(args, 0), ConversionTarget::String)?)
        });
        self.register("ToBoolean", 1, |_, args| {
            type_ops::convert_value(scalar(args, 0), ConversionTarget::Boolean)
        });
        self.register("ToInteger", 1, |_, args| {
            type_ops::convert_value(scalar(args, 0), ConversionTarget::Integer)
        });
        self.register("ToLong", 1, |_, args| {
            type_ops::convert_value(scalar(args, 0), ConversionTarget::Long)
        });
        self.register("ToDecimal", 1, |_, args| {
            type_ops::convert_value(scalar(args, 0), ConversionTarget::Decimal)
        });
        self.register("ToDate", 1, |_, args| {
            type_ops::convert_value(scalar(args, 0), ConversionTarget::Date)
        });
        self.register("ToDateTime", 1, |_, args| {
            type_ops::convert_value(scalar(args, 0), ConversionTarget::DateTime)
        });
        self.register("ToTime", 1, |_, args| {
            type_ops::convert_value(scalar(args, 0), ConversionTarget::Time)
        });
        self.register("ToQuantity", 1, |_, args| {
            type_ops::convert_value(scalar(args, 0), ConversionTarget::Quantity)
        });
        self.register("ToRatio", 1, |_, args| {
            type_ops::convert_value(scalar(args, 0), ConversionTarget::Ratio)
        });
        self.register("ToConcept", 1, |_, args| {
            type_ops::convert_value(scalar(args, 0), ConversionTarget::Concept)
        });
        self.register("ConvertsToBoolean", 1, |_, args| {
            type_ops::converts_to(scalar(args, 0), ConversionTarget::Boolean)
        });
        self.register("ConvertsToInteger", 1, |_, args| {
            type_ops::converts_to(scalar(args, 0), ConversionTarget::Integer)
        });
        self.register("ConvertsToLong", 1, |_, args| {
            type_ops::converts_to(scalar(args, 0), ConversionTarget::Long)
        });
        self.register("ConvertsToDecimal", 1, |_, args| {
            type_ops::converts_to(scalar(args, 0), ConversionTarget::Decimal)
        });
        self.register("ConvertsToString", 1, |_, args| {
            type_ops::converts_to(scalar(args, 0), ConversionTarget::String)
        });
        self.register("ConvertsToDate", 1, |_, args| {
            type_ops::converts_to(scalar(args, 0), ConversionTarget::Date)
        });
        self.register("ConvertsToDateTime", 1, |_, args| {
            type_ops::converts_to(scalar(args, 0), ConversionTarget::DateTime)
        });
        self.register("ConvertsToTime", 1, |_, args| {
            type_ops::converts_to(scalar(args, 0), ConversionTarget::Time)
        });
        self.register("ConvertsToQuantity", 1, |_, args| {
            type_ops::converts_to(scalar(args, 0), ConversionTarget::Quantity)
        });
        self.register("ConvertsToRatio", 1, |_, args| {
            type_ops::converts_to(scalar(args, 0), ConversionTarget::Ratio)
        });
        self.register("ConvertsToConcept", 1, |_, args| {
            type_ops::converts_to(scalar(args, 0), ConversionTarget::Concept)
        });
        self.register("ConvertQuantity", 2, |ctx, args| {
            type_ops::convert_quantity(scalar(args, 0), scalar(args, 1), ctx.units())
        });

        // --- FHIR helpers ---
        // extension(source, url): read extensions from a primitive
        // wrapper or a resource
        self.register("extension", 2, |_, args| {
            let url = match scalar(args, 1) {
                CqlValue::String(url) => Some(url.clone()),
                CqlValue::Null => None,
                other => {
                    return Err(EvalError::type_mismatch("String", other.type_name()));
                }
            };
            Ok(extensions_of(arg(args, 0), url.as_deref()))
        });
    }
}

/// A raw argument; missing positions read as null
fn arg(args: &[CqlValue], index: usize) -> &CqlValue {
    args.get(index).unwrap_or(&CqlValue::Null)
}

/// A scalar argument: wrapper-free, with singleton lists unwrapped
fn scalar(args: &[CqlValue], index: usize) -> &CqlValue {
    let value = unwrap_primitive(arg(args, index));
    if let CqlValue::List(list_value) = value {
        if list_value.len() == 1 {
            return unwrap_primitive(&list_value.elements[0]);
        }
    }
    value
}

/// All arguments as scalars
fn scalar_args(args: &[CqlValue]) -> Vec<CqlValue> {
    (0..args.len()).map(|i| scalar(args, i).clone()).collect()
}

fn integer_or_none(args: &[CqlValue], index: usize) -> EvalResult<Option<i64>> {
    match scalar(args, index) {
        CqlValue::Integer(i) => Ok(Some(*i)),
        CqlValue::Null => Ok(None),
        other => Err(EvalError::type_mismatch("Integer", other.type_name())),
    }
}

fn set_union(ctx: &mut EvaluationContext, args: &[CqlValue]) -> EvalResult<CqlValue> {
    match (arg(args, 0), arg(args, 1)) {
        (CqlValue::List(a), CqlValue::List(b)) => Ok(list::list_union(a, b, ctx.units())),
        (CqlValue::Interval(a), CqlValue::Interval(b)) => {
            crate::operators::interval::interval_union(a, b, ctx.units())
        }
        (CqlValue::Null, CqlValue::List(b)) => Ok(CqlValue::List(b.clone())),
        (CqlValue::List(a), CqlValue::Null) => Ok(CqlValue::List(a.clone())),
        (CqlValue::Null, _) | (_, CqlValue::Null) => Ok(CqlValue::Null),
        (a, _) => Err(EvalError::type_mismatch("List or Interval", a.type_name())),
    }
}

fn set_intersect(ctx: &mut EvaluationContext, args: &[CqlValue]) -> EvalResult<CqlValue> {
    match (arg(args, 0), arg(args, 1)) {
        (CqlValue::List(a), CqlValue::List(b)) => Ok(list::list_intersect(a, b, ctx.units())),
        (CqlValue::Interval(a), CqlValue::Interval(b)) => {
            crate::operators::interval::interval_intersect(a, b, ctx.units())
        }
        (CqlValue::Null, _) | (_, CqlValue::Null) => Ok(CqlValue::Null),
        (a, _) => Err(EvalError::type_mismatch("List or Interval", a.type_name())),
    }
}

fn set_except(ctx: &mut EvaluationContext, args: &[CqlValue]) -> EvalResult<CqlValue> {
    match (arg(args, 0), arg(args, 1)) {
        (CqlValue::List(a), CqlValue::List(b)) => Ok(list::list_except(a, b, ctx.units())),
        (CqlValue::Interval(a), CqlValue::Interval(b)) => {
            crate::operators::interval::interval_except(a, b, ctx.units())
        }
        (CqlValue::Null, _) | (_, CqlValue::Null) => Ok(CqlValue::Null),
        (a, _) => Err(EvalError::type_mismatch("List or Interval", a.type_name())),
    }
}
