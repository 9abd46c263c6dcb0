//! Type tests, casts and conversions
//!
//! `is` tests structurally: primitives by variant, resources by
//! `resourceType`. `as` returns the value when the test holds, null
//! otherwise, or raises in strict mode. The `To*` conversions yield null
//! for unconvertible values; `ConvertsTo*` report the same as a boolean.

use crate::error::{EvalError, EvalResult};
use crate::navigation::unwrap_primitive;
use crate::units::UnitConverter;
use lumen_cql_ast::{ConversionTarget, TypeSpecifier};
use lumen_cql_types::{
    CqlCode, CqlConcept, CqlDate, CqlDateTime, CqlQuantity, CqlRatio, CqlTime, CqlValue,
};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Structural type test
pub fn value_matches_type(value: &CqlValue, specifier: &TypeSpecifier) -> bool {
    let value = unwrap_primitive(value);
    match specifier {
        TypeSpecifier::Named(_) => {
            let name = specifier.simple_name().unwrap_or_default();
            match name {
                "Any" => true,
                "Integer" | "Long" => matches!(value, CqlValue::Integer(_)),
                "Decimal" => matches!(value, CqlValue::Decimal(_)),
                "Boolean" => matches!(value, CqlValue::Boolean(_)),
                "String" => matches!(value, CqlValue::String(_)),
                "Date" => matches!(value, CqlValue::Date(_)),
                "DateTime" => matches!(value, CqlValue::DateTime(_)),
                "Time" => matches!(value, CqlValue::Time(_)),
                "Quantity" => matches!(value, CqlValue::Quantity(_)),
                "Ratio" => matches!(value, CqlValue::Ratio(_)),
                "Code" => matches!(value, CqlValue::Code(_)),
                "Concept" | "CodeableConcept" => matches!(value, CqlValue::Concept(_)),
                "Tuple" => matches!(value, CqlValue::Tuple(_)),
                // Any other name tests a resource type
                resource_type => match value {
                    CqlValue::Resource(r) => r.resource_type == resource_type,
                    _ => false,
                },
            }
        }
        TypeSpecifier::List(inner) => match value {
            CqlValue::List(list) => list.iter().all(|v| v.is_null() || value_matches_type(v, inner)),
            _ => false,
        },
        TypeSpecifier::Interval(inner) => match value {
            CqlValue::Interval(interval) => [interval.low(), interval.high()]
                .into_iter()
                .flatten()
                .all(|v| value_matches_type(v, inner)),
            _ => false,
        },
        TypeSpecifier::Tuple(elements) => match value {
            CqlValue::Tuple(tuple) => elements.iter().all(|(name, ty)| {
                tuple
                    .get(name)
                    .is_some_and(|v| v.is_null() || value_matches_type(v, ty))
            }),
            _ => false,
        },
        TypeSpecifier::Choice(choices) => {
            choices.iter().any(|ty| value_matches_type(value, ty))
        }
    }
}

/// `as`: the value when the test holds, null otherwise; strict casts
/// raise
pub fn cast_value(
    value: &CqlValue,
    specifier: &TypeSpecifier,
    strict: bool,
) -> EvalResult<CqlValue> {
    if value.is_null() {
        return Ok(CqlValue::Null);
    }
    if value_matches_type(value, specifier) {
        return Ok(unwrap_primitive(value).clone());
    }
    // Integer promotes implicitly to Decimal
    if specifier.simple_name() == Some("Decimal") {
        if let CqlValue::Integer(i) = unwrap_primitive(value) {
            return Ok(CqlValue::Decimal(Decimal::from(*i)));
        }
    }
    if strict {
        Err(EvalError::cast(value.type_name(), specifier.to_string()))
    } else {
        Ok(CqlValue::Null)
    }
}

/// Dispatch a `To*` conversion
pub fn convert_value(value: &CqlValue, target: ConversionTarget) -> EvalResult<CqlValue> {
    let value = unwrap_primitive(value);
    if value.is_null() {
        return Ok(CqlValue::Null);
    }
    Ok(match target {
        ConversionTarget::Boolean => to_boolean(value),
        ConversionTarget::Integer | ConversionTarget::Long => to_integer(value),
        ConversionTarget::Decimal => to_decimal(value),
        ConversionTarget::String => to_string_value(value),
        ConversionTarget::Date => to_date(value),
        ConversionTarget::DateTime => to_datetime(value),
        ConversionTarget::Time => to_time(value),
        ConversionTarget::Quantity => to_quantity(value),
        ConversionTarget::Ratio => to_ratio(value),
        ConversionTarget::Concept => to_concept(value),
    })
}

/// `ConvertsTo*`: whether the conversion would produce a value
pub fn converts_to(value: &CqlValue, target: ConversionTarget) -> EvalResult<CqlValue> {
    if value.is_null() {
        return Ok(CqlValue::Null);
    }
    let converted = convert_value(value, target)?;
    Ok(CqlValue::Boolean(!converted.is_null()))
}

/// ToBoolean: booleans, 0/1 numerics, and the usual string spellings
pub fn to_boolean(value: &CqlValue) -> CqlValue {
    match value {
        CqlValue::Boolean(b) => CqlValue::Boolean(*b),
        CqlValue::Integer(1) => CqlValue::Boolean(true),
        CqlValue::Integer(0) => CqlValue::Boolean(false),
        CqlValue::Decimal(d) if *d == Decimal::ONE => CqlValue::Boolean(true),
        CqlValue::Decimal(d) if d.is_zero() => CqlValue::Boolean(false),
        CqlValue::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => CqlValue::Boolean(true),
            "false" | "f" | "no" | "n" | "0" => CqlValue::Boolean(false),
            _ => CqlValue::Null,
        },
        _ => CqlValue::Null,
    }
}

/// ToInteger
pub fn to_integer(value: &CqlValue) -> CqlValue {
    match value {
        CqlValue::Integer(i) => CqlValue::Integer(*i),
        CqlValue::Boolean(b) => CqlValue::Integer(i64::from(*b)),
        CqlValue::String(s) => s
            .trim()
            .parse::<i64>()
            .map(CqlValue::Integer)
            .unwrap_or(CqlValue::Null),
        _ => CqlValue::Null,
    }
}

/// ToDecimal
pub fn to_decimal(value: &CqlValue) -> CqlValue {
    match value {
        CqlValue::Decimal(d) => CqlValue::Decimal(*d),
        CqlValue::Integer(i) => CqlValue::Decimal(Decimal::from(*i)),
        CqlValue::Boolean(b) => CqlValue::Decimal(Decimal::from(i64::from(*b))),
        CqlValue::String(s) => Decimal::from_str(s.trim())
            .map(CqlValue::Decimal)
            .unwrap_or(CqlValue::Null),
        _ => CqlValue::Null,
    }
}

/// ToString: canonical textual form, unquoted
pub fn to_string_value(value: &CqlValue) -> CqlValue {
    match value {
        CqlValue::String(s) => CqlValue::string(s.clone()),
        CqlValue::Boolean(b) => CqlValue::string(b.to_string()),
        CqlValue::Integer(i) => CqlValue::string(i.to_string()),
        CqlValue::Decimal(d) => CqlValue::string(d.to_string()),
        CqlValue::Date(d) => CqlValue::string(d.to_string()),
        CqlValue::DateTime(dt) => CqlValue::string(dt.to_string()),
        CqlValue::Time(t) => CqlValue::string(t.to_string()),
        CqlValue::Quantity(q) => CqlValue::string(q.to_string()),
        CqlValue::Ratio(r) => CqlValue::string(r.to_string()),
        _ => CqlValue::Null,
    }
}

/// ToDate
pub fn to_date(value: &CqlValue) -> CqlValue {
    match value {
        CqlValue::Date(d) => CqlValue::Date(*d),
        CqlValue::DateTime(dt) => CqlValue::Date(dt.date()),
        CqlValue::String(s) => CqlDate::parse(s).map(CqlValue::Date).unwrap_or(CqlValue::Null),
        _ => CqlValue::Null,
    }
}

/// ToDateTime
pub fn to_datetime(value: &CqlValue) -> CqlValue {
    match value {
        CqlValue::DateTime(dt) => CqlValue::DateTime(*dt),
        CqlValue::Date(d) => CqlValue::DateTime(CqlDateTime::from_date(*d)),
        CqlValue::String(s) => CqlDateTime::parse(s)
            .map(CqlValue::DateTime)
            .unwrap_or(CqlValue::Null),
        _ => CqlValue::Null,
    }
}

/// ToTime
pub fn to_time(value: &CqlValue) -> CqlValue {
    match value {
        CqlValue::Time(t) => CqlValue::Time(*t),
        CqlValue::DateTime(dt) => dt.time().map(CqlValue::Time).unwrap_or(CqlValue::Null),
        CqlValue::String(s) => CqlTime::parse(s).map(CqlValue::Time).unwrap_or(CqlValue::Null),
        _ => CqlValue::Null,
    }
}

/// ToQuantity: numbers become unitless quantities; strings parse the
/// `<decimal> '<unit>'` form
pub fn to_quantity(value: &CqlValue) -> CqlValue {
    match value {
        CqlValue::Quantity(q) => CqlValue::Quantity(q.clone()),
        CqlValue::Integer(i) => CqlValue::Quantity(CqlQuantity::unitless(Decimal::from(*i))),
        CqlValue::Decimal(d) => CqlValue::Quantity(CqlQuantity::unitless(*d)),
        CqlValue::Ratio(r) => r
            .to_decimal()
            .map(|d| CqlValue::Quantity(CqlQuantity::unitless(d)))
            .unwrap_or(CqlValue::Null),
        CqlValue::String(s) => parse_quantity(s).map(CqlValue::Quantity).unwrap_or(CqlValue::Null),
        _ => CqlValue::Null,
    }
}

/// Parse a quantity literal: `5.5 'mg'`, `5.5 mg`, or a bare number
pub fn parse_quantity(s: &str) -> Option<CqlQuantity> {
    let s = s.trim();
    let (number, unit) = match s.find(char::is_whitespace) {
        Some(idx) => (&s[..idx], Some(s[idx..].trim())),
        None => (s, None),
    };
    let value = Decimal::from_str(number).ok()?;
    match unit {
        None | Some("") => Some(CqlQuantity::unitless(value)),
        Some(unit) => {
            let unit = unit.trim_matches('\'');
            if unit.is_empty() {
                return None;
            }
            Some(CqlQuantity::new(value, unit))
        }
    }
}

/// ToRatio: parses `<quantity>:<quantity>`
pub fn to_ratio(value: &CqlValue) -> CqlValue {
    match value {
        CqlValue::Ratio(r) => CqlValue::Ratio(r.clone()),
        CqlValue::String(s) => {
            let Some((num, denom)) = s.split_once(':') else {
                return CqlValue::Null;
            };
            match (parse_quantity(num), parse_quantity(denom)) {
                (Some(n), Some(d)) => CqlValue::Ratio(CqlRatio::new(n, d)),
                _ => CqlValue::Null,
            }
        }
        _ => CqlValue::Null,
    }
}

/// ToConcept: a code (or list of codes) becomes a concept
pub fn to_concept(value: &CqlValue) -> CqlValue {
    match value {
        CqlValue::Concept(c) => CqlValue::Concept(c.clone()),
        CqlValue::Code(code) => CqlValue::Concept(CqlConcept::from_code(code.clone())),
        CqlValue::List(list) => {
            let codes: Vec<CqlCode> = list
                .iter()
                .filter_map(|v| match v {
                    CqlValue::Code(c) => Some(c.clone()),
                    _ => None,
                })
                .collect();
            if codes.is_empty() {
                CqlValue::Null
            } else {
                CqlValue::Concept(CqlConcept::new(codes, None))
            }
        }
        _ => CqlValue::Null,
    }
}

/// ConvertQuantity: rewrite a quantity in another unit via the converter
pub fn convert_quantity(
    value: &CqlValue,
    unit: &CqlValue,
    units: &dyn UnitConverter,
) -> EvalResult<CqlValue> {
    let (CqlValue::Quantity(q), CqlValue::String(target)) = (value, unit) else {
        if value.is_null() || unit.is_null() {
            return Ok(CqlValue::Null);
        }
        return Err(EvalError::invalid_operand(
            "ConvertQuantity",
            format!("{} to {}", value.type_name(), unit.type_name()),
        ));
    };
    match units.convert(q.value, q.unit_or_default(), target) {
        Some(converted) => Ok(CqlValue::Quantity(CqlQuantity {
            value: converted,
            unit: Some(target.clone()),
            original_unit: q.unit.clone(),
        })),
        None => Ok(CqlValue::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::StandardUnitConverter;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_is_primitive_types() {
        assert!(value_matches_type(
            &CqlValue::integer(5),
            &TypeSpecifier::named("Integer")
        ));
        assert!(!value_matches_type(
            &CqlValue::integer(5),
            &TypeSpecifier::named("Decimal")
        ));
        assert!(value_matches_type(
            &CqlValue::integer(5),
            &TypeSpecifier::named("Any")
        ));
    }

    #[test]
    fn test_is_resource_type() {
        let patient = CqlValue::Resource(lumen_cql_types::CqlResource::from_json(
            serde_json::json!({"resourceType": "Patient"}),
        ));
        assert!(value_matches_type(&patient, &TypeSpecifier::named("Patient")));
        assert!(!value_matches_type(&patient, &TypeSpecifier::named("Condition")));
        assert!(value_matches_type(&patient, &TypeSpecifier::named("FHIR.Patient")));
    }

    #[test]
    fn test_is_list_and_interval() {
        let list = CqlValue::list(vec![CqlValue::integer(1), CqlValue::integer(2)]);
        assert!(value_matches_type(
            &list,
            &TypeSpecifier::List(Box::new(TypeSpecifier::named("Integer")))
        ));
        assert!(!value_matches_type(
            &list,
            &TypeSpecifier::List(Box::new(TypeSpecifier::named("String")))
        ));

        let interval = CqlValue::Interval(lumen_cql_types::CqlInterval::closed(
            CqlValue::integer(1),
            CqlValue::integer(5),
        ));
        assert!(value_matches_type(
            &interval,
            &TypeSpecifier::Interval(Box::new(TypeSpecifier::named("Integer")))
        ));
    }

    #[test]
    fn test_cast_behavior() {
        let value = CqlValue::integer(5);
        assert_eq!(
            cast_value(&value, &TypeSpecifier::named("Integer"), false).unwrap(),
            value
        );
        assert_eq!(
            cast_value(&value, &TypeSpecifier::named("String"), false).unwrap(),
            CqlValue::Null
        );
        assert!(cast_value(&value, &TypeSpecifier::named("String"), true).is_err());
        // Implicit numeric promotion
        assert_eq!(
            cast_value(&value, &TypeSpecifier::named("Decimal"), false).unwrap(),
            CqlValue::Decimal(Decimal::from(5))
        );
    }

    #[test]
    fn test_decimal_string_round_trip() {
        let parsed = to_decimal(&CqlValue::string("3.25"));
        assert_eq!(parsed, CqlValue::Decimal(Decimal::from_str("3.25").unwrap()));
        assert_eq!(to_string_value(&parsed), CqlValue::string("3.25"));
    }

    #[test]
    fn test_to_integer() {
        assert_eq!(to_integer(&CqlValue::string("42")), CqlValue::integer(42));
        assert_eq!(to_integer(&CqlValue::string("nope")), CqlValue::Null);
        assert_eq!(to_integer(&CqlValue::Boolean(true)), CqlValue::integer(1));
    }

    #[test]
    fn test_to_quantity_parsing() {
        assert_eq!(
            to_quantity(&CqlValue::string("5.5 'mg'")),
            CqlValue::Quantity(CqlQuantity::new(Decimal::from_str("5.5").unwrap(), "mg"))
        );
        assert_eq!(
            to_quantity(&CqlValue::integer(3)),
            CqlValue::Quantity(CqlQuantity::unitless(Decimal::from(3)))
        );
        assert_eq!(to_quantity(&CqlValue::string("banana")), CqlValue::Null);
    }

    #[test]
    fn test_converts_to() {
        assert_eq!(
            converts_to(&CqlValue::string("42"), ConversionTarget::Integer).unwrap(),
            CqlValue::Boolean(true)
        );
        assert_eq!(
            converts_to(&CqlValue::string("x"), ConversionTarget::Integer).unwrap(),
            CqlValue::Boolean(false)
        );
        assert_eq!(
            converts_to(&CqlValue::Null, ConversionTarget::Integer).unwrap(),
            CqlValue::Null
        );
    }

    #[test]
    fn test_convert_quantity() {
        let units = StandardUnitConverter::new();
        let q = CqlValue::Quantity(CqlQuantity::new(Decimal::from(2), "g"));
        let result = convert_quantity(&q, &CqlValue::string("mg"), &units).unwrap();
        match result {
            CqlValue::Quantity(converted) => {
                assert_eq!(converted.value, Decimal::from(2000));
                assert_eq!(converted.unit.as_deref(), Some("mg"));
                assert_eq!(converted.original_unit.as_deref(), Some("g"));
            }
            other => panic!("expected quantity, got {other:?}"),
        }
        // Unknown target unit: null, not an error
        assert_eq!(
            convert_quantity(&q, &CqlValue::string("furlong"), &units).unwrap(),
            CqlValue::Null
        );
    }
}
