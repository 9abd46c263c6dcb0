//! Path navigation over resources, tuples and lists
//!
//! Property access follows the FHIR-flavoured rules: choice-type
//! polymorphism (`value[x]`), list auto-flattening with null dropping,
//! primitive-with-extension wrappers from `_field` siblings, and the
//! reserved interval paths. Missing properties are soft failures that
//! yield null.

use lumen_cql_types::{
    CqlCode, CqlConcept, CqlDate, CqlDateTime, CqlInterval, CqlQuantity, CqlResource, CqlTime,
    CqlTuple, CqlValue,
};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::str::FromStr;

/// Choice-type suffixes probed, in order, when a property is absent
const CHOICE_TYPE_SUFFIXES: &[&str] = &[
    "Quantity",
    "String",
    "CodeableConcept",
    "Boolean",
    "Integer",
    "DateTime",
    "Period",
    "Range",
    "Ratio",
];

/// Access property `path` on `value`
pub fn navigate(value: &CqlValue, path: &str) -> CqlValue {
    match value {
        CqlValue::Null => CqlValue::Null,
        CqlValue::Tuple(tuple) => match tuple.get(path) {
            Some(v) => v.clone(),
            None => choice_lookup_tuple(tuple, path).unwrap_or(CqlValue::Null),
        },
        CqlValue::Resource(resource) => navigate_object(resource.data.as_ref(), path),
        CqlValue::List(list) => {
            // Project over elements, drop nulls, flatten one level
            let mut projected = Vec::new();
            for element in list.iter() {
                match navigate(element, path) {
                    CqlValue::Null => {}
                    CqlValue::List(inner) => projected.extend(inner.elements),
                    other => projected.push(other),
                }
            }
            CqlValue::list(projected)
        }
        CqlValue::Interval(interval) => match path {
            "low" => interval.low_raw().cloned().unwrap_or(CqlValue::Null),
            "high" => interval.high_raw().cloned().unwrap_or(CqlValue::Null),
            "lowClosed" => CqlValue::Boolean(interval.low_closed),
            "highClosed" => CqlValue::Boolean(interval.high_closed),
            _ => CqlValue::Null,
        },
        CqlValue::Quantity(quantity) => match path {
            "value" => CqlValue::Decimal(quantity.value),
            "unit" | "code" => quantity
                .unit
                .clone()
                .map(CqlValue::String)
                .unwrap_or(CqlValue::Null),
            _ => CqlValue::Null,
        },
        CqlValue::Code(code) => match path {
            "code" => CqlValue::string(&code.code),
            "system" => CqlValue::string(&code.system),
            "display" => code
                .display
                .clone()
                .map(CqlValue::String)
                .unwrap_or(CqlValue::Null),
            "version" => code
                .version
                .clone()
                .map(CqlValue::String)
                .unwrap_or(CqlValue::Null),
            _ => CqlValue::Null,
        },
        CqlValue::Concept(concept) => match path {
            "codes" | "coding" => CqlValue::list(
                concept.codes.iter().cloned().map(CqlValue::Code).collect(),
            ),
            "display" | "text" => concept
                .display
                .clone()
                .map(CqlValue::String)
                .unwrap_or(CqlValue::Null),
            _ => CqlValue::Null,
        },
        CqlValue::Ratio(ratio) => match path {
            "numerator" => CqlValue::Quantity(ratio.numerator.clone()),
            "denominator" => CqlValue::Quantity(ratio.denominator.clone()),
            _ => CqlValue::Null,
        },
        _ => CqlValue::Null,
    }
}

fn choice_lookup_tuple(tuple: &CqlTuple, path: &str) -> Option<CqlValue> {
    for suffix in CHOICE_TYPE_SUFFIXES {
        if let Some(v) = tuple.get(&format!("{path}{suffix}")) {
            return Some(v.clone());
        }
    }
    None
}

fn navigate_object(data: &JsonValue, path: &str) -> CqlValue {
    let JsonValue::Object(map) = data else {
        return CqlValue::Null;
    };

    let (key, raw) = match map.get(path) {
        Some(v) => (path.to_string(), v),
        None => {
            // Choice-type polymorphism: probe the typed spellings
            let mut found = None;
            for suffix in CHOICE_TYPE_SUFFIXES {
                let candidate = format!("{path}{suffix}");
                if let Some(v) = map.get(&candidate) {
                    found = Some((candidate, v));
                    break;
                }
            }
            match found {
                Some(hit) => hit,
                None => return CqlValue::Null,
            }
        }
    };

    let converted = json_to_value(raw);

    // A `_field` sibling carries extension metadata for a primitive; the
    // pair surfaces as a { value, extension } wrapper
    if let Some(JsonValue::Object(meta)) = map.get(&format!("_{key}")) {
        if is_json_primitive(raw) {
            let extensions = meta
                .get("extension")
                .map(json_to_value)
                .unwrap_or(CqlValue::Null);
            return CqlValue::Tuple(CqlTuple::from_elements([
                ("value", converted),
                ("extension", extensions),
            ]));
        }
    }

    converted
}

fn is_json_primitive(value: &JsonValue) -> bool {
    matches!(
        value,
        JsonValue::String(_) | JsonValue::Number(_) | JsonValue::Bool(_)
    )
}

/// Whether a tuple is a primitive-with-extension wrapper
pub fn is_primitive_wrapper(tuple: &CqlTuple) -> bool {
    tuple.len() == 2 && tuple.get("value").is_some() && tuple.get("extension").is_some()
}

/// See through a primitive-with-extension wrapper; other values pass
/// unchanged
pub fn unwrap_primitive(value: &CqlValue) -> &CqlValue {
    if let CqlValue::Tuple(tuple) = value {
        if is_primitive_wrapper(tuple) {
            return tuple.get("value").unwrap_or(value);
        }
    }
    value
}

/// The extensions attached to a value: a wrapper's `_field` sibling data,
/// or a resource's own `extension` element
pub fn extensions_of(value: &CqlValue, url: Option<&str>) -> CqlValue {
    let all = match value {
        CqlValue::Tuple(tuple) if is_primitive_wrapper(tuple) => {
            tuple.get("extension").cloned().unwrap_or(CqlValue::Null)
        }
        CqlValue::Resource(resource) => resource
            .get("extension")
            .map(json_to_value)
            .unwrap_or(CqlValue::Null),
        _ => CqlValue::Null,
    };

    let Some(url) = url else { return all };
    match all {
        CqlValue::List(list) => CqlValue::list(
            list.elements
                .into_iter()
                .filter(|ext| matches!(navigate(ext, "url"), CqlValue::String(ref u) if u == url))
                .collect(),
        ),
        other => other,
    }
}

/// Convert a JSON node to a runtime value.
///
/// Recognizes the FHIR shapes the evaluator works with directly:
/// Quantity, Coding, CodeableConcept, Period and Range become their value
/// types; date-like strings become temporal values; any other object
/// stays an opaque resource node.
pub fn json_to_value(json: &JsonValue) -> CqlValue {
    match json {
        JsonValue::Null => CqlValue::Null,
        JsonValue::Bool(b) => CqlValue::Boolean(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CqlValue::Integer(i)
            } else {
                Decimal::from_str(&n.to_string())
                    .map(CqlValue::Decimal)
                    .unwrap_or(CqlValue::Null)
            }
        }
        JsonValue::String(s) => string_to_value(s),
        JsonValue::Array(items) => {
            CqlValue::list(items.iter().map(json_to_value).collect())
        }
        JsonValue::Object(map) => {
            if map.contains_key("resourceType") {
                return CqlValue::Resource(CqlResource::from_json(json.clone()));
            }
            if let Some(quantity) = as_quantity(map) {
                return CqlValue::Quantity(quantity);
            }
            if let Some(code) = as_coding(map) {
                return CqlValue::Code(code);
            }
            if let Some(concept) = as_codeable_concept(map) {
                return CqlValue::Concept(concept);
            }
            if let Some(period) = as_period(map) {
                return CqlValue::Interval(period);
            }
            if let Some(range) = as_range(map) {
                return CqlValue::Interval(range);
            }
            CqlValue::Resource(CqlResource::from_json(json.clone()))
        }
    }
}

/// Date, date-time and time strings surface as temporal values so
/// comparisons against retrieved data work without a model layer
fn string_to_value(s: &str) -> CqlValue {
    let bytes = s.as_bytes();
    let looks_dated = bytes.len() >= 7
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-';

    if looks_dated {
        if s.contains('T') {
            if let Some(dt) = CqlDateTime::parse(s) {
                return CqlValue::DateTime(dt);
            }
        } else if let Some(d) = CqlDate::parse(s) {
            return CqlValue::Date(d);
        }
    } else if bytes.len() >= 5
        && bytes[..2].iter().all(u8::is_ascii_digit)
        && bytes[2] == b':'
    {
        if let Some(t) = CqlTime::parse(s) {
            return CqlValue::Time(t);
        }
    }

    CqlValue::string(s)
}

fn as_quantity(map: &serde_json::Map<String, JsonValue>) -> Option<CqlQuantity> {
    let value = map.get("value")?.as_f64()?;
    let value = Decimal::from_str(&map.get("value")?.to_string())
        .or_else(|_| Decimal::try_from(value))
        .ok()?;
    let unit = map
        .get("code")
        .or_else(|| map.get("unit"))
        .and_then(|v| v.as_str());
    Some(match unit {
        Some(unit) => CqlQuantity::new(value, unit),
        None => CqlQuantity::unitless(value),
    })
}

fn as_coding(map: &serde_json::Map<String, JsonValue>) -> Option<CqlCode> {
    let code = map.get("code")?.as_str()?;
    let system = map.get("system")?.as_str()?;
    let mut result = CqlCode::new(code, system);
    if let Some(display) = map.get("display").and_then(|v| v.as_str()) {
        result = result.with_display(display);
    }
    if let Some(version) = map.get("version").and_then(|v| v.as_str()) {
        result = result.with_version(version);
    }
    Some(result)
}

fn as_codeable_concept(map: &serde_json::Map<String, JsonValue>) -> Option<CqlConcept> {
    let JsonValue::Array(codings) = map.get("coding")? else {
        return None;
    };
    let codes: Vec<CqlCode> = codings
        .iter()
        .filter_map(|c| c.as_object().and_then(as_coding))
        .collect();
    let display = map.get("text").and_then(|v| v.as_str()).map(String::from);
    Some(CqlConcept::new(codes, display))
}

fn as_period(map: &serde_json::Map<String, JsonValue>) -> Option<CqlInterval> {
    if !map.contains_key("start") && !map.contains_key("end") {
        return None;
    }
    let start = map.get("start").and_then(|v| v.as_str());
    let end = map.get("end").and_then(|v| v.as_str());
    if start.is_none() && end.is_none() {
        return None;
    }
    let parse = |s: &str| -> Option<CqlValue> {
        if s.contains('T') {
            CqlDateTime::parse(s).map(CqlValue::DateTime)
        } else {
            CqlDate::parse(s).map(CqlValue::Date)
        }
    };
    Some(CqlInterval::new(
        start.and_then(parse),
        true,
        end.and_then(parse),
        true,
    ))
}

fn as_range(map: &serde_json::Map<String, JsonValue>) -> Option<CqlInterval> {
    let low = map.get("low")?.as_object().and_then(as_quantity);
    let high = map.get("high").and_then(|v| v.as_object()).and_then(as_quantity);
    Some(CqlInterval::new(
        low.map(CqlValue::Quantity),
        true,
        high.map(CqlValue::Quantity),
        true,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn patient() -> CqlValue {
        CqlValue::Resource(CqlResource::from_json(json!({
            "resourceType": "Patient",
            "id": "p1",
            "birthDate": "1980-03-15",
            "name": [
                { "given": ["Ada", "Jane"], "family": "Doe" },
                { "given": ["A."], "family": "Doe" }
            ],
            "deceasedBoolean": false,
        })))
    }

    #[test]
    fn test_simple_property() {
        let p = patient();
        assert_eq!(
            navigate(&p, "birthDate"),
            CqlValue::Date(CqlDate::new(1980, 3, 15))
        );
    }

    #[test]
    fn test_missing_property_is_null() {
        assert_eq!(navigate(&patient(), "maritalStatus"), CqlValue::Null);
        assert_eq!(navigate(&CqlValue::Null, "anything"), CqlValue::Null);
    }

    #[test]
    fn test_list_projection_flattens() {
        let p = patient();
        let names = navigate(&p, "name");
        let given = navigate(&names, "given");
        assert_eq!(
            given,
            CqlValue::list(vec![
                CqlValue::string("Ada"),
                CqlValue::string("Jane"),
                CqlValue::string("A."),
            ])
        );
    }

    #[test]
    fn test_choice_type_polymorphism() {
        let p = patient();
        assert_eq!(navigate(&p, "deceased"), CqlValue::Boolean(false));

        let obs = CqlValue::Resource(CqlResource::from_json(json!({
            "resourceType": "Observation",
            "valueQuantity": { "value": 6.2, "unit": "%" },
        })));
        let value = navigate(&obs, "value");
        match value {
            CqlValue::Quantity(q) => assert_eq!(q.unit.as_deref(), Some("%")),
            other => panic!("expected quantity, got {other:?}"),
        }
    }

    #[test]
    fn test_effective_datetime_choice() {
        let obs = CqlValue::Resource(CqlResource::from_json(json!({
            "resourceType": "Observation",
            "effectiveDateTime": "2024-02-01T08:00:00Z",
        })));
        match navigate(&obs, "effective") {
            CqlValue::DateTime(dt) => assert_eq!(dt.year, 2024),
            other => panic!("expected datetime, got {other:?}"),
        }
    }

    #[test]
    fn test_primitive_extension_wrapper() {
        let p = CqlValue::Resource(CqlResource::from_json(json!({
            "resourceType": "Patient",
            "birthDate": "1980-03-15",
            "_birthDate": {
                "extension": [
                    { "url": "http://example.org/precision", "valueString": "exact" }
                ]
            },
        })));
        let wrapped = navigate(&p, "birthDate");
        let CqlValue::Tuple(tuple) = &wrapped else {
            panic!("expected wrapper tuple");
        };
        assert!(is_primitive_wrapper(tuple));
        assert_eq!(
            unwrap_primitive(&wrapped),
            &CqlValue::Date(CqlDate::new(1980, 3, 15))
        );

        let matching = extensions_of(&wrapped, Some("http://example.org/precision"));
        match matching {
            CqlValue::List(list) => assert_eq!(list.len(), 1),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_interval_reserved_paths() {
        let iv = CqlValue::Interval(CqlInterval::closed_open(
            CqlValue::integer(1),
            CqlValue::integer(5),
        ));
        assert_eq!(navigate(&iv, "low"), CqlValue::integer(1));
        assert_eq!(navigate(&iv, "high"), CqlValue::integer(5));
        assert_eq!(navigate(&iv, "lowClosed"), CqlValue::Boolean(true));
        assert_eq!(navigate(&iv, "highClosed"), CqlValue::Boolean(false));
    }

    #[test]
    fn test_codeable_concept_conversion() {
        let condition = CqlValue::Resource(CqlResource::from_json(json!({
            "resourceType": "Condition",
            "code": {
                "coding": [
                    { "system": "http://snomed.info/sct", "code": "73211009" }
                ],
                "text": "Diabetes"
            },
        })));
        match navigate(&condition, "code") {
            CqlValue::Concept(concept) => {
                assert_eq!(concept.codes.len(), 1);
                assert_eq!(concept.display.as_deref(), Some("Diabetes"));
            }
            other => panic!("expected concept, got {other:?}"),
        }
    }

    #[test]
    fn test_period_conversion() {
        let encounter = CqlValue::Resource(CqlResource::from_json(json!({
            "resourceType": "Encounter",
            "period": { "start": "2024-01-01", "end": "2024-01-05" },
        })));
        match navigate(&encounter, "period") {
            CqlValue::Interval(iv) => {
                assert_eq!(iv.low(), Some(&CqlValue::Date(CqlDate::new(2024, 1, 1))));
            }
            other => panic!("expected interval, got {other:?}"),
        }
    }

    #[test]
    fn test_time_string_conversion() {
        assert_eq!(
            string_to_value("08:30:00"),
            CqlValue::Time(CqlTime {
                hour: 8,
                minute: Some(30),
                second: Some(0),
                millisecond: None,
            })
        );
        // Identifiers that merely start with digits stay strings
        assert_eq!(string_to_value("1234"), CqlValue::string("1234"));
    }
}
