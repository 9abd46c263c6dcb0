//! Clinical data source interface and the in-memory implementation
//!
//! Retrieves are synchronous calls on a [`DataSource`]. When a code filter
//! is present, only resources whose coded element matches one of the codes
//! (by system + code) are returned; when a date filter is present,
//! resources whose date falls inside the interval are kept, with Period
//! elements passing on overlap. In a patient context the result set is
//! restricted to the patient's compartment.

use crate::operators::interval;
use crate::units::StandardUnitConverter;
use lumen_cql_types::{
    CqlCode, CqlDate, CqlDateTime, CqlInterval, CqlResource, CqlValue,
};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Parameters of a single retrieve
#[derive(Debug, Default)]
pub struct RetrieveParameters<'a> {
    /// Resource type to read
    pub resource_type: &'a str,
    /// Contextual resource (usually the Patient) restricting the result
    /// to its compartment
    pub context: Option<&'a CqlResource>,
    /// Dotted path to the coded element
    pub code_path: Option<&'a str>,
    /// Direct code list (a valueset is expanded into this before retrieve)
    pub codes: Option<&'a [CqlCode]>,
    /// Canonical valueset URL, for sources that index by valueset
    pub valueset: Option<&'a str>,
    /// Dotted path to the date element
    pub date_path: Option<&'a str>,
    /// Interval the date element must fall inside
    pub date_range: Option<&'a CqlInterval>,
}

/// Synchronous source of clinical resources
pub trait DataSource: Send + Sync {
    /// Retrieve resources of a type with optional code and date filters
    fn retrieve(&self, params: &RetrieveParameters<'_>) -> Result<Vec<CqlResource>, String>;

    /// Resolve a reference string (`Patient/p1`) to a resource
    fn resolve_reference(&self, reference: &str) -> Option<CqlResource>;
}

/// Default coded-element path per resource type, applied when a retrieve
/// names a terminology filter without a property
pub fn default_code_path(resource_type: &str) -> Option<&'static str> {
    match resource_type {
        "Condition" | "Observation" | "Procedure" | "AllergyIntolerance"
        | "DiagnosticReport" => Some("code"),
        "MedicationRequest" | "MedicationStatement" => Some("medication"),
        "Immunization" => Some("vaccineCode"),
        "CarePlan" => Some("category"),
        _ => None,
    }
}

/// Reference paths that tie a resource to its patient compartment
fn patient_reference_paths(resource_type: &str) -> &'static [&'static str] {
    match resource_type {
        "AllergyIntolerance" | "Immunization" | "Device" | "Claim" | "ExplanationOfBenefit" => {
            &["patient.reference"]
        }
        "Coverage" => &["beneficiary.reference"],
        _ => &["subject.reference", "patient.reference"],
    }
}

/// In-memory data source: resources indexed by type, with optional locally
/// registered valueset expansions
#[derive(Default)]
pub struct InMemoryDataSource {
    resources: RwLock<HashMap<String, Vec<CqlResource>>>,
    valuesets: RwLock<HashMap<String, Vec<CqlCode>>>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one resource, indexed under its `resourceType`
    pub fn add_resource(&self, resource: JsonValue) {
        let resource = CqlResource::from_json(resource);
        self.resources
            .write()
            .entry(resource.resource_type.clone())
            .or_default()
            .push(resource);
    }

    /// Add many resources
    pub fn add_resources(&self, resources: impl IntoIterator<Item = JsonValue>) {
        for resource in resources {
            self.add_resource(resource);
        }
    }

    /// Register a valueset expansion used when a retrieve names a
    /// valueset URL without pre-expanded codes
    pub fn add_valueset(&self, url: impl Into<String>, codes: Vec<CqlCode>) {
        self.valuesets.write().insert(url.into(), codes);
    }

    /// Remove all resources and valuesets
    pub fn clear(&self) {
        self.resources.write().clear();
        self.valuesets.write().clear();
    }

    fn in_compartment(&self, resource: &CqlResource, context: &CqlResource) -> bool {
        if context.resource_type != "Patient" {
            return true;
        }
        let Some(patient_id) = context.id() else {
            return true;
        };
        let expected = format!("Patient/{patient_id}");
        for path in patient_reference_paths(&resource.resource_type) {
            if let Some(JsonValue::String(reference)) = get_nested(&resource.data, path) {
                return reference == &expected;
            }
        }
        // No reference present: not tied to any patient, keep it
        true
    }
}

impl DataSource for InMemoryDataSource {
    fn retrieve(&self, params: &RetrieveParameters<'_>) -> Result<Vec<CqlResource>, String> {
        // Patient retrieves in a patient context yield the context patient
        if params.resource_type == "Patient" {
            if let Some(context) = params.context {
                if context.resource_type == "Patient" {
                    return Ok(vec![context.clone()]);
                }
            }
        }

        let resources = self.resources.read();
        let candidates = resources
            .get(params.resource_type)
            .cloned()
            .unwrap_or_default();

        // Resolve the effective code list: direct codes, else a locally
        // registered valueset expansion
        let vs_codes;
        let codes: Option<&[CqlCode]> = match (params.codes, params.valueset) {
            (Some(codes), _) => Some(codes),
            (None, Some(url)) => {
                vs_codes = self.valuesets.read().get(url).cloned();
                vs_codes.as_deref()
            }
            (None, None) => None,
        };

        let mut result = Vec::new();
        for resource in candidates {
            if let Some(context) = params.context {
                if !self.in_compartment(&resource, context) {
                    continue;
                }
            }
            if let Some(codes) = codes {
                let path = params
                    .code_path
                    .or_else(|| default_code_path(params.resource_type));
                let Some(path) = path else { continue };
                if !matches_code(&resource.data, path, codes) {
                    continue;
                }
            }
            if let (Some(date_path), Some(range)) = (params.date_path, params.date_range) {
                if !matches_date_range(&resource.data, date_path, range) {
                    continue;
                }
            }
            result.push(resource);
        }

        Ok(result)
    }

    fn resolve_reference(&self, reference: &str) -> Option<CqlResource> {
        let (resource_type, id) = reference.split_once('/')?;
        self.resources
            .read()
            .get(resource_type)?
            .iter()
            .find(|r| r.id() == Some(id))
            .cloned()
    }
}

/// Walk a dotted path through a JSON document. Arrays project the step
/// over their elements and concatenate the results.
pub fn get_nested<'a>(value: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let mut current = value;
    for part in path.split('.') {
        match current {
            JsonValue::Object(map) => {
                current = map.get(part)?;
            }
            JsonValue::Array(items) => {
                // Single-element arrays step through transparently
                current = items.first()?.get(part)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

/// Collect the Coding objects reachable at a coded element: a Coding, a
/// CodeableConcept, or an array of either
fn collect_codings(value: &JsonValue) -> Vec<&JsonValue> {
    let mut codings = Vec::new();
    match value {
        JsonValue::Object(map) => {
            if let Some(JsonValue::Array(items)) = map.get("coding") {
                codings.extend(items.iter());
            } else if map.contains_key("code") {
                codings.push(value);
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                codings.extend(collect_codings(item));
            }
        }
        _ => {}
    }
    codings
}

/// Whether the coded element at `path` matches any of the codes
pub fn matches_code(resource: &JsonValue, path: &str, codes: &[CqlCode]) -> bool {
    let Some(coded) = get_nested(resource, path) else {
        return false;
    };
    let codings = collect_codings(coded);
    if codings.is_empty() {
        // A bare code string matches on code value alone
        if let JsonValue::String(code) = coded {
            return codes.iter().any(|c| c.code == *code);
        }
        return false;
    }
    for coding in codings {
        let code = coding.get("code").and_then(|v| v.as_str());
        let system = coding.get("system").and_then(|v| v.as_str());
        if let (Some(code), Some(system)) = (code, system) {
            if codes.iter().any(|c| c.code == code && c.system == system) {
                return true;
            }
        }
    }
    false
}

static UNITS: Lazy<StandardUnitConverter> = Lazy::new(StandardUnitConverter::new);

/// Whether the date element at `path` falls inside the range. A Period
/// passes when it overlaps the range; a missing element passes.
pub fn matches_date_range(resource: &JsonValue, path: &str, range: &CqlInterval) -> bool {
    let Some(value) = get_nested(resource, path) else {
        return true;
    };
    match value {
        JsonValue::String(s) => match parse_temporal(s) {
            Some(point) => interval::point_in_interval(&point, range, &*UNITS).is_true(),
            None => true,
        },
        JsonValue::Object(map) => {
            // Period: overlap with the range
            let start = map.get("start").and_then(|v| v.as_str()).and_then(parse_temporal);
            let end = map.get("end").and_then(|v| v.as_str()).and_then(parse_temporal);
            let period = CqlInterval::new(start, true, end, true);
            interval::overlaps(&period, range, None, &*UNITS).is_true()
        }
        _ => true,
    }
}

/// Parse a FHIR date or dateTime string into a value
pub fn parse_temporal(s: &str) -> Option<CqlValue> {
    if s.contains('T') {
        CqlDateTime::parse(s).map(CqlValue::DateTime)
    } else if s.len() > 4 {
        CqlDate::parse(s).map(CqlValue::Date)
    } else {
        s.parse::<i32>().ok().map(|y| CqlValue::Date(CqlDate::year_only(y)))
    }
}

/// A source holding no data; retrieves yield empty lists
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyDataSource;

impl DataSource for EmptyDataSource {
    fn retrieve(&self, _params: &RetrieveParameters<'_>) -> Result<Vec<CqlResource>, String> {
        Ok(Vec::new())
    }

    fn resolve_reference(&self, _reference: &str) -> Option<CqlResource> {
        None
    }
}

/// Shared handle helper
pub fn shared(source: impl DataSource + 'static) -> Arc<dyn DataSource> {
    Arc::new(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snomed(code: &str) -> CqlCode {
        CqlCode::new(code, "http://snomed.info/sct")
    }

    fn source_with_conditions() -> InMemoryDataSource {
        let source = InMemoryDataSource::new();
        source.add_resource(json!({
            "resourceType": "Patient",
            "id": "p1",
        }));
        source.add_resource(json!({
            "resourceType": "Condition",
            "id": "c1",
            "subject": { "reference": "Patient/p1" },
            "code": { "coding": [
                { "system": "http://snomed.info/sct", "code": "73211009" }
            ]},
            "onsetDateTime": "2023-06-01T00:00:00Z",
        }));
        source.add_resource(json!({
            "resourceType": "Condition",
            "id": "c2",
            "subject": { "reference": "Patient/p2" },
            "code": { "coding": [
                { "system": "http://snomed.info/sct", "code": "73211009" }
            ]},
        }));
        source.add_resource(json!({
            "resourceType": "Condition",
            "id": "c3",
            "subject": { "reference": "Patient/p1" },
            "code": { "coding": [
                { "system": "http://snomed.info/sct", "code": "38341003" }
            ]},
        }));
        source
    }

    #[test]
    fn test_retrieve_by_type() {
        let source = source_with_conditions();
        let result = source
            .retrieve(&RetrieveParameters {
                resource_type: "Condition",
                ..Default::default()
            })
            .unwrap();
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_compartment_filter() {
        let source = source_with_conditions();
        let patient = source.resolve_reference("Patient/p1").unwrap();
        let result = source
            .retrieve(&RetrieveParameters {
                resource_type: "Condition",
                context: Some(&patient),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|r| r.id() != Some("c2")));
    }

    #[test]
    fn test_code_filter() {
        let source = source_with_conditions();
        let codes = [snomed("73211009")];
        let result = source
            .retrieve(&RetrieveParameters {
                resource_type: "Condition",
                code_path: Some("code"),
                codes: Some(&codes),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_code_filter_uses_default_path() {
        let source = source_with_conditions();
        let codes = [snomed("38341003")];
        let result = source
            .retrieve(&RetrieveParameters {
                resource_type: "Condition",
                codes: Some(&codes),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id(), Some("c3"));
    }

    #[test]
    fn test_registered_valueset_filter() {
        let source = source_with_conditions();
        source.add_valueset("http://example.org/vs/diabetes", vec![snomed("73211009")]);
        let result = source
            .retrieve(&RetrieveParameters {
                resource_type: "Condition",
                code_path: Some("code"),
                valueset: Some("http://example.org/vs/diabetes"),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_date_range_filter() {
        let source = source_with_conditions();
        let range = CqlInterval::closed(
            CqlValue::Date(CqlDate::new(2023, 1, 1)),
            CqlValue::Date(CqlDate::new(2023, 12, 31)),
        );
        let result = source
            .retrieve(&RetrieveParameters {
                resource_type: "Condition",
                date_path: Some("onsetDateTime"),
                date_range: Some(&range),
                ..Default::default()
            })
            .unwrap();
        // c1 falls inside; c2 and c3 have no onset and pass unfiltered
        assert_eq!(result.len(), 3);

        let range = CqlInterval::closed(
            CqlValue::Date(CqlDate::new(2024, 1, 1)),
            CqlValue::Date(CqlDate::new(2024, 12, 31)),
        );
        let result = source
            .retrieve(&RetrieveParameters {
                resource_type: "Condition",
                date_path: Some("onsetDateTime"),
                date_range: Some(&range),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|r| r.id() != Some("c1")));
    }

    #[test]
    fn test_patient_retrieve_in_patient_context() {
        let source = source_with_conditions();
        let patient = source.resolve_reference("Patient/p1").unwrap();
        let result = source
            .retrieve(&RetrieveParameters {
                resource_type: "Patient",
                context: Some(&patient),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id(), Some("p1"));
    }

    #[test]
    fn test_resolve_reference() {
        let source = source_with_conditions();
        assert!(source.resolve_reference("Patient/p1").is_some());
        assert!(source.resolve_reference("Patient/nope").is_none());
        assert!(source.resolve_reference("garbage").is_none());
    }
}
