//! End-to-end scenarios driving the full stack: libraries, retrieves,
//! terminology, queries and measure evaluation.

use lumen_cql::ast::{
    BinaryOp, Expr, ExprKind, ExpressionDefinition, Library, Query, Ref, RelatedSource,
    RelationOp, RelationshipClause, Retrieve, ValuesetDefinition,
};
use lumen_cql::eval::{
    CqlEvaluator, DataSource, EvaluationContext, InMemoryDataSource,
    InMemoryTerminologyProvider, MeasureEvaluator, TerminologyAdapter,
};
use lumen_cql::types::{CqlCode, CqlDateTime, CqlResource, CqlValue};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

const DIABETES_VS: &str = "http://example.org/ValueSet/diabetes";
const A1C_VS: &str = "http://example.org/ValueSet/a1c";

fn fixed_now() -> CqlDateTime {
    CqlDateTime::new(2024, 6, 1, 12, 0, 0, 0, Some(0))
}

fn terminology() -> Arc<TerminologyAdapter> {
    let provider = InMemoryTerminologyProvider::new();
    provider.add_valueset(
        DIABETES_VS,
        vec![CqlCode::new("73211009", "http://snomed.info/sct")],
    );
    provider.add_valueset(A1C_VS, vec![CqlCode::new("4548-4", "http://loinc.org")]);
    Arc::new(TerminologyAdapter::new(Arc::new(provider)))
}

/// The S5 library:
///   define Diabetics: [Condition: "Diabetes VS"]
///   define WithA1c: [Observation: "A1c VS"]
///   define EligibleFinding:
///     [Patient] P with WithA1c O such that O.effective after Today() - 1 year
fn eligibility_library() -> Library {
    let mut library = Library::new("Eligibility");
    library.valuesets.insert(
        "Diabetes VS".into(),
        ValuesetDefinition {
            name: "Diabetes VS".into(),
            uri: DIABETES_VS.into(),
            version: None,
            codesystems: vec![],
        },
    );
    library.valuesets.insert(
        "A1c VS".into(),
        ValuesetDefinition {
            name: "A1c VS".into(),
            uri: A1C_VS.into(),
            version: None,
            codesystems: vec![],
        },
    );

    let valueset_ref = |name: &str| {
        Expr::new(ExprKind::ValueSetRef(Ref {
            name: name.to_string(),
            library: None,
        }))
    };

    library.add_definition(ExpressionDefinition::new(
        "Diabetics",
        Expr::retrieve(Retrieve::of_type("Condition").with_codes(valueset_ref("Diabetes VS"))),
    ));
    library.add_definition(ExpressionDefinition::new(
        "WithA1c",
        Expr::retrieve(Retrieve::of_type("Observation").with_codes(valueset_ref("A1c VS"))),
    ));

    let one_year_ago = Expr::binary(
        BinaryOp::Subtract,
        Expr::new(ExprKind::Today),
        Expr::quantity(Decimal::from(1), "year"),
    );
    let query = Query::from_source(Expr::retrieve(Retrieve::of_type("Patient")), "P")
        .with_relationship(RelationshipClause::With(RelatedSource {
            expression: Expr::expression_ref("WithA1c").boxed(),
            alias: "O".to_string(),
            such_that: Expr::relation(
                RelationOp::After,
                Expr::scoped_property("O", "effective"),
                one_year_ago,
            )
            .boxed(),
        }));
    library.add_definition(ExpressionDefinition::new("EligibleFinding", Expr::query(query)));
    library
}

fn observation(id: &str, patient: &str, code: &str, system: &str, effective: &str) -> serde_json::Value {
    json!({
        "resourceType": "Observation",
        "id": id,
        "subject": { "reference": format!("Patient/{patient}") },
        "code": { "coding": [ { "system": system, "code": code } ] },
        "effectiveDateTime": effective,
    })
}

fn eligibility_context(source: Arc<InMemoryDataSource>) -> EvaluationContext {
    let patient = source.resolve_reference("Patient/p1").unwrap();
    EvaluationContext::new()
        .with_library(Arc::new(eligibility_library()))
        .with_data_source(source)
        .with_terminology(terminology())
        .with_now(fixed_now())
        .with_context_resource("Patient", CqlValue::Resource(patient))
}

#[test]
fn test_recent_a1c_makes_patient_eligible() {
    let source = Arc::new(InMemoryDataSource::new());
    source.add_resource(json!({ "resourceType": "Patient", "id": "p1" }));
    // One A1c inside the window, one stale, one off-valueset
    source.add_resource(observation("o1", "p1", "4548-4", "http://loinc.org", "2024-02-01T08:00:00Z"));
    source.add_resource(observation("o2", "p1", "4548-4", "http://loinc.org", "2020-01-01T08:00:00Z"));
    source.add_resource(observation("o3", "p1", "999", "http://loinc.org", "2024-03-01T08:00:00Z"));

    let mut ctx = eligibility_context(source);
    let result = CqlEvaluator::new()
        .evaluate_definition("EligibleFinding", &mut ctx)
        .unwrap();

    let CqlValue::List(list) = result else {
        panic!("expected list");
    };
    assert_eq!(list.len(), 1);
    match &list.elements[0] {
        CqlValue::Resource(resource) => assert_eq!(resource.id(), Some("p1")),
        other => panic!("expected the patient resource, got {other:?}"),
    }
}

#[test]
fn test_stale_a1c_leaves_patient_ineligible() {
    let source = Arc::new(InMemoryDataSource::new());
    source.add_resource(json!({ "resourceType": "Patient", "id": "p1" }));
    source.add_resource(observation("o1", "p1", "4548-4", "http://loinc.org", "2020-01-01T08:00:00Z"));

    let mut ctx = eligibility_context(source);
    let result = CqlEvaluator::new()
        .evaluate_definition("EligibleFinding", &mut ctx)
        .unwrap();

    assert_eq!(result, CqlValue::empty_list());
}

#[test]
fn test_retrieve_filters_by_valueset_and_compartment() {
    let source = Arc::new(InMemoryDataSource::new());
    source.add_resource(json!({ "resourceType": "Patient", "id": "p1" }));
    source.add_resource(json!({
        "resourceType": "Condition",
        "id": "c1",
        "subject": { "reference": "Patient/p1" },
        "code": { "coding": [ { "system": "http://snomed.info/sct", "code": "73211009" } ] },
    }));
    // Same code, other patient's compartment
    source.add_resource(json!({
        "resourceType": "Condition",
        "id": "c2",
        "subject": { "reference": "Patient/p2" },
        "code": { "coding": [ { "system": "http://snomed.info/sct", "code": "73211009" } ] },
    }));
    // Off-valueset condition
    source.add_resource(json!({
        "resourceType": "Condition",
        "id": "c3",
        "subject": { "reference": "Patient/p1" },
        "code": { "coding": [ { "system": "http://snomed.info/sct", "code": "38341003" } ] },
    }));

    let mut ctx = eligibility_context(source);
    let result = CqlEvaluator::new()
        .evaluate_definition("Diabetics", &mut ctx)
        .unwrap();

    let CqlValue::List(list) = result else {
        panic!("expected list");
    };
    assert_eq!(list.len(), 1);
    match &list.elements[0] {
        CqlValue::Resource(resource) => assert_eq!(resource.id(), Some("c1")),
        other => panic!("expected a condition, got {other:?}"),
    }
}

// ============================================================================
// Measure evaluation (S6)
// ============================================================================

fn flag_property(name: &str) -> Expr {
    Expr::property(Expr::identifier_ref("Patient"), name)
}

fn measure_library() -> Library {
    let mut library = Library::new("http://example.org/Measure/diabetes-control");
    library.add_definition(ExpressionDefinition::new("Initial Population", Expr::boolean(true)));
    library.add_definition(ExpressionDefinition::new("Denominator", flag_property("denominator")));
    library.add_definition(ExpressionDefinition::new(
        "Denominator Exclusion",
        flag_property("denominatorExclusion"),
    ));
    library.add_definition(ExpressionDefinition::new(
        "Denominator Exception",
        flag_property("denominatorException"),
    ));
    library.add_definition(ExpressionDefinition::new("Numerator", flag_property("numerator")));
    library.add_definition(ExpressionDefinition::new(
        "Numerator Exclusion",
        flag_property("numeratorExclusion"),
    ));
    library.add_definition(ExpressionDefinition::new(
        "Stratifier Sex",
        flag_property("gender"),
    ));
    library
}

/// 100 patients: denominator 80, numerator 50, denominator exclusion 5,
/// denominator exception 5, numerator exclusion 3
fn measure_patients() -> Vec<CqlResource> {
    (0..100)
        .map(|i| {
            CqlResource::from_json(json!({
                "resourceType": "Patient",
                "id": format!("p{i}"),
                "gender": if i % 2 == 0 { "female" } else { "male" },
                "denominator": i < 80,
                "numerator": i < 50,
                "denominatorExclusion": (75..80).contains(&i),
                "denominatorException": (70..75).contains(&i),
                "numeratorExclusion": i < 3,
            }))
        })
        .collect()
}

#[test]
fn test_proportion_measure_score() {
    let evaluator = MeasureEvaluator::new(Arc::new(measure_library())).with_now(fixed_now());
    let report = evaluator.evaluate_population(&measure_patients()).unwrap();

    assert_eq!(report.groups.len(), 1);
    let group = &report.groups[0];
    assert_eq!(group.populations["denominator"].count, 80);
    assert_eq!(group.populations["numerator"].count, 50);
    assert_eq!(group.populations["denominator-exclusion"].count, 5);
    assert_eq!(group.populations["denominator-exception"].count, 5);
    assert_eq!(group.populations["numerator-exclusion"].count, 3);

    // (50 - 3) / (80 - 5 - 5) = 47 / 70 = 0.6714
    assert_eq!(
        group.measure_score,
        Some(Decimal::from_str("0.6714").unwrap())
    );
}

#[test]
fn test_measure_stratification_repeats_counts() {
    let evaluator = MeasureEvaluator::new(Arc::new(measure_library())).with_now(fixed_now());
    let report = evaluator.evaluate_population(&measure_patients()).unwrap();

    let strata = &report.groups[0].stratifiers["Stratifier Sex"];
    assert_eq!(strata.len(), 2);
    let total_denominator: usize = strata
        .iter()
        .map(|s| s.populations["denominator"].count)
        .sum();
    assert_eq!(total_denominator, 80);
}

#[test]
fn test_measure_report_wire_format() {
    let evaluator = MeasureEvaluator::new(Arc::new(measure_library())).with_now(fixed_now());
    let report = evaluator.evaluate_population(&measure_patients()).unwrap();
    let fhir = report.to_fhir();

    assert_eq!(fhir["resourceType"], "MeasureReport");
    assert_eq!(fhir["status"], "complete");
    assert_eq!(fhir["type"], "summary");
    assert_eq!(fhir["measure"], "http://example.org/Measure/diabetes-control");

    let populations = fhir["group"][0]["population"].as_array().unwrap();
    let denominator = populations
        .iter()
        .find(|p| p["code"]["coding"][0]["code"] == "denominator")
        .unwrap();
    assert_eq!(denominator["count"], 80);

    let score = fhir["group"][0]["measureScore"]["value"].as_str().map(String::from);
    // rust_decimal serializes with serde-with-str; accept either form
    let rendered = score.unwrap_or_else(|| fhir["group"][0]["measureScore"]["value"].to_string());
    assert!(rendered.contains("0.6714"), "unexpected score {rendered}");

    assert!(fhir["group"][0]["stratifier"].is_array());
}

#[test]
fn test_denominator_of_zero_scores_null() {
    let mut library = Library::new("EmptyMeasure");
    library.add_definition(ExpressionDefinition::new("Denominator", Expr::boolean(false)));
    library.add_definition(ExpressionDefinition::new("Numerator", Expr::boolean(false)));

    let evaluator = MeasureEvaluator::new(Arc::new(library)).with_now(fixed_now());
    let patients = vec![CqlResource::from_json(json!({
        "resourceType": "Patient", "id": "p0",
    }))];
    let report = evaluator.evaluate_population(&patients).unwrap();
    assert_eq!(report.groups[0].measure_score, None);
}
