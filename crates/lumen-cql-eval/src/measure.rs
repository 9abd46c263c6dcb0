//! Clinical quality measure evaluation
//!
//! A measure is a library plus scoring metadata. Standard population
//! definitions are detected by their conventional names; stratifiers by
//! a `Stratifier` name prefix. Each patient is evaluated in its own
//! context; a failing population definition counts the patient out of
//! that population rather than aborting the report.

use crate::context::EvaluationContext;
use crate::datasource::DataSource;
use crate::engine::CqlEvaluator;
use crate::error::EvalResult;
use crate::library::LibraryManager;
use crate::terminology::TerminologyAdapter;
use indexmap::IndexMap;
use lumen_cql_ast::Library;
use lumen_cql_types::{CqlDateTime, CqlResource, CqlValue};
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;

/// The standard population kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PopulationType {
    InitialPopulation,
    Denominator,
    DenominatorExclusion,
    DenominatorException,
    Numerator,
    NumeratorExclusion,
    MeasurePopulation,
    MeasurePopulationExclusion,
    MeasureObservation,
}

impl PopulationType {
    /// The wire code for this population
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialPopulation => "initial-population",
            Self::Denominator => "denominator",
            Self::DenominatorExclusion => "denominator-exclusion",
            Self::DenominatorException => "denominator-exception",
            Self::Numerator => "numerator",
            Self::NumeratorExclusion => "numerator-exclusion",
            Self::MeasurePopulation => "measure-population",
            Self::MeasurePopulationExclusion => "measure-population-exclusion",
            Self::MeasureObservation => "measure-observation",
        }
    }

    /// Conventional definition spellings, tried in order
    pub fn standard_names(self) -> &'static [&'static str] {
        match self {
            Self::InitialPopulation => {
                &["Initial Population", "InitialPopulation", "initial-population"]
            }
            Self::Denominator => &["Denominator", "denominator"],
            Self::DenominatorExclusion => {
                &["Denominator Exclusion", "DenominatorExclusion", "denominator-exclusion"]
            }
            Self::DenominatorException => {
                &["Denominator Exception", "DenominatorException", "denominator-exception"]
            }
            Self::Numerator => &["Numerator", "numerator"],
            Self::NumeratorExclusion => {
                &["Numerator Exclusion", "NumeratorExclusion", "numerator-exclusion"]
            }
            Self::MeasurePopulation => {
                &["Measure Population", "MeasurePopulation", "measure-population"]
            }
            Self::MeasurePopulationExclusion => &[
                "Measure Population Exclusion",
                "MeasurePopulationExclusion",
                "measure-population-exclusion",
            ],
            Self::MeasureObservation => {
                &["Measure Observation", "MeasureObservation", "measure-observation"]
            }
        }
    }

    /// Every population kind, in reporting order
    pub fn all() -> &'static [PopulationType] {
        &[
            Self::InitialPopulation,
            Self::Denominator,
            Self::DenominatorExclusion,
            Self::DenominatorException,
            Self::Numerator,
            Self::NumeratorExclusion,
            Self::MeasurePopulation,
            Self::MeasurePopulationExclusion,
            Self::MeasureObservation,
        ]
    }
}

/// Scoring model of a measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeasureScoring {
    #[default]
    Proportion,
    Ratio,
    ContinuousVariable,
    Cohort,
}

/// One population definition of a group
#[derive(Debug, Clone)]
pub struct MeasurePopulation {
    pub population_type: PopulationType,
    /// Name of the CQL definition backing this population
    pub definition: String,
}

/// A measure group: populations plus stratifiers
#[derive(Debug, Clone)]
pub struct MeasureGroup {
    pub id: String,
    pub populations: Vec<MeasurePopulation>,
    /// Definition names whose values key the strata
    pub stratifiers: Vec<String>,
}

/// Per-patient evaluation record
#[derive(Debug, Clone)]
pub struct PatientResult {
    pub patient_id: String,
    /// Population code to membership
    pub populations: IndexMap<String, bool>,
    /// Measure observation values
    pub observations: IndexMap<String, CqlValue>,
    /// Stratifier name to stratum key
    pub stratifier_values: IndexMap<String, CqlValue>,
}

/// Count of patients in one population
#[derive(Debug, Clone)]
pub struct PopulationCount {
    pub population_type: PopulationType,
    pub count: usize,
    pub patients: Vec<String>,
}

impl PopulationCount {
    fn new(population_type: PopulationType) -> Self {
        Self {
            population_type,
            count: 0,
            patients: Vec::new(),
        }
    }
}

/// Population counts for one stratum value
#[derive(Debug, Clone)]
pub struct StratifierResult {
    pub value: CqlValue,
    pub populations: IndexMap<String, PopulationCount>,
}

/// Aggregated results of one group
#[derive(Debug, Clone)]
pub struct GroupResult {
    pub id: String,
    pub populations: IndexMap<String, PopulationCount>,
    pub stratifiers: IndexMap<String, Vec<StratifierResult>>,
    pub measure_score: Option<Decimal>,
}

/// The aggregated measure report
#[derive(Debug, Clone)]
pub struct MeasureReport {
    /// Canonical measure identifier
    pub measure: String,
    pub period_start: Option<CqlValue>,
    pub period_end: Option<CqlValue>,
    pub groups: Vec<GroupResult>,
    pub patient_results: Vec<PatientResult>,
    /// When the report was produced
    pub date: CqlDateTime,
}

impl MeasureReport {
    /// Render the FHIR MeasureReport wire format
    pub fn to_fhir(&self) -> serde_json::Value {
        use serde_json::json;

        let mut report = json!({
            "resourceType": "MeasureReport",
            "status": "complete",
            "type": "summary",
            "measure": self.measure,
            "date": self.date.to_string(),
        });

        if let (Some(start), Some(end)) = (&self.period_start, &self.period_end) {
            report["period"] = json!({
                "start": temporal_string(start),
                "end": temporal_string(end),
            });
        }

        let mut groups = Vec::new();
        for group in &self.groups {
            let mut group_json = json!({ "id": group.id });

            let populations: Vec<serde_json::Value> = group
                .populations
                .values()
                .map(|population| {
                    json!({
                        "code": { "coding": [ { "code": population.population_type.as_str() } ] },
                        "count": population.count,
                    })
                })
                .collect();
            if !populations.is_empty() {
                group_json["population"] = json!(populations);
            }

            if let Some(score) = group.measure_score {
                group_json["measureScore"] = json!({ "value": score });
            }

            if !group.stratifiers.is_empty() {
                let stratifiers: Vec<serde_json::Value> = group
                    .stratifiers
                    .iter()
                    .map(|(name, results)| {
                        let strata: Vec<serde_json::Value> = results
                            .iter()
                            .map(|stratum| {
                                let populations: Vec<serde_json::Value> = stratum
                                    .populations
                                    .values()
                                    .map(|population| {
                                        json!({
                                            "code": { "coding": [ { "code": population.population_type.as_str() } ] },
                                            "count": population.count,
                                        })
                                    })
                                    .collect();
                                json!({
                                    "value": { "text": stratum.value.to_string() },
                                    "population": populations,
                                })
                            })
                            .collect();
                        json!({
                            "code": [ { "text": name } ],
                            "stratum": strata,
                        })
                    })
                    .collect();
                group_json["stratifier"] = json!(stratifiers);
            }

            groups.push(group_json);
        }
        if !groups.is_empty() {
            report["group"] = json!(groups);
        }

        report
    }
}

fn temporal_string(value: &CqlValue) -> String {
    match value {
        CqlValue::Date(d) => d.to_string(),
        CqlValue::DateTime(dt) => dt.to_string(),
        other => other.to_string(),
    }
}

/// Evaluates a measure library over patients
pub struct MeasureEvaluator {
    evaluator: CqlEvaluator,
    library: Arc<Library>,
    measure_url: String,
    data_source: Option<Arc<dyn DataSource>>,
    terminology: Option<Arc<TerminologyAdapter>>,
    library_manager: Option<Arc<LibraryManager>>,
    groups: Vec<MeasureGroup>,
    scoring: MeasureScoring,
    /// Fixed clock for reproducible evaluation, when set
    now: Option<CqlDateTime>,
}

impl MeasureEvaluator {
    /// Create an evaluator, detecting standard populations and
    /// stratifiers from the library's definition names
    pub fn new(library: Arc<Library>) -> Self {
        let measure_url = library.name.clone();
        let groups = detect_groups(&library);
        Self {
            evaluator: CqlEvaluator::new(),
            library,
            measure_url,
            data_source: None,
            terminology: None,
            library_manager: None,
            groups,
            scoring: MeasureScoring::Proportion,
            now: None,
        }
    }

    pub fn with_data_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.data_source = Some(source);
        self
    }

    pub fn with_terminology(mut self, adapter: Arc<TerminologyAdapter>) -> Self {
        self.terminology = Some(adapter);
        self
    }

    pub fn with_library_manager(mut self, manager: Arc<LibraryManager>) -> Self {
        self.library_manager = Some(manager);
        self
    }

    pub fn with_measure_url(mut self, url: impl Into<String>) -> Self {
        self.measure_url = url.into();
        self
    }

    pub fn with_now(mut self, now: CqlDateTime) -> Self {
        self.now = Some(now);
        self
    }

    pub fn set_scoring(&mut self, scoring: MeasureScoring) {
        self.scoring = scoring;
    }

    /// The detected (or configured) groups
    pub fn groups(&self) -> &[MeasureGroup] {
        &self.groups
    }

    /// Add a population to a group, creating the group when absent
    pub fn add_population(
        &mut self,
        group_id: &str,
        population_type: PopulationType,
        definition: impl Into<String>,
    ) {
        let population = MeasurePopulation {
            population_type,
            definition: definition.into(),
        };
        match self.groups.iter_mut().find(|g| g.id == group_id) {
            Some(group) => group.populations.push(population),
            None => self.groups.push(MeasureGroup {
                id: group_id.to_string(),
                populations: vec![population],
                stratifiers: Vec::new(),
            }),
        }
    }

    /// Add a stratifier to a group, creating the group when absent
    pub fn add_stratifier(&mut self, group_id: &str, definition: impl Into<String>) {
        let definition = definition.into();
        match self.groups.iter_mut().find(|g| g.id == group_id) {
            Some(group) => group.stratifiers.push(definition),
            None => self.groups.push(MeasureGroup {
                id: group_id.to_string(),
                populations: Vec::new(),
                stratifiers: vec![definition],
            }),
        }
    }

    fn context_for(&self, patient: &CqlResource) -> EvaluationContext {
        let mut ctx = EvaluationContext::new()
            .with_library(self.library.clone())
            .with_context_resource("Patient", CqlValue::Resource(patient.clone()));
        if let Some(source) = &self.data_source {
            ctx = ctx.with_data_source(source.clone());
        }
        if let Some(adapter) = &self.terminology {
            ctx = ctx.with_terminology(adapter.clone());
        }
        if let Some(manager) = &self.library_manager {
            ctx = ctx.with_library_manager(manager.clone());
        }
        if let Some(now) = self.now {
            ctx = ctx.with_now(now);
        }
        ctx
    }

    /// Evaluate every configured population and stratifier for one
    /// patient
    pub fn evaluate_patient(&self, patient: &CqlResource) -> PatientResult {
        let patient_id = patient.id().unwrap_or("unknown").to_string();
        let mut result = PatientResult {
            patient_id,
            populations: IndexMap::new(),
            observations: IndexMap::new(),
            stratifier_values: IndexMap::new(),
        };
        let mut ctx = self.context_for(patient);

        for group in &self.groups {
            for population in &group.populations {
                let value = self
                    .evaluator
                    .evaluate_definition(&population.definition, &mut ctx);
                match population.population_type {
                    PopulationType::MeasureObservation => {
                        let observed = value.unwrap_or(CqlValue::Null);
                        result.populations.insert(
                            population.population_type.as_str().to_string(),
                            !observed.is_null(),
                        );
                        result
                            .observations
                            .insert(population.definition.clone(), observed);
                    }
                    _ => {
                        let in_population =
                            value.map(|v| value_to_membership(&v)).unwrap_or(false);
                        result.populations.insert(
                            population.population_type.as_str().to_string(),
                            in_population,
                        );
                    }
                }
            }
            for stratifier in &group.stratifiers {
                let value = self
                    .evaluator
                    .evaluate_definition(stratifier, &mut ctx)
                    .unwrap_or(CqlValue::Null);
                result.stratifier_values.insert(stratifier.clone(), value);
            }
        }

        result
    }

    /// Evaluate the measure over a population and aggregate the report
    pub fn evaluate_population(&self, patients: &[CqlResource]) -> EvalResult<MeasureReport> {
        let (period_start, period_end) = self.measurement_period();

        let mut report = MeasureReport {
            measure: self.measure_url.clone(),
            period_start,
            period_end,
            groups: Vec::new(),
            patient_results: Vec::new(),
            date: self
                .now
                .unwrap_or_else(|| EvaluationContext::new().now()),
        };

        for patient in patients {
            report.patient_results.push(self.evaluate_patient(patient));
        }

        for group in &self.groups {
            let mut group_result = GroupResult {
                id: group.id.clone(),
                populations: IndexMap::new(),
                stratifiers: IndexMap::new(),
                measure_score: None,
            };
            for population in &group.populations {
                group_result.populations.insert(
                    population.population_type.as_str().to_string(),
                    PopulationCount::new(population.population_type),
                );
            }

            for patient_result in &report.patient_results {
                for (code, in_population) in &patient_result.populations {
                    if *in_population {
                        if let Some(count) = group_result.populations.get_mut(code) {
                            count.count += 1;
                            count.patients.push(patient_result.patient_id.clone());
                        }
                    }
                }
            }

            group_result.measure_score = self.score(group, &group_result, &report);

            for stratifier in &group.stratifiers {
                let results =
                    stratify(group, stratifier, &report.patient_results);
                group_result
                    .stratifiers
                    .insert(stratifier.clone(), results);
            }

            report.groups.push(group_result);
        }

        Ok(report)
    }

    /// The measure score for one group, per the configured scoring model
    fn score(
        &self,
        group: &MeasureGroup,
        result: &GroupResult,
        report: &MeasureReport,
    ) -> Option<Decimal> {
        let count = |population_type: PopulationType| -> i64 {
            result
                .populations
                .get(population_type.as_str())
                .map(|c| c.count as i64)
                .unwrap_or(0)
        };

        match self.scoring {
            MeasureScoring::Proportion => {
                let numerator =
                    count(PopulationType::Numerator) - count(PopulationType::NumeratorExclusion);
                let denominator = count(PopulationType::Denominator)
                    - count(PopulationType::DenominatorExclusion)
                    - count(PopulationType::DenominatorException);
                ratio_score(numerator, denominator)
            }
            MeasureScoring::Ratio => {
                let numerator =
                    count(PopulationType::Numerator) - count(PopulationType::NumeratorExclusion);
                let denominator = count(PopulationType::Denominator)
                    - count(PopulationType::DenominatorExclusion);
                ratio_score(numerator, denominator)
            }
            MeasureScoring::ContinuousVariable => {
                // Average of the measure observations over patients in the
                // measure population, exclusions removed
                let observation = group
                    .populations
                    .iter()
                    .find(|p| p.population_type == PopulationType::MeasureObservation)?;
                let mut total = Decimal::ZERO;
                let mut observed = 0i64;
                for patient in &report.patient_results {
                    let in_population = patient
                        .populations
                        .get(PopulationType::MeasurePopulation.as_str())
                        .copied()
                        .unwrap_or(false);
                    let excluded = patient
                        .populations
                        .get(PopulationType::MeasurePopulationExclusion.as_str())
                        .copied()
                        .unwrap_or(false);
                    if !in_population || excluded {
                        continue;
                    }
                    if let Some(value) = patient.observations.get(&observation.definition) {
                        if let Some(decimal) = value.as_decimal() {
                            total += decimal;
                            observed += 1;
                        }
                    }
                }
                if observed == 0 {
                    None
                } else {
                    Some(round_score(total / Decimal::from(observed)))
                }
            }
            MeasureScoring::Cohort => None,
        }
    }

    /// Bounds of the library's measurement period parameter, when one is
    /// declared with a default
    fn measurement_period(&self) -> (Option<CqlValue>, Option<CqlValue>) {
        let parameter = self
            .library
            .parameters
            .iter()
            .find(|(name, _)| name.replace(' ', "") == "MeasurementPeriod")
            .and_then(|(_, p)| p.default.as_ref());
        let Some(default) = parameter else {
            return (None, None);
        };
        let mut ctx = self.context_for(&CqlResource::from_json(serde_json::json!({
            "resourceType": "Patient"
        })));
        match self.evaluator.evaluate(default, &mut ctx) {
            Ok(CqlValue::Interval(interval)) => (
                interval.low().cloned(),
                interval.high().cloned(),
            ),
            _ => (None, None),
        }
    }
}

/// Coerce a definition result to population membership: lists count when
/// non-empty, null is out, booleans speak for themselves
fn value_to_membership(value: &CqlValue) -> bool {
    match value {
        CqlValue::Null => false,
        CqlValue::Boolean(b) => *b,
        CqlValue::List(list) => !list.is_empty(),
        _ => true,
    }
}

fn ratio_score(numerator: i64, denominator: i64) -> Option<Decimal> {
    if denominator <= 0 {
        return None;
    }
    Some(round_score(
        Decimal::from(numerator) / Decimal::from(denominator),
    ))
}

/// Scores round to four fractional digits
fn round_score(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

/// Group patient results by a stratifier's value
fn stratify(
    group: &MeasureGroup,
    stratifier: &str,
    patient_results: &[PatientResult],
) -> Vec<StratifierResult> {
    let mut strata: Vec<StratifierResult> = Vec::new();

    for patient in patient_results {
        let value = patient
            .stratifier_values
            .get(stratifier)
            .cloned()
            .unwrap_or(CqlValue::Null);

        let stratum = match strata.iter_mut().find(|s| s.value == value) {
            Some(stratum) => stratum,
            None => {
                let mut populations = IndexMap::new();
                for population in &group.populations {
                    populations.insert(
                        population.population_type.as_str().to_string(),
                        PopulationCount::new(population.population_type),
                    );
                }
                strata.push(StratifierResult { value, populations });
                strata.last_mut().unwrap()
            }
        };

        for (code, in_population) in &patient.populations {
            if *in_population {
                if let Some(count) = stratum.populations.get_mut(code) {
                    count.count += 1;
                    count.patients.push(patient.patient_id.clone());
                }
            }
        }
    }

    strata
}

/// Detect standard populations and stratifiers from definition names
fn detect_groups(library: &Library) -> Vec<MeasureGroup> {
    let mut group = MeasureGroup {
        id: "default".to_string(),
        populations: Vec::new(),
        stratifiers: Vec::new(),
    };

    for population_type in PopulationType::all() {
        for name in population_type.standard_names() {
            if library.definitions.contains_key(*name) {
                group.populations.push(MeasurePopulation {
                    population_type: *population_type,
                    definition: (*name).to_string(),
                });
                break;
            }
        }
    }

    for name in library.definitions.keys() {
        if name.starts_with("Stratifier") || name.contains("Stratification") {
            group.stratifiers.push(name.clone());
        }
    }

    if group.populations.is_empty() && group.stratifiers.is_empty() {
        Vec::new()
    } else {
        vec![group]
    }
}
