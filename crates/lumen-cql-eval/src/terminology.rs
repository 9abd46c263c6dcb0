//! Terminology adapter
//!
//! The core consumes a [`TerminologyProvider`]; the [`TerminologyAdapter`]
//! in front of it memoizes valueset expansions in a bounded LRU keyed by
//! canonical URL. Retrieves that reference a valueset expand through the
//! adapter to a code list before code-matching resources.

use crate::error::{EvalError, EvalResult};
use lumen_cql_types::{CqlCode, CqlConcept, CqlValue};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of a subsumption test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsumption {
    Equivalent,
    Subsumes,
    SubsumedBy,
    NotSubsumed,
}

impl Subsumption {
    /// The wire code for this outcome
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equivalent => "equivalent",
            Self::Subsumes => "subsumes",
            Self::SubsumedBy => "subsumed-by",
            Self::NotSubsumed => "not-subsumed",
        }
    }
}

/// External terminology service interface
pub trait TerminologyProvider: Send + Sync {
    /// Expand a valueset to its concrete code list
    fn expand(&self, valueset_url: &str) -> Result<Vec<CqlCode>, String>;

    /// Test membership of a code in a valueset
    fn contains(&self, valueset_url: &str, system: &str, code: &str) -> Result<bool, String> {
        Ok(self
            .expand(valueset_url)?
            .iter()
            .any(|c| c.system == system && c.code == code))
    }

    /// Look up code details (display) in a code system
    fn lookup(&self, system: &str, code: &str) -> Option<CqlCode>;

    /// Subsumption relationship between two codes of one system
    fn subsumes(&self, system: &str, a: &str, b: &str) -> Subsumption;
}

/// Default capacity of the expansion cache
const EXPANSION_CACHE_CAPACITY: usize = 128;

/// Caching front for a terminology provider
pub struct TerminologyAdapter {
    provider: Arc<dyn TerminologyProvider>,
    cache: Mutex<ExpansionCache>,
}

impl TerminologyAdapter {
    pub fn new(provider: Arc<dyn TerminologyProvider>) -> Self {
        Self {
            provider,
            cache: Mutex::new(ExpansionCache::new(EXPANSION_CACHE_CAPACITY)),
        }
    }

    /// The wrapped provider
    pub fn provider(&self) -> &Arc<dyn TerminologyProvider> {
        &self.provider
    }

    /// Expand a valueset, consulting the LRU first
    pub fn expand(&self, valueset_url: &str) -> EvalResult<Vec<CqlCode>> {
        if let Some(codes) = self.cache.lock().get(valueset_url) {
            return Ok(codes);
        }
        let codes = self
            .provider
            .expand(valueset_url)
            .map_err(EvalError::terminology)?;
        self.cache.lock().put(valueset_url, codes.clone());
        Ok(codes)
    }

    /// Membership test; answered from a cached expansion when available
    pub fn contains(&self, valueset_url: &str, system: &str, code: &str) -> EvalResult<bool> {
        if let Some(codes) = self.cache.lock().get(valueset_url) {
            return Ok(codes.iter().any(|c| c.system == system && c.code == code));
        }
        self.provider
            .contains(valueset_url, system, code)
            .map_err(EvalError::terminology)
    }

    /// Membership test for any code carried by a value (Code, Concept,
    /// String, or a list of them)
    pub fn value_in_valueset(&self, value: &CqlValue, valueset_url: &str) -> EvalResult<bool> {
        match value {
            CqlValue::Null => Ok(false),
            CqlValue::Code(code) => self.contains(valueset_url, &code.system, &code.code),
            CqlValue::Concept(concept) => {
                for code in &concept.codes {
                    if self.contains(valueset_url, &code.system, &code.code)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            // A bare string matches on code alone
            CqlValue::String(code) => {
                let expansion = self.expand(valueset_url)?;
                Ok(expansion.iter().any(|c| c.code == *code))
            }
            CqlValue::List(list) => {
                for element in list.iter() {
                    if self.value_in_valueset(element, valueset_url)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            other => Err(EvalError::type_mismatch("Code", other.type_name())),
        }
    }

    /// Look up code details
    pub fn lookup(&self, system: &str, code: &str) -> Option<CqlCode> {
        self.provider.lookup(system, code)
    }

    /// Subsumption relationship
    pub fn subsumes(&self, system: &str, a: &str, b: &str) -> Subsumption {
        self.provider.subsumes(system, a, b)
    }

    /// Drop all cached expansions
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }
}

/// A small LRU keyed by valueset URL; recency is tracked by reinsertion
/// order
struct ExpansionCache {
    capacity: usize,
    entries: indexmap::IndexMap<String, Vec<CqlCode>>,
}

impl ExpansionCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: indexmap::IndexMap::new(),
        }
    }

    fn get(&mut self, url: &str) -> Option<Vec<CqlCode>> {
        let codes = self.entries.shift_remove(url)?;
        self.entries.insert(url.to_string(), codes.clone());
        Some(codes)
    }

    fn put(&mut self, url: &str, codes: Vec<CqlCode>) {
        self.entries.shift_remove(url);
        if self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(url.to_string(), codes);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// In-memory provider backed by registered expansions; the standard test
/// double and the building block for preloaded deployments
#[derive(Default)]
pub struct InMemoryTerminologyProvider {
    valuesets: Mutex<HashMap<String, Vec<CqlCode>>>,
    displays: Mutex<HashMap<(String, String), String>>,
}

impl InMemoryTerminologyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a valueset expansion
    pub fn add_valueset(&self, url: impl Into<String>, codes: Vec<CqlCode>) {
        self.valuesets.lock().insert(url.into(), codes);
    }

    /// Register a display string for lookups
    pub fn add_display(
        &self,
        system: impl Into<String>,
        code: impl Into<String>,
        display: impl Into<String>,
    ) {
        self.displays
            .lock()
            .insert((system.into(), code.into()), display.into());
    }
}

impl TerminologyProvider for InMemoryTerminologyProvider {
    fn expand(&self, valueset_url: &str) -> Result<Vec<CqlCode>, String> {
        self.valuesets
            .lock()
            .get(valueset_url)
            .cloned()
            .ok_or_else(|| format!("valueset not found: {valueset_url}"))
    }

    fn lookup(&self, system: &str, code: &str) -> Option<CqlCode> {
        let display = self
            .displays
            .lock()
            .get(&(system.to_string(), code.to_string()))
            .cloned()?;
        Some(CqlCode::new(code, system).with_display(display))
    }

    fn subsumes(&self, _system: &str, a: &str, b: &str) -> Subsumption {
        if a == b {
            Subsumption::Equivalent
        } else {
            Subsumption::NotSubsumed
        }
    }
}

/// Convenience: concept/code equivalence used by code matching
pub fn codes_equivalent(a: &CqlCode, b: &CqlCode) -> bool {
    a.is_equivalent(b)
}

/// Whether a code list contains an equivalent of the given code
pub fn code_in_codes(code: &CqlCode, codes: &[CqlCode]) -> bool {
    codes.iter().any(|c| c.is_equivalent(code))
}

/// Whether any code of a concept appears in the code list
pub fn concept_in_codes(concept: &CqlConcept, codes: &[CqlCode]) -> bool {
    concept.codes.iter().any(|c| code_in_codes(c, codes))
}
