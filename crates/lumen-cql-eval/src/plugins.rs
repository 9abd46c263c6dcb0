//! Host-provided plugin functions
//!
//! Plugins fill the user-defined function slot of the registry: a call
//! site resolves user library functions first, then plugins, then
//! built-ins. `external` library functions must have a plugin
//! implementation under the declared name.

use crate::error::{EvalError, EvalResult};
use lumen_cql_types::CqlValue;
use std::collections::HashMap;
use std::sync::Arc;

/// A plugin function implementation
pub type PluginFn = Arc<dyn Fn(&[CqlValue]) -> EvalResult<CqlValue> + Send + Sync>;

/// Registry of host-provided functions, keyed by name
#[derive(Default, Clone)]
pub struct PluginRegistry {
    functions: HashMap<String, PluginEntry>,
}

#[derive(Clone)]
struct PluginEntry {
    func: PluginFn,
    description: Option<String>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under a name, replacing any previous entry
    pub fn register<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&[CqlValue]) -> EvalResult<CqlValue> + Send + Sync + 'static,
    {
        self.functions.insert(
            name.into(),
            PluginEntry {
                func: Arc::new(func),
                description: None,
            },
        );
    }

    /// Register with a description, for host tooling
    pub fn register_with_description<F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        func: F,
    ) where
        F: Fn(&[CqlValue]) -> EvalResult<CqlValue> + Send + Sync + 'static,
    {
        self.functions.insert(
            name.into(),
            PluginEntry {
                func: Arc::new(func),
                description: Some(description.into()),
            },
        );
    }

    /// Remove a function; true when something was removed
    pub fn unregister(&mut self, name: &str) -> bool {
        self.functions.remove(name).is_some()
    }

    /// Whether a function is registered
    pub fn has(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Invoke a registered function
    pub fn call(&self, name: &str, args: &[CqlValue]) -> EvalResult<CqlValue> {
        let entry = self
            .functions
            .get(name)
            .ok_or_else(|| EvalError::undefined_function(name))?;
        (entry.func)(args)
    }

    /// Description of a registered function
    pub fn description(&self, name: &str) -> Option<&str> {
        self.functions.get(name)?.description.as_deref()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Absorb all functions of another registry
    pub fn merge(&mut self, other: &PluginRegistry) {
        for (name, entry) in &other.functions {
            self.functions.insert(name.clone(), entry.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_call() {
        let mut registry = PluginRegistry::new();
        registry.register("Double", |args| match args.first() {
            Some(CqlValue::Integer(i)) => Ok(CqlValue::Integer(i * 2)),
            _ => Ok(CqlValue::Null),
        });

        assert!(registry.has("Double"));
        assert_eq!(
            registry.call("Double", &[CqlValue::integer(21)]).unwrap(),
            CqlValue::integer(42)
        );
    }

    #[test]
    fn test_unknown_function_is_an_error() {
        let registry = PluginRegistry::new();
        assert!(registry.call("Nope", &[]).is_err());
    }

    #[test]
    fn test_merge_overrides() {
        let mut a = PluginRegistry::new();
        a.register("F", |_| Ok(CqlValue::integer(1)));
        let mut b = PluginRegistry::new();
        b.register("F", |_| Ok(CqlValue::integer(2)));

        a.merge(&b);
        assert_eq!(a.call("F", &[]).unwrap(), CqlValue::integer(2));
        assert_eq!(a.len(), 1);
    }
}
