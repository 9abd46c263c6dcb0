//! Evaluation context
//!
//! Per-evaluation mutable state: the lexical alias-scope stack, iteration
//! variable stacks, parameter bindings, the definition cache with its
//! in-progress set for cycle detection, and the current-library stack used
//! by cross-library references. All state lives exactly as long as one
//! top-level evaluation unless a caller deliberately reuses the context.

use crate::datasource::DataSource;
use crate::library::LibraryManager;
use crate::plugins::PluginRegistry;
use crate::terminology::TerminologyAdapter;
use crate::units::{StandardUnitConverter, UnitConverter};
use chrono::{Datelike, Local, Offset, Timelike};
use lumen_cql_ast::Library;
use lumen_cql_diagnostics::Severity;
use lumen_cql_types::{CqlDate, CqlDateTime, CqlTime, CqlValue};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Recursion guard; generous for clinical logic, small enough to fail
/// before the thread stack does
const MAX_RECURSION_DEPTH: usize = 512;

/// Sink for Message-operator diagnostics
pub trait MessageSink: Send + Sync {
    fn emit(&self, severity: Severity, code: &str, message: &str);
}

/// Default sink: routes through the `log` crate at the matching level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMessageSink;

impl MessageSink for LogMessageSink {
    fn emit(&self, severity: Severity, code: &str, message: &str) {
        match severity {
            Severity::Trace => log::trace!("[{code}] {message}"),
            Severity::Debug => log::debug!("[{code}] {message}"),
            Severity::Warning => log::warn!("[{code}] {message}"),
            Severity::Error => log::error!("[{code}] {message}"),
        }
    }
}

/// Test sink that records every emitted message
#[derive(Debug, Default)]
pub struct CollectingMessageSink {
    messages: Mutex<Vec<(Severity, String, String)>>,
}

impl CollectingMessageSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Severity, String, String)> {
        self.messages.lock().clone()
    }
}

impl MessageSink for CollectingMessageSink {
    fn emit(&self, severity: Severity, code: &str, message: &str) {
        self.messages
            .lock()
            .push((severity, code.to_string(), message.to_string()));
    }
}

/// One alias scope frame. A barrier frame starts a fresh lexical
/// environment: lookups never search past it, so function parameters are
/// not merged into the caller's scope.
struct ScopeFrame {
    bindings: HashMap<String, CqlValue>,
    barrier: bool,
}

impl ScopeFrame {
    fn new(barrier: bool) -> Self {
        Self {
            bindings: HashMap::new(),
            barrier,
        }
    }
}

/// Per-evaluation state for the evaluator
pub struct EvaluationContext {
    /// Current-library stack; the last entry resolves unqualified names
    libraries: Vec<Arc<Library>>,
    /// Lexical alias scopes, innermost last
    scopes: Vec<ScopeFrame>,
    this_stack: Vec<CqlValue>,
    index_stack: Vec<i64>,
    total_stack: Vec<CqlValue>,
    /// Flat parameter bindings; library defaults fill in lazily
    parameters: HashMap<String, CqlValue>,
    /// Memoized definition results keyed `library.definition`
    definition_cache: HashMap<String, CqlValue>,
    /// Definitions currently being evaluated, for cycle detection
    in_progress: HashSet<String>,
    recursion_depth: usize,
    /// The evaluation clock, fixed at construction
    now: CqlDateTime,
    /// Declared evaluation context name, e.g. "Patient"
    context_name: Option<String>,
    /// The resource the evaluation runs against
    context_resource: Option<CqlValue>,
    data_source: Option<Arc<dyn DataSource>>,
    terminology: Option<Arc<TerminologyAdapter>>,
    units: Arc<dyn UnitConverter>,
    plugins: PluginRegistry,
    message_sink: Arc<dyn MessageSink>,
    library_manager: Option<Arc<LibraryManager>>,
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluationContext {
    /// Create a context with the wall clock and the standard unit table
    pub fn new() -> Self {
        Self {
            libraries: Vec::new(),
            scopes: vec![ScopeFrame::new(false)],
            this_stack: Vec::new(),
            index_stack: Vec::new(),
            total_stack: Vec::new(),
            parameters: HashMap::new(),
            definition_cache: HashMap::new(),
            in_progress: HashSet::new(),
            recursion_depth: 0,
            now: capture_now(),
            context_name: None,
            context_resource: None,
            data_source: None,
            terminology: None,
            units: Arc::new(StandardUnitConverter::new()),
            plugins: PluginRegistry::new(),
            message_sink: Arc::new(LogMessageSink),
            library_manager: None,
        }
    }

    // --- builder-style configuration ---

    pub fn with_library(mut self, library: Arc<Library>) -> Self {
        self.libraries = vec![library];
        self
    }

    pub fn with_now(mut self, now: CqlDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn with_context_resource(
        mut self,
        context_name: impl Into<String>,
        resource: CqlValue,
    ) -> Self {
        self.context_name = Some(context_name.into());
        self.context_resource = Some(resource);
        self
    }

    pub fn with_data_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.data_source = Some(source);
        self
    }

    pub fn with_terminology(mut self, adapter: Arc<TerminologyAdapter>) -> Self {
        self.terminology = Some(adapter);
        self
    }

    pub fn with_units(mut self, units: Arc<dyn UnitConverter>) -> Self {
        self.units = units;
        self
    }

    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_message_sink(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.message_sink = sink;
        self
    }

    pub fn with_library_manager(mut self, manager: Arc<LibraryManager>) -> Self {
        self.library_manager = Some(manager);
        self
    }

    // --- library stack ---

    /// The library resolving unqualified names right now
    pub fn current_library(&self) -> Option<&Arc<Library>> {
        self.libraries.last()
    }

    /// Switch name resolution to another library for a cross-library call
    pub fn push_library(&mut self, library: Arc<Library>) {
        self.libraries.push(library);
    }

    /// Restore the previous library after a cross-library call
    pub fn pop_library(&mut self) {
        if self.libraries.len() > 1 {
            self.libraries.pop();
        }
    }

    // --- alias scopes ---

    /// Push a scope for a query body or nested projection
    pub fn push_scope(&mut self) {
        self.scopes.push(ScopeFrame::new(false));
    }

    /// Push a fresh top-level scope for a function body; lookups inside
    /// never see the caller's aliases
    pub fn push_function_scope(&mut self) {
        self.scopes.push(ScopeFrame::new(true));
    }

    /// Pop the innermost scope
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        } else {
            // The root scope stays; just clear it
            self.scopes[0].bindings.clear();
        }
    }

    /// Bind a name in the innermost scope
    pub fn set_alias(&mut self, name: impl Into<String>, value: CqlValue) {
        if let Some(frame) = self.scopes.last_mut() {
            frame.bindings.insert(name.into(), value);
        }
    }

    /// Look a name up from the innermost scope outward, stopping at a
    /// function barrier
    pub fn get_alias(&self, name: &str) -> Option<&CqlValue> {
        for frame in self.scopes.iter().rev() {
            if let Some(value) = frame.bindings.get(name) {
                return Some(value);
            }
            if frame.barrier {
                return None;
            }
        }
        None
    }

    /// Whether a name is visible from the innermost scope
    pub fn has_alias(&self, name: &str) -> bool {
        self.get_alias(name).is_some()
    }

    // --- iteration variable stacks ---

    pub fn push_this(&mut self, value: CqlValue) {
        self.this_stack.push(value);
    }

    pub fn pop_this(&mut self) {
        self.this_stack.pop();
    }

    pub fn current_this(&self) -> Option<&CqlValue> {
        self.this_stack.last()
    }

    pub fn push_index(&mut self, index: i64) {
        self.index_stack.push(index);
    }

    pub fn pop_index(&mut self) {
        self.index_stack.pop();
    }

    pub fn current_index(&self) -> Option<i64> {
        self.index_stack.last().copied()
    }

    pub fn push_total(&mut self, value: CqlValue) {
        self.total_stack.push(value);
    }

    pub fn pop_total(&mut self) {
        self.total_stack.pop();
    }

    pub fn current_total(&self) -> Option<&CqlValue> {
        self.total_stack.last()
    }

    // --- parameters ---

    /// Bind a parameter value
    pub fn set_parameter(&mut self, name: impl Into<String>, value: CqlValue) {
        self.parameters.insert(name.into(), value);
    }

    /// A bound parameter value; defaults resolve lazily in the evaluator
    pub fn get_parameter(&self, name: &str) -> Option<&CqlValue> {
        self.parameters.get(name)
    }

    // --- definition cache and cycle detection ---

    /// A cached definition result
    pub fn get_cached(&self, key: &str) -> Option<&CqlValue> {
        self.definition_cache.get(key)
    }

    /// Cache a fully evaluated definition result
    pub fn cache_result(&mut self, key: impl Into<String>, value: CqlValue) {
        self.definition_cache.insert(key.into(), value);
    }

    /// Mark a definition as being evaluated; false when it already is
    /// (a cycle)
    pub fn begin_evaluation(&mut self, key: &str) -> bool {
        self.in_progress.insert(key.to_string())
    }

    /// Unmark a definition, successful or not
    pub fn end_evaluation(&mut self, key: &str) {
        self.in_progress.remove(key);
    }

    /// Drop all cached definition results
    pub fn clear_cache(&mut self) {
        self.definition_cache.clear();
    }

    // --- recursion guard ---

    pub fn enter_recursion(&mut self) -> bool {
        if self.recursion_depth >= MAX_RECURSION_DEPTH {
            return false;
        }
        self.recursion_depth += 1;
        true
    }

    pub fn exit_recursion(&mut self) {
        self.recursion_depth = self.recursion_depth.saturating_sub(1);
    }

    // --- clock ---

    /// The evaluation clock
    pub fn now(&self) -> CqlDateTime {
        self.now
    }

    /// The evaluation date
    pub fn today(&self) -> CqlDate {
        self.now.date()
    }

    /// The evaluation time of day
    pub fn time_of_day(&self) -> CqlTime {
        self.now.time().unwrap_or(CqlTime::MIN)
    }

    // --- evaluation context resource ---

    pub fn context_name(&self) -> Option<&str> {
        self.context_name.as_deref()
    }

    pub fn context_resource(&self) -> Option<&CqlValue> {
        self.context_resource.as_ref()
    }

    pub fn set_context_resource(&mut self, context_name: impl Into<String>, resource: CqlValue) {
        self.context_name = Some(context_name.into());
        self.context_resource = Some(resource);
    }

    // --- collaborators ---

    pub fn data_source(&self) -> Option<&Arc<dyn DataSource>> {
        self.data_source.as_ref()
    }

    pub fn terminology(&self) -> Option<&Arc<TerminologyAdapter>> {
        self.terminology.as_ref()
    }

    pub fn units(&self) -> &dyn UnitConverter {
        self.units.as_ref()
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn plugins_mut(&mut self) -> &mut PluginRegistry {
        &mut self.plugins
    }

    pub fn message_sink(&self) -> &Arc<dyn MessageSink> {
        &self.message_sink
    }

    pub fn library_manager(&self) -> Option<&Arc<LibraryManager>> {
        self.library_manager.as_ref()
    }
}

/// Capture the wall clock as a full-precision local DateTime
fn capture_now() -> CqlDateTime {
    let now = Local::now();
    let offset_minutes = (now.offset().fix().local_minus_utc() / 60) as i16;
    CqlDateTime::new(
        now.year(),
        now.month() as u8,
        now.day() as u8,
        now.hour() as u8,
        now.minute() as u8,
        now.second() as u8,
        (now.timestamp_subsec_millis().min(999)) as u16,
        Some(offset_minutes),
    )
}
