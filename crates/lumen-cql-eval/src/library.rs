//! Library resolution and management
//!
//! A [`LibraryResolver`] turns `(name, version)` into source text; the
//! [`LibraryManager`] memoizes compiled libraries and resolves include
//! graphs on demand, reporting cyclic includes instead of recursing into
//! them.

use crate::error::{EvalError, EvalErrorKind, EvalResult};
use lumen_cql_ast::Library;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolves a library name (and optional version) to source text
pub trait LibraryResolver: Send + Sync {
    fn resolve(&self, name: &str, version: Option<&str>) -> Option<String>;
}

/// Filesystem resolver.
///
/// Searches each configured directory for, in order: `{name}.cql`,
/// `{name}-{version}.cql`, their lowercase spellings, and the same
/// patterns inside a `{name}/` subdirectory, with a case-insensitive
/// directory scan as the last resort.
#[derive(Debug, Default, Clone)]
pub struct FileLibraryResolver {
    search_paths: Vec<PathBuf>,
}

impl FileLibraryResolver {
    pub fn new(search_paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            search_paths: search_paths
                .into_iter()
                .map(Into::into)
                .filter(|p: &PathBuf| p.is_dir())
                .collect(),
        }
    }

    /// Add a directory to the search path
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if path.is_dir() && !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
    }

    fn candidates(name: &str, version: Option<&str>) -> Vec<String> {
        let mut candidates = vec![format!("{name}.cql")];
        if let Some(version) = version {
            candidates.push(format!("{name}-{version}.cql"));
        }
        candidates.push(format!("{}.cql", name.to_lowercase()));
        if let Some(version) = version {
            candidates.push(format!("{}-{version}.cql", name.to_lowercase()));
        }
        candidates
    }

    fn try_dir(dir: &Path, candidates: &[String]) -> Option<String> {
        for candidate in candidates {
            let path = dir.join(candidate);
            if path.is_file() {
                return std::fs::read_to_string(path).ok();
            }
        }
        None
    }

    /// Case-insensitive scan of a directory for `{name}.cql`
    fn scan_dir(dir: &Path, name: &str) -> Option<String> {
        let wanted = format!("{}.cql", name.to_lowercase());
        for entry in std::fs::read_dir(dir).ok()? {
            let entry = entry.ok()?;
            let file_name = entry.file_name();
            if file_name.to_string_lossy().to_lowercase() == wanted {
                return std::fs::read_to_string(entry.path()).ok();
            }
        }
        None
    }
}

impl LibraryResolver for FileLibraryResolver {
    fn resolve(&self, name: &str, version: Option<&str>) -> Option<String> {
        let candidates = Self::candidates(name, version);
        for dir in &self.search_paths {
            if let Some(source) = Self::try_dir(dir, &candidates) {
                return Some(source);
            }
            let subdir = dir.join(name);
            if subdir.is_dir() {
                if let Some(source) = Self::try_dir(&subdir, &candidates) {
                    return Some(source);
                }
            }
        }
        // Last resort: case-insensitive filename match
        for dir in &self.search_paths {
            if let Some(source) = Self::scan_dir(dir, name) {
                return Some(source);
            }
        }
        None
    }
}

/// In-memory resolver keyed `name` or `name|version`
#[derive(Debug, Default, Clone)]
pub struct InMemoryLibraryResolver {
    libraries: HashMap<String, String>,
}

impl InMemoryLibraryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source; versioned entries also register the bare name
    /// as a fallback
    pub fn add_library(
        &mut self,
        name: impl Into<String>,
        version: Option<&str>,
        source: impl Into<String>,
    ) {
        let name = name.into();
        let source = source.into();
        match version {
            Some(version) => {
                self.libraries
                    .insert(format!("{name}|{version}"), source.clone());
                self.libraries.entry(name).or_insert(source);
            }
            None => {
                self.libraries.insert(name, source);
            }
        }
    }
}

impl LibraryResolver for InMemoryLibraryResolver {
    fn resolve(&self, name: &str, version: Option<&str>) -> Option<String> {
        if let Some(version) = version {
            if let Some(source) = self.libraries.get(&format!("{name}|{version}")) {
                return Some(source.clone());
            }
        }
        self.libraries.get(name).cloned()
    }
}

/// Tries sub-resolvers in order
#[derive(Default)]
pub struct CompositeLibraryResolver {
    resolvers: Vec<Box<dyn LibraryResolver>>,
}

impl CompositeLibraryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, resolver: impl LibraryResolver + 'static) {
        self.resolvers.push(Box::new(resolver));
    }
}

impl LibraryResolver for CompositeLibraryResolver {
    fn resolve(&self, name: &str, version: Option<&str>) -> Option<String> {
        self.resolvers
            .iter()
            .find_map(|resolver| resolver.resolve(name, version))
    }
}

/// Hook translating source text to a compiled library
pub type CompileFn = Box<dyn Fn(&str) -> EvalResult<Library> + Send + Sync>;

/// Memoizes compiled libraries by `(name, version)` and resolves include
/// graphs on demand
pub struct LibraryManager {
    cache: Mutex<HashMap<(String, String), Arc<Library>>>,
    resolver: Box<dyn LibraryResolver>,
    compile: CompileFn,
}

impl LibraryManager {
    pub fn new(resolver: impl LibraryResolver + 'static, compile: CompileFn) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            resolver: Box::new(resolver),
            compile,
        }
    }

    /// A manager over pre-compiled libraries only
    pub fn from_libraries(libraries: impl IntoIterator<Item = Library>) -> Self {
        let manager = Self::new(InMemoryLibraryResolver::new(), Box::new(|_source| {
            Err(EvalError::internal("no compile hook configured"))
        }));
        for library in libraries {
            manager.add_library(Arc::new(library));
        }
        manager
    }

    fn cache_key(name: &str, version: Option<&str>) -> (String, String) {
        (name.to_string(), version.unwrap_or_default().to_string())
    }

    /// Register a compiled library
    pub fn add_library(&self, library: Arc<Library>) {
        let key = Self::cache_key(&library.name, library.version.as_deref());
        let mut cache = self.cache.lock();
        // Also register under the bare name for versionless lookups
        cache
            .entry(Self::cache_key(&library.name, None))
            .or_insert_with(|| library.clone());
        cache.insert(key, library);
    }

    /// Get a library, compiling it through the resolver when absent
    pub fn get_library(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> EvalResult<Option<Arc<Library>>> {
        let key = Self::cache_key(name, version);
        if let Some(library) = self.cache.lock().get(&key) {
            return Ok(Some(library.clone()));
        }

        let Some(source) = self.resolver.resolve(name, version) else {
            return Ok(None);
        };
        let library = Arc::new((self.compile)(&source)?);
        self.add_library(library.clone());
        Ok(Some(library))
    }

    /// Resolve the full include graph of a library, keyed by effective
    /// alias. Cyclic includes are an error.
    pub fn resolve_includes(
        &self,
        library: &Library,
    ) -> EvalResult<HashMap<String, Arc<Library>>> {
        let mut resolved = HashMap::new();
        let mut visiting = vec![library.name.clone()];
        self.resolve_includes_into(library, &mut resolved, &mut visiting)?;
        Ok(resolved)
    }

    fn resolve_includes_into(
        &self,
        library: &Library,
        resolved: &mut HashMap<String, Arc<Library>>,
        visiting: &mut Vec<String>,
    ) -> EvalResult<()> {
        for include in &library.includes {
            if visiting.contains(&include.library) {
                return Err(EvalErrorKind::LibraryCycle {
                    name: include.library.clone(),
                }
                .into());
            }
            let included = self
                .get_library(&include.library, include.version.as_deref())?
                .ok_or_else(|| EvalError::undefined_library(&include.library))?;

            visiting.push(include.library.clone());
            self.resolve_includes_into(&included, resolved, visiting)?;
            visiting.pop();

            resolved.insert(include.effective_alias().to_string(), included);
        }
        Ok(())
    }
}
