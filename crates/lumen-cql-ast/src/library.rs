//! Library model: the unit of compilation
//!
//! A [`Library`] carries everything a `library` source file declares:
//! identifier and version, data models, aliased includes, parameters,
//! terminology definitions, named expressions and functions.

use crate::{AccessModifier, BoxExpr, OptBoxExpr, TypeSpecifier};
use indexmap::IndexMap;

/// A compiled CQL library
#[derive(Debug, Clone, Default)]
pub struct Library {
    /// Library name
    pub name: String,
    /// Optional version
    pub version: Option<String>,
    /// Declared data models (`using`)
    pub usings: Vec<UsingDefinition>,
    /// Aliased includes
    pub includes: Vec<IncludeDefinition>,
    /// Parameter declarations, in declaration order
    pub parameters: IndexMap<String, ParameterDefinition>,
    /// Codesystem definitions
    pub codesystems: IndexMap<String, CodesystemDefinition>,
    /// Valueset definitions
    pub valuesets: IndexMap<String, ValuesetDefinition>,
    /// Code definitions
    pub codes: IndexMap<String, CodeDefinition>,
    /// Concept definitions
    pub concepts: IndexMap<String, ConceptDefinition>,
    /// Declared evaluation contexts (`context Patient`)
    pub contexts: Vec<String>,
    /// Named expression definitions, in declaration order
    pub definitions: IndexMap<String, ExpressionDefinition>,
    /// Function definitions, overloaded by arity
    pub functions: IndexMap<String, Vec<FunctionDefinition>>,
}

impl Library {
    /// Create an empty library with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create an empty library with name and version
    pub fn with_version(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
            ..Default::default()
        }
    }

    /// Add a named expression definition
    pub fn add_definition(&mut self, definition: ExpressionDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    /// Add a function definition; overloads accumulate under the name
    pub fn add_function(&mut self, function: FunctionDefinition) {
        self.functions
            .entry(function.name.clone())
            .or_default()
            .push(function);
    }

    /// Look up an expression definition by name
    pub fn definition(&self, name: &str) -> Option<&ExpressionDefinition> {
        self.definitions.get(name)
    }

    /// Look up a function by name and arity; falls back to the first
    /// overload when no arity matches exactly
    pub fn function(&self, name: &str, arity: usize) -> Option<&FunctionDefinition> {
        let overloads = self.functions.get(name)?;
        overloads
            .iter()
            .find(|f| f.parameters.len() == arity)
            .or_else(|| overloads.first())
    }

    /// Find an include by its effective alias (the explicit alias, or the
    /// library name when no alias was given)
    pub fn include_by_alias(&self, alias: &str) -> Option<&IncludeDefinition> {
        self.includes
            .iter()
            .find(|inc| inc.alias.as_deref().unwrap_or(&inc.library) == alias)
    }

    /// Resolve a codesystem definition name to its URI
    pub fn codesystem_uri(&self, name: &str) -> Option<&str> {
        self.codesystems.get(name).map(|cs| cs.uri.as_str())
    }

    /// Resolve a code definition to (code, system URI, display)
    pub fn resolve_code(&self, name: &str) -> Option<ResolvedCode> {
        let code_def = self.codes.get(name)?;
        let system = self.codesystem_uri(&code_def.codesystem)?;
        Some(ResolvedCode {
            code: code_def.code.clone(),
            system: system.to_string(),
            display: code_def.display.clone(),
            version: self
                .codesystems
                .get(&code_def.codesystem)
                .and_then(|cs| cs.version.clone()),
        })
    }

    /// Resolve a concept definition to its resolved codes
    pub fn resolve_concept(&self, name: &str) -> Option<(Vec<ResolvedCode>, Option<String>)> {
        let concept_def = self.concepts.get(name)?;
        let codes = concept_def
            .codes
            .iter()
            .filter_map(|code_ref| self.resolve_code(code_ref))
            .collect();
        Some((codes, concept_def.display.clone()))
    }
}

/// A code resolved against its declared codesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCode {
    pub code: String,
    pub system: String,
    pub display: Option<String>,
    pub version: Option<String>,
}

/// A `using` statement (data model declaration)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsingDefinition {
    /// Model identifier, e.g. "FHIR"
    pub model: String,
    /// Optional model version
    pub version: Option<String>,
}

/// An `include` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDefinition {
    /// Included library name
    pub library: String,
    /// Optional version
    pub version: Option<String>,
    /// Local alias (`called`); the library name serves when absent
    pub alias: Option<String>,
}

impl IncludeDefinition {
    /// The alias under which the include is referenced
    pub fn effective_alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.library)
    }
}

/// A parameter declaration
#[derive(Debug, Clone)]
pub struct ParameterDefinition {
    pub name: String,
    pub type_specifier: Option<TypeSpecifier>,
    /// Default expression, evaluated lazily at first reference
    pub default: OptBoxExpr,
}

/// A codesystem definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodesystemDefinition {
    pub name: String,
    /// Canonical URI
    pub uri: String,
    pub version: Option<String>,
}

/// A valueset definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuesetDefinition {
    pub name: String,
    /// Canonical URL used for expansion and membership tests
    pub uri: String,
    pub version: Option<String>,
    /// Referenced codesystem names, when declared
    pub codesystems: Vec<String>,
}

/// A code definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeDefinition {
    pub name: String,
    pub code: String,
    /// Name of a codesystem definition in the same library
    pub codesystem: String,
    pub display: Option<String>,
}

/// A concept definition grouping code definitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptDefinition {
    pub name: String,
    /// Names of code definitions in the same library
    pub codes: Vec<String>,
    pub display: Option<String>,
}

/// A named expression definition
#[derive(Debug, Clone)]
pub struct ExpressionDefinition {
    pub name: String,
    pub access: AccessModifier,
    /// Evaluation context the definition was declared under
    pub context: Option<String>,
    pub expression: BoxExpr,
}

impl ExpressionDefinition {
    pub fn new(name: impl Into<String>, expression: crate::Expr) -> Self {
        Self {
            name: name.into(),
            access: AccessModifier::Public,
            context: None,
            expression: expression.boxed(),
        }
    }
}

/// A function definition
#[derive(Debug, Clone)]
pub struct FunctionDefinition {
    pub name: String,
    pub access: AccessModifier,
    /// Whether the function may be invoked fluently
    pub fluent: bool,
    /// Ordered parameter list
    pub parameters: Vec<FunctionParameter>,
    pub return_type: Option<TypeSpecifier>,
    /// Function body; None for external functions
    pub body: OptBoxExpr,
    /// External functions are supplied by the host through the plugin slot
    pub external: bool,
}

impl FunctionDefinition {
    pub fn new(
        name: impl Into<String>,
        parameters: Vec<FunctionParameter>,
        body: crate::Expr,
    ) -> Self {
        Self {
            name: name.into(),
            access: AccessModifier::Public,
            fluent: false,
            parameters,
            return_type: None,
            body: Some(body.boxed()),
            external: false,
        }
    }
}

/// A function parameter
#[derive(Debug, Clone)]
pub struct FunctionParameter {
    pub name: String,
    pub type_specifier: Option<TypeSpecifier>,
}

impl FunctionParameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_specifier: None,
        }
    }
}
