//! Type specifiers used by `is` / `as` and instance construction

use std::fmt;

/// A type specifier as written in source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSpecifier {
    /// A named type, e.g. `Integer`, `FHIR.Patient`, `Condition`
    Named(String),
    /// `List<T>`
    List(Box<TypeSpecifier>),
    /// `Interval<T>`
    Interval(Box<TypeSpecifier>),
    /// `Tuple { name: T, ... }`
    Tuple(Vec<(String, TypeSpecifier)>),
    /// `Choice<A, B, ...>`
    Choice(Vec<TypeSpecifier>),
}

impl TypeSpecifier {
    /// Create a named type specifier
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// The bare name for a named specifier, stripped of any model qualifier
    pub fn simple_name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name.rsplit('.').next().unwrap_or(name)),
            _ => None,
        }
    }
}

impl fmt::Display for TypeSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{name}"),
            Self::List(inner) => write!(f, "List<{inner}>"),
            Self::Interval(inner) => write!(f, "Interval<{inner}>"),
            Self::Tuple(elements) => {
                write!(f, "Tuple {{ ")?;
                for (i, (name, ty)) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                write!(f, " }}")
            }
            Self::Choice(choices) => {
                write!(f, "Choice<")?;
                for (i, ty) in choices.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{ty}")?;
                }
                write!(f, ">")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_name_strips_model_qualifier() {
        assert_eq!(TypeSpecifier::named("FHIR.Patient").simple_name(), Some("Patient"));
        assert_eq!(TypeSpecifier::named("Integer").simple_name(), Some("Integer"));
        assert_eq!(
            TypeSpecifier::List(Box::new(TypeSpecifier::named("Integer"))).simple_name(),
            None
        );
    }

    #[test]
    fn test_display() {
        let ty = TypeSpecifier::Interval(Box::new(TypeSpecifier::named("DateTime")));
        assert_eq!(ty.to_string(), "Interval<DateTime>");
    }
}
