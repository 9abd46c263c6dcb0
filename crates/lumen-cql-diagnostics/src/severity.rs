//! Severity levels for runtime diagnostics emitted by the Message operator

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a runtime diagnostic message.
///
/// `Error` aborts the evaluation that raised it; the other levels log and
/// continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    Warning,
    Error,
}

impl Severity {
    /// Whether a message at this severity aborts evaluation
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Parse failure for a severity name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown message severity: {0}")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "information" is accepted as an alias used by older libraries
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" | "information" | "message" => Ok(Self::Debug),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(UnknownSeverity(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_severity() {
        assert_eq!("Trace".parse::<Severity>().unwrap(), Severity::Trace);
        assert_eq!("warning".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!("information".parse::<Severity>().unwrap(), Severity::Debug);
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_only_error_is_fatal() {
        assert!(Severity::Error.is_fatal());
        assert!(!Severity::Warning.is_fatal());
        assert!(!Severity::Debug.is_fatal());
        assert!(!Severity::Trace.is_fatal());
    }
}
