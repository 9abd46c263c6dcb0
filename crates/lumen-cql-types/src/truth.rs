//! Three-valued (Kleene K3) logic
//!
//! Boolean operators work over {true, false, unknown} with unknown read as
//! "could be either". A dedicated type keeps null from silently collapsing
//! to false; conversion to `bool` happens only at well-defined boundaries
//! (where-clause filters, if-conditions).

use std::fmt;

/// A three-valued truth value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    /// Logical conjunction: false dominates, unknown otherwise propagates
    pub const fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::False, _) | (_, Self::False) => Self::False,
            (Self::True, Self::True) => Self::True,
            _ => Self::Unknown,
        }
    }

    /// Logical disjunction: true dominates, unknown otherwise propagates
    pub const fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::True, _) | (_, Self::True) => Self::True,
            (Self::False, Self::False) => Self::False,
            _ => Self::Unknown,
        }
    }

    /// Exclusive or: unknown if either operand is unknown
    pub const fn xor(self, other: Self) -> Self {
        match (self, other) {
            (Self::Unknown, _) | (_, Self::Unknown) => Self::Unknown,
            (a, b) => {
                if matches!(a, Self::True) != matches!(b, Self::True) {
                    Self::True
                } else {
                    Self::False
                }
            }
        }
    }

    /// Material implication: `a implies b` = `(not a) or b`
    pub const fn implies(self, other: Self) -> Self {
        match self {
            Self::False => Self::True,
            Self::True => other,
            Self::Unknown => match other {
                Self::True => Self::True,
                _ => Self::Unknown,
            },
        }
    }

    /// Negation; unknown stays unknown
    pub const fn not(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Unknown => Self::Unknown,
        }
    }

    /// Collapse to `bool`, reading unknown as false.
    ///
    /// This is the boundary coercion used by where-clause filters and
    /// population membership.
    pub const fn is_true(self) -> bool {
        matches!(self, Self::True)
    }

    /// The definite boolean, if there is one
    pub const fn to_bool(self) -> Option<bool> {
        match self {
            Self::True => Some(true),
            Self::False => Some(false),
            Self::Unknown => None,
        }
    }
}

impl From<bool> for Truth {
    fn from(b: bool) -> Self {
        if b { Self::True } else { Self::False }
    }
}

impl From<Option<bool>> for Truth {
    fn from(b: Option<bool>) -> Self {
        match b {
            Some(true) => Self::True,
            Some(false) => Self::False,
            None => Self::Unknown,
        }
    }
}

impl fmt::Display for Truth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::Unknown => write!(f, "null"),
        }
    }
}
