//! String functions
//!
//! All functions are null-propagating: a null argument yields null.
//! `Length` counts Unicode code points. Regular expressions compile once
//! and cache by pattern.

use crate::error::{EvalError, EvalErrorKind, EvalResult};
use lumen_cql_types::CqlValue;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;

static REGEX_CACHE: Lazy<Mutex<HashMap<String, Regex>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn compiled(pattern: &str) -> EvalResult<Regex> {
    let mut cache = REGEX_CACHE.lock();
    if let Some(re) = cache.get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(pattern).map_err(|_| {
        EvalError::from(EvalErrorKind::InvalidRegex {
            pattern: pattern.to_string(),
        })
    })?;
    cache.insert(pattern.to_string(), re.clone());
    Ok(re)
}

fn expect_string<'a>(value: &'a CqlValue, function: &str) -> EvalResult<Option<&'a str>> {
    match value {
        CqlValue::Null => Ok(None),
        CqlValue::String(s) => Ok(Some(s)),
        other => Err(EvalError::invalid_operand(
            function,
            format!("expected String, found {}", other.type_name()),
        )),
    }
}

fn expect_integer(value: &CqlValue, function: &str) -> EvalResult<Option<i64>> {
    match value {
        CqlValue::Null => Ok(None),
        CqlValue::Integer(i) => Ok(Some(*i)),
        other => Err(EvalError::invalid_operand(
            function,
            format!("expected Integer, found {}", other.type_name()),
        )),
    }
}

/// Concatenate: null-propagating string concatenation
pub fn concatenate(left: &CqlValue, right: &CqlValue) -> EvalResult<CqlValue> {
    let (Some(a), Some(b)) = (
        expect_string(left, "Concatenate")?,
        expect_string(right, "Concatenate")?,
    ) else {
        return Ok(CqlValue::Null);
    };
    Ok(CqlValue::String(format!("{a}{b}")))
}

/// Combine: join the string elements of a list, skipping nulls
pub fn combine(source: &CqlValue, separator: Option<&CqlValue>) -> EvalResult<CqlValue> {
    let list = match source {
        CqlValue::Null => return Ok(CqlValue::Null),
        CqlValue::List(list) => list,
        other => {
            return Err(EvalError::invalid_operand(
                "Combine",
                format!("expected List, found {}", other.type_name()),
            ));
        }
    };
    let separator = match separator {
        None | Some(CqlValue::Null) => "",
        Some(CqlValue::String(s)) => s,
        Some(other) => {
            return Err(EvalError::invalid_operand(
                "Combine",
                format!("expected String separator, found {}", other.type_name()),
            ));
        }
    };
    let mut parts = Vec::new();
    for element in list.iter() {
        if let Some(s) = expect_string(element, "Combine")? {
            parts.push(s.to_string());
        }
    }
    Ok(CqlValue::String(parts.join(separator)))
}

/// Split a string on a separator
pub fn split(source: &CqlValue, separator: &CqlValue) -> EvalResult<CqlValue> {
    let (Some(s), Some(sep)) = (
        expect_string(source, "Split")?,
        expect_string(separator, "Split")?,
    ) else {
        return Ok(CqlValue::Null);
    };
    if sep.is_empty() {
        return Ok(CqlValue::list(vec![CqlValue::string(s)]));
    }
    Ok(CqlValue::list(
        s.split(sep).map(CqlValue::string).collect(),
    ))
}

/// Length in Unicode code points
pub fn string_length(value: &CqlValue) -> EvalResult<CqlValue> {
    match expect_string(value, "Length")? {
        None => Ok(CqlValue::Null),
        Some(s) => Ok(CqlValue::Integer(s.chars().count() as i64)),
    }
}

/// Upper-case
pub fn upper(value: &CqlValue) -> EvalResult<CqlValue> {
    match expect_string(value, "Upper")? {
        None => Ok(CqlValue::Null),
        Some(s) => Ok(CqlValue::String(s.to_uppercase())),
    }
}

/// Lower-case
pub fn lower(value: &CqlValue) -> EvalResult<CqlValue> {
    match expect_string(value, "Lower")? {
        None => Ok(CqlValue::Null),
        Some(s) => Ok(CqlValue::String(s.to_lowercase())),
    }
}

/// Substring from a 0-based start, with optional length.
/// An out-of-range start is null.
pub fn substring(
    source: &CqlValue,
    start: &CqlValue,
    length: Option<&CqlValue>,
) -> EvalResult<CqlValue> {
    let (Some(s), Some(start)) = (
        expect_string(source, "Substring")?,
        expect_integer(start, "Substring")?,
    ) else {
        return Ok(CqlValue::Null);
    };
    let chars: Vec<char> = s.chars().collect();
    if start < 0 || start as usize >= chars.len() {
        return Ok(CqlValue::Null);
    }
    let start = start as usize;
    let end = match length {
        None => chars.len(),
        Some(len) => match expect_integer(len, "Substring")? {
            None => return Ok(CqlValue::Null),
            Some(len) if len < 0 => return Ok(CqlValue::Null),
            Some(len) => (start + len as usize).min(chars.len()),
        },
    };
    Ok(CqlValue::String(chars[start..end].iter().collect()))
}

/// StartsWith
pub fn starts_with(source: &CqlValue, prefix: &CqlValue) -> EvalResult<CqlValue> {
    let (Some(s), Some(p)) = (
        expect_string(source, "StartsWith")?,
        expect_string(prefix, "StartsWith")?,
    ) else {
        return Ok(CqlValue::Null);
    };
    Ok(CqlValue::Boolean(s.starts_with(p)))
}

/// EndsWith
pub fn ends_with(source: &CqlValue, suffix: &CqlValue) -> EvalResult<CqlValue> {
    let (Some(s), Some(p)) = (
        expect_string(source, "EndsWith")?,
        expect_string(suffix, "EndsWith")?,
    ) else {
        return Ok(CqlValue::Null);
    };
    Ok(CqlValue::Boolean(s.ends_with(p)))
}

/// Matches: whole-string regular expression test
pub fn matches(source: &CqlValue, pattern: &CqlValue) -> EvalResult<CqlValue> {
    let (Some(s), Some(p)) = (
        expect_string(source, "Matches")?,
        expect_string(pattern, "Matches")?,
    ) else {
        return Ok(CqlValue::Null);
    };
    let re = compiled(&format!("^(?:{p})$"))?;
    Ok(CqlValue::Boolean(re.is_match(s)))
}

/// ReplaceMatches: regex substitution
pub fn replace_matches(
    source: &CqlValue,
    pattern: &CqlValue,
    substitution: &CqlValue,
) -> EvalResult<CqlValue> {
    let (Some(s), Some(p), Some(r)) = (
        expect_string(source, "ReplaceMatches")?,
        expect_string(pattern, "ReplaceMatches")?,
        expect_string(substitution, "ReplaceMatches")?,
    ) else {
        return Ok(CqlValue::Null);
    };
    let re = compiled(p)?;
    Ok(CqlValue::String(re.replace_all(s, r).into_owned()))
}

/// Replace: literal substring substitution
pub fn replace(
    source: &CqlValue,
    pattern: &CqlValue,
    substitution: &CqlValue,
) -> EvalResult<CqlValue> {
    let (Some(s), Some(p), Some(r)) = (
        expect_string(source, "Replace")?,
        expect_string(pattern, "Replace")?,
        expect_string(substitution, "Replace")?,
    ) else {
        return Ok(CqlValue::Null);
    };
    Ok(CqlValue::String(s.replace(p, r)))
}

/// Indexer: 0-based character access; out of range is null
pub fn indexer(source: &CqlValue, index: &CqlValue) -> EvalResult<CqlValue> {
    let (Some(s), Some(i)) = (
        expect_string(source, "Indexer")?,
        expect_integer(index, "Indexer")?,
    ) else {
        return Ok(CqlValue::Null);
    };
    if i < 0 {
        return Ok(CqlValue::Null);
    }
    match s.chars().nth(i as usize) {
        Some(c) => Ok(CqlValue::String(c.to_string())),
        None => Ok(CqlValue::Null),
    }
}

/// PositionOf: first 0-based position of `pattern` in `argument`, -1 when
/// absent
pub fn position_of(pattern: &CqlValue, argument: &CqlValue) -> EvalResult<CqlValue> {
    let (Some(p), Some(s)) = (
        expect_string(pattern, "PositionOf")?,
        expect_string(argument, "PositionOf")?,
    ) else {
        return Ok(CqlValue::Null);
    };
    match s.find(p) {
        Some(byte_pos) => Ok(CqlValue::Integer(s[..byte_pos].chars().count() as i64)),
        None => Ok(CqlValue::Integer(-1)),
    }
}

/// LastPositionOf: last 0-based position, -1 when absent
pub fn last_position_of(pattern: &CqlValue, argument: &CqlValue) -> EvalResult<CqlValue> {
    let (Some(p), Some(s)) = (
        expect_string(pattern, "LastPositionOf")?,
        expect_string(argument, "LastPositionOf")?,
    ) else {
        return Ok(CqlValue::Null);
    };
    match s.rfind(p) {
        Some(byte_pos) => Ok(CqlValue::Integer(s[..byte_pos].chars().count() as i64)),
        None => Ok(CqlValue::Integer(-1)),
    }
}

/// Trim ASCII whitespace from both ends
pub fn trim(value: &CqlValue) -> EvalResult<CqlValue> {
    match expect_string(value, "Trim")? {
        None => Ok(CqlValue::Null),
        Some(s) => Ok(CqlValue::String(s.trim().to_string())),
    }
}

/// Substring containment
pub fn string_contains(source: &CqlValue, substring: &CqlValue) -> EvalResult<CqlValue> {
    let (Some(s), Some(sub)) = (
        expect_string(source, "Contains")?,
        expect_string(substring, "Contains")?,
    ) else {
        return Ok(CqlValue::Null);
    };
    Ok(CqlValue::Boolean(s.contains(sub)))
}
