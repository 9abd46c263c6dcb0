//! String function tests through the registry

use super::{eval, int, text};
use lumen_cql_ast::Expr;
use lumen_cql_types::CqlValue;
use pretty_assertions::assert_eq;

#[test]
fn test_concatenate_and_combine() {
    assert_eq!(
        eval(Expr::function("Concatenate", vec![text("ab"), text("cd")])),
        CqlValue::string("abcd")
    );
    assert_eq!(
        eval(Expr::function("Concatenate", vec![text("ab"), Expr::null()])),
        CqlValue::Null
    );
    let list = Expr::list(vec![text("a"), text("b"), text("c")]);
    assert_eq!(
        eval(Expr::function("Combine", vec![list, text("-")])),
        CqlValue::string("a-b-c")
    );
}

#[test]
fn test_split_and_indexing() {
    assert_eq!(
        eval(Expr::function("Split", vec![text("a,b,c"), text(",")])),
        CqlValue::list(vec![
            CqlValue::string("a"),
            CqlValue::string("b"),
            CqlValue::string("c"),
        ])
    );
    assert_eq!(
        eval(Expr::function("Indexer", vec![text("abc"), int(1)])),
        CqlValue::string("b")
    );
    assert_eq!(
        eval(Expr::function("PositionOf", vec![text("b"), text("abcb")])),
        CqlValue::integer(1)
    );
    assert_eq!(
        eval(Expr::function("LastPositionOf", vec![text("b"), text("abcb")])),
        CqlValue::integer(3)
    );
}

#[test]
fn test_case_and_trim() {
    assert_eq!(
        eval(Expr::function("Upper", vec![text("abc")])),
        CqlValue::string("ABC")
    );
    assert_eq!(
        eval(Expr::function("Lower", vec![text("ABC")])),
        CqlValue::string("abc")
    );
    assert_eq!(
        eval(Expr::function("Trim", vec![text("  x  ")])),
        CqlValue::string("x")
    );
}

#[test]
fn test_substring_variants() {
    assert_eq!(
        eval(Expr::function("Substring", vec![text("hello world"), int(6)])),
        CqlValue::string("world")
    );
    assert_eq!(
        eval(Expr::function("Substring", vec![text("hello"), int(1), int(3)])),
        CqlValue::string("ell")
    );
    assert_eq!(
        eval(Expr::function("Substring", vec![text("hello"), int(10)])),
        CqlValue::Null
    );
}

#[test]
fn test_predicates() {
    assert_eq!(
        eval(Expr::function("StartsWith", vec![text("observation"), text("obs")])),
        CqlValue::Boolean(true)
    );
    assert_eq!(
        eval(Expr::function("EndsWith", vec![text("observation"), text("ion")])),
        CqlValue::Boolean(true)
    );
    assert_eq!(
        eval(Expr::function("Contains", vec![text("observation"), text("serv")])),
        CqlValue::Boolean(true)
    );
}

#[test]
fn test_regex_functions() {
    assert_eq!(
        eval(Expr::function("Matches", vec![text("12-34"), text(r"\d+-\d+")])),
        CqlValue::Boolean(true)
    );
    assert_eq!(
        eval(Expr::function(
            "ReplaceMatches",
            vec![text("a1b2"), text(r"\d"), text("_")]
        )),
        CqlValue::string("a_b_")
    );
    assert_eq!(
        eval(Expr::function(
            "Replace",
            vec![text("a.b.c"), text("."), text("-")]
        )),
        CqlValue::string("a-b-c")
    );
}

#[test]
fn test_conversions() {
    assert_eq!(
        eval(Expr::function("ToInteger", vec![text("42")])),
        CqlValue::integer(42)
    );
    assert_eq!(
        eval(Expr::function("ToString", vec![int(42)])),
        CqlValue::string("42")
    );
    assert_eq!(
        eval(Expr::function("ConvertsToDecimal", vec![text("3.25")])),
        CqlValue::Boolean(true)
    );
    assert_eq!(
        eval(Expr::function("ConvertsToDate", vec![text("not a date")])),
        CqlValue::Boolean(false)
    );
}
