use std::path::Path;

use darwinian::operators::{self, OperatorCategory};
use darwinian::scanner;
use darwinian::source::SourceUnit;

/// (original, mutated) for every point one operator finds in `source`.
fn mutations(op: &str, path: &str, source: &str) -> Vec<(String, String)> {
    let unit = SourceUnit::from_source(Path::new(path), source.to_string()).unwrap();
    let ops = operators::select(&[op]).unwrap();
    scanner::scan_unit(&unit, &ops, None)
        .into_iter()
        .map(|p| (p.original, p.mutated))
        .collect()
}

fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
    list.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()
}

// --- Catalog ---

#[test]
fn catalog_has_every_category() {
    let cats: Vec<_> = operators::catalog().iter().map(|op| op.category).collect();
    for want in [
        OperatorCategory::Relational,
        OperatorCategory::Logical,
        OperatorCategory::Arithmetic,
        OperatorCategory::Bitwise,
        OperatorCategory::Assignment,
        OperatorCategory::Literal,
        OperatorCategory::Statement,
    ] {
        assert!(cats.contains(&want), "missing {want:?}");
    }
}

#[test]
fn string_literal_is_opt_in() {
    assert!(!operators::default_ids().contains(&"string_literal"));
    assert!(operators::default_ids().contains(&"relational_boundary"));
}

#[test]
fn select_empty_means_defaults() {
    let ops = operators::select::<&str>(&[]).unwrap();
    let ids: Vec<_> = ops.iter().map(|op| op.id).collect();
    assert_eq!(ids, operators::default_ids());
}

#[test]
fn select_keeps_catalog_order() {
    let ops = operators::select(&["bool_flip", "arithmetic"]).unwrap();
    let ids: Vec<_> = ops.iter().map(|op| op.id).collect();
    assert_eq!(ids, vec!["arithmetic", "bool_flip"]);
}

#[test]
fn select_unknown_operator_fails() {
    let err = operators::select(&["relational_boundary", "nope"]).unwrap_err();
    assert!(err.to_string().contains("nope"));
    assert!(err.to_string().contains("relational_boundary"));
}

#[test]
fn find_by_id() {
    assert_eq!(operators::find("shift").map(|op| op.category), Some(OperatorCategory::Bitwise));
    assert!(operators::find("shifty").is_none());
}

// --- Relational ---

#[test]
fn boundary_each_direction() {
    let src = "def f(a, b):\n    return [a < b, a <= b, a > b, a >= b]\n";
    assert_eq!(
        mutations("relational_boundary", "f.py", src),
        pairs(&[("<", "<="), ("<=", "<"), (">", ">="), (">=", ">")])
    );
}

#[test]
fn relational_negation_each_direction() {
    let src = "def f(a, b):\n    return [a < b, a <= b, a > b, a >= b]\n";
    assert_eq!(
        mutations("relational_negation", "f.py", src),
        pairs(&[("<", ">="), ("<=", ">"), (">", "<="), (">=", "<")])
    );
}

#[test]
fn equality_negation_python_identity_and_membership() {
    let src = "def f(a, b):\n    return [a == b, a is None, a in b, a not in b]\n";
    assert_eq!(
        mutations("equality_negation", "f.py", src),
        pairs(&[("==", "!="), ("is", "is not"), ("in", "not in"), ("not in", "in")])
    );
}

#[test]
fn equality_negation_js_strict() {
    let src = "function f(a, b) { return [a === b, a != b]; }\n";
    assert_eq!(
        mutations("equality_negation", "f.js", src),
        pairs(&[("===", "!=="), ("!=", "==")])
    );
}

// --- Logical ---

#[test]
fn logical_flip_js() {
    let src = "function f(a, b) { return [a && b, a || b, a ?? b]; }\n";
    assert_eq!(
        mutations("logical_flip", "f.js", src),
        pairs(&[("&&", "||"), ("||", "&&"), ("??", "||")])
    );
}

#[test]
fn logical_flip_rust() {
    let src = "fn f(a: bool, b: bool) -> bool { a || b }\n";
    assert_eq!(mutations("logical_flip", "f.rs", src), pairs(&[("||", "&&")]));
}

#[test]
fn negation_removal_python() {
    let src = "def f(a):\n    return not a\n";
    assert_eq!(mutations("negation_removal", "f.py", src), pairs(&[("not a", "a")]));
}

// --- Arithmetic ---

#[test]
fn arithmetic_python_operators() {
    let src = "def f(a, b):\n    return [a - b, a * b, a / b, a % b, a // b, a ** b]\n";
    assert_eq!(
        mutations("arithmetic", "f.py", src),
        pairs(&[("-", "+"), ("*", "/"), ("/", "*"), ("%", "/"), ("//", "/"), ("**", "*")])
    );
}

#[test]
fn arithmetic_skips_js_string_concatenation() {
    let src = "function f(n) { return \"id-\" + n; }\n";
    assert!(mutations("arithmetic", "f.js", src).is_empty());
}

#[test]
fn unary_minus_removal() {
    let src = "fn f(a: i32) -> i32 { -a }\n";
    assert_eq!(mutations("unary_minus_removal", "f.rs", src), pairs(&[("-a", "a")]));
}

// --- Bitwise ---

#[test]
fn bitwise_and_shift() {
    let src = "fn f(a: u8, b: u8) -> u8 { (a & b) | (a ^ b) << 1 }\n";
    assert_eq!(
        mutations("bitwise", "f.rs", src),
        pairs(&[("&", "|"), ("|", "&"), ("^", "&")])
    );
    assert_eq!(mutations("shift", "f.rs", src), pairs(&[("<<", ">>")]));
}

#[test]
fn unsigned_shift_js() {
    let src = "function f(a) { return a >>> 2; }\n";
    assert_eq!(mutations("shift", "f.js", src), pairs(&[(">>>", "<<")]));
}

// --- Assignment ---

#[test]
fn compound_assignment_python() {
    let src = "def f(a):\n    a += 1\n    a *= 2\n    a %= 3\n    return a\n";
    assert_eq!(
        mutations("compound_assignment", "f.py", src),
        pairs(&[("+=", "-="), ("*=", "/="), ("%=", "/=")])
    );
}

#[test]
fn compound_assignment_rust() {
    let src = "fn f(mut a: i32) -> i32 {\n    a -= 1;\n    a\n}\n";
    assert_eq!(mutations("compound_assignment", "f.rs", src), pairs(&[("-=", "+=")]));
}

// --- Literals ---

#[test]
fn bool_flip_rust_argument() {
    let src = "fn f() -> bool {\n    g(true)\n}\n";
    assert_eq!(mutations("bool_flip", "f.rs", src), pairs(&[("true", "false")]));
}

#[test]
fn string_literal_empty_and_nonempty() {
    let src = "def f(a):\n    x = \"hello\"\n    y = ''\n    return a\n";
    assert_eq!(
        mutations("string_literal", "f.py", src),
        pairs(&[("\"hello\"", "\"\""), ("''", "\"mutator_xx\"")])
    );
}

#[test]
fn string_literal_skips_imports() {
    let src = "import x from \"./x\";\nconst a = \"b\";\n";
    assert_eq!(mutations("string_literal", "f.js", src), pairs(&[("\"b\"", "\"\"")]));
}

// --- Statements ---

#[test]
fn return_value_js() {
    let src = "function f(a) {\n  if (a) { return true; }\n  return [a];\n}\n";
    assert_eq!(
        mutations("return_value", "f.js", src),
        pairs(&[("return true;", "return false;"), ("return [a];", "return [];")])
    );
}

#[test]
fn return_value_rust_unit_is_not_mutated() {
    let src = "fn f() -> Result<(), ()> {\n    return Ok(());\n}\n";
    assert!(mutations("return_value", "f.rs", src).is_empty());
}

#[test]
fn block_removal_js_skips_empty_blocks() {
    let src = "function f(a) {\n  if (a) { g(); } else {}\n}\n";
    assert_eq!(mutations("block_removal", "f.js", src), pairs(&[("{ g(); }", "{}")]));
}

#[test]
fn block_removal_rust_else_branch() {
    let src = "fn f(a: bool) {\n    if a { g(); } else { h(); }\n}\n";
    assert_eq!(
        mutations("block_removal", "f.rs", src),
        pairs(&[("{ g(); }", "{}"), ("{ h(); }", "{}")])
    );
}

#[test]
fn call_statement_removal_rust() {
    let src = "fn f() {\n    g();\n    let x = h();\n}\n";
    assert_eq!(mutations("call_statement_removal", "f.rs", src), pairs(&[("g();", ";")]));
}
