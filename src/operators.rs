use serde::{Deserialize, Serialize};

use crate::Language;
use crate::error::ConfigError;
use crate::syntax::{NodeCategory, SyntaxNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperatorCategory {
    Relational,
    Logical,
    Arithmetic,
    Bitwise,
    Assignment,
    Literal,
    Statement,
}

/// A mutation operator: a predicate over syntax nodes plus the text that
/// replaces a matching node's span. Both halves are pure.
pub struct MutationOperator {
    pub id: &'static str,
    pub category: OperatorCategory,
    pub enabled_by_default: bool,
    pub description: &'static str,
    matches: fn(&SyntaxNode<'_>) -> bool,
    transform: fn(&SyntaxNode<'_>) -> String,
}

impl std::fmt::Debug for MutationOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationOperator")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("enabled_by_default", &self.enabled_by_default)
            .finish()
    }
}

impl MutationOperator {
    pub fn matches(&self, node: &SyntaxNode<'_>) -> bool {
        (self.matches)(node)
    }

    /// Only meaningful for nodes `matches` accepted.
    pub fn transform(&self, node: &SyntaxNode<'_>) -> String {
        (self.transform)(node)
    }
}

static CATALOG: [MutationOperator; 15] = [
    MutationOperator {
        id: "relational_boundary",
        category: OperatorCategory::Relational,
        enabled_by_default: true,
        description: "< <-> <=, > <-> >=",
        matches: |n| is_binary_op(n, &["<", "<=", ">", ">="]),
        transform: |n| swap(n.text(), &[("<", "<="), ("<=", "<"), (">", ">="), (">=", ">")]),
    },
    MutationOperator {
        id: "relational_negation",
        category: OperatorCategory::Relational,
        enabled_by_default: true,
        description: "< -> >=, <= -> >, > -> <=, >= -> <",
        matches: |n| is_binary_op(n, &["<", "<=", ">", ">="]),
        transform: |n| swap(n.text(), &[("<", ">="), ("<=", ">"), (">", "<="), (">=", "<")]),
    },
    MutationOperator {
        id: "equality_negation",
        category: OperatorCategory::Relational,
        enabled_by_default: true,
        description: "== <-> !=, === <-> !==, is <-> is not, in <-> not in",
        matches: |n| {
            is_binary_op(n, &["==", "!=", "===", "!=="])
                || (n.language().is_python() && is_binary_op(n, &["is", "is not", "in", "not in"]))
        },
        transform: |n| {
            swap(
                n.text(),
                &[
                    ("==", "!="),
                    ("!=", "=="),
                    ("===", "!=="),
                    ("!==", "==="),
                    ("is", "is not"),
                    ("is not", "is"),
                    ("in", "not in"),
                    ("not in", "in"),
                ],
            )
        },
    },
    MutationOperator {
        id: "logical_flip",
        category: OperatorCategory::Logical,
        enabled_by_default: true,
        description: "&& <-> ||, and <-> or, ?? -> ||",
        matches: |n| {
            if n.language().is_python() {
                is_binary_op(n, &["and", "or"])
            } else {
                is_binary_op(n, &["&&", "||", "??"])
            }
        },
        transform: |n| {
            swap(n.text(), &[("&&", "||"), ("||", "&&"), ("??", "||"), ("and", "or"), ("or", "and")])
        },
    },
    MutationOperator {
        id: "negation_removal",
        category: OperatorCategory::Logical,
        enabled_by_default: true,
        description: "!x -> x, not x -> x",
        matches: |n| is_unary(n, &["!", "not"]),
        transform: operand_text,
    },
    MutationOperator {
        id: "arithmetic",
        category: OperatorCategory::Arithmetic,
        enabled_by_default: true,
        description: "+ <-> -, * <-> /, % -> /, // -> /, ** -> *",
        matches: |n| {
            is_binary_op(n, &["+", "-", "*", "/", "%", "//", "**"])
                && !(n.text() == "+" && is_string_concatenation(n))
        },
        transform: |n| {
            swap(
                n.text(),
                &[("+", "-"), ("-", "+"), ("*", "/"), ("/", "*"), ("%", "/"), ("//", "/"), ("**", "*")],
            )
        },
    },
    MutationOperator {
        id: "unary_minus_removal",
        category: OperatorCategory::Arithmetic,
        enabled_by_default: true,
        description: "-x -> x",
        matches: |n| is_unary(n, &["-"]),
        transform: operand_text,
    },
    MutationOperator {
        id: "bitwise",
        category: OperatorCategory::Bitwise,
        enabled_by_default: true,
        description: "& <-> |, ^ -> &",
        matches: |n| is_binary_op(n, &["&", "|", "^"]),
        transform: |n| swap(n.text(), &[("&", "|"), ("|", "&"), ("^", "&")]),
    },
    MutationOperator {
        id: "shift",
        category: OperatorCategory::Bitwise,
        enabled_by_default: true,
        description: "<< <-> >>, >>> -> <<",
        matches: |n| is_binary_op(n, &["<<", ">>", ">>>"]),
        transform: |n| swap(n.text(), &[("<<", ">>"), (">>", "<<"), (">>>", "<<")]),
    },
    MutationOperator {
        id: "compound_assignment",
        category: OperatorCategory::Assignment,
        enabled_by_default: true,
        description: "+= <-> -=, *= <-> /=, %= -> /=",
        matches: |n| {
            n.category() == NodeCategory::AssignmentOperator
                && matches!(n.text(), "+=" | "-=" | "*=" | "/=" | "%=")
        },
        transform: |n| swap(n.text(), &[("+=", "-="), ("-=", "+="), ("*=", "/="), ("/=", "*="), ("%=", "/=")]),
    },
    MutationOperator {
        id: "bool_flip",
        category: OperatorCategory::Literal,
        enabled_by_default: true,
        description: "true <-> false outside return statements",
        matches: |n| {
            n.category() == NodeCategory::BooleanLiteral
                && !n
                    .parent()
                    .is_some_and(|p| p.category() == NodeCategory::ReturnStatement)
        },
        transform: |n| {
            swap(n.text(), &[("true", "false"), ("false", "true"), ("True", "False"), ("False", "True")])
        },
    },
    MutationOperator {
        id: "return_value",
        category: OperatorCategory::Statement,
        enabled_by_default: true,
        description: "return x -> return <neutral value>",
        matches: |n| neutral_return(n).is_some(),
        transform: |n| neutral_return(n).unwrap_or_else(|| n.text().to_string()),
    },
    MutationOperator {
        id: "block_removal",
        category: OperatorCategory::Statement,
        enabled_by_default: true,
        description: "if/else body -> empty body",
        matches: |n| n.category() == NodeCategory::ConditionalBlock && !is_empty_block(n),
        transform: |n| empty_body(n.language()).to_string(),
    },
    MutationOperator {
        id: "call_statement_removal",
        category: OperatorCategory::Statement,
        enabled_by_default: true,
        description: "f(x); -> empty statement",
        matches: |n| n.category() == NodeCategory::CallStatement,
        transform: |n| {
            if n.language().is_python() {
                "pass".to_string()
            } else {
                ";".to_string()
            }
        },
    },
    MutationOperator {
        id: "string_literal",
        category: OperatorCategory::Literal,
        enabled_by_default: false,
        description: "\"text\" -> \"\", \"\" -> \"mutator_xx\"",
        matches: |n| {
            n.category() == NodeCategory::StringLiteral
                && (n.text().starts_with('"') || n.text().starts_with('\''))
                && !matches!(n.parent_kind(), "import_statement" | "export_statement")
        },
        transform: |n| {
            if matches!(n.text(), "\"\"" | "''") {
                "\"mutator_xx\"".to_string()
            } else {
                "\"\"".to_string()
            }
        },
    },
];

pub fn catalog() -> &'static [MutationOperator] {
    &CATALOG
}

pub fn find(id: &str) -> Option<&'static MutationOperator> {
    CATALOG.iter().find(|op| op.id == id)
}

pub fn default_ids() -> Vec<&'static str> {
    CATALOG
        .iter()
        .filter(|op| op.enabled_by_default)
        .map(|op| op.id)
        .collect()
}

/// Resolve operator ids into catalog entries, in catalog order.
/// An empty selection means the default set.
pub fn select<S: AsRef<str>>(ids: &[S]) -> Result<Vec<&'static MutationOperator>, ConfigError> {
    if ids.is_empty() {
        return Ok(CATALOG.iter().filter(|op| op.enabled_by_default).collect());
    }
    for id in ids {
        if find(id.as_ref()).is_none() {
            return Err(ConfigError::UnknownOperator {
                id: id.as_ref().to_string(),
                available: CATALOG.iter().map(|op| op.id).collect::<Vec<_>>().join(", "),
            });
        }
    }
    Ok(CATALOG
        .iter()
        .filter(|op| ids.iter().any(|id| id.as_ref() == op.id))
        .collect())
}

fn is_binary_op(node: &SyntaxNode<'_>, ops: &[&str]) -> bool {
    node.category() == NodeCategory::BinaryOperator && ops.contains(&node.text())
}

fn is_unary(node: &SyntaxNode<'_>, ops: &[&str]) -> bool {
    node.category() == NodeCategory::UnaryExpression
        && node.child_count() >= 2
        && node.child(0).is_some_and(|op| ops.contains(&op.text()))
}

fn operand_text(node: &SyntaxNode<'_>) -> String {
    node.last_child()
        .map(|operand| operand.text().to_string())
        .unwrap_or_else(|| node.text().to_string())
}

fn swap(text: &str, table: &[(&str, &str)]) -> String {
    table
        .iter()
        .find(|(from, _)| *from == text)
        .map(|(_, to)| to.to_string())
        .unwrap_or_else(|| text.to_string())
}

fn is_string_like(kind: &str) -> bool {
    matches!(
        kind,
        "string" | "concatenated_string" | "template_string" | "string_literal"
    )
}

fn is_string_concatenation(op: &SyntaxNode<'_>) -> bool {
    op.prev_sibling().is_some_and(|s| is_string_like(s.kind()))
        || op.next_sibling().is_some_and(|s| is_string_like(s.kind()))
}

fn is_empty_block(node: &SyntaxNode<'_>) -> bool {
    let text = node.text().trim();
    if node.language().is_python() {
        return text == "pass";
    }
    let inner = text.trim_start_matches('{').trim_end_matches('}');
    inner.trim().is_empty()
}

fn empty_body(language: Language) -> &'static str {
    if language.is_python() { "pass" } else { "{}" }
}

/// The mutated `return` statement, or `None` when there is no useful,
/// non-equivalent replacement.
fn neutral_return(node: &SyntaxNode<'_>) -> Option<String> {
    if node.category() != NodeCategory::ReturnStatement {
        return None;
    }
    let expr = node.first_named_child()?.text().trim();
    let value = match node.language() {
        Language::Python => python_neutral(expr),
        Language::Rust => rust_neutral(expr)?,
        Language::JavaScript | Language::TypeScript | Language::Tsx => js_neutral(expr),
    };
    if value == expr {
        return None;
    }
    let semicolon = if node.text().trim_end().ends_with(';') { ";" } else { "" };
    Some(format!("return {value}{semicolon}"))
}

fn is_number(text: &str) -> bool {
    text.parse::<f64>().is_ok()
}

fn python_neutral(expr: &str) -> &'static str {
    if expr == "None" {
        "\"\""
    } else if expr == "True" {
        "False"
    } else if expr == "False" {
        "True"
    } else if expr == "\"\"" || expr == "''" {
        "None"
    } else if expr.starts_with('"') || expr.starts_with('\'') || expr.starts_with("f\"") || expr.starts_with("f'") {
        "\"\""
    } else if expr.starts_with('[') {
        if expr == "[]" { "None" } else { "[]" }
    } else if expr.starts_with('{') {
        if expr == "{}" { "None" } else { "{}" }
    } else if expr == "0" {
        "1"
    } else if is_number(expr) {
        "0"
    } else {
        "None"
    }
}

fn rust_neutral(expr: &str) -> Option<&'static str> {
    let value = if expr == "true" {
        "false"
    } else if expr == "false" {
        "true"
    } else if matches!(expr, "()" | "Ok(())" | "None") {
        return None;
    } else if expr == "0" {
        "1"
    } else if expr.starts_with('"') && expr.ends_with('"') {
        "\"\""
    } else if expr.starts_with('"') {
        "String::new()"
    } else if expr.starts_with("vec!") || expr.starts_with("Vec::") {
        "vec![]"
    } else if is_number(expr) {
        "0"
    } else {
        "Default::default()"
    };
    Some(value)
}

fn js_neutral(expr: &str) -> &'static str {
    if expr == "true" {
        "false"
    } else if expr == "false" {
        "true"
    } else if expr == "null" || expr == "undefined" {
        "\"\""
    } else if expr == "\"\"" || expr == "''" || expr == "``" {
        "null"
    } else if expr.starts_with('"') || expr.starts_with('\'') || expr.starts_with('`') {
        "\"\""
    } else if expr == "[]" || expr == "{}" {
        "null"
    } else if expr.starts_with('[') {
        "[]"
    } else if expr.starts_with('{') {
        "{}"
    } else if expr == "0" {
        "1"
    } else if is_number(expr) {
        "0"
    } else {
        "null"
    }
}
