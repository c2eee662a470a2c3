use std::ops::Range;

use tree_sitter::{Node, Parser, Tree};

use crate::Language;

/// Language-independent tag the operators dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCategory {
    /// Operator token of a binary, comparison or boolean expression.
    BinaryOperator,
    /// A whole prefix expression such as `!x`, `-x` or `not x`.
    UnaryExpression,
    /// Operator token of a compound assignment (`+=`, `-=`, ...).
    AssignmentOperator,
    BooleanLiteral,
    StringLiteral,
    ReturnStatement,
    /// The body of an `if` / `else` branch.
    ConditionalBlock,
    /// A statement consisting of a single call, kept only for its side effect.
    CallStatement,
    /// Logging, printing, docstrings and test-only code. Never descended into.
    Noise,
    Other,
}

pub fn parse(language: Language, source: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    parser.set_language(&language.grammar()).ok()?;
    parser.parse(source, None)
}

/// A borrowed view of one syntax-tree node: kind, span and text.
#[derive(Clone, Copy)]
pub struct SyntaxNode<'a> {
    node: Node<'a>,
    source: &'a str,
    language: Language,
}

impl std::fmt::Debug for SyntaxNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntaxNode")
            .field("kind", &self.kind())
            .field("span", &self.span())
            .field("text", &self.text())
            .finish()
    }
}

impl<'a> SyntaxNode<'a> {
    pub fn new(node: Node<'a>, source: &'a str, language: Language) -> Self {
        Self { node, source, language }
    }

    fn wrap(&self, node: Node<'a>) -> Self {
        Self::new(node, self.source, self.language)
    }

    pub fn raw(&self) -> Node<'a> {
        self.node
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn kind(&self) -> &'static str {
        self.node.kind()
    }

    pub fn is_named(&self) -> bool {
        self.node.is_named()
    }

    pub fn span(&self) -> Range<usize> {
        self.node.start_byte()..self.node.end_byte()
    }

    pub fn text(&self) -> &'a str {
        &self.source[self.node.start_byte()..self.node.end_byte()]
    }

    /// 1-based line.
    pub fn line(&self) -> usize {
        self.node.start_position().row + 1
    }

    /// 1-based column, in bytes.
    pub fn column(&self) -> usize {
        self.node.start_position().column + 1
    }

    pub fn parent(&self) -> Option<Self> {
        self.node.parent().map(|n| self.wrap(n))
    }

    pub fn parent_kind(&self) -> &'static str {
        self.node.parent().map(|p| p.kind()).unwrap_or("")
    }

    pub fn child_count(&self) -> usize {
        self.node.child_count()
    }

    pub fn child(&self, i: usize) -> Option<Self> {
        self.node.child(i).map(|n| self.wrap(n))
    }

    pub fn first_named_child(&self) -> Option<Self> {
        let count = self.node.child_count();
        for i in 0..count {
            if let Some(child) = self.node.child(i) {
                if child.is_named() && !is_comment(child.kind()) {
                    return Some(self.wrap(child));
                }
            }
        }
        None
    }

    pub fn last_child(&self) -> Option<Self> {
        let count = self.node.child_count();
        if count == 0 {
            return None;
        }
        self.child(count - 1)
    }

    pub fn prev_sibling(&self) -> Option<Self> {
        self.node.prev_sibling().map(|n| self.wrap(n))
    }

    pub fn next_sibling(&self) -> Option<Self> {
        self.node.next_sibling().map(|n| self.wrap(n))
    }

    pub fn field(&self, name: &str) -> Option<Self> {
        self.node.child_by_field_name(name).map(|n| self.wrap(n))
    }

    pub fn category(&self) -> NodeCategory {
        if self.is_noise() {
            return NodeCategory::Noise;
        }
        match self.language {
            Language::Python => self.python_category(),
            Language::Rust => self.rust_category(),
            Language::JavaScript | Language::TypeScript | Language::Tsx => self.js_category(),
        }
    }

    fn is_operator_token_of(&self, parents: &[&str]) -> bool {
        !self.is_named() && parents.contains(&self.parent_kind())
    }

    fn is_assignment_token_of(&self, parent: &str) -> bool {
        let text = self.text();
        !self.is_named() && self.parent_kind() == parent && text.len() >= 2 && text.ends_with('=')
    }

    fn is_single_call_statement(&self, call_kind: &str) -> bool {
        self.kind() == "expression_statement"
            && self
                .first_named_child()
                .is_some_and(|c| c.kind() == call_kind && !c.is_noise())
    }

    fn python_category(&self) -> NodeCategory {
        if self.is_operator_token_of(&["binary_operator", "comparison_operator", "boolean_operator"]) {
            return NodeCategory::BinaryOperator;
        }
        if self.is_assignment_token_of("augmented_assignment") {
            return NodeCategory::AssignmentOperator;
        }
        match self.kind() {
            "unary_operator" | "not_operator" => NodeCategory::UnaryExpression,
            "true" | "false" => NodeCategory::BooleanLiteral,
            "string" => NodeCategory::StringLiteral,
            "return_statement" => NodeCategory::ReturnStatement,
            "block" if matches!(self.parent_kind(), "if_statement" | "elif_clause" | "else_clause") => {
                NodeCategory::ConditionalBlock
            }
            _ if self.is_single_call_statement("call") => NodeCategory::CallStatement,
            _ => NodeCategory::Other,
        }
    }

    fn rust_category(&self) -> NodeCategory {
        if self.is_operator_token_of(&["binary_expression"]) {
            return NodeCategory::BinaryOperator;
        }
        if self.is_assignment_token_of("compound_assignment_expr") {
            return NodeCategory::AssignmentOperator;
        }
        match self.kind() {
            "unary_expression" => NodeCategory::UnaryExpression,
            "boolean_literal" => NodeCategory::BooleanLiteral,
            "string_literal" => NodeCategory::StringLiteral,
            "return_expression" => NodeCategory::ReturnStatement,
            "block" if matches!(self.parent_kind(), "if_expression" | "else_clause") => {
                NodeCategory::ConditionalBlock
            }
            _ if self.is_single_call_statement("call_expression") => NodeCategory::CallStatement,
            _ => NodeCategory::Other,
        }
    }

    fn js_category(&self) -> NodeCategory {
        if self.is_operator_token_of(&["binary_expression"]) {
            return NodeCategory::BinaryOperator;
        }
        if self.is_assignment_token_of("augmented_assignment_expression") {
            return NodeCategory::AssignmentOperator;
        }
        match self.kind() {
            "unary_expression" => NodeCategory::UnaryExpression,
            "true" | "false" => NodeCategory::BooleanLiteral,
            "string" => NodeCategory::StringLiteral,
            "return_statement" => NodeCategory::ReturnStatement,
            "statement_block" if matches!(self.parent_kind(), "if_statement" | "else_clause") => {
                NodeCategory::ConditionalBlock
            }
            _ if self.is_single_call_statement("call_expression") => NodeCategory::CallStatement,
            _ => NodeCategory::Other,
        }
    }

    /// Skip nodes that are not business logic: print calls, logging,
    /// docstrings and code that only exists for tests.
    fn is_noise(&self) -> bool {
        match (self.language, self.kind()) {
            (Language::Python, "call") => self
                .field("function")
                .is_some_and(|f| is_python_logging(f.text())),
            (Language::Rust, "macro_invocation") => self
                .field("macro")
                .is_some_and(|m| is_rust_logging_macro(m.text())),
            (Language::Rust, "attribute_item") => true,
            (Language::Rust, "function_item" | "mod_item") => self.has_test_attribute(),
            (Language::JavaScript | Language::TypeScript | Language::Tsx, "call_expression") => self
                .field("function")
                .is_some_and(|f| f.text().starts_with("console.")),
            (_, "expression_statement") => {
                self.node.named_child_count() == 1
                    && self.first_named_child().is_some_and(|c| c.kind() == "string")
            }
            _ => false,
        }
    }

    fn has_test_attribute(&self) -> bool {
        let mut sibling = self.node.prev_sibling();
        while let Some(s) = sibling {
            if s.kind() != "attribute_item" {
                break;
            }
            let text = &self.source[s.start_byte()..s.end_byte()];
            if text == "#[test]" || text == "#[cfg(test)]" {
                return true;
            }
            sibling = s.prev_sibling();
        }
        false
    }

    /// Name of the function this node defines, if it defines one.
    pub fn function_name(&self) -> Option<&'a str> {
        let named = match (self.language, self.kind()) {
            (Language::Python, "function_definition") => true,
            (Language::Rust, "function_item") => true,
            (
                Language::JavaScript | Language::TypeScript | Language::Tsx,
                "function_declaration" | "generator_function_declaration" | "method_definition",
            ) => true,
            (Language::JavaScript | Language::TypeScript | Language::Tsx, "variable_declarator") => {
                // const foo = () => {} or const foo = function() {}
                self.field("value").is_some_and(|v| {
                    matches!(v.kind(), "arrow_function" | "function_expression" | "function")
                })
            }
            _ => false,
        };
        if !named {
            return None;
        }
        self.field("name").map(|n| n.text())
    }
}

fn is_comment(kind: &str) -> bool {
    matches!(kind, "comment" | "line_comment" | "block_comment")
}

fn is_python_logging(function: &str) -> bool {
    function == "print"
        || function.starts_with("logging.")
        || function.starts_with("log.")
        || function.starts_with("logger.")
}

fn is_rust_logging_macro(name: &str) -> bool {
    let last = name.rsplit("::").next().unwrap_or(name);
    matches!(
        last,
        "println" | "eprintln" | "print" | "eprint" | "format" | "trace" | "debug" | "info" | "warn" | "error" | "log"
    )
}
