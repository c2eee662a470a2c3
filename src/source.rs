use std::path::{Path, PathBuf};

use tree_sitter::Tree;

use crate::error::ScanError;
use crate::syntax::{self, SyntaxNode};
use crate::{Language, detect_language};

/// One source file plus its parsed tree. Read-only once loaded.
pub struct SourceUnit {
    /// Path relative to the project root.
    pub path: PathBuf,
    pub language: Language,
    pub text: String,
    tree: Tree,
}

impl std::fmt::Debug for SourceUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceUnit")
            .field("path", &self.path)
            .field("language", &self.language)
            .field("bytes", &self.text.len())
            .finish()
    }
}

impl SourceUnit {
    pub fn load(project_root: &Path, relative: &Path) -> Result<Self, ScanError> {
        let abs = project_root.join(relative);
        let text = std::fs::read_to_string(&abs).map_err(|source| ScanError::Unreadable {
            path: relative.to_path_buf(),
            source,
        })?;
        Self::from_source(relative, text)
    }

    pub fn from_source(path: &Path, text: String) -> Result<Self, ScanError> {
        let language = detect_language(path).ok_or_else(|| ScanError::UnsupportedLanguage {
            path: path.to_path_buf(),
        })?;
        let tree = syntax::parse(language, &text).ok_or_else(|| ScanError::Parse {
            path: path.to_path_buf(),
        })?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(ScanError::Malformed {
                path: path.to_path_buf(),
                line: first_error_line(root),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            language,
            text,
            tree,
        })
    }

    pub fn root(&self) -> SyntaxNode<'_> {
        SyntaxNode::new(self.tree.root_node(), &self.text, self.language)
    }

    pub fn lines(&self) -> Vec<&str> {
        self.text.lines().collect()
    }

    /// Names of every function defined in the unit, in source order.
    pub fn list_functions(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = self.tree.walk();
        loop {
            let node = SyntaxNode::new(cursor.node(), &self.text, self.language);
            if let Some(name) = node.function_name() {
                names.push(name.to_string());
            }
            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return names;
                }
            }
        }
    }

    /// The first function definition with the given name.
    pub fn find_function(&self, name: &str) -> Option<SyntaxNode<'_>> {
        let mut stack = vec![self.tree.root_node()];
        while let Some(node) = stack.pop() {
            let view = SyntaxNode::new(node, &self.text, self.language);
            if view.function_name() == Some(name) {
                return Some(view);
            }
            for i in (0..node.child_count()).rev() {
                if let Some(child) = node.child(i) {
                    stack.push(child);
                }
            }
        }
        None
    }
}

fn first_error_line(root: tree_sitter::Node<'_>) -> usize {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return node.start_position().row + 1;
        }
        for i in (0..node.child_count()).rev() {
            if let Some(child) = node.child(i) {
                if child.has_error() || child.is_missing() {
                    stack.push(child);
                }
            }
        }
    }
    root.start_position().row + 1
}

/// Load every path, keeping the units that parse and the errors of those that don't.
pub fn load_units(project_root: &Path, paths: &[PathBuf]) -> (Vec<SourceUnit>, Vec<ScanError>) {
    let mut units = Vec::with_capacity(paths.len());
    let mut errors = Vec::new();
    for path in paths {
        match SourceUnit::load(project_root, path) {
            Ok(unit) => units.push(unit),
            Err(e) => {
                tracing::warn!("skipping {}: {}", path.display(), e);
                errors.push(e);
            }
        }
    }
    (units, errors)
}
