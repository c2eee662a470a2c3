use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::detect_language;

const SKIP_NAMES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    ".venv",
    "venv",
    "__pycache__",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    ".darwinian",
    ".darwinian-report.json",
];

/// Build output. Only skipped directly under the project root, so a source
/// package that happens to be called `build` is still mutated and copied.
const ROOT_SKIP_NAMES: &[&str] = &["target", "dist", "build", ".next", ".nuxt"];

const SKIP_SUFFIXES: &[&str] = &[".pyc", ".pyo"];

/// Entries never copied into a mutant and never scanned. `at_root` is true for
/// entries directly under the project root.
pub fn should_skip(name: &str, at_root: bool) -> bool {
    SKIP_NAMES.contains(&name)
        || (at_root && ROOT_SKIP_NAMES.contains(&name))
        || SKIP_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Find the project root by walking up from `start` looking for markers.
pub fn find_project_root(start: &Path) -> PathBuf {
    let markers = &[
        "pyproject.toml",
        "setup.py",
        "setup.cfg",
        "package.json",
        "Cargo.toml",
        "go.mod",
        ".git",
    ];
    let first = if start.is_dir() {
        start
    } else {
        start.parent().unwrap_or(start)
    };
    let mut dir = first;
    loop {
        for marker in markers {
            if dir.join(marker).exists() {
                return dir.to_path_buf();
            }
        }
        match dir.parent() {
            Some(parent) if parent != dir => dir = parent,
            _ => break,
        }
    }
    first.to_path_buf()
}

/// Include / exclude globs, matched against root-relative paths.
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl SourceFilter {
    pub fn accepts(&self, relative: &Path) -> bool {
        let path = relative.to_string_lossy().replace('\\', "/");
        if !self.include.is_empty() && !self.include.iter().any(|p| glob_match::glob_match(p, &path)) {
            return false;
        }
        !self.exclude.iter().any(|p| glob_match::glob_match(p, &path))
    }
}

/// Resolve targets (files or directories) into sorted, deduplicated source
/// paths relative to `root`. Files outside `root` are ignored.
pub fn discover_sources(
    root: &Path,
    targets: &[PathBuf],
    filter: &SourceFilter,
    skip_dir: Option<&Path>,
) -> std::io::Result<Vec<PathBuf>> {
    let defaults = [root.to_path_buf()];
    let targets = if targets.is_empty() { &defaults[..] } else { targets };

    let mut found = Vec::new();
    for target in targets {
        let target = if target.is_absolute() {
            target.clone()
        } else {
            std::env::current_dir()?.join(target)
        };
        if target.is_file() {
            if let Ok(rel) = target.strip_prefix(root) {
                if detect_language(rel).is_some() {
                    found.push(rel.to_path_buf());
                }
            }
            continue;
        }
        let walker = WalkDir::new(&target)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if skip_dir.is_some_and(|s| e.path() == s) {
                    return false;
                }
                let at_root = e.path().parent() == Some(root);
                e.depth() == 0 || !should_skip(&e.file_name().to_string_lossy(), at_root)
            });
        for entry in walker {
            let entry = entry.map_err(std::io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(root) else {
                continue;
            };
            if detect_language(rel).is_some() && filter.accepts(rel) {
                found.push(rel.to_path_buf());
            }
        }
    }
    found.sort();
    found.dedup();
    Ok(found)
}
