use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, MaterializationError};
use crate::mutants::{Mutant, MutantId, MutationPoint};
use crate::project::should_skip;

/// Deterministic working directory for a mutant.
pub fn mutant_dir(output_root: &Path, id: MutantId) -> PathBuf {
    output_root.join(format!("mutant-{id:05}"))
}

fn copy_dir_filtered(src: &Path, dst: &Path, skip_dir: &Path, at_root: bool) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if should_skip(&name.to_string_lossy(), at_root) {
            continue;
        }
        let src_path = entry.path();
        // Neither the run directory nor the output root holding it.
        if src_path == skip_dir || skip_dir.parent() == Some(src_path.as_path()) {
            continue;
        }
        let dst_path = dst.join(&name);
        let ft = entry.file_type()?;
        if ft.is_dir() {
            copy_dir_filtered(&src_path, &dst_path, skip_dir, false)?;
        } else if ft.is_file() {
            fs::copy(&src_path, &dst_path)?;
        }
        // Symlinks and special files are not copied
    }
    Ok(())
}

/// Replace any stale `workdir` with a filtered copy of the project.
fn fresh_copy(project_root: &Path, workdir: &Path, output_root: &Path) -> Result<(), MaterializationError> {
    let copy_err = |source| MaterializationError::Copy {
        dest: workdir.to_path_buf(),
        source,
    };
    if workdir.exists() {
        fs::remove_dir_all(workdir).map_err(copy_err)?;
    }
    copy_dir_filtered(project_root, workdir, output_root, true).map_err(copy_err)
}

/// Splice the point's replacement over its byte span.
pub fn apply_mutation(source: &str, point: &MutationPoint) -> Result<String, MaterializationError> {
    let (start, end) = (point.location.start_byte, point.location.end_byte);
    if start > end || end > source.len() || !source.is_char_boundary(start) || !source.is_char_boundary(end) {
        return Err(MaterializationError::SpanOutOfBounds {
            path: point.file.clone(),
            start,
            end,
            len: source.len(),
        });
    }
    let mut result = String::with_capacity(source.len() + point.mutated.len());
    result.push_str(&source[..start]);
    result.push_str(&point.mutated);
    result.push_str(&source[end..]);
    Ok(result)
}

pub fn generate_diff(original: &str, mutated: &str) -> String {
    use similar::TextDiff;
    let diff = TextDiff::from_lines(original, mutated);
    let mut output = String::new();
    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => {
                output.push_str(&format!("- {}", change));
            }
            similar::ChangeTag::Insert => {
                output.push_str(&format!("+ {}", change));
            }
            _ => {}
        }
    }
    output
}

/// Copy the project into `output_root/mutant-{id}` and write the mutated unit.
/// `unit_text` is the unit's original contents; the project itself is never written.
pub fn materialize(
    project_root: &Path,
    unit_text: &str,
    point: &MutationPoint,
    output_root: &Path,
    id: MutantId,
) -> Result<Mutant, MaterializationError> {
    let mutated = apply_mutation(unit_text, point)?;
    let workdir = mutant_dir(output_root, id);
    fresh_copy(project_root, &workdir, output_root)?;

    let target = workdir.join(&point.file);
    fs::write(&target, mutated).map_err(|source| MaterializationError::Write {
        path: target.clone(),
        source,
    })?;
    tracing::debug!("materialized m{} in {}", id, workdir.display());

    Ok(Mutant {
        id,
        point: point.clone(),
        workdir,
    })
}

/// Unmutated copy of the project used for the baseline run.
pub fn prepare_baseline(project_root: &Path, output_root: &Path) -> Result<PathBuf, MaterializationError> {
    let workdir = output_root.join("baseline");
    fresh_copy(project_root, &workdir, output_root)?;
    Ok(workdir)
}

/// Remove a mutant's working directory. Failures are logged, not returned.
pub fn discard(mutant: &Mutant) {
    if let Err(e) = fs::remove_dir_all(&mutant.workdir) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("failed to remove {}: {}", mutant.workdir.display(), e);
        }
    }
}

/// Canonical form of `path`, resolving symlinks even when the path does not
/// exist yet. Paths compared against a canonical project root go through this.
pub fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(p) = path.canonicalize() {
        return p;
    }
    // Not created yet: resolve the nearest existing ancestor.
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => resolve_path(parent).join(name),
        _ => std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf()),
    }
}

/// The output root may live inside the project (it is skipped when copying)
/// but must never be the project root or one of its ancestors.
pub fn validate_isolation(project_root: &Path, output_root: &Path) -> Result<(), ConfigError> {
    let project = resolve_path(project_root);
    let output = resolve_path(output_root);
    if project.starts_with(&output) {
        return Err(ConfigError::OutputAliasesProject { output, project });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutants::Location;
    use tempfile::TempDir;

    fn point(file: &str, start: usize, end: usize, mutated: &str) -> MutationPoint {
        MutationPoint {
            operator: "relational_boundary".into(),
            file: PathBuf::from(file),
            location: Location {
                line: 1,
                column: 0,
                start_byte: start,
                end_byte: end,
            },
            original: String::new(),
            mutated: mutated.into(),
            context_before: vec![],
            context_after: vec![],
        }
    }

    #[test]
    fn apply_mutation_splices_span() {
        let src = "x = a < b\n";
        let p = point("app.py", 4, 9, "a <= b");
        assert_eq!(apply_mutation(src, &p).unwrap(), "x = a <= b\n");
    }

    #[test]
    fn apply_mutation_rejects_span_past_end() {
        let p = point("app.py", 4, 40, "x");
        let err = apply_mutation("short", &p).unwrap_err();
        assert!(matches!(err, MaterializationError::SpanOutOfBounds { len: 5, .. }));
    }

    #[test]
    fn materialize_skips_git_and_caches() {
        let src_dir = TempDir::new().unwrap();
        let src = src_dir.path();
        fs::write(src.join("app.py"), "x = a < b\n").unwrap();
        fs::create_dir(src.join(".git")).unwrap();
        fs::write(src.join(".git").join("HEAD"), "ref").unwrap();
        fs::create_dir(src.join("__pycache__")).unwrap();
        fs::write(src.join("__pycache__").join("app.cpython-311.pyc"), "bytes").unwrap();

        let out_dir = TempDir::new().unwrap();
        let p = point("app.py", 4, 9, "a <= b");
        let mutant = materialize(src, "x = a < b\n", &p, out_dir.path(), 3).unwrap();

        assert_eq!(mutant.workdir, out_dir.path().join("mutant-00003"));
        assert!(!mutant.workdir.join(".git").exists());
        assert!(!mutant.workdir.join("__pycache__").exists());
        assert_eq!(fs::read_to_string(mutant.workdir.join("app.py")).unwrap(), "x = a <= b\n");
        assert_eq!(fs::read_to_string(src.join("app.py")).unwrap(), "x = a < b\n");
    }

    #[test]
    fn materialize_skips_nested_output_root() {
        let src_dir = TempDir::new().unwrap();
        let src = src_dir.path();
        fs::write(src.join("app.py"), "x = a < b\n").unwrap();
        let out = src.join("mutants-out");
        fs::create_dir(&out).unwrap();

        let p = point("app.py", 4, 9, "a <= b");
        let mutant = materialize(src, "x = a < b\n", &p, &out, 0).unwrap();
        assert!(!mutant.workdir.join("mutants-out").exists());
    }

    #[test]
    fn materialize_replaces_stale_directory() {
        let src_dir = TempDir::new().unwrap();
        fs::write(src_dir.path().join("app.py"), "x = a < b\n").unwrap();
        let out_dir = TempDir::new().unwrap();
        let stale = mutant_dir(out_dir.path(), 1);
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("leftover.txt"), "old").unwrap();

        let p = point("app.py", 4, 9, "a <= b");
        let mutant = materialize(src_dir.path(), "x = a < b\n", &p, out_dir.path(), 1).unwrap();
        assert!(!mutant.workdir.join("leftover.txt").exists());
    }

    #[test]
    fn discard_removes_workdir() {
        let src_dir = TempDir::new().unwrap();
        fs::write(src_dir.path().join("app.py"), "x = a < b\n").unwrap();
        let out_dir = TempDir::new().unwrap();
        let p = point("app.py", 4, 9, "a <= b");
        let mutant = materialize(src_dir.path(), "x = a < b\n", &p, out_dir.path(), 0).unwrap();
        discard(&mutant);
        assert!(!mutant.workdir.exists());
        discard(&mutant);
    }

    #[test]
    fn baseline_copy_is_unmodified() {
        let src_dir = TempDir::new().unwrap();
        fs::write(src_dir.path().join("app.py"), "x = a < b\n").unwrap();
        let out_dir = TempDir::new().unwrap();
        let dir = prepare_baseline(src_dir.path(), out_dir.path()).unwrap();
        assert_eq!(fs::read_to_string(dir.join("app.py")).unwrap(), "x = a < b\n");
    }

    #[test]
    fn isolation_rejects_project_root_and_ancestors() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("proj");
        fs::create_dir(&project).unwrap();

        assert!(validate_isolation(&project, &project).is_err());
        assert!(validate_isolation(&project, dir.path()).is_err());
        assert!(validate_isolation(&project, &project.join(".darwinian")).is_ok());
        assert!(validate_isolation(&project, &dir.path().join("elsewhere")).is_ok());
    }

    #[test]
    fn diff_shows_changed_line_only() {
        let diff = generate_diff("a\nb < c\nd\n", "a\nb <= c\nd\n");
        assert_eq!(diff, "- b < c\n+ b <= c\n");
    }
}
