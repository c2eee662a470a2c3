use std::collections::HashSet;

use crate::error::ConfigError;
use crate::mutants::{Location, MutationPoint};
use crate::operators::MutationOperator;
use crate::source::SourceUnit;
use crate::syntax::{NodeCategory, SyntaxNode};

const CONTEXT_LINES: usize = 2;

/// Scan every unit in order. Units are never mutated; the result is a
/// deterministic function of the units and the operator list.
pub fn scan(
    units: &[SourceUnit],
    operators: &[&MutationOperator],
    function: Option<&str>,
) -> Vec<MutationPoint> {
    let mut points = Vec::new();
    for unit in units {
        let found = scan_unit(unit, operators, function);
        tracing::debug!("{}: {} mutation points", unit.path.display(), found.len());
        points.extend(found);
    }
    points
}

/// A function scope must name a function in at least one unit.
pub fn check_function(units: &[SourceUnit], name: &str) -> Result<(), ConfigError> {
    if units.iter().any(|u| u.find_function(name).is_some()) {
        return Ok(());
    }
    let available: Vec<String> = units.iter().flat_map(|u| u.list_functions()).collect();
    Err(ConfigError::FunctionNotFound {
        name: name.to_string(),
        available: available.join(", "),
    })
}

/// Scan one unit, optionally restricted to the body of the named function.
/// A scope that names no function in this unit yields nothing.
pub fn scan_unit(
    unit: &SourceUnit,
    operators: &[&MutationOperator],
    function: Option<&str>,
) -> Vec<MutationPoint> {
    let start = match function {
        Some(name) => match unit.find_function(name) {
            Some(node) => node,
            None => return Vec::new(),
        },
        None => unit.root(),
    };

    let lines = unit.lines();
    let mut points = Vec::new();
    let mut seen = HashSet::new();

    // Pre-order over every node below `start`, never leaving its subtree.
    let mut cursor = start.raw().walk();
    let mut depth = 0usize;
    loop {
        let node = SyntaxNode::new(cursor.node(), &unit.text, unit.language);
        let descend = node.category() != NodeCategory::Noise;
        if descend {
            for op in operators {
                if !op.matches(&node) {
                    continue;
                }
                let point = make_point(unit, &lines, op, &node);
                if seen.insert((op.id, point.location)) {
                    points.push(point);
                }
            }
        }

        if descend && cursor.goto_first_child() {
            depth += 1;
            continue;
        }
        loop {
            if depth == 0 {
                return points;
            }
            if cursor.goto_next_sibling() {
                break;
            }
            cursor.goto_parent();
            depth -= 1;
        }
    }
}

fn make_point(
    unit: &SourceUnit,
    lines: &[&str],
    op: &MutationOperator,
    node: &SyntaxNode<'_>,
) -> MutationPoint {
    let span = node.span();
    let (context_before, context_after) = get_context(lines, node.line() - 1, CONTEXT_LINES);
    MutationPoint {
        operator: op.id.to_string(),
        file: unit.path.clone(),
        location: Location {
            line: node.line(),
            column: node.column(),
            start_byte: span.start,
            end_byte: span.end,
        },
        original: node.text().to_string(),
        mutated: op.transform(node),
        context_before,
        context_after,
    }
}

fn get_context(lines: &[&str], line_idx: usize, range: usize) -> (Vec<String>, Vec<String>) {
    if line_idx >= lines.len() {
        return (vec![], vec![]);
    }
    let start = line_idx.saturating_sub(range);
    let end = (line_idx + range + 1).min(lines.len());
    let before: Vec<String> = lines[start..line_idx].iter().map(|s| s.to_string()).collect();
    let after: Vec<String> = if line_idx + 1 < end {
        lines[line_idx + 1..end].iter().map(|s| s.to_string()).collect()
    } else {
        vec![]
    };
    (before, after)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_clamps_at_file_edges() {
        let lines = vec!["a", "b", "c"];
        let (before, after) = get_context(&lines, 0, 2);
        assert!(before.is_empty());
        assert_eq!(after, vec!["b", "c"]);
        let (before, after) = get_context(&lines, 2, 2);
        assert_eq!(before, vec!["a", "b"]);
        assert!(after.is_empty());
    }

    #[test]
    fn context_out_of_range_is_empty() {
        let lines = vec!["a"];
        assert_eq!(get_context(&lines, 5, 2), (vec![], vec![]));
    }
}
