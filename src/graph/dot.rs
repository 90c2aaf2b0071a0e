//! DOT text handling for `turbo run <task> --graph` output.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{DevtoolsError, Result};

use super::DependencyGraph;

/// Shown when the tool output holds neither a graph block nor edges
pub const PLACEHOLDER_GRAPH: &str = r#"digraph {
  rankdir=LR;
  node [shape=box, style=rounded];

  "web" -> "@repo/ui";
  "web" -> "@repo/utils";
  "docs" -> "@repo/ui";
  "@repo/ui" -> "@repo/tsconfig";
  "@repo/utils" -> "@repo/tsconfig";
}"#;

static GRAPH_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:strict\s+)?digraph(?:\s+(?:"[^"]*"|\w+))?\s*\{"#)
        .expect("graph header regex")
});

static EDGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:"([^"]+)"|([\w.]+))\s*->\s*(?:"([^"]+)"|([\w.]+))"#).expect("edge regex")
});

static ROOT_SCOPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[root\]\s*").expect("root regex"));

static TASK_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"#[^#/\s]+$").expect("task regex"));

/// Pull a usable graph description out of raw command output.
///
/// A complete `digraph { ... }` block is returned verbatim. Otherwise lines
/// containing `->` are wrapped into a new digraph. Otherwise the placeholder
/// graph is returned. Empty or whitespace-only input is `EmptyInput`.
pub fn extract_graph_description(raw: &str) -> Result<String> {
    if raw.trim().is_empty() {
        return Err(DevtoolsError::EmptyInput);
    }

    if let Some(block) = find_graph_block(raw) {
        return Ok(block.to_string());
    }

    let edge_lines: Vec<&str> = raw.lines().filter(|line| line.contains("->")).collect();
    if !edge_lines.is_empty() {
        tracing::debug!("No digraph block found, synthesizing from {} lines", edge_lines.len());
        return Ok(synthesize_description(&edge_lines));
    }

    tracing::debug!("No graph data in output, using placeholder graph");
    Ok(PLACEHOLDER_GRAPH.to_string())
}

/// First `digraph` header whose braces close, as a slice of `raw`
fn find_graph_block(raw: &str) -> Option<&str> {
    for header in GRAPH_HEADER.find_iter(raw) {
        // header ends right after its opening brace
        if let Some(end) = matching_brace(raw, header.end() - 1) {
            return Some(&raw[header.start()..=end]);
        }
    }
    None
}

/// Byte offset of the `}` closing the `{` at `open`, skipping quoted strings
fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[open..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }

    None
}

fn synthesize_description(edge_lines: &[&str]) -> String {
    let mut dot = String::from("digraph {\n");
    dot.push_str("  rankdir=LR;\n");
    dot.push_str("  node [shape=box, style=rounded];\n");
    for line in edge_lines {
        let statement = line.trim().trim_end_matches(';');
        dot.push_str("  ");
        dot.push_str(statement);
        dot.push_str(";\n");
    }
    dot.push('}');
    dot
}

/// Collect `"A" -> "B"` edges, one per line, in line order.
///
/// Identifiers lose a leading `[root] ` scope and a trailing `#task` suffix.
/// Edges into the root sentinel are dropped, so a package whose only edge
/// points at the sentinel is not a node.
pub fn parse_edges(description: &str) -> DependencyGraph {
    let mut graph = DependencyGraph::new();

    for line in description.lines() {
        let Some(caps) = EDGE.captures(line) else {
            continue;
        };

        let from = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
        let to = caps.get(3).or_else(|| caps.get(4)).map(|m| m.as_str());
        let (Some(from), Some(to)) = (from, to) else {
            continue;
        };

        let from = strip_decorations(from);
        let to = strip_decorations(to);
        if !graph.add_edge(from, to) {
            tracing::trace!("Dropping sentinel edge: {}", line.trim());
        }
    }

    graph
}

/// `[root] @scope/pkg#build` -> `@scope/pkg`
pub fn strip_decorations(id: &str) -> String {
    let id = ROOT_SCOPE.replace(id.trim(), "");
    TASK_SUFFIX.replace(&id, "").into_owned()
}
