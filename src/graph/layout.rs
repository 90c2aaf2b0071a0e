//! Layered layout used when Graphviz is not available.
//!
//! Dependency-free nodes sit on the top level; every other node sits one
//! level below the deepest of its dependencies. Nodes that never qualify
//! (cycles, or anything depending on a cycle) share one trailing level.
//! The output depends only on the graph, so equal graphs give identical SVG.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use super::DependencyGraph;

pub const NODE_WIDTH: f64 = 200.0;
pub const NODE_HEIGHT: f64 = 40.0;
pub const LEVEL_HEIGHT: f64 = 80.0;
pub const NODE_SPACING: f64 = 20.0;
pub const MIN_WIDTH: f64 = 800.0;
const TOP_MARGIN: f64 = 50.0;
const EXTRA_HEIGHT: f64 = 100.0;

/// Labels longer than this are cut and end in `...`
pub const LABEL_BUDGET: usize = 25;
const LABEL_KEEP: usize = LABEL_BUDGET - 3;

const NODE_FILL: &str = "#4080ff";
const STROKE: &str = "#165dff";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedNode {
    pub id: String,
    pub label: String,
    pub level: usize,
    /// Top-left corner
    pub x: f64,
    pub y: f64,
}

impl PlacedNode {
    pub fn center(&self) -> (f64, f64) {
        (self.x + NODE_WIDTH / 2.0, self.y + NODE_HEIGHT / 2.0)
    }

    fn top(&self) -> (f64, f64) {
        (self.x + NODE_WIDTH / 2.0, self.y)
    }

    fn bottom(&self) -> (f64, f64) {
        (self.x + NODE_WIDTH / 2.0, self.y + NODE_HEIGHT)
    }

    fn left(&self) -> (f64, f64) {
        (self.x, self.y + NODE_HEIGHT / 2.0)
    }

    fn right(&self) -> (f64, f64) {
        (self.x + NODE_WIDTH, self.y + NODE_HEIGHT / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedEdge {
    pub from: String,
    pub to: String,
    pub start: (f64, f64),
    pub end: (f64, f64),
}

/// A fully placed graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagram {
    pub width: f64,
    pub height: f64,
    pub levels: Vec<Vec<String>>,
    pub nodes: Vec<PlacedNode>,
    pub edges: Vec<PlacedEdge>,
}

impl Diagram {
    pub fn node(&self, id: &str) -> Option<&PlacedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn to_svg(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Diagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        )?;
        writeln!(f, "  <defs>")?;
        writeln!(
            f,
            r#"    <marker id="arrowhead" markerWidth="10" markerHeight="7" refX="9" refY="3.5" orient="auto">"#
        )?;
        writeln!(f, r#"      <polygon points="0 0, 10 3.5, 0 7" fill="{}"/>"#, STROKE)?;
        writeln!(f, "    </marker>")?;
        writeln!(f, "  </defs>")?;

        writeln!(f, r#"  <g class="edges">"#)?;
        for edge in &self.edges {
            writeln!(
                f,
                r#"    <line class="edge" x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2" marker-end="url(#arrowhead)"/>"#,
                edge.start.0, edge.start.1, edge.end.0, edge.end.1, STROKE
            )?;
        }
        writeln!(f, "  </g>")?;

        writeln!(f, r#"  <g class="nodes">"#)?;
        for node in &self.nodes {
            let (cx, cy) = node.center();
            writeln!(f, r#"    <g class="node">"#)?;
            writeln!(f, "      <title>{}</title>", escape_xml(&node.id))?;
            writeln!(
                f,
                r#"      <rect x="{}" y="{}" width="{}" height="{}" rx="5" fill="{}" stroke="{}" stroke-width="2"/>"#,
                node.x, node.y, NODE_WIDTH, NODE_HEIGHT, NODE_FILL, STROKE
            )?;
            writeln!(
                f,
                r#"      <text x="{}" y="{}" text-anchor="middle" fill="white" font-family="Arial, sans-serif" font-size="12">{}</text>"#,
                cx,
                cy + 5.0,
                escape_xml(&node.label)
            )?;
            writeln!(f, "    </g>")?;
        }
        writeln!(f, "  </g>")?;

        write!(f, "</svg>")
    }
}

/// Group nodes into levels. Level 0 holds nodes without dependencies; a node
/// joins the next level once all of its dependencies are placed.
pub fn assign_levels(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in graph.edges() {
        outgoing
            .entry(edge.from.as_str())
            .or_default()
            .push(edge.to.as_str());
    }

    let mut leveled: HashSet<&str> = HashSet::new();
    let mut levels: Vec<Vec<String>> = Vec::new();

    loop {
        let next: Vec<&str> = graph
            .nodes()
            .iter()
            .map(String::as_str)
            .filter(|node| !leveled.contains(node))
            .filter(|node| {
                outgoing
                    .get(node)
                    .map_or(true, |targets| targets.iter().all(|t| leveled.contains(t)))
            })
            .collect();

        if next.is_empty() {
            break;
        }

        leveled.extend(next.iter().copied());
        levels.push(next.into_iter().map(String::from).collect());
    }

    let remaining: Vec<String> = graph
        .nodes()
        .iter()
        .filter(|node| !leveled.contains(node.as_str()))
        .cloned()
        .collect();

    if !remaining.is_empty() {
        tracing::debug!("{} nodes could not be leveled", remaining.len());
        levels.push(remaining);
    }

    levels
}

/// Place every node of `graph`.
pub fn layout_graph(graph: &DependencyGraph) -> Diagram {
    let levels = assign_levels(graph);

    let widest = levels.iter().map(Vec::len).max().unwrap_or(0);
    let width = MIN_WIDTH.max(widest as f64 * (NODE_WIDTH + NODE_SPACING));
    let height = levels.len() as f64 * LEVEL_HEIGHT + EXTRA_HEIGHT;

    let mut nodes = Vec::with_capacity(graph.node_count());
    for (level_index, level) in levels.iter().enumerate() {
        let y = TOP_MARGIN + level_index as f64 * LEVEL_HEIGHT;
        let count = level.len() as f64;
        let row_width = count * NODE_WIDTH + (count - 1.0) * NODE_SPACING;
        let start_x = (width - row_width) / 2.0;

        for (i, id) in level.iter().enumerate() {
            nodes.push(PlacedNode {
                id: id.clone(),
                label: truncate_label(id),
                level: level_index,
                x: start_x + i as f64 * (NODE_WIDTH + NODE_SPACING),
                y,
            });
        }
    }

    let positions: HashMap<&str, &PlacedNode> =
        nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    let edges = graph
        .edges()
        .iter()
        .filter_map(|edge| {
            let from = positions.get(edge.from.as_str())?;
            let to = positions.get(edge.to.as_str())?;
            let (start, end) = anchors(from, to);
            Some(PlacedEdge {
                from: edge.from.clone(),
                to: edge.to.clone(),
                start,
                end,
            })
        })
        .collect();

    Diagram {
        width,
        height,
        levels,
        nodes,
        edges,
    }
}

fn anchors(from: &PlacedNode, to: &PlacedNode) -> ((f64, f64), (f64, f64)) {
    if from.level > to.level {
        (from.top(), to.bottom())
    } else if from.level < to.level {
        (from.bottom(), to.top())
    } else if from.x <= to.x {
        (from.right(), to.left())
    } else {
        (from.left(), to.right())
    }
}

fn truncate_label(id: &str) -> String {
    if id.chars().count() > LABEL_BUDGET {
        let kept: String = id.chars().take(LABEL_KEEP).collect();
        format!("{}...", kept)
    } else {
        id.to_string()
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str)]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (from, to) in edges {
            graph.add_edge(*from, *to);
        }
        graph
    }

    #[test]
    fn test_levels_follow_dependencies() {
        let g = graph(&[("web", "ui"), ("web", "utils"), ("ui", "utils")]);
        let levels = assign_levels(&g);
        assert_eq!(levels, vec![vec!["utils"], vec!["ui"], vec!["web"]]);
    }

    #[test]
    fn test_cycle_goes_to_trailing_level() {
        let g = graph(&[("A", "B"), ("B", "A"), ("C", "A"), ("D", "E")]);
        let levels = assign_levels(&g);
        assert_eq!(levels, vec![vec!["E"], vec!["D"], vec!["A", "B", "C"]]);
    }

    #[test]
    fn test_geometry() {
        let g = graph(&[("web", "ui"), ("docs", "ui")]);
        let diagram = layout_graph(&g);

        assert_eq!(diagram.width, MIN_WIDTH);
        assert_eq!(diagram.height, 2.0 * LEVEL_HEIGHT + 100.0);

        let ui = diagram.node("ui").unwrap();
        assert_eq!(ui.level, 0);
        assert_eq!(ui.x, (MIN_WIDTH - NODE_WIDTH) / 2.0);
        assert_eq!(ui.y, 50.0);

        let web = diagram.node("web").unwrap();
        let docs = diagram.node("docs").unwrap();
        assert_eq!(web.y, 130.0);
        assert_eq!(docs.x - web.x, NODE_WIDTH + NODE_SPACING);
        // the row is centered
        assert_eq!(web.x, MIN_WIDTH - (docs.x + NODE_WIDTH));
    }

    #[test]
    fn test_wide_level_grows_canvas() {
        let edges: Vec<(String, String)> =
            (0..6).map(|i| (format!("app-{}", i), "core".to_string())).collect();
        let mut g = DependencyGraph::new();
        for (from, to) in &edges {
            g.add_edge(from.as_str(), to.as_str());
        }

        let diagram = layout_graph(&g);
        assert_eq!(diagram.width, 6.0 * (NODE_WIDTH + NODE_SPACING));
    }

    #[test]
    fn test_edge_anchors_point_upwards() {
        let g = graph(&[("web", "ui")]);
        let diagram = layout_graph(&g);
        let edge = &diagram.edges[0];
        let web = diagram.node("web").unwrap();
        let ui = diagram.node("ui").unwrap();

        assert_eq!(edge.start, (web.x + NODE_WIDTH / 2.0, web.y));
        assert_eq!(edge.end, (ui.x + NODE_WIDTH / 2.0, ui.y + NODE_HEIGHT));
    }

    #[test]
    fn test_label_truncation() {
        assert_eq!(truncate_label("short"), "short");
        assert_eq!(truncate_label(&"a".repeat(25)), "a".repeat(25));
        assert_eq!(
            truncate_label("@life-toolkit/components-repeat"),
            "@life-toolkit/componen..."
        );
    }

    #[test]
    fn test_svg_escapes_labels() {
        let g = graph(&[("a<b>", "c&d")]);
        let svg = layout_graph(&g).to_svg();
        assert!(svg.contains("<title>a&lt;b&gt;</title>"));
        assert!(svg.contains("<title>c&amp;d</title>"));
    }

    #[test]
    fn test_svg_is_deterministic() {
        let g = graph(&[("web", "ui"), ("web", "utils"), ("ui", "utils"), ("x", "x")]);
        assert_eq!(layout_graph(&g).to_svg(), layout_graph(&g.clone()).to_svg());
    }

    #[test]
    fn test_empty_graph() {
        let diagram = layout_graph(&DependencyGraph::new());
        assert!(diagram.nodes.is_empty());
        assert_eq!(diagram.height, 100.0);
        assert!(diagram.to_svg().ends_with("</svg>"));
    }
}
