//! Dependency graph derived from build tool output.
//!
//! - [`dot`] extracts a graph description from raw command output and parses its edges
//! - [`layout`] places nodes in levels and renders a self-contained SVG
//! - [`render`] picks Graphviz when it is installed, the layered layout otherwise

pub mod dot;
pub mod layout;
pub mod render;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub use dot::{extract_graph_description, parse_edges, PLACEHOLDER_GRAPH};
pub use layout::{layout_graph, Diagram};
pub use render::{GraphRenderer, GraphvizRenderer, LayeredRenderer, RenderPipeline, RenderedGraph};

/// Synthetic node meaning "depends on nothing"; never part of a graph
pub const ROOT_SENTINEL: &str = "___ROOT___";

/// `from` depends on `to`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
}

impl DependencyEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Nodes in order of first appearance plus edges in input order.
/// Every edge endpoint is a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    edges: Vec<DependencyEdge>,
    #[serde(skip)]
    index: HashSet<String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains_node(&self, node: &str) -> bool {
        self.index.contains(node)
    }

    /// Add a standalone node. The sentinel is rejected.
    pub fn add_node(&mut self, node: impl Into<String>) -> bool {
        let node = node.into();
        if node == ROOT_SENTINEL || self.index.contains(&node) {
            return false;
        }
        self.index.insert(node.clone());
        self.nodes.push(node);
        true
    }

    /// Add an edge and its endpoints. Edges touching the sentinel are dropped.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> bool {
        let (from, to) = (from.into(), to.into());
        if from == ROOT_SENTINEL || to == ROOT_SENTINEL {
            return false;
        }
        self.add_node(from.clone());
        self.add_node(to.clone());
        self.edges.push(DependencyEdge { from, to });
        true
    }

    /// Nodes `node` depends on
    pub fn dependencies_of<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.from == node)
            .map(|e| e.to.as_str())
    }

    /// Nodes depending on `node`
    pub fn dependents_of<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.to == node)
            .map(|e| e.from.as_str())
    }
}
