use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{DevtoolsError, Result};

use super::dot::{extract_graph_description, parse_edges};
use super::layout::layout_graph;
use super::DependencyGraph;

/// Turns a DOT description into SVG
#[async_trait]
pub trait GraphRenderer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn render(&self, description: &str, graph: &DependencyGraph) -> Result<String>;
}

/// Renders through the Graphviz `dot` executable
#[derive(Debug, Clone)]
pub struct GraphvizRenderer {
    program: String,
    timeout: Duration,
}

impl GraphvizRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `Some` when `dot -V` runs successfully
    pub async fn detect() -> Option<Self> {
        let renderer = Self::new("dot");
        renderer.is_available().await.then_some(renderer)
    }

    pub async fn is_available(&self) -> bool {
        let probe = Command::new(&self.program)
            .arg("-V")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        matches!(timeout(self.timeout, probe).await, Ok(Ok(status)) if status.success())
    }
}

#[async_trait]
impl GraphRenderer for GraphvizRenderer {
    fn name(&self) -> &'static str {
        "graphviz"
    }

    async fn render(&self, description: &str, _graph: &DependencyGraph) -> Result<String> {
        let mut child = Command::new(&self.program)
            .arg("-Tsvg")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DevtoolsError::GraphRender(format!("Failed to start {}: {}", self.program, e))
            })?;

        // the child is killed and reaped if this future is dropped or fails
        let stdin = child.stdin.take();
        let run = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(description.as_bytes()).await?;
            }
            child.wait_with_output().await
        };

        let output = match timeout(self.timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(DevtoolsError::GraphRender(format!("{} failed: {}", self.program, e)))
            }
            Err(_) => {
                return Err(DevtoolsError::GraphRender(format!(
                    "{} timed out after {:?}",
                    self.program, self.timeout
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DevtoolsError::GraphRender(stderr.trim().to_string()));
        }

        let svg = String::from_utf8_lossy(&output.stdout).into_owned();
        if !svg.contains("<svg") {
            return Err(DevtoolsError::GraphRender(
                "Graphviz produced no SVG".to_string(),
            ));
        }
        Ok(svg)
    }
}

/// Built-in layered layout. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayeredRenderer;

#[async_trait]
impl GraphRenderer for LayeredRenderer {
    fn name(&self) -> &'static str {
        "layered"
    }

    async fn render(&self, _description: &str, graph: &DependencyGraph) -> Result<String> {
        Ok(layout_graph(graph).to_svg())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedGraph {
    pub description: String,
    pub graph: DependencyGraph,
    pub svg: String,
    pub renderer: &'static str,
}

/// Graphviz when present, layered layout otherwise or when Graphviz fails
pub struct RenderPipeline {
    primary: Option<Box<dyn GraphRenderer>>,
    fallback: Box<dyn GraphRenderer>,
}

impl RenderPipeline {
    pub fn new(
        primary: Option<Box<dyn GraphRenderer>>,
        fallback: Box<dyn GraphRenderer>,
    ) -> Self {
        Self { primary, fallback }
    }

    pub async fn detect() -> Self {
        let primary = GraphvizRenderer::detect()
            .await
            .map(|r| Box::new(r) as Box<dyn GraphRenderer>);
        if primary.is_none() {
            tracing::debug!("Graphviz not found, using layered layout");
        }
        Self::new(primary, Box::new(LayeredRenderer))
    }

    pub fn fallback_only() -> Self {
        Self::new(None, Box::new(LayeredRenderer))
    }

    pub fn renderer_name(&self) -> &'static str {
        self.primary
            .as_ref()
            .map(|r| r.name())
            .unwrap_or_else(|| self.fallback.name())
    }

    /// Extract the graph from raw command output, then render it
    pub async fn render_output(&self, raw: &str) -> Result<RenderedGraph> {
        let description = extract_graph_description(raw)?;
        self.render(&description).await
    }

    pub async fn render(&self, description: &str) -> Result<RenderedGraph> {
        let graph = parse_edges(description);

        if let Some(primary) = &self.primary {
            match primary.render(description, &graph).await {
                Ok(svg) => {
                    return Ok(RenderedGraph {
                        description: description.to_string(),
                        graph,
                        svg,
                        renderer: primary.name(),
                    })
                }
                Err(e) => {
                    tracing::warn!("{} rendering failed, falling back: {}", primary.name(), e)
                }
            }
        }

        let svg = self.fallback.render(description, &graph).await?;
        Ok(RenderedGraph {
            description: description.to_string(),
            graph,
            svg,
            renderer: self.fallback.name(),
        })
    }
}
