use std::sync::Arc;

use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo, Tool, ToolsCapability,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use turbo_devtools::error::Result;
use turbo_devtools::graph::{RenderPipeline, RenderedGraph};
use turbo_devtools::{CommandCatalog, Session};

#[derive(Clone)]
pub struct McpServer {
    session: Arc<Session>,
    renderer: Arc<RenderPipeline>,
    fallback_renderer: Arc<RenderPipeline>,
}

impl McpServer {
    pub fn new(session: Arc<Session>, renderer: RenderPipeline) -> Self {
        Self {
            session,
            renderer: Arc::new(renderer),
            fallback_renderer: Arc::new(RenderPipeline::fallback_only()),
        }
    }

    fn pipeline(&self, fallback: bool) -> &RenderPipeline {
        if fallback {
            &self.fallback_renderer
        } else {
            &self.renderer
        }
    }

    fn scan_project_impl(&self) -> Result<String> {
        let model = self.session.refresh()?.unwrap_or_else(|| self.session.snapshot());

        let output = serde_json::json!({
            "root": self.session.root().map(|p| p.display().to_string()),
            "summary": model.summary(),
            "project": &*model,
        });
        Ok(serde_json::to_string_pretty(&output).unwrap_or_default())
    }

    fn list_tasks_impl(&self) -> String {
        let model = self.session.snapshot();
        let catalog = CommandCatalog::new(&model, self.session.config());

        let output = serde_json::json!({
            "tasks": model.task_names,
            "shortcuts": catalog.available_tasks(),
            "commands": catalog.entries(),
        });
        serde_json::to_string_pretty(&output).unwrap_or_default()
    }

    fn graph_json(rendered: &RenderedGraph, format: GraphFormat) -> String {
        let output = match format {
            GraphFormat::Dot => serde_json::json!({ "description": rendered.description }),
            GraphFormat::Svg => serde_json::json!({
                "renderer": rendered.renderer,
                "svg": rendered.svg,
            }),
            GraphFormat::All => serde_json::json!({
                "renderer": rendered.renderer,
                "description": rendered.description,
                "nodes": rendered.graph.nodes(),
                "edges": rendered.graph.edges(),
                "svg": rendered.svg,
            }),
        };
        serde_json::to_string_pretty(&output).unwrap_or_default()
    }
}

fn schema_for<T: JsonSchema>() -> Arc<serde_json::Map<String, serde_json::Value>> {
    let schema = schemars::schema_for!(T);
    let value = serde_json::to_value(&schema).unwrap_or_default();
    match value {
        serde_json::Value::Object(map) => Arc::new(map),
        _ => Arc::new(serde_json::Map::new()),
    }
}

fn parse_params<T: DeserializeOwned>(
    request: CallToolRequestParams,
) -> std::result::Result<T, McpError> {
    serde_json::from_value(serde_json::Value::Object(request.arguments.unwrap_or_default()))
        .map_err(|e| McpError::invalid_params(e.to_string(), None))
}

fn tool(
    name: &str,
    title: &str,
    description: &str,
    input_schema: Arc<serde_json::Map<String, serde_json::Value>>,
) -> Tool {
    Tool {
        name: name.to_string().into(),
        title: Some(title.to_string()),
        description: Some(description.to_string().into()),
        input_schema,
        output_schema: None,
        annotations: None,
        icons: None,
        meta: None,
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct EmptyParams {}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RunCommandParams {
    /// Shell command, run in the project root
    pub script: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RunCommandWithOutputParams {
    /// Shell command, run in the project root
    pub script: String,
    /// Correlation id echoed in the response
    #[serde(default)]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GraphFormat {
    Dot,
    Svg,
    #[default]
    All,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DependencyGraphParams {
    /// dot, svg or all
    #[serde(default)]
    pub format: GraphFormat,
    /// Skip Graphviz and use the built-in layout
    #[serde(default)]
    pub fallback: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RenderGraphParams {
    /// Raw output of `turbo run <task> --graph`
    pub raw: String,
    #[serde(default)]
    pub format: GraphFormat,
    #[serde(default)]
    pub fallback: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct OpenWorkspaceParams {
    /// Workspace path relative to the project root
    pub workspace_path: String,
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(true),
                }),
                ..Default::default()
            },
            server_info: Implementation {
                name: "turbo-devtools".to_string(),
                title: Some("Turborepo Devtools".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Inspects a Turborepo monorepo: workspaces, pipeline tasks, \
                 package manager commands and the package dependency graph."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, McpError> {
        let tools = vec![
            tool(
                "scan_project",
                "Scan Project",
                "Rescan workspaces, tasks and package manager",
                schema_for::<EmptyParams>(),
            ),
            tool(
                "list_tasks",
                "List Tasks",
                "Pipeline tasks and runnable commands",
                schema_for::<EmptyParams>(),
            ),
            tool(
                "run_command",
                "Run Command",
                "Start a command without waiting",
                schema_for::<RunCommandParams>(),
            ),
            tool(
                "run_command_with_output",
                "Run Command With Output",
                "Run a command and return its output",
                schema_for::<RunCommandWithOutputParams>(),
            ),
            tool(
                "dependency_graph",
                "Dependency Graph",
                "Run the graph command and render the package graph",
                schema_for::<DependencyGraphParams>(),
            ),
            tool(
                "render_graph",
                "Render Graph",
                "Render graph command output supplied as text",
                schema_for::<RenderGraphParams>(),
            ),
            tool(
                "open_workspace",
                "Open Workspace",
                "Reveal a workspace folder in the file browser",
                schema_for::<OpenWorkspaceParams>(),
            ),
        ];

        Ok(ListToolsResult {
            tools,
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let result = match request.name.as_ref() {
            "scan_project" => match self.scan_project_impl() {
                Ok(json) => CallToolResult::success(vec![Content::text(json)]),
                Err(e) => CallToolResult::error(vec![Content::text(e.to_string())]),
            },
            "list_tasks" => CallToolResult::success(vec![Content::text(self.list_tasks_impl())]),
            "run_command" => {
                let params: RunCommandParams = parse_params(request)?;

                match self.session.run_command(&params.script) {
                    Ok(()) => CallToolResult::success(vec![Content::text(format!(
                        "Started: {}",
                        params.script
                    ))]),
                    Err(e) => CallToolResult::error(vec![Content::text(e.to_string())]),
                }
            }
            "run_command_with_output" => {
                let params: RunCommandWithOutputParams = parse_params(request)?;
                let message_id = params
                    .message_id
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

                match self
                    .session
                    .run_command_with_output(&message_id, &params.script)
                    .await
                {
                    Some(turbo_devtools::Notification::CommandOutput {
                        output: Some(output),
                        ..
                    }) => CallToolResult::success(vec![Content::text(output)]),
                    Some(turbo_devtools::Notification::CommandOutput {
                        error: Some(error), ..
                    }) => CallToolResult::error(vec![Content::text(error)]),
                    _ => CallToolResult::error(vec![Content::text(format!(
                        "No output for message {}",
                        message_id
                    ))]),
                }
            }
            "dependency_graph" => {
                let params: DependencyGraphParams = parse_params(request)?;

                match self
                    .session
                    .dependency_graph(self.pipeline(params.fallback))
                    .await
                {
                    Ok(rendered) => CallToolResult::success(vec![Content::text(
                        Self::graph_json(&rendered, params.format),
                    )]),
                    Err(e) => CallToolResult::error(vec![Content::text(e.to_string())]),
                }
            }
            "render_graph" => {
                let params: RenderGraphParams = parse_params(request)?;

                match self.pipeline(params.fallback).render_output(&params.raw).await {
                    Ok(rendered) => CallToolResult::success(vec![Content::text(
                        Self::graph_json(&rendered, params.format),
                    )]),
                    Err(e) => CallToolResult::error(vec![Content::text(e.to_string())]),
                }
            }
            "open_workspace" => {
                let params: OpenWorkspaceParams = parse_params(request)?;

                match self.session.open_workspace(&params.workspace_path) {
                    Ok(path) => CallToolResult::success(vec![Content::text(format!(
                        "Opened {}",
                        path.display()
                    ))]),
                    Err(e) => CallToolResult::error(vec![Content::text(e.to_string())]),
                }
            }
            _ => {
                return Err(McpError::invalid_params(
                    format!("Unknown tool: {}", request.name),
                    None,
                ));
            }
        };

        Ok(result)
    }
}
