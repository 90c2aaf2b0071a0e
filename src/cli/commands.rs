use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use turbo_devtools::error::Result;
use turbo_devtools::graph::RenderPipeline;
use turbo_devtools::workspace::{ManifestWatcher, WorkspaceCategory};
use turbo_devtools::{CommandCatalog, CommandRunner, DevtoolsConfig, ProjectModel, ProjectScanner};

#[derive(Parser)]
#[command(name = "turbo-devtools")]
#[command(about = "Inspect Turborepo monorepos: workspaces, tasks and dependency graphs")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Show workspaces and tasks of the current project
    turbo-devtools scan

    # Machine-readable snapshot, re-printed on every manifest change
    turbo-devtools scan --format json --watch

    # Commands available for the project
    turbo-devtools tasks

    # Render the package graph to a file
    turbo-devtools graph --output graph.svg

    # Render saved `turbo run build --graph` output without Graphviz
    turbo-devtools graph --input graph.txt --fallback

    # Run a command in the project root
    turbo-devtools run --timeout 60 turbo run lint

    # Start MCP server
    turbo-devtools serve
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project root
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan workspaces, pipeline tasks and package manager
    Scan {
        /// Output format: text or json
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Re-scan when manifests or lockfiles change
        #[arg(long)]
        watch: bool,
    },

    /// List pipeline tasks and runnable commands
    Tasks,

    /// Render the package dependency graph
    Graph {
        /// Read graph command output from a file instead of running it
        #[arg(long)]
        input: Option<PathBuf>,

        /// Write the result to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: svg or dot
        #[arg(long, default_value = "svg", value_parser = ["svg", "dot"])]
        format: String,

        /// Use the built-in layered layout even if Graphviz is installed
        #[arg(long)]
        fallback: bool,

        /// Graph command timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Command printing the DOT graph
        #[arg(long)]
        graph_command: Option<String>,
    },

    /// Run a command in the project root and print its output
    Run {
        /// Timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Command and arguments, or one quoted shell line
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Start MCP server
    Serve,
}

fn load_config(
    root: &Path,
    timeout: Option<u64>,
    graph_command: Option<String>,
) -> Result<DevtoolsConfig> {
    let mut config = DevtoolsConfig::load(root)?;
    if let Some(secs) = timeout {
        config = config.with_timeout_secs(secs);
    }
    if let Some(command) = graph_command {
        config = config.with_graph_command(command);
    }
    Ok(config)
}

pub fn scan(root: &Path, format: &str, watch: bool) -> Result<()> {
    let config = load_config(root, None, None)?;
    let scanner = ProjectScanner::new(config.clone());

    let model = scanner.build_project_model(root);
    print_model(&model, format);

    if watch {
        eprintln!("Watching for changes...");
        let watcher = ManifestWatcher::new(root, &config)?;

        while let Some(changed) = watcher.recv() {
            for path in &changed {
                tracing::debug!("Changed: {}", path.display());
            }
            let model = scanner.build_project_model(root);
            print_model(&model, format);
        }
    }

    Ok(())
}

fn print_model(model: &ProjectModel, format: &str) {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(model).unwrap_or_default());
        return;
    }

    if model.is_empty() {
        println!("No Turborepo project found");
        return;
    }

    let summary = model.summary();
    println!("Package manager: {}", model.package_manager);
    println!(
        "Workspaces: {} apps, {} libraries, {} other",
        summary.apps, summary.libraries, summary.others
    );

    if model.task_names.is_empty() {
        println!("Tasks: none");
    } else {
        println!("Tasks: {}", model.task_names.join(", "));
    }

    for (title, category) in [
        ("Apps", WorkspaceCategory::App),
        ("Libraries", WorkspaceCategory::Library),
        ("Other", WorkspaceCategory::Other),
    ] {
        let workspaces: Vec<_> = model.workspaces_in(category).collect();
        if workspaces.is_empty() {
            continue;
        }

        println!("\n{}:", title);
        for workspace in workspaces {
            let scripts: Vec<&str> = workspace.scripts.keys().map(String::as_str).collect();
            println!("  {} ({})", workspace.name, workspace.relative_path);
            if !scripts.is_empty() {
                println!("    scripts: {}", scripts.join(", "));
            }
        }
    }
}

pub fn tasks(root: &Path) -> Result<()> {
    let config = load_config(root, None, None)?;
    let model = ProjectScanner::new(config.clone()).build_project_model(root);
    let catalog = CommandCatalog::new(&model, &config);

    let shortcuts = catalog.available_tasks();
    if !shortcuts.is_empty() {
        println!("Shortcuts: {}", shortcuts.join(", "));
        println!();
    }

    let entries = catalog.entries();
    let width = entries.iter().map(|e| e.label.len()).max().unwrap_or(0);
    for entry in entries {
        println!("{:width$}  {}", entry.label, entry.command, width = width);
    }

    Ok(())
}

pub async fn graph(
    root: &Path,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    format: &str,
    fallback: bool,
    timeout: Option<u64>,
    graph_command: Option<String>,
) -> Result<()> {
    let config = load_config(root, timeout, graph_command)?;

    let raw = match input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            CommandRunner::from_config(&config)
                .run_with_output(&config.graph_command, root)
                .await?
        }
    };

    let pipeline = if fallback {
        RenderPipeline::fallback_only()
    } else {
        RenderPipeline::detect().await
    };
    let rendered = pipeline.render_output(&raw).await?;

    let text = if format == "dot" {
        &rendered.description
    } else {
        &rendered.svg
    };

    match output {
        Some(path) => {
            fs::write(&path, text)?;
            println!(
                "Wrote {} ({} packages, {} edges, {} renderer)",
                path.display(),
                rendered.graph.node_count(),
                rendered.graph.edge_count(),
                rendered.renderer
            );
        }
        None => println!("{}", text),
    }

    Ok(())
}

pub async fn run(root: &Path, command: &[String], timeout: Option<u64>) -> Result<()> {
    let config = load_config(root, timeout, None)?;
    let output = CommandRunner::from_config(&config)
        .run_with_output(&shell_line(command)?, root)
        .await?;
    print!("{}", output);
    Ok(())
}

/// A single argument is taken as a complete shell line (`run "turbo run lint | tail"`);
/// several arguments are quoted so each reaches the program unchanged.
fn shell_line(command: &[String]) -> Result<String> {
    if let [line] = command {
        return Ok(line.clone());
    }

    shlex::try_join(command.iter().map(String::as_str)).map_err(|e| {
        turbo_devtools::DevtoolsError::ExternalCommand(format!("Cannot quote command: {}", e))
    })
}

pub async fn run_mcp_server(root: &Path) -> Result<()> {
    use crate::mcp::McpServer;
    use rmcp::ServiceExt;
    use turbo_devtools::SessionRegistry;

    let registry = SessionRegistry::new();
    let session = registry.open(Some(root.to_path_buf()))?;
    if let Err(e) = session.refresh() {
        tracing::warn!("Initial scan failed: {}", e);
    }

    let session_id = session.id();
    let server = McpServer::new(session, RenderPipeline::detect().await);

    let transport = (tokio::io::stdin(), tokio::io::stdout());
    let service = server
        .serve(transport)
        .await
        .map_err(|e| turbo_devtools::DevtoolsError::Mcp(e.to_string()))?;

    let finished = service
        .waiting()
        .await
        .map_err(|e| turbo_devtools::DevtoolsError::Mcp(e.to_string()));

    registry.close(session_id);
    tracing::debug!("Closed session {}", session_id);
    finished?;

    Ok(())
}
