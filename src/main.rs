mod cli;
mod mcp;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries MCP traffic and command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turbo_devtools=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { format, watch } => {
            cli::scan(&cli.root, &format, watch)?;
        }
        Commands::Tasks => {
            cli::tasks(&cli.root)?;
        }
        Commands::Graph {
            input,
            output,
            format,
            fallback,
            timeout,
            graph_command,
        } => {
            cli::graph(
                &cli.root,
                input,
                output,
                &format,
                fallback,
                timeout,
                graph_command,
            )
            .await?;
        }
        Commands::Run { timeout, command } => {
            cli::run(&cli.root, &command, timeout).await?;
        }
        Commands::Serve => {
            cli::run_mcp_server(&cli.root).await?;
        }
    }

    Ok(())
}
