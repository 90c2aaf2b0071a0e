use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevtoolsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No project found at {0}")]
    NotAProject(String),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Workspace resolution error: {0}")]
    WorkspaceResolution(String),

    #[error("{0}")]
    ExternalCommand(String),

    #[error("Command timed out after {} seconds", .0.as_secs_f64())]
    CommandTimeout(Duration),

    #[error("Graph command produced no output")]
    EmptyInput,

    #[error("Graph render error: {0}")]
    GraphRender(String),

    #[error("No project root is open")]
    NoProjectRoot,

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("Watcher error: {0}")]
    Watcher(String),
}

pub type Result<T> = std::result::Result<T, DevtoolsError>;
