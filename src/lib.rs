pub mod commands;
pub mod config;
pub mod error;
pub mod graph;
pub mod runner;
pub mod session;
pub mod workspace;

pub use commands::{CatalogEntry, CommandCatalog, PackageManagerAction, WELL_KNOWN_TASKS};
pub use config::DevtoolsConfig;
pub use error::{DevtoolsError, Result};
pub use graph::{
    extract_graph_description, layout_graph, parse_edges, DependencyEdge, DependencyGraph,
    Diagram, RenderPipeline, RenderedGraph,
};
pub use runner::CommandRunner;
pub use session::{
    FileRevealer, Notification, RefreshStatus, Request, Session, SessionId, SessionRegistry,
};
pub use workspace::{
    build_project_model, PackageManager, ProjectModel, ProjectScanner, WorkspaceCategory,
    WorkspaceEntry,
};
