//! Project-level settings.
//!
//! Defaults match a stock Turborepo layout. A `.turbo-devtools.toml` at the
//! project root can override any of them; missing keys keep their default.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DevtoolsError, Result};

/// Name of the optional override file looked up at the project root.
pub const CONFIG_FILE_NAME: &str = ".turbo-devtools.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevtoolsConfig {
    /// Manifest file read at the root and in every workspace
    pub manifest_file: String,
    /// Pipeline config file read at the root
    pub pipeline_file: String,
    /// pnpm workspace file, consulted when the manifest declares no patterns
    pub pnpm_workspace_file: String,
    pub pnpm_lockfile: String,
    pub yarn_lockfile: String,
    /// Timeout for commands whose output is collected
    pub command_timeout_secs: u64,
    /// Largest accepted stdout/stderr size in bytes
    pub max_output_bytes: usize,
    /// Command expected to print a DOT graph on stdout
    pub graph_command: String,
    /// Executable used to build task commands
    pub task_runner: String,
}

impl Default for DevtoolsConfig {
    fn default() -> Self {
        Self {
            manifest_file: "package.json".to_string(),
            pipeline_file: "turbo.json".to_string(),
            pnpm_workspace_file: "pnpm-workspace.yaml".to_string(),
            pnpm_lockfile: "pnpm-lock.yaml".to_string(),
            yarn_lockfile: "yarn.lock".to_string(),
            command_timeout_secs: 30,
            max_output_bytes: 10 * 1024 * 1024,
            graph_command: "turbo run build --graph".to_string(),
            task_runner: "turbo".to_string(),
        }
    }
}

impl DevtoolsConfig {
    /// Load overrides from `root/.turbo-devtools.toml`, falling back to defaults
    /// when the file does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            DevtoolsError::ConfigParse(format!("Failed to parse {}: {}", CONFIG_FILE_NAME, e))
        })
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.command_timeout_secs = secs;
        self
    }

    pub fn with_graph_command(mut self, command: impl Into<String>) -> Self {
        self.graph_command = command.into();
        self
    }
}
