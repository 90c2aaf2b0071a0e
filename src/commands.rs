//! Shell command strings offered for a project.

use std::fmt;

use serde::Serialize;

use crate::config::DevtoolsConfig;
use crate::workspace::{PackageManager, ProjectModel, WorkspaceEntry};

/// Task shortcuts offered when the pipeline defines them, in display order
pub const WELL_KNOWN_TASKS: &[&str] = &["dev", "build", "test", "lint", "clean"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManagerAction {
    Install,
    Update,
    Outdated,
}

impl PackageManagerAction {
    pub const ALL: [PackageManagerAction; 3] = [Self::Install, Self::Update, Self::Outdated];

    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManagerAction::Install => "install",
            PackageManagerAction::Update => "update",
            PackageManagerAction::Outdated => "outdated",
        }
    }
}

impl fmt::Display for PackageManagerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labelled command ready to be sent to a runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub label: String,
    pub command: String,
}

pub struct CommandCatalog<'a> {
    model: &'a ProjectModel,
    config: &'a DevtoolsConfig,
}

impl<'a> CommandCatalog<'a> {
    pub fn new(model: &'a ProjectModel, config: &'a DevtoolsConfig) -> Self {
        Self { model, config }
    }

    pub fn package_manager(&self) -> PackageManager {
        self.model.package_manager
    }

    pub fn task_command(&self, task: &str) -> String {
        format!("{} run {}", self.config.task_runner, task)
    }

    pub fn dry_run_command(&self) -> String {
        format!("{} run build --dry", self.config.task_runner)
    }

    pub fn graph_command(&self) -> String {
        self.config.graph_command.clone()
    }

    pub fn prune_command(&self) -> String {
        format!("{} prune", self.config.task_runner)
    }

    /// Runs a workspace script from the project root
    pub fn script_command(&self, workspace: &WorkspaceEntry, script: &str) -> String {
        format!(
            "cd {} && {} run {}",
            workspace.relative_path, self.model.package_manager, script
        )
    }

    pub fn package_manager_command(&self, action: PackageManagerAction) -> String {
        format!("{} {}", self.model.package_manager, action)
    }

    /// Well-known tasks the pipeline actually defines
    pub fn available_tasks(&self) -> Vec<&'static str> {
        WELL_KNOWN_TASKS
            .iter()
            .copied()
            .filter(|task| self.model.has_task(task))
            .collect()
    }

    /// Every command the project offers, grouped the way a task panel shows them
    pub fn entries(&self) -> Vec<CatalogEntry> {
        let mut entries: Vec<CatalogEntry> = self
            .model
            .task_names
            .iter()
            .map(|task| CatalogEntry {
                label: format!("task:{}", task),
                command: self.task_command(task),
            })
            .collect();

        entries.push(CatalogEntry {
            label: "dry-run".to_string(),
            command: self.dry_run_command(),
        });
        entries.push(CatalogEntry {
            label: "graph".to_string(),
            command: self.graph_command(),
        });
        entries.push(CatalogEntry {
            label: "prune".to_string(),
            command: self.prune_command(),
        });

        for action in PackageManagerAction::ALL {
            entries.push(CatalogEntry {
                label: format!("pm:{}", action),
                command: self.package_manager_command(action),
            });
        }

        for workspace in &self.model.workspaces {
            for script in workspace.scripts.keys() {
                entries.push(CatalogEntry {
                    label: format!("{}:{}", workspace.name, script),
                    command: self.script_command(workspace, script),
                });
            }
        }

        entries
    }
}
