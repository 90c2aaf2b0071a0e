//! Monorepo workspace model.
//!
//! This module provides:
//! - Manifest and pipeline config reading
//! - Package manager detection
//! - Workspace pattern expansion into a [`ProjectModel`]
//! - Watching the files a scan depends on

pub mod detector;
pub mod manifest;
pub mod pipeline;
pub mod scanner;
pub mod watcher;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use detector::PackageManagerDetector;
pub use manifest::PackageManifest;
pub use pipeline::PipelineConfig;
pub use scanner::{build_project_model, ProjectScanner};
pub use watcher::ManifestWatcher;

/// One package discovered inside the monorepo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceEntry {
    /// Manifest name, or the directory name when the manifest has none
    pub name: String,
    /// POSIX-style path relative to the project root
    pub relative_path: String,
    /// Script name -> command
    pub scripts: BTreeMap<String, String>,
    pub category: WorkspaceCategory,
}

impl WorkspaceEntry {
    pub fn new(
        name: impl Into<String>,
        relative_path: impl Into<String>,
        scripts: BTreeMap<String, String>,
    ) -> Self {
        let relative_path = relative_path.into();
        let category = WorkspaceCategory::classify(&relative_path, &scripts);
        Self {
            name: name.into(),
            relative_path,
            scripts,
            category,
        }
    }
}

/// Coarse role of a workspace, used for grouping in the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceCategory {
    App,
    Library,
    Other,
}

impl WorkspaceCategory {
    /// First matching rule wins:
    /// path under `apps/` or `app/`, path under `packages/` or `libs/`,
    /// a `dev` or `start` script, otherwise `Other`.
    ///
    /// Path rules are plain substring checks, so `internal-apps/foo` counts as an app.
    pub fn classify(relative_path: &str, scripts: &BTreeMap<String, String>) -> Self {
        if relative_path.contains("apps/") || relative_path.contains("app/") {
            return WorkspaceCategory::App;
        }

        if relative_path.contains("packages/") || relative_path.contains("libs/") {
            return WorkspaceCategory::Library;
        }

        if scripts.contains_key("dev") || scripts.contains_key("start") {
            return WorkspaceCategory::App;
        }

        WorkspaceCategory::Other
    }
}

/// Package manager driving the monorepo
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    #[default]
    Npm,
    Pnpm,
    Yarn,
}

impl PackageManager {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the display surfaces know about a project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectModel {
    pub workspaces: Vec<WorkspaceEntry>,
    pub pipeline: Option<PipelineConfig>,
    pub package_manager: PackageManager,
    pub task_names: Vec<String>,
}

impl ProjectModel {
    /// The "no project detected" model.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(
        workspaces: Vec<WorkspaceEntry>,
        pipeline: Option<PipelineConfig>,
        package_manager: PackageManager,
    ) -> Self {
        let task_names = pipeline
            .as_ref()
            .map(|p| p.task_names())
            .unwrap_or_default();

        Self {
            workspaces,
            pipeline,
            package_manager,
            task_names,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.workspaces.is_empty() && self.pipeline.is_none()
    }

    /// Get a workspace by its relative path
    pub fn get_workspace(&self, relative_path: &str) -> Option<&WorkspaceEntry> {
        self.workspaces
            .iter()
            .find(|w| w.relative_path == relative_path)
    }

    /// Workspaces keyed by relative path. Two scans of the same tree compare
    /// equal through this view even if directory listing order differs.
    pub fn workspace_set(&self) -> BTreeMap<&str, &WorkspaceEntry> {
        self.workspaces
            .iter()
            .map(|w| (w.relative_path.as_str(), w))
            .collect()
    }

    pub fn workspaces_in(
        &self,
        category: WorkspaceCategory,
    ) -> impl Iterator<Item = &WorkspaceEntry> {
        self.workspaces.iter().filter(move |w| w.category == category)
    }

    pub fn has_task(&self, task: &str) -> bool {
        self.task_names.iter().any(|t| t == task)
    }

    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            apps: self.workspaces_in(WorkspaceCategory::App).count(),
            libraries: self.workspaces_in(WorkspaceCategory::Library).count(),
            others: self.workspaces_in(WorkspaceCategory::Other).count(),
            tasks: self.task_names.len(),
        }
    }
}

/// Counts shown in the project overview
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub apps: usize,
    pub libraries: usize,
    pub others: usize,
    pub tasks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripts(names: &[&str]) -> BTreeMap<String, String> {
        names
            .iter()
            .map(|n| (n.to_string(), format!("run-{}", n)))
            .collect()
    }

    #[test]
    fn test_classify_apps_path_ignores_scripts() {
        assert_eq!(
            WorkspaceCategory::classify("apps/web", &scripts(&[])),
            WorkspaceCategory::App
        );
        assert_eq!(
            WorkspaceCategory::classify("apps/web", &scripts(&["build"])),
            WorkspaceCategory::App
        );
    }

    #[test]
    fn test_classify_library_paths() {
        assert_eq!(
            WorkspaceCategory::classify("libs/ui", &scripts(&["dev"])),
            WorkspaceCategory::Library
        );
        assert_eq!(
            WorkspaceCategory::classify("packages/core", &scripts(&[])),
            WorkspaceCategory::Library
        );
    }

    #[test]
    fn test_classify_by_scripts() {
        assert_eq!(
            WorkspaceCategory::classify("tools/x", &scripts(&["dev"])),
            WorkspaceCategory::App
        );
        assert_eq!(
            WorkspaceCategory::classify("tools/x", &scripts(&["start"])),
            WorkspaceCategory::App
        );
        assert_eq!(
            WorkspaceCategory::classify("tools/x", &scripts(&["build", "lint"])),
            WorkspaceCategory::Other
        );
    }

    #[test]
    fn test_classify_substring_match() {
        assert_eq!(
            WorkspaceCategory::classify("internal-apps/foo", &scripts(&[])),
            WorkspaceCategory::App
        );
    }

    #[test]
    fn test_package_manager_serializes_lowercase() {
        let json = serde_json::to_string(&PackageManager::Pnpm).unwrap();
        assert_eq!(json, "\"pnpm\"");
        assert_eq!(PackageManager::default(), PackageManager::Npm);
    }

    #[test]
    fn test_project_model_task_names_from_pipeline() {
        let pipeline = PipelineConfig::from_json(r#"{ "pipeline": { "build": {}, "dev": {} } }"#)
            .unwrap();
        let model = ProjectModel::new(Vec::new(), Some(pipeline), PackageManager::Yarn);

        assert_eq!(model.task_names, vec!["build", "dev"]);
        assert!(model.has_task("dev"));
        assert!(!model.has_task("test"));
    }

    #[test]
    fn test_project_model_summary() {
        let model = ProjectModel::new(
            vec![
                WorkspaceEntry::new("web", "apps/web", scripts(&["dev"])),
                WorkspaceEntry::new("ui", "packages/ui", scripts(&[])),
                WorkspaceEntry::new("x", "tools/x", scripts(&[])),
            ],
            None,
            PackageManager::Npm,
        );

        let summary = model.summary();
        assert_eq!(summary.apps, 1);
        assert_eq!(summary.libraries, 1);
        assert_eq!(summary.others, 1);
        assert_eq!(summary.tasks, 0);
        assert!(model.get_workspace("packages/ui").is_some());
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = WorkspaceEntry::new("web", "apps/web", scripts(&[]));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["relativePath"], "apps/web");
        assert_eq!(json["category"], "app");
    }

    #[test]
    fn test_empty_model() {
        let model = ProjectModel::empty();
        assert!(model.is_empty());
        assert!(model.task_names.is_empty());
        assert_eq!(model.package_manager, PackageManager::Npm);
    }
}
