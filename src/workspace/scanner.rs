//! Workspace discovery.
//!
//! Each workspace pattern is resolved by a [`ResolutionStrategy`]. The glob
//! strategy is used whenever it can compile the pattern; otherwise, or when
//! the glob engine itself fails, the literal-path strategy takes over for that
//! pattern only.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::{debug, info, warn};

use crate::config::DevtoolsConfig;
use crate::error::{DevtoolsError, Result};

use super::manifest::{read_pnpm_patterns, PackageManifest};
use super::{PackageManagerDetector, PipelineConfig, ProjectModel, WorkspaceEntry};

/// Scan `root` with the default configuration.
pub fn build_project_model(root: &Path) -> ProjectModel {
    ProjectScanner::new(DevtoolsConfig::default()).build_project_model(root)
}

/// Read-only view of the project root shared by the resolution strategies
pub struct ScanContext<'a> {
    root: &'a Path,
    manifest_file: &'a str,
}

impl<'a> ScanContext<'a> {
    pub fn new(root: &'a Path, manifest_file: &'a str) -> Self {
        Self {
            root,
            manifest_file,
        }
    }

    pub fn root(&self) -> &Path {
        self.root
    }

    /// Entry for `dir` if it holds a parseable manifest
    pub fn read_package(&self, dir: &Path) -> Option<WorkspaceEntry> {
        let manifest_path = dir.join(self.manifest_file);
        if !manifest_path.is_file() {
            return None;
        }

        match PackageManifest::read(dir, self.manifest_file) {
            Ok(manifest) => {
                let relative_path = relative_posix_path(self.root, dir);
                let name = manifest
                    .name
                    .unwrap_or_else(|| directory_name(dir, &relative_path));
                Some(WorkspaceEntry::new(name, relative_path, manifest.scripts))
            }
            Err(e) => {
                warn!("Skipping {}: {}", manifest_path.display(), e);
                None
            }
        }
    }

    /// Packages among the immediate children of `dir`. Does not descend further.
    pub fn scan_children(&self, dir: &Path) -> Vec<WorkspaceEntry> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {}: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut children: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        children.sort();

        children
            .iter()
            .filter_map(|child| self.read_package(child))
            .collect()
    }

    /// A candidate with a manifest is a package; a plain directory is a
    /// container whose packaged children are returned.
    pub fn resolve_candidate(&self, candidate: &Path) -> Vec<WorkspaceEntry> {
        if self.is_dependency_dir(candidate) {
            return Vec::new();
        }

        if let Some(entry) = self.read_package(candidate) {
            return vec![entry];
        }

        if candidate.is_dir() {
            return self.scan_children(candidate);
        }

        debug!(
            "Skipping {}: no manifest and not a directory",
            candidate.display()
        );
        Vec::new()
    }

    fn is_dependency_dir(&self, path: &Path) -> bool {
        path.strip_prefix(self.root)
            .unwrap_or(path)
            .components()
            .any(|c| c.as_os_str() == "node_modules")
    }
}

/// One way of turning a workspace pattern into entries
pub trait ResolutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Capability probe: whether this strategy can handle `pattern` at all
    fn supports(&self, pattern: &str) -> bool;

    fn resolve(&self, ctx: &ScanContext<'_>, pattern: &str) -> Result<Vec<WorkspaceEntry>>;
}

/// Glob expansion; `*` never crosses a path separator
pub struct GlobStrategy;

impl GlobStrategy {
    fn match_options() -> MatchOptions {
        MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: true,
        }
    }

    fn full_pattern(root: &Path, pattern: &str) -> Result<String> {
        let root = root.to_str().ok_or_else(|| {
            DevtoolsError::WorkspaceResolution(format!(
                "Project root is not valid UTF-8: {}",
                root.display()
            ))
        })?;

        let pattern = pattern.trim_start_matches("./").trim_end_matches('/');
        Ok(format!(
            "{}/{}",
            Pattern::escape(root).trim_end_matches('/'),
            pattern
        ))
    }
}

impl ResolutionStrategy for GlobStrategy {
    fn name(&self) -> &'static str {
        "glob"
    }

    fn supports(&self, pattern: &str) -> bool {
        Pattern::new(pattern).is_ok()
    }

    fn resolve(&self, ctx: &ScanContext<'_>, pattern: &str) -> Result<Vec<WorkspaceEntry>> {
        let full = Self::full_pattern(ctx.root(), pattern)?;
        let paths = glob::glob_with(&full, Self::match_options()).map_err(|e| {
            DevtoolsError::WorkspaceResolution(format!("Invalid pattern '{}': {}", pattern, e))
        })?;

        let mut entries = Vec::new();
        for path in paths {
            match path {
                Ok(candidate) => entries.extend(ctx.resolve_candidate(&candidate)),
                Err(e) => debug!("Skipping unreadable match for '{}': {}", pattern, e),
            }
        }

        debug!("Pattern '{}' resolved to {} workspaces", pattern, entries.len());
        Ok(entries)
    }
}

/// Treats the pattern as a literal directory, or the directory in front of a
/// trailing `/*`, and scans its immediate children
pub struct LiteralStrategy;

impl ResolutionStrategy for LiteralStrategy {
    fn name(&self) -> &'static str {
        "literal"
    }

    fn supports(&self, _pattern: &str) -> bool {
        true
    }

    fn resolve(&self, ctx: &ScanContext<'_>, pattern: &str) -> Result<Vec<WorkspaceEntry>> {
        let mut candidates = vec![ctx.root().join(pattern)];
        if let Some(base) = pattern.strip_suffix("/*") {
            candidates.push(ctx.root().join(base));
        }

        let mut entries = Vec::new();
        for dir in candidates {
            if dir.is_dir() {
                entries.extend(ctx.scan_children(&dir));
            }
        }

        Ok(entries)
    }
}

/// Discovered entries, unique by relative path. The first discovery wins.
#[derive(Default)]
struct WorkspaceSet {
    entries: Vec<WorkspaceEntry>,
    seen: HashSet<String>,
}

impl WorkspaceSet {
    fn insert(&mut self, entry: WorkspaceEntry) -> bool {
        if !self.seen.insert(entry.relative_path.clone()) {
            debug!("Workspace {} already discovered", entry.relative_path);
            return false;
        }
        self.entries.push(entry);
        true
    }

    fn extend(&mut self, entries: impl IntoIterator<Item = WorkspaceEntry>) {
        for entry in entries {
            self.insert(entry);
        }
    }

    fn into_vec(self) -> Vec<WorkspaceEntry> {
        self.entries
    }
}

/// Builds [`ProjectModel`]s from the file system
pub struct ProjectScanner {
    config: DevtoolsConfig,
    primary: Box<dyn ResolutionStrategy>,
    fallback: Box<dyn ResolutionStrategy>,
}

impl ProjectScanner {
    pub fn new(config: DevtoolsConfig) -> Self {
        Self::with_strategies(config, Box::new(GlobStrategy), Box::new(LiteralStrategy))
    }

    pub fn with_strategies(
        config: DevtoolsConfig,
        primary: Box<dyn ResolutionStrategy>,
        fallback: Box<dyn ResolutionStrategy>,
    ) -> Self {
        Self {
            config,
            primary,
            fallback,
        }
    }

    pub fn config(&self) -> &DevtoolsConfig {
        &self.config
    }

    /// Never fails: anything that prevents a scan yields the empty model.
    pub fn build_project_model(&self, root: &Path) -> ProjectModel {
        match self.scan(root) {
            Ok(model) => model,
            Err(DevtoolsError::NotAProject(path)) => {
                debug!("No project at {}", path);
                ProjectModel::empty()
            }
            Err(e) => {
                warn!("Cannot scan {}: {}", root.display(), e);
                ProjectModel::empty()
            }
        }
    }

    /// Like [`build_project_model`](Self::build_project_model) but reports why
    /// no project was found. Errors below the root manifest are still
    /// downgraded to absence.
    pub fn scan(&self, root: &Path) -> Result<ProjectModel> {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

        if !PackageManagerDetector::is_project(&root, &self.config) {
            return Err(DevtoolsError::NotAProject(root.display().to_string()));
        }
        let manifest = PackageManifest::read(&root, &self.config.manifest_file)?;

        let pipeline = match PipelineConfig::read(&root, &self.config.pipeline_file) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                warn!("Ignoring {}: {}", self.config.pipeline_file, e);
                None
            }
        };

        let ctx = ScanContext::new(&root, &self.config.manifest_file);
        let mut workspaces = WorkspaceSet::default();
        for pattern in self.workspace_patterns(&root, &manifest) {
            if pattern.starts_with('!') {
                debug!("Skipping exclusion pattern '{}'", pattern);
                continue;
            }
            workspaces.extend(self.resolve_pattern(&ctx, &pattern));
        }

        let package_manager = PackageManagerDetector::detect(&root, &self.config);
        let model = ProjectModel::new(workspaces.into_vec(), pipeline, package_manager);

        info!(
            "Scanned {}: {} workspaces, {} tasks, {}",
            root.display(),
            model.workspaces.len(),
            model.task_names.len(),
            model.package_manager
        );

        Ok(model)
    }

    fn workspace_patterns(&self, root: &Path, manifest: &PackageManifest) -> Vec<String> {
        if manifest.has_workspaces() {
            return manifest.workspace_patterns.clone();
        }

        match read_pnpm_patterns(root, &self.config.pnpm_workspace_file) {
            Ok(patterns) => patterns,
            Err(e) => {
                warn!("Ignoring {}: {}", self.config.pnpm_workspace_file, e);
                Vec::new()
            }
        }
    }

    fn resolve_pattern(&self, ctx: &ScanContext<'_>, pattern: &str) -> Vec<WorkspaceEntry> {
        if self.primary.supports(pattern) {
            match self.primary.resolve(ctx, pattern) {
                Ok(entries) => return entries,
                Err(e) => warn!(
                    "{} resolution failed for '{}': {}",
                    self.primary.name(),
                    pattern,
                    e
                ),
            }
        } else {
            debug!(
                "Pattern '{}' not supported by {}",
                pattern,
                self.primary.name()
            );
        }

        debug!("Resolving '{}' with {}", pattern, self.fallback.name());
        self.fallback.resolve(ctx, pattern).unwrap_or_else(|e| {
            warn!(
                "{} resolution failed for '{}': {}",
                self.fallback.name(),
                pattern,
                e
            );
            Vec::new()
        })
    }
}

/// `path` relative to `root`, joined with `/`
fn relative_posix_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);

    let mut parts: Vec<String> = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                if parts.last().is_some_and(|p| p != "..") {
                    parts.pop();
                } else {
                    parts.push("..".to_string());
                }
            }
            _ => {}
        }
    }

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

fn directory_name(dir: &Path, fallback: &str) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_package(root: &Path, rel: &str, json: &str) {
        let dir = root.join(rel);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("package.json"), json).unwrap();
    }

    #[test]
    fn test_relative_posix_path() {
        let root = Path::new("/repo");
        assert_eq!(relative_posix_path(root, Path::new("/repo/apps/web")), "apps/web");
        assert_eq!(relative_posix_path(root, Path::new("/repo/./apps/web")), "apps/web");
        assert_eq!(relative_posix_path(root, Path::new("/repo/apps/../libs/ui")), "libs/ui");
        assert_eq!(relative_posix_path(root, Path::new("/repo")), ".");
    }

    #[test]
    fn test_glob_probe() {
        assert!(GlobStrategy.supports("packages/*"));
        assert!(GlobStrategy.supports("apps/**"));
        assert!(!GlobStrategy.supports("group[1"));
        assert!(!GlobStrategy.supports("packages/***"));
        assert!(LiteralStrategy.supports("group[1"));
    }

    #[test]
    fn test_resolve_candidate_with_manifest_does_not_descend() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_package(root, "tools/cli", r#"{ "name": "cli" }"#);
        write_package(root, "tools/cli/fixtures/inner", r#"{ "name": "inner" }"#);

        let ctx = ScanContext::new(root, "package.json");
        let entries = ctx.resolve_candidate(&root.join("tools/cli"));

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "cli");
        assert_eq!(entries[0].relative_path, "tools/cli");
    }

    #[test]
    fn test_resolve_candidate_scans_one_level() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_package(root, "group/a", r#"{ "name": "a" }"#);
        write_package(root, "group/nested/b", r#"{ "name": "b" }"#);
        fs::create_dir_all(root.join("group/empty")).unwrap();

        let ctx = ScanContext::new(root, "package.json");
        let entries = ctx.resolve_candidate(&root.join("group"));

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].relative_path, "group/a");
    }

    #[test]
    fn test_name_falls_back_to_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_package(root, "packages/unnamed", r#"{ "scripts": { "build": "tsc" } }"#);

        let ctx = ScanContext::new(root, "package.json");
        let entry = ctx.read_package(&root.join("packages/unnamed")).unwrap();
        assert_eq!(entry.name, "unnamed");
        assert_eq!(entry.scripts["build"], "tsc");
    }

    #[test]
    fn test_malformed_child_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_package(root, "packages/good", r#"{ "name": "good" }"#);
        write_package(root, "packages/bad", r#"{ "name": "#);

        let ctx = ScanContext::new(root, "package.json");
        let entries = ctx.scan_children(&root.join("packages"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "good");
    }

    #[test]
    fn test_literal_strategy_strips_trailing_star() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_package(root, "group[1/x", r#"{ "name": "x" }"#);

        let ctx = ScanContext::new(root, "package.json");
        let entries = LiteralStrategy.resolve(&ctx, "group[1/*").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].relative_path, "group[1/x");
    }

    #[test]
    fn test_glob_strategy_skips_node_modules() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_package(root, "packages/a", r#"{ "name": "a" }"#);
        write_package(root, "packages/a/node_modules/dep", r#"{ "name": "dep" }"#);

        let ctx = ScanContext::new(root, "package.json");
        let entries = GlobStrategy.resolve(&ctx, "packages/**").unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"a"));
        assert!(!names.contains(&"dep"));
    }

    #[test]
    fn test_workspace_set_keeps_first() {
        let mut set = WorkspaceSet::default();
        assert!(set.insert(WorkspaceEntry::new("a", "packages/a", Default::default())));
        assert!(!set.insert(WorkspaceEntry::new("a2", "packages/a", Default::default())));
        let entries = set.into_vec();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a");
    }
}
