//! Package manager detection.

use std::path::Path;

use crate::config::DevtoolsConfig;

use super::PackageManager;

/// Detects the package manager from lockfiles at the project root
pub struct PackageManagerDetector;

impl PackageManagerDetector {
    /// Lockfiles are only checked for existence, never parsed.
    /// pnpm wins over yarn; npm is the default.
    pub fn detect(root: &Path, config: &DevtoolsConfig) -> PackageManager {
        if root.join(&config.pnpm_lockfile).exists() {
            PackageManager::Pnpm
        } else if root.join(&config.yarn_lockfile).exists() {
            PackageManager::Yarn
        } else {
            PackageManager::Npm
        }
    }

    /// Whether `root` looks like a project at all (has a manifest)
    pub fn is_project(root: &Path, config: &DevtoolsConfig) -> bool {
        root.join(&config.manifest_file).is_file()
    }
}
