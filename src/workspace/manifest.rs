//! `package.json` and `pnpm-workspace.yaml` reading.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{DevtoolsError, Result};

/// Parsed manifest of one package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageManifest {
    pub name: Option<String>,
    pub scripts: BTreeMap<String, String>,
    /// Workspace glob patterns, in declaration order
    pub workspace_patterns: Vec<String>,
}

impl PackageManifest {
    /// Read `dir/<file_name>`.
    pub fn read(dir: &Path, file_name: &str) -> Result<Self> {
        let path = dir.join(file_name);
        let content = std::fs::read_to_string(&path)?;

        Self::from_json(&content).map_err(|e| match e {
            DevtoolsError::ConfigParse(msg) => {
                DevtoolsError::ConfigParse(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| DevtoolsError::ConfigParse(format!("Failed to parse manifest: {}", e)))?;

        let obj = json.as_object().ok_or_else(|| {
            DevtoolsError::ConfigParse("Manifest is not a JSON object".to_string())
        })?;

        let name = obj
            .get("name")
            .and_then(|v| v.as_str())
            .filter(|n| !n.is_empty())
            .map(String::from);

        let scripts = obj
            .get("scripts")
            .and_then(|v| v.as_object())
            .map(|scripts| {
                scripts
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|cmd| (k.clone(), cmd.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let workspace_patterns = obj
            .get("workspaces")
            .map(extract_workspace_patterns)
            .unwrap_or_default();

        Ok(Self {
            name,
            scripts,
            workspace_patterns,
        })
    }

    pub fn has_workspaces(&self) -> bool {
        !self.workspace_patterns.is_empty()
    }
}

fn extract_workspace_patterns(workspaces: &serde_json::Value) -> Vec<String> {
    match workspaces {
        serde_json::Value::Array(arr) => arr
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        serde_json::Value::Object(obj) => {
            // yarn workspaces format: { "packages": [...] }
            if let Some(packages) = obj.get("packages") {
                extract_workspace_patterns(packages)
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct PnpmWorkspaceFile {
    #[serde(default)]
    packages: Vec<String>,
}

/// Patterns listed under `packages:` in a pnpm workspace file.
///
/// A missing file yields no patterns; a malformed one is a `ConfigParse` error.
pub fn read_pnpm_patterns(root: &Path, file_name: &str) -> Result<Vec<String>> {
    let path = root.join(file_name);
    if !path.is_file() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(&path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let file: PnpmWorkspaceFile = serde_yaml::from_str(&content).map_err(|e| {
        DevtoolsError::ConfigParse(format!("Failed to parse {}: {}", path.display(), e))
    })?;

    Ok(file.packages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_manifest() {
        let manifest = PackageManifest::from_json(
            r#"{
    "name": "my-monorepo",
    "private": true,
    "scripts": { "build": "turbo run build", "dev": "turbo run dev", "weird": 1 },
    "workspaces": ["apps/*", "packages/*"]
}"#,
        )
        .unwrap();

        assert_eq!(manifest.name.as_deref(), Some("my-monorepo"));
        assert_eq!(manifest.scripts.len(), 2);
        assert_eq!(manifest.scripts["dev"], "turbo run dev");
        assert_eq!(manifest.workspace_patterns, vec!["apps/*", "packages/*"]);
        assert!(manifest.has_workspaces());
    }

    #[test]
    fn test_parse_yarn_object_workspaces() {
        let manifest = PackageManifest::from_json(
            r#"{ "workspaces": { "packages": ["libs/*", 3], "nohoist": ["**/react"] } }"#,
        )
        .unwrap();

        assert_eq!(manifest.name, None);
        assert_eq!(manifest.workspace_patterns, vec!["libs/*"]);
    }

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest = PackageManifest::from_json("{}").unwrap();
        assert_eq!(manifest, PackageManifest::default());
        assert!(!manifest.has_workspaces());
    }

    #[test]
    fn test_reject_non_object() {
        let err = PackageManifest::from_json("[1, 2]").unwrap_err();
        assert!(matches!(err, DevtoolsError::ConfigParse(_)));

        let err = PackageManifest::from_json("{ not json").unwrap_err();
        assert!(matches!(err, DevtoolsError::ConfigParse(_)));
    }

    #[test]
    fn test_read_missing_manifest_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = PackageManifest::read(temp_dir.path(), "package.json").unwrap_err();
        assert!(matches!(err, DevtoolsError::Io(_)));
    }

    #[test]
    fn test_read_pnpm_patterns() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("pnpm-workspace.yaml"),
            r#"
packages:
  - 'apps/*'
  - "libs/*"
  - '!**/test/**'
"#,
        )
        .unwrap();

        let patterns = read_pnpm_patterns(temp_dir.path(), "pnpm-workspace.yaml").unwrap();
        assert_eq!(patterns, vec!["apps/*", "libs/*", "!**/test/**"]);
    }

    #[test]
    fn test_read_pnpm_patterns_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let patterns = read_pnpm_patterns(temp_dir.path(), "pnpm-workspace.yaml").unwrap();
        assert!(patterns.is_empty());
    }
}
