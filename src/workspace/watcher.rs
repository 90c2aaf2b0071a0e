use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};

use crate::config::DevtoolsConfig;
use crate::error::{DevtoolsError, Result};

/// Watches a project root for changes to the files a scan reads:
/// manifests, the pipeline config, the pnpm workspace file and lockfiles.
/// Directories appearing or disappearing count too, since a moved or
/// deleted workspace folder changes the scan without touching a manifest.
pub struct ManifestWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher>,
    receiver: Receiver<std::result::Result<Vec<DebouncedEvent>, notify::Error>>,
    root: PathBuf,
    watched_names: Vec<String>,
}

impl ManifestWatcher {
    pub fn new(root: &Path, config: &DevtoolsConfig) -> Result<Self> {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let (tx, rx) = channel();

        let mut debouncer = new_debouncer(Duration::from_millis(500), tx)
            .map_err(|e| DevtoolsError::Watcher(e.to_string()))?;

        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| DevtoolsError::Watcher(e.to_string()))?;

        Ok(Self {
            _debouncer: debouncer,
            receiver: rx,
            root,
            watched_names: watched_names(config),
        })
    }

    /// Block until relevant files change. Returns `None` once the watcher is gone.
    pub fn recv(&self) -> Option<Vec<PathBuf>> {
        loop {
            match self.receiver.recv() {
                Ok(Ok(events)) => {
                    let changed = self.relevant(events);
                    if !changed.is_empty() {
                        return Some(changed);
                    }
                }
                Ok(Err(e)) => tracing::warn!("Watch error: {}", e),
                Err(_) => return None,
            }
        }
    }

    fn relevant(&self, events: Vec<DebouncedEvent>) -> Vec<PathBuf> {
        events
            .into_iter()
            .map(|e| e.path)
            .filter(|path| is_relevant(&self.root, path, &self.watched_names))
            .collect()
    }
}

fn watched_names(config: &DevtoolsConfig) -> Vec<String> {
    vec![
        config.manifest_file.clone(),
        config.pipeline_file.clone(),
        config.pnpm_workspace_file.clone(),
        config.pnpm_lockfile.clone(),
        config.yarn_lockfile.clone(),
    ]
}

fn is_relevant(root: &Path, path: &Path, watched_names: &[String]) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let ignored = relative.components().any(|c| {
        let name = c.as_os_str().to_string_lossy();
        name == "node_modules" || (name.starts_with('.') && name.len() > 1 && name != "..")
    });
    if ignored {
        return false;
    }

    let watched = path
        .file_name()
        .map(|name| watched_names.iter().any(|w| name == w.as_str()))
        .unwrap_or(false);

    watched || is_directory_change(path)
}

/// Created or renamed-in directories still exist; removed or renamed-away
/// ones are gone and, unlike most files, carry no extension.
fn is_directory_change(path: &Path) -> bool {
    if path.exists() {
        path.is_dir()
    } else {
        path.extension().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_moves_are_relevant() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let root = temp_dir.path();
        let names = watched_names(&DevtoolsConfig::default());

        std::fs::create_dir_all(root.join("apps/admin")).unwrap();
        std::fs::create_dir_all(root.join("apps/web/src")).unwrap();
        std::fs::write(root.join("apps/web/src/index.ts"), "").unwrap();

        // renamed in, renamed away
        assert!(is_relevant(root, &root.join("apps/admin"), &names));
        assert!(is_relevant(root, &root.join("apps/dashboard"), &names));

        assert!(!is_relevant(root, &root.join("apps/web/src/index.ts"), &names));
        assert!(!is_relevant(root, &root.join("apps/web/src/deleted.ts"), &names));
        assert!(!is_relevant(root, &root.join(".turbo/cache/abc123"), &names));
    }

    #[test]
    fn test_is_relevant() {
        let names = watched_names(&DevtoolsConfig::default());
        let root = Path::new("/repo");

        assert!(is_relevant(root, Path::new("/repo/package.json"), &names));
        assert!(is_relevant(root, Path::new("/repo/apps/web/package.json"), &names));
        assert!(is_relevant(root, Path::new("/repo/turbo.json"), &names));
        assert!(is_relevant(root, Path::new("/repo/pnpm-lock.yaml"), &names));
        assert!(!is_relevant(root, Path::new("/repo/apps/web/src/index.ts"), &names));
        assert!(!is_relevant(
            root,
            Path::new("/repo/node_modules/react/package.json"),
            &names
        ));
    }
}
