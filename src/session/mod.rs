//! Host sessions
//!
//! A [`Session`] serves one display host: it owns the project root, the
//! current [`ProjectModel`] snapshot and the correlation ids of commands
//! whose output is still awaited. Hosts talk to it through the tagged
//! [`Request`]/[`Notification`] protocol.

pub mod protocol;
pub mod registry;

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info, warn};

use crate::config::DevtoolsConfig;
use crate::error::{DevtoolsError, Result};
use crate::graph::{RenderPipeline, RenderedGraph};
use crate::runner::CommandRunner;
use crate::workspace::{ProjectModel, ProjectScanner};

pub use protocol::{Notification, RefreshStatus, Request};
pub use registry::{SessionId, SessionRegistry};

/// Shows a directory in the platform file browser
pub trait FileRevealer: Send + Sync {
    fn reveal(&self, path: &Path) -> Result<()>;
}

/// `open -R` on macOS, `explorer` on Windows, `xdg-open` elsewhere
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRevealer;

impl FileRevealer for SystemRevealer {
    fn reveal(&self, path: &Path) -> Result<()> {
        let mut cmd = if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.arg("-R");
            cmd
        } else if cfg!(windows) {
            Command::new("explorer")
        } else {
            Command::new("xdg-open")
        };

        let status = cmd
            .arg(path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                DevtoolsError::ExternalCommand(format!(
                    "Failed to open {}: {}",
                    path.display(),
                    e
                ))
            })?;

        // explorer exits non-zero even when it opened the folder
        if !status.success() && !cfg!(windows) {
            return Err(DevtoolsError::ExternalCommand(format!(
                "Failed to open {}: {}",
                path.display(),
                status
            )));
        }
        Ok(())
    }
}

pub struct Session {
    id: SessionId,
    root: Option<PathBuf>,
    scanner: ProjectScanner,
    runner: CommandRunner,
    model: RwLock<Arc<ProjectModel>>,
    pending: Mutex<HashSet<String>>,
    refreshing: AtomicBool,
    revealer: Arc<dyn FileRevealer>,
}

impl Session {
    pub fn new(
        id: SessionId,
        root: Option<PathBuf>,
        config: DevtoolsConfig,
        revealer: Arc<dyn FileRevealer>,
    ) -> Self {
        Self {
            id,
            root,
            runner: CommandRunner::from_config(&config),
            scanner: ProjectScanner::new(config),
            model: RwLock::new(Arc::new(ProjectModel::empty())),
            pending: Mutex::new(HashSet::new()),
            refreshing: AtomicBool::new(false),
            revealer,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn config(&self) -> &DevtoolsConfig {
        self.scanner.config()
    }

    pub fn runner(&self) -> &CommandRunner {
        &self.runner
    }

    fn require_root(&self) -> Result<&Path> {
        self.root().ok_or(DevtoolsError::NoProjectRoot)
    }

    /// The last published model
    pub fn snapshot(&self) -> Arc<ProjectModel> {
        let model = self.model.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*model)
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Rescan the root and publish the new model.
    ///
    /// Returns `Ok(None)` without scanning when a refresh is already running.
    /// A root without a readable manifest publishes the empty model, so
    /// workspaces from an earlier scan never outlive a broken manifest.
    /// Fails only when no root is open.
    pub fn refresh(&self) -> Result<Option<Arc<ProjectModel>>> {
        let root = self.require_root()?;

        if self.refreshing.swap(true, Ordering::AcqRel) {
            debug!("Refresh already in flight, ignoring");
            return Ok(None);
        }

        let model = Arc::new(self.scanner.build_project_model(root));
        self.refreshing.store(false, Ordering::Release);

        *self.model.write().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&model);
        Ok(Some(model))
    }

    pub async fn handle_json(&self, raw: &str) -> Result<Vec<Notification>> {
        let request = Request::from_json(raw)?;
        self.handle(request).await
    }

    /// Handle one request to completion and return what the host should receive
    pub async fn handle(&self, request: Request) -> Result<Vec<Notification>> {
        debug!("Session {} handling {}", self.id, request.kind());

        match request {
            Request::Ready => match self.refresh() {
                Ok(Some(data)) => Ok(vec![Notification::UpdateProjectInfo { data }]),
                Ok(None) => Ok(Vec::new()),
                Err(e) => {
                    warn!("Initial scan failed: {}", e);
                    Ok(vec![Notification::UpdateProjectInfo {
                        data: self.snapshot(),
                    }])
                }
            },
            Request::Refresh => Ok(self.refresh_notifications()),
            Request::RunCommand { script } => {
                self.run_command(&script)?;
                Ok(Vec::new())
            }
            Request::RunCommandWithOutput { script, message_id } => Ok(self
                .run_command_with_output(&message_id, &script)
                .await
                .into_iter()
                .collect()),
            Request::OpenWorkspace { workspace_path } => {
                self.open_workspace(&workspace_path)?;
                Ok(Vec::new())
            }
        }
    }

    fn refresh_notifications(&self) -> Vec<Notification> {
        let mut notifications = vec![Notification::ShowRefreshStatus {
            status: RefreshStatus::Refreshing,
        }];

        match self.refresh() {
            Ok(Some(data)) => {
                notifications.push(Notification::UpdateProjectInfo { data });
                notifications.push(Notification::ShowRefreshStatus {
                    status: RefreshStatus::Completed,
                });
            }
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Refresh failed: {}", e);
                notifications.push(Notification::ShowRefreshStatus {
                    status: RefreshStatus::Error,
                });
            }
        }

        notifications
    }

    /// Mark `message_id` as awaited. False if it already was.
    pub fn register_pending(&self, message_id: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(message_id.to_string())
    }

    /// Resolve a pending id. Results for ids nobody waits for are discarded.
    pub fn complete(&self, message_id: &str, result: Result<String>) -> Option<Notification> {
        let was_pending = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(message_id);

        if !was_pending {
            debug!("Discarding output for unknown message id {}", message_id);
            return None;
        }

        Some(Notification::command_output(message_id, result))
    }

    /// Run `script` in the project root and report its output under `message_id`
    pub async fn run_command_with_output(
        &self,
        message_id: &str,
        script: &str,
    ) -> Option<Notification> {
        self.register_pending(message_id);

        let result = match self.require_root() {
            Ok(root) => self.runner.run_with_output(script, root).await,
            Err(e) => Err(e),
        };

        self.complete(message_id, result)
    }

    /// Start `script` in the project root without waiting for it
    pub fn run_command(&self, script: &str) -> Result<()> {
        let root = self.require_root()?;
        info!("Running `{}`", script);
        self.runner.spawn(script, root)
    }

    /// Run the configured graph command in the root and render what it prints
    pub async fn dependency_graph(&self, renderer: &RenderPipeline) -> Result<RenderedGraph> {
        let root = self.require_root()?;
        let raw = self
            .runner
            .run_with_output(&self.config().graph_command, root)
            .await?;
        renderer.render_output(&raw).await
    }

    /// Reveal `root/<relative_path>` in the file browser
    pub fn open_workspace(&self, relative_path: &str) -> Result<PathBuf> {
        let root = self.require_root()?;

        let relative = Path::new(relative_path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(DevtoolsError::WorkspaceResolution(format!(
                "Workspace path must stay inside the project: {}",
                relative_path
            )));
        }

        let full_path = root.join(relative);
        if !full_path.is_dir() {
            return Err(DevtoolsError::WorkspaceResolution(format!(
                "Workspace not found: {}",
                relative_path
            )));
        }

        self.revealer.reveal(&full_path)?;
        info!("Revealed {}", full_path.display());
        Ok(full_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopRevealer;

    impl FileRevealer for NoopRevealer {
        fn reveal(&self, _path: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn session(root: Option<PathBuf>) -> Session {
        Session::new(
            SessionId::new(),
            root,
            DevtoolsConfig::default(),
            Arc::new(NoopRevealer),
        )
    }

    #[test]
    fn test_refresh_in_flight_is_noop() {
        let dir = tempfile::TempDir::new().unwrap();
        let session = session(Some(dir.path().to_path_buf()));

        session.refreshing.store(true, Ordering::Release);
        assert!(session.refresh().unwrap().is_none());
        assert!(session.refresh_notifications().is_empty());

        session.refreshing.store(false, Ordering::Release);
        assert!(session.refresh().unwrap().is_some());
        assert!(!session.is_refreshing());
    }

    #[test]
    fn test_complete_discards_unknown_ids() {
        let session = session(None);
        assert!(session.complete("never-sent", Ok("x".to_string())).is_none());

        assert!(session.register_pending("m1"));
        assert!(!session.register_pending("m1"));
        assert!(session.complete("m1", Ok("x".to_string())).is_some());
        assert!(session.complete("m1", Ok("x".to_string())).is_none());
    }

    #[test]
    fn test_no_root() {
        let session = session(None);
        assert!(matches!(session.refresh(), Err(DevtoolsError::NoProjectRoot)));
        assert!(matches!(
            session.open_workspace("apps/web"),
            Err(DevtoolsError::NoProjectRoot)
        ));
        assert!(matches!(
            session.run_command("ls"),
            Err(DevtoolsError::NoProjectRoot)
        ));
    }

    #[test]
    fn test_open_workspace_stays_in_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let session = session(Some(dir.path().to_path_buf()));

        assert!(session.open_workspace("../outside").is_err());
        assert!(session.open_workspace("/etc").is_err());
        assert!(session.open_workspace("apps/missing").is_err());
    }
}
