//! Session Registry
//!
//! Keeps every open session by id. Hosts hold an id, never a global.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DevtoolsConfig;
use crate::error::{DevtoolsError, Result};

use super::{FileRevealer, Session, SystemRevealer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Sessions by id
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    revealer: Arc<dyn FileRevealer>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_revealer(Arc::new(SystemRevealer))
    }

    pub fn with_revealer(revealer: Arc<dyn FileRevealer>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            revealer,
        }
    }

    /// Create a session for `root`. The root's `.turbo-devtools.toml` is
    /// applied when present.
    pub fn open(&self, root: Option<PathBuf>) -> Result<Arc<Session>> {
        let config = match &root {
            Some(root) => DevtoolsConfig::load(root)?,
            None => DevtoolsConfig::default(),
        };
        Ok(self.open_with_config(root, config))
    }

    pub fn open_with_config(
        &self,
        root: Option<PathBuf>,
        config: DevtoolsConfig,
    ) -> Arc<Session> {
        let id = SessionId::new();
        let session = Arc::new(Session::new(id, root, config, Arc::clone(&self.revealer)));

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.insert(id, Arc::clone(&session));
        tracing::debug!("Opened session {}", id);

        session
    }

    pub fn get(&self, id: SessionId) -> Result<Arc<Session>> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| DevtoolsError::UnknownSession(id.to_string()))
    }

    pub fn close(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_get_close() {
        let registry = SessionRegistry::new();

        let session = registry.open(None).unwrap();
        assert_eq!(registry.len(), 1);

        let fetched = registry.get(session.id()).unwrap();
        assert!(Arc::ptr_eq(&session, &fetched));

        assert!(registry.close(session.id()));
        assert!(!registry.close(session.id()));
        assert!(registry.is_empty());
        assert!(matches!(
            registry.get(session.id()),
            Err(DevtoolsError::UnknownSession(_))
        ));
    }

    #[test]
    fn test_sessions_are_independent() {
        let registry = SessionRegistry::new();
        let a = registry.open(None).unwrap();
        let b = registry.open(None).unwrap();

        assert_ne!(a.id(), b.id());
        assert_eq!(registry.len(), 2);
    }
}
