//! Messages exchanged with a display host.
//!
//! Both directions are JSON objects tagged by `command`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DevtoolsError, Result};
use crate::workspace::ProjectModel;

/// Host -> core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Request {
    Ready,
    Refresh,
    #[serde(rename_all = "camelCase")]
    RunCommand { script: String },
    #[serde(rename_all = "camelCase")]
    RunCommandWithOutput { script: String, message_id: String },
    #[serde(rename_all = "camelCase")]
    OpenWorkspace { workspace_path: String },
}

impl Request {
    /// Parse and validate a raw host message.
    pub fn from_json(raw: &str) -> Result<Self> {
        let request: Request = serde_json::from_str(raw)
            .map_err(|e| DevtoolsError::Protocol(format!("Invalid request: {}", e)))?;
        request.validate()?;
        Ok(request)
    }

    fn validate(&self) -> Result<()> {
        match self {
            Request::RunCommand { script } if script.trim().is_empty() => {
                Err(DevtoolsError::Protocol("runCommand needs a script".to_string()))
            }
            Request::RunCommandWithOutput { script, message_id } => {
                if script.trim().is_empty() {
                    return Err(DevtoolsError::Protocol(
                        "runCommandWithOutput needs a script".to_string(),
                    ));
                }
                if message_id.is_empty() {
                    return Err(DevtoolsError::Protocol(
                        "runCommandWithOutput needs a messageId".to_string(),
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Request::Ready => "ready",
            Request::Refresh => "refresh",
            Request::RunCommand { .. } => "runCommand",
            Request::RunCommandWithOutput { .. } => "runCommandWithOutput",
            Request::OpenWorkspace { .. } => "openWorkspace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStatus {
    Refreshing,
    Completed,
    Error,
}

/// Core -> host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Notification {
    /// Full snapshot, never a diff
    UpdateProjectInfo { data: Arc<ProjectModel> },
    ShowRefreshStatus { status: RefreshStatus },
    #[serde(rename_all = "camelCase")]
    CommandOutput {
        message_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl Notification {
    pub fn command_output(message_id: impl Into<String>, result: Result<String>) -> Self {
        let (output, error) = match result {
            Ok(output) => (Some(output), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Notification::CommandOutput {
            message_id: message_id.into(),
            output,
            error,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| DevtoolsError::Protocol(e.to_string()))
    }
}
