//! `turbo.json` reading.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DevtoolsError, Result};

/// Task definitions from the pipeline config.
///
/// Definitions are kept as opaque JSON; only their keys are interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub tasks: serde_json::Map<String, serde_json::Value>,
}

impl PipelineConfig {
    /// Read `root/<file_name>`. A missing file is `Ok(None)`.
    pub fn read(root: &Path, file_name: &str) -> Result<Option<Self>> {
        let path = root.join(file_name);
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_json(&content).map(Some)
    }

    /// Tasks come from `pipeline` (turbo 1.x) or `tasks` (turbo 2.x);
    /// `pipeline` wins when both are present.
    pub fn from_json(content: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(content).map_err(|e| {
            DevtoolsError::ConfigParse(format!("Failed to parse pipeline config: {}", e))
        })?;

        let obj = json.as_object().ok_or_else(|| {
            DevtoolsError::ConfigParse("Pipeline config is not a JSON object".to_string())
        })?;

        let tasks = obj
            .get("pipeline")
            .or_else(|| obj.get("tasks"))
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();

        Ok(Self { tasks })
    }

    /// Task names in file order
    pub fn task_names(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }
}
