//! JSON dataset snapshots.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use mastery_core::model::{
    Area, Attempt, Competency, Indicator, ProgressSummary, Resource, Student, Teacher,
};
use mastery_core::StoreError;

/// Everything a [`MemoryStore`](crate::MemoryStore) holds, in the shape it
/// is persisted on disk. Missing sections load as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub areas: Vec<Area>,
    #[serde(default)]
    pub competencies: Vec<Competency>,
    #[serde(default)]
    pub indicators: Vec<Indicator>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub teachers: Vec<Teacher>,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub attempts: Vec<Attempt>,
    #[serde(default)]
    pub progress: Vec<ProgressSummary>,
}

impl Dataset {
    /// Decode a dataset from JSON text.
    pub fn from_json(content: &str) -> std::result::Result<Self, StoreError> {
        serde_json::from_str(content).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    /// Load a dataset file. The file must exist.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Io(e.to_string()))
            .with_context(|| format!("failed to read dataset {}", path.display()))?;
        let dataset = Self::from_json(&content)
            .with_context(|| format!("failed to parse dataset {}", path.display()))?;
        tracing::debug!(
            path = %path.display(),
            attempts = dataset.attempts.len(),
            summaries = dataset.progress.len(),
            "loaded dataset"
        );
        Ok(dataset)
    }

    /// Load a dataset file, or start empty if there is none yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_json(path)
        } else {
            tracing::warn!(path = %path.display(), "dataset not found, starting empty");
            Ok(Self::default())
        }
    }

    /// Write the dataset as pretty JSON, replacing the file atomically.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }

        let contents = serde_json::to_string_pretty(self).context("failed to serialize dataset")?;
        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, contents)
            .with_context(|| format!("failed to write {}", staging.display()))?;
        std::fs::rename(&staging, path)
            .with_context(|| format!("failed to replace dataset {}", path.display()))?;
        Ok(())
    }
}
