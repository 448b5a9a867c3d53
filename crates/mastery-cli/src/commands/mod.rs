//! Subcommand implementations.

pub mod analytics;
pub mod attempt;
pub mod attempts;
pub mod init;
pub mod progress;
pub mod recommend;
pub mod reconcile;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use mastery_core::traits::Stores;
use mastery_core::{load_config_from, MasteryConfig, MasteryEngine};
use mastery_store::{DatasetLock, MemoryStore};

/// How long a writing command waits for another writer to finish.
const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Global path options shared by every subcommand.
pub struct Paths {
    pub config: Option<PathBuf>,
    pub data: Option<PathBuf>,
}

impl Paths {
    /// Load the configuration, applying the `--data` override.
    pub fn config(&self) -> Result<MasteryConfig> {
        let mut config = load_config_from(self.config.as_deref())?;
        if let Some(data) = &self.data {
            config.data_path = data.clone();
        }
        Ok(config)
    }
}

/// An engine over the dataset file, plus what is needed to save it back.
pub struct Workspace {
    pub engine: MasteryEngine,
    store: Arc<MemoryStore>,
    data_path: PathBuf,
    _lock: Option<DatasetLock>,
}

impl Workspace {
    /// Open the dataset for reading.
    pub fn open(paths: &Paths) -> Result<Self> {
        Self::from_config(paths.config()?)
    }

    /// Open the dataset for a load, mutate and save cycle. Other writers
    /// wait until this workspace is dropped.
    pub async fn open_for_write(paths: &Paths) -> Result<Self> {
        let config = paths.config()?;
        let lock = DatasetLock::acquire(&config.data_path, LOCK_TIMEOUT).await?;
        let mut workspace = Self::from_config(config)?;
        workspace._lock = Some(lock);
        Ok(workspace)
    }

    pub fn from_config(config: MasteryConfig) -> Result<Self> {
        let data_path = config.data_path.clone();
        let store = Arc::new(
            MemoryStore::open(&data_path)
                .with_context(|| format!("failed to open dataset {}", data_path.display()))?,
        );
        let engine = MasteryEngine::new(Stores::uniform(store.clone()), config);
        Ok(Self {
            engine,
            store,
            data_path,
            _lock: None,
        })
    }

    /// Write the dataset back to disk.
    pub async fn save(&self) -> Result<()> {
        self.store.save(&self.data_path).await?;
        tracing::debug!(path = %self.data_path.display(), "dataset saved");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(format: &str) -> Result<Self> {
        match format {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => anyhow::bail!("unknown format '{other}', expected text or json"),
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render an optional score with one decimal, or a dash.
pub fn score_cell(score: Option<f64>) -> String {
    score.map_or_else(|| "-".to_string(), |s| format!("{s:.1}"))
}

/// Render a duration in seconds as `1h 02m`, `3m 20s`, or `45s`.
pub fn duration_cell(seconds: u64) -> String {
    match seconds {
        s if s >= 3600 => format!("{}h {:02}m", s / 3600, (s % 3600) / 60),
        s if s >= 60 => format!("{}m {:02}s", s / 60, s % 60),
        s => format!("{s}s"),
    }
}
