//! Engine configuration and loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::RankingKind;

/// Score recorded for completions that arrive without one.
pub const DEFAULT_COMPLETION_SCORE: f64 = 80.0;

/// Largest accepted `staleness_days`, about a century.
pub const MAX_STALENESS_DAYS: i64 = 36_500;

/// Largest accepted `usage_window_days`, about ten years.
pub const MAX_USAGE_WINDOW_DAYS: i64 = 3_660;

/// Top-level mastery configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryConfig {
    /// Score applied to completions without an explicit score.
    #[serde(default = "default_score")]
    pub default_score: f64,
    /// Averages strictly below this are flagged for reinforcement.
    #[serde(default = "default_threshold")]
    pub reinforcement_threshold: f64,
    /// Days after which a completed indicator is due for review.
    #[serde(default = "default_staleness_days")]
    pub staleness_days: i64,
    /// Default number of recommended indicators.
    #[serde(default = "default_limit_indicators")]
    pub limit_indicators: usize,
    /// Default number of resources per recommended indicator.
    #[serde(default = "default_limit_resources")]
    pub limit_resources: usize,
    /// Raw attempts scanned when a student has no summaries.
    #[serde(default = "default_fallback_scan")]
    pub fallback_attempt_scan: usize,
    /// Candidate ordering policy.
    #[serde(default)]
    pub ranking: RankingKind,
    /// Lookback window for usage statistics.
    #[serde(default = "default_usage_window")]
    pub usage_window_days: i64,
    /// Offset from UTC used to bucket usage into local calendar days.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Rows in the class "struggling indicators" list.
    #[serde(default = "default_struggling_limit")]
    pub struggling_limit: usize,
    /// Dataset file used by the CLI.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
}

fn default_score() -> f64 {
    DEFAULT_COMPLETION_SCORE
}
fn default_threshold() -> f64 {
    60.0
}
fn default_staleness_days() -> i64 {
    14
}
fn default_limit_indicators() -> usize {
    6
}
fn default_limit_resources() -> usize {
    3
}
fn default_fallback_scan() -> usize {
    100
}
fn default_usage_window() -> i64 {
    30
}
fn default_struggling_limit() -> usize {
    5
}
fn default_data_path() -> PathBuf {
    PathBuf::from("mastery-data.json")
}

impl Default for MasteryConfig {
    fn default() -> Self {
        Self {
            default_score: default_score(),
            reinforcement_threshold: default_threshold(),
            staleness_days: default_staleness_days(),
            limit_indicators: default_limit_indicators(),
            limit_resources: default_limit_resources(),
            fallback_attempt_scan: default_fallback_scan(),
            ranking: RankingKind::default(),
            usage_window_days: default_usage_window(),
            utc_offset_minutes: 0,
            struggling_limit: default_struggling_limit(),
            data_path: default_data_path(),
        }
    }
}

impl MasteryConfig {
    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            (0.0..=100.0).contains(&self.default_score),
            "default_score must be between 0 and 100"
        );
        anyhow::ensure!(
            (0.0..=100.0).contains(&self.reinforcement_threshold),
            "reinforcement_threshold must be between 0 and 100"
        );
        anyhow::ensure!(
            (0..=MAX_STALENESS_DAYS).contains(&self.staleness_days),
            "staleness_days must be between 0 and {MAX_STALENESS_DAYS}"
        );
        anyhow::ensure!(self.limit_indicators >= 1, "limit_indicators must be at least 1");
        anyhow::ensure!(self.limit_resources >= 1, "limit_resources must be at least 1");
        anyhow::ensure!(
            (1..=MAX_USAGE_WINDOW_DAYS).contains(&self.usage_window_days),
            "usage_window_days must be between 1 and {MAX_USAGE_WINDOW_DAYS}"
        );
        anyhow::ensure!(
            self.utc_offset_minutes.abs() < 24 * 60,
            "utc_offset_minutes must be within one day"
        );
        Ok(())
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `mastery.toml` in the current directory
/// 2. `~/.config/mastery/config.toml`
///
/// Environment variable overrides: `MASTERY_DATA`, `MASTERY_STALENESS_DAYS`,
/// `MASTERY_DEFAULT_SCORE`.
pub fn load_config() -> Result<MasteryConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<MasteryConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("mastery.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => MasteryConfig::default(),
    };

    if let Ok(data) = std::env::var("MASTERY_DATA") {
        config.data_path = PathBuf::from(data);
    }
    if let Ok(days) = std::env::var("MASTERY_STALENESS_DAYS") {
        config.staleness_days = days
            .trim()
            .parse()
            .with_context(|| format!("invalid MASTERY_STALENESS_DAYS: '{days}'"))?;
    }
    if let Ok(score) = std::env::var("MASTERY_DEFAULT_SCORE") {
        config.default_score = score
            .trim()
            .parse()
            .with_context(|| format!("invalid MASTERY_DEFAULT_SCORE: '{score}'"))?;
    }

    config.validate()?;
    Ok(config)
}

/// Parse a TOML string into a config (useful for testing).
pub fn parse_config(content: &str) -> Result<MasteryConfig> {
    let config: MasteryConfig = toml::from_str(content)?;
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("mastery"))
}
