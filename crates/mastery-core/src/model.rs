//! Core data model types for mastery.
//!
//! Attempts are the raw event log; progress summaries are derived from them.
//! Indicators, resources, and roster entries are reference data owned by
//! other systems and only read here.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{RecordId, StoredId};

// ---------------------------------------------------------------------------
// Attempt ledger
// ---------------------------------------------------------------------------

/// Lifecycle status of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    InProgress,
    Completed,
    Abandoned,
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptStatus::Pending => write!(f, "pending"),
            AttemptStatus::InProgress => write!(f, "in_progress"),
            AttemptStatus::Completed => write!(f, "completed"),
            AttemptStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// One recorded try by a student at an indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: RecordId,
    pub student_id: RecordId,
    pub indicator_id: RecordId,
    #[serde(default)]
    pub resource_id: Option<RecordId>,
    pub status: AttemptStatus,
    /// Score in `[0, 100]`, set on completion.
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub duration_seconds: u64,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Attempt {
    /// Timestamp of the most recent write to this attempt.
    pub fn touched_at(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }
}

/// Filter for listing attempts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttemptFilter {
    #[serde(default)]
    pub student_id: Option<RecordId>,
    #[serde(default)]
    pub indicator_id: Option<RecordId>,
    #[serde(default)]
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Progress summaries
// ---------------------------------------------------------------------------

/// Mastery state of a (student, indicator) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    Pending,
    InProgress,
    Completed,
}

impl fmt::Display for ProgressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressState::Pending => write!(f, "pending"),
            ProgressState::InProgress => write!(f, "in_progress"),
            ProgressState::Completed => write!(f, "completed"),
        }
    }
}

/// Derived per-(student, indicator) summary, recomputed from attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub student_id: RecordId,
    pub indicator_id: RecordId,
    pub state: ProgressState,
    /// Rounded mean score over completed attempts only.
    pub average_score: Option<f64>,
    pub total_attempts: u32,
    pub abandoned_attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl ProgressSummary {
    /// The summary of a pair with no attempts.
    pub fn empty(student_id: RecordId, indicator_id: RecordId) -> Self {
        Self {
            student_id,
            indicator_id,
            state: ProgressState::Pending,
            average_score: None,
            total_attempts: 0,
            abandoned_attempts: 0,
            last_attempt_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog and roster (read-only reference data)
// ---------------------------------------------------------------------------

/// An atomic curriculum learning objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub id: RecordId,
    pub area_id: RecordId,
    pub competency_id: RecordId,
    pub grade_code: String,
    pub code: String,
    #[serde(default)]
    pub description: String,
}

/// A curriculum area (subject).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub id: RecordId,
    pub name: String,
}

/// A competency inside an area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competency {
    pub id: RecordId,
    pub area_id: RecordId,
    pub name: String,
}

/// A learning resource linked to one or more indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: RecordId,
    #[serde(default)]
    pub indicator_id: Option<StoredId>,
    #[serde(default)]
    pub indicator_ids: Vec<StoredId>,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    /// Soft-delete flag; a missing value means active.
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Resource {
    /// Every indicator reference on this resource, single-valued field first.
    pub fn indicator_refs(&self) -> impl Iterator<Item = &StoredId> {
        self.indicator_id.iter().chain(self.indicator_ids.iter())
    }
}

fn default_true() -> bool {
    true
}

/// A student as seen by the roster service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub grade_code: Option<String>,
    #[serde(default)]
    pub teacher_id: Option<RecordId>,
}

/// A teacher as seen by the roster service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: RecordId,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

/// Why an indicator is recommended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// Not yet mastered or scoring poorly.
    Reinforcement,
    /// Mastered but stale.
    Review,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Reinforcement => write!(f, "reinforcement"),
            Reason::Review => write!(f, "review"),
        }
    }
}

/// A recommended indicator with its matched resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub indicator_id: RecordId,
    pub reason: Reason,
    #[serde(default)]
    pub indicator_code: Option<String>,
    #[serde(default)]
    pub average_score: Option<f64>,
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub resources: Vec<Resource>,
}

/// Ranking policy name as it appears in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingKind {
    #[default]
    Insertion,
    LowestScore,
}

impl FromStr for RankingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "insertion" => Ok(RankingKind::Insertion),
            "lowest_score" | "lowest-score" => Ok(RankingKind::LowestScore),
            other => Err(format!("unknown ranking policy: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Boundary requests
// ---------------------------------------------------------------------------

/// Start an attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartAttemptRequest {
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub indicator_id: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
}

/// Complete an attempt, either an existing one or a new one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteAttemptRequest {
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub indicator_id: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub attempt_id: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub duration_seconds: Option<u64>,
}

/// Abandon an attempt, either an existing one or a new one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AbandonAttemptRequest {
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub indicator_id: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub attempt_id: Option<String>,
}

/// Ask for recommendations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub limit_indicators: Option<usize>,
    #[serde(default)]
    pub limit_resources: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serde_is_snake_case() {
        let json = serde_json::to_string(&AttemptStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(AttemptStatus::Abandoned.to_string(), "abandoned");
        assert_eq!(ProgressState::Completed.to_string(), "completed");
    }

    #[test]
    fn resource_defaults_to_active() {
        let json = r#"{
            "id": "00000000-0000-0000-0000-000000000001",
            "indicator_ids": ["00000000-0000-0000-0000-000000000002"],
            "type": "video",
            "title": "Fractions",
            "url": "https://example.org/fractions"
        }"#;
        let resource: Resource = serde_json::from_str(json).unwrap();
        assert!(resource.active);
        assert!(resource.indicator_id.is_none());
        assert_eq!(resource.indicator_refs().count(), 1);
        assert_eq!(resource.kind, "video");
    }

    #[test]
    fn ranking_kind_parse() {
        assert_eq!("insertion".parse::<RankingKind>().unwrap(), RankingKind::Insertion);
        assert_eq!(
            "Lowest-Score".parse::<RankingKind>().unwrap(),
            RankingKind::LowestScore
        );
        assert!("severity".parse::<RankingKind>().is_err());
    }

    #[test]
    fn touched_at_prefers_updated() {
        let created = Utc::now();
        let later = created + chrono::Duration::minutes(5);
        let mut attempt = Attempt {
            id: RecordId::new(),
            student_id: RecordId::new(),
            indicator_id: RecordId::new(),
            resource_id: None,
            status: AttemptStatus::InProgress,
            score: None,
            duration_seconds: 0,
            started_at: created,
            finished_at: None,
            created_at: created,
            updated_at: None,
        };
        assert_eq!(attempt.touched_at(), created);
        attempt.updated_at = Some(later);
        assert_eq!(attempt.touched_at(), later);
    }
}
