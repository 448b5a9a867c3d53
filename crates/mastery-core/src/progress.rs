//! Progress aggregation.
//!
//! A summary is always a full fold over the current attempt set of its
//! pair, never a delta on the previous summary. Concurrent recomputations
//! may race on the upsert, but whichever lands last is consistent with
//! some complete attempt set.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::ids::RecordId;
use crate::model::{Attempt, AttemptFilter, AttemptStatus, ProgressState, ProgressSummary};
use crate::traits::{AttemptStore, ProgressStore};

/// Fold every attempt of a pair into its summary.
///
/// Attempts belonging to other pairs are ignored, so callers may pass a
/// superset.
pub fn fold_attempts(
    student_id: RecordId,
    indicator_id: RecordId,
    attempts: &[Attempt],
) -> ProgressSummary {
    let mut summary = ProgressSummary::empty(student_id, indicator_id);
    let mut score_sum = 0.0;
    let mut completed = 0u32;

    for attempt in attempts
        .iter()
        .filter(|a| a.student_id == student_id && a.indicator_id == indicator_id)
    {
        summary.total_attempts += 1;
        match attempt.status {
            AttemptStatus::Abandoned => summary.abandoned_attempts += 1,
            AttemptStatus::Completed => {
                completed += 1;
                score_sum += attempt.score.unwrap_or(0.0);
            }
            AttemptStatus::Pending | AttemptStatus::InProgress => {}
        }
        let touched = attempt.touched_at();
        if summary.last_attempt_at.map_or(true, |last| touched > last) {
            summary.last_attempt_at = Some(touched);
        }
    }

    if completed > 0 {
        summary.average_score = Some((score_sum / completed as f64).round());
        summary.state = ProgressState::Completed;
    } else if summary.total_attempts > 0 {
        summary.state = ProgressState::InProgress;
    }

    summary
}

/// Recomputes and persists progress summaries.
pub struct ProgressAggregator {
    attempts: Arc<dyn AttemptStore>,
    progress: Arc<dyn ProgressStore>,
}

impl ProgressAggregator {
    pub fn new(attempts: Arc<dyn AttemptStore>, progress: Arc<dyn ProgressStore>) -> Self {
        Self { attempts, progress }
    }

    /// Rebuild the summary of one pair from all of its attempts and upsert it.
    pub async fn recompute(
        &self,
        student_id: RecordId,
        indicator_id: RecordId,
    ) -> Result<ProgressSummary> {
        let attempts = self
            .attempts
            .attempts_for_pair(student_id, indicator_id)
            .await?;
        let summary = fold_attempts(student_id, indicator_id, &attempts);
        self.progress.upsert_progress(&summary).await?;
        tracing::debug!(
            student = %student_id,
            indicator = %indicator_id,
            state = %summary.state,
            total = summary.total_attempts,
            "recomputed progress summary"
        );
        Ok(summary)
    }

    /// Recompute every pair of a student that has attempts or a summary.
    ///
    /// Used to heal summaries after out-of-band writes to the ledger.
    pub async fn recompute_student(&self, student_id: RecordId) -> Result<Vec<ProgressSummary>> {
        let mut indicators: Vec<RecordId> = Vec::new();
        let mut seen = HashSet::new();

        for summary in self.progress.progress_for_student(student_id).await? {
            if seen.insert(summary.indicator_id) {
                indicators.push(summary.indicator_id);
            }
        }
        let filter = AttemptFilter {
            student_id: Some(student_id),
            ..Default::default()
        };
        let mut attempts = self.attempts.list_attempts(&filter).await?;
        // Oldest first so new pairs are appended in the order they were practiced.
        attempts.reverse();
        for attempt in &attempts {
            if seen.insert(attempt.indicator_id) {
                indicators.push(attempt.indicator_id);
            }
        }

        let mut summaries = Vec::with_capacity(indicators.len());
        for indicator_id in indicators {
            summaries.push(self.recompute(student_id, indicator_id).await?);
        }
        tracing::info!(student = %student_id, pairs = summaries.len(), "reconciled progress");
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + Duration::minutes(minutes)
    }

    fn attempt(
        student: RecordId,
        indicator: RecordId,
        status: AttemptStatus,
        score: Option<f64>,
        created: i64,
    ) -> Attempt {
        Attempt {
            id: RecordId::new(),
            student_id: student,
            indicator_id: indicator,
            resource_id: None,
            status,
            score,
            duration_seconds: 60,
            started_at: at(created),
            finished_at: None,
            created_at: at(created),
            updated_at: None,
        }
    }

    #[test]
    fn completed_and_abandoned_mix() {
        let (s, i) = (RecordId::new(), RecordId::new());
        let attempts = vec![
            attempt(s, i, AttemptStatus::Completed, Some(45.0), 0),
            attempt(s, i, AttemptStatus::Abandoned, None, 5),
        ];
        let summary = fold_attempts(s, i, &attempts);
        assert_eq!(summary.state, ProgressState::Completed);
        assert_eq!(summary.average_score, Some(45.0));
        assert_eq!(summary.total_attempts, 2);
        assert_eq!(summary.abandoned_attempts, 1);
        assert_eq!(summary.last_attempt_at, Some(at(5)));
    }

    #[test]
    fn zero_attempts_is_pending() {
        let (s, i) = (RecordId::new(), RecordId::new());
        let summary = fold_attempts(s, i, &[]);
        assert_eq!(summary, ProgressSummary::empty(s, i));
        assert_eq!(summary.state, ProgressState::Pending);
        assert!(summary.average_score.is_none());
        assert!(summary.last_attempt_at.is_none());
    }

    #[test]
    fn average_ignores_unfinished_attempts() {
        let (s, i) = (RecordId::new(), RecordId::new());
        let mut in_progress = attempt(s, i, AttemptStatus::InProgress, Some(5.0), 0);
        in_progress.updated_at = Some(at(30));
        let attempts = vec![
            in_progress,
            attempt(s, i, AttemptStatus::Abandoned, Some(10.0), 1),
            attempt(s, i, AttemptStatus::Completed, Some(70.0), 2),
            attempt(s, i, AttemptStatus::Completed, Some(75.0), 3),
        ];
        let summary = fold_attempts(s, i, &attempts);
        // (70 + 75) / 2 = 72.5 rounds half away from zero.
        assert_eq!(summary.average_score, Some(73.0));
        assert_eq!(summary.last_attempt_at, Some(at(30)));
    }

    #[test]
    fn in_progress_without_completion() {
        let (s, i) = (RecordId::new(), RecordId::new());
        let attempts = vec![
            attempt(s, i, AttemptStatus::InProgress, None, 0),
            attempt(s, i, AttemptStatus::Abandoned, None, 1),
        ];
        let summary = fold_attempts(s, i, &attempts);
        assert_eq!(summary.state, ProgressState::InProgress);
        assert!(summary.average_score.is_none());
    }

    #[test]
    fn fold_is_order_independent() {
        let (s, i) = (RecordId::new(), RecordId::new());
        let mut attempts = vec![
            attempt(s, i, AttemptStatus::Completed, Some(90.0), 0),
            attempt(s, i, AttemptStatus::Abandoned, None, 9),
            attempt(s, i, AttemptStatus::Completed, Some(40.0), 4),
        ];
        let forward = fold_attempts(s, i, &attempts);
        attempts.reverse();
        let backward = fold_attempts(s, i, &attempts);
        assert_eq!(
            serde_json::to_string(&forward).unwrap(),
            serde_json::to_string(&backward).unwrap()
        );
    }

    #[test]
    fn other_pairs_are_ignored() {
        let (s, i) = (RecordId::new(), RecordId::new());
        let attempts = vec![
            attempt(s, RecordId::new(), AttemptStatus::Completed, Some(10.0), 0),
            attempt(RecordId::new(), i, AttemptStatus::Completed, Some(10.0), 0),
        ];
        assert_eq!(fold_attempts(s, i, &attempts), ProgressSummary::empty(s, i));
    }
}
