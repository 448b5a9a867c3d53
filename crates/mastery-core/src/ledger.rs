//! Attempt ledger.
//!
//! Start, complete, and abandon all go through [`AttemptLedger::upsert_attempt`],
//! which either transitions an existing attempt or records a new one, then
//! recomputes the pair's summary before returning.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{MasteryError, Result};
use crate::ids::RecordId;
use crate::model::{
    AbandonAttemptRequest, Attempt, AttemptFilter, AttemptStatus, CompleteAttemptRequest,
    StartAttemptRequest,
};
use crate::progress::ProgressAggregator;
use crate::traits::{AttemptStore, CatalogSource, Clock};

/// Which attempt a transition applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptCriteria {
    /// An existing attempt.
    ById(RecordId),
    /// A new attempt created directly in the target state.
    New,
}

/// The state change to apply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    Start,
    Complete {
        score: f64,
        duration_seconds: Option<u64>,
    },
    Abandon,
}

impl Transition {
    fn status(&self) -> AttemptStatus {
        match self {
            Transition::Start => AttemptStatus::InProgress,
            Transition::Complete { .. } => AttemptStatus::Completed,
            Transition::Abandon => AttemptStatus::Abandoned,
        }
    }
}

/// Identity of the attempt being written.
#[derive(Debug, Clone, Copy)]
pub struct AttemptKey {
    pub student_id: RecordId,
    pub indicator_id: RecordId,
    pub resource_id: Option<RecordId>,
}

type PairKey = (RecordId, RecordId);
type PairLock = Arc<tokio::sync::Mutex<()>>;

/// Async write locks keyed by (student, indicator).
///
/// An entry lives only while some writer holds or waits on it.
#[derive(Default)]
struct PairLocks {
    locks: Mutex<HashMap<PairKey, PairLock>>,
}

impl PairLocks {
    fn acquire(&self, key: PairKey) -> PairLock {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(key)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn release(&self, key: PairKey, lock: PairLock) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Only the map and `lock` still own it.
        let idle = locks
            .get(&key)
            .is_some_and(|held| Arc::ptr_eq(held, &lock) && Arc::strong_count(&lock) == 2);
        if idle {
            locks.remove(&key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Records attempts and keeps their progress summaries current.
pub struct AttemptLedger {
    attempts: Arc<dyn AttemptStore>,
    catalog: Arc<dyn CatalogSource>,
    aggregator: Arc<ProgressAggregator>,
    clock: Arc<dyn Clock>,
    default_score: f64,
    pair_locks: PairLocks,
}

impl AttemptLedger {
    pub fn new(
        attempts: Arc<dyn AttemptStore>,
        catalog: Arc<dyn CatalogSource>,
        aggregator: Arc<ProgressAggregator>,
        clock: Arc<dyn Clock>,
        default_score: f64,
    ) -> Self {
        Self {
            attempts,
            catalog,
            aggregator,
            clock,
            default_score,
            pair_locks: PairLocks::default(),
        }
    }

    pub async fn start_attempt(&self, request: &StartAttemptRequest) -> Result<Attempt> {
        let key = parse_key(
            request.student_id.as_deref(),
            request.indicator_id.as_deref(),
            request.resource_id.as_deref(),
        )?;
        self.upsert_attempt(key, AttemptCriteria::New, Transition::Start)
            .await
    }

    pub async fn complete_attempt(&self, request: &CompleteAttemptRequest) -> Result<Attempt> {
        let key = parse_key(
            request.student_id.as_deref(),
            request.indicator_id.as_deref(),
            request.resource_id.as_deref(),
        )?;
        let criteria = parse_criteria(request.attempt_id.as_deref())?;
        let score = request.score.unwrap_or(self.default_score);
        if !score.is_finite() || !(0.0..=100.0).contains(&score) {
            return Err(MasteryError::Validation(format!(
                "score must be between 0 and 100, got {score}"
            )));
        }
        let transition = Transition::Complete {
            score,
            duration_seconds: request.duration_seconds,
        };
        self.upsert_attempt(key, criteria, transition).await
    }

    pub async fn abandon_attempt(&self, request: &AbandonAttemptRequest) -> Result<Attempt> {
        let key = parse_key(
            request.student_id.as_deref(),
            request.indicator_id.as_deref(),
            request.resource_id.as_deref(),
        )?;
        let criteria = parse_criteria(request.attempt_id.as_deref())?;
        self.upsert_attempt(key, criteria, Transition::Abandon)
            .await
    }

    /// Apply `transition` to the attempt selected by `criteria`, then
    /// recompute the affected summary.
    pub async fn upsert_attempt(
        &self,
        key: AttemptKey,
        criteria: AttemptCriteria,
        transition: Transition,
    ) -> Result<Attempt> {
        let pair = (key.student_id, key.indicator_id);
        let lock = self.pair_locks.acquire(pair);
        let result = {
            let _guard = lock.lock().await;
            self.write_and_recompute(key, criteria, transition).await
        };
        self.pair_locks.release(pair, lock);
        result
    }

    async fn write_and_recompute(
        &self,
        key: AttemptKey,
        criteria: AttemptCriteria,
        transition: Transition,
    ) -> Result<Attempt> {
        let now = self.clock.now();

        let attempt = match criteria {
            AttemptCriteria::New => {
                if self.catalog.indicator(key.indicator_id).await?.is_none() {
                    return Err(MasteryError::not_found("indicator", key.indicator_id));
                }
                let mut attempt = Attempt {
                    id: RecordId::new(),
                    student_id: key.student_id,
                    indicator_id: key.indicator_id,
                    resource_id: key.resource_id,
                    status: transition.status(),
                    score: None,
                    duration_seconds: 0,
                    started_at: now,
                    finished_at: None,
                    created_at: now,
                    updated_at: None,
                };
                apply(&mut attempt, transition, now);
                self.attempts.insert_attempt(&attempt).await?;
                attempt
            }
            AttemptCriteria::ById(id) => {
                let mut attempt = self
                    .attempts
                    .get_attempt(id)
                    .await?
                    .filter(|a| {
                        a.student_id == key.student_id && a.indicator_id == key.indicator_id
                    })
                    .ok_or_else(|| MasteryError::not_found("attempt", id))?;
                if attempt.resource_id.is_none() {
                    attempt.resource_id = key.resource_id;
                }
                apply(&mut attempt, transition, now);
                attempt.updated_at = Some(now);
                if !self.attempts.update_attempt(&attempt).await? {
                    return Err(MasteryError::not_found("attempt", id));
                }
                attempt
            }
        };

        tracing::info!(
            attempt = %attempt.id,
            student = %attempt.student_id,
            indicator = %attempt.indicator_id,
            status = %attempt.status,
            "attempt recorded"
        );

        self.aggregator
            .recompute(attempt.student_id, attempt.indicator_id)
            .await?;
        Ok(attempt)
    }

    /// Attempts matching the filter, newest first.
    pub async fn list_attempts(&self, filter: &AttemptFilter) -> Result<Vec<Attempt>> {
        Ok(self.attempts.list_attempts(filter).await?)
    }
}

fn apply(attempt: &mut Attempt, transition: Transition, now: chrono::DateTime<chrono::Utc>) {
    attempt.status = transition.status();
    match transition {
        Transition::Start => {}
        Transition::Complete {
            score,
            duration_seconds,
        } => {
            attempt.score = Some(score);
            if let Some(seconds) = duration_seconds {
                attempt.duration_seconds = seconds;
            }
            attempt.finished_at = Some(now);
        }
        Transition::Abandon => {
            attempt.finished_at = Some(now);
        }
    }
}

fn parse_key(
    student_id: Option<&str>,
    indicator_id: Option<&str>,
    resource_id: Option<&str>,
) -> Result<AttemptKey> {
    Ok(AttemptKey {
        student_id: RecordId::parse_field("student_id", student_id)?,
        indicator_id: RecordId::parse_field("indicator_id", indicator_id)?,
        resource_id: RecordId::parse_optional_field("resource_id", resource_id)?,
    })
}

fn parse_criteria(attempt_id: Option<&str>) -> Result<AttemptCriteria> {
    Ok(RecordId::parse_optional_field("attempt_id", attempt_id)?
        .map(AttemptCriteria::ById)
        .unwrap_or(AttemptCriteria::New))
}
