//! Storage and clock seams.
//!
//! The engine only talks to persistence through these async traits, which
//! are implemented by the `mastery-store` crate.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ids::{RecordId, StoredId};
use crate::model::{
    Area, Attempt, AttemptFilter, Competency, Indicator, ProgressSummary, Resource, Student,
    Teacher,
};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Attempt ledger storage
// ---------------------------------------------------------------------------

/// Append-mostly storage for attempts.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Persist a new attempt.
    async fn insert_attempt(&self, attempt: &Attempt) -> StoreResult<()>;

    /// Replace an existing attempt by id. Returns `false` if it does not exist.
    async fn update_attempt(&self, attempt: &Attempt) -> StoreResult<bool>;

    async fn get_attempt(&self, id: RecordId) -> StoreResult<Option<Attempt>>;

    /// Every attempt for one (student, indicator) pair, in any order.
    async fn attempts_for_pair(
        &self,
        student_id: RecordId,
        indicator_id: RecordId,
    ) -> StoreResult<Vec<Attempt>>;

    /// Attempts matching the filter, newest `started_at` first.
    async fn list_attempts(&self, filter: &AttemptFilter) -> StoreResult<Vec<Attempt>>;

    /// Attempts of any of `student_ids` started at or after `since`.
    async fn attempts_since(
        &self,
        student_ids: &[RecordId],
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<Attempt>>;
}

// ---------------------------------------------------------------------------
// Progress summary storage
// ---------------------------------------------------------------------------

/// Keyed storage for derived progress summaries.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Insert or replace the summary keyed by `(student_id, indicator_id)`.
    async fn upsert_progress(&self, summary: &ProgressSummary) -> StoreResult<()>;

    /// All summaries of one student, in first-insertion order.
    async fn progress_for_student(&self, student_id: RecordId)
        -> StoreResult<Vec<ProgressSummary>>;

    /// All summaries of the given students.
    async fn progress_for_students(
        &self,
        student_ids: &[RecordId],
    ) -> StoreResult<Vec<ProgressSummary>>;
}

// ---------------------------------------------------------------------------
// Catalog and roster (read-only)
// ---------------------------------------------------------------------------

/// Direct resource lookup: active resources whose `indicator_id` or any
/// element of `indicator_ids` is exactly one of `any_of`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceQuery {
    pub any_of: Vec<StoredId>,
}

impl ResourceQuery {
    pub fn for_indicators(ids: &[RecordId]) -> Self {
        Self {
            any_of: ids.iter().flat_map(|id| StoredId::encodings_of(*id)).collect(),
        }
    }

    /// Exact-match evaluation, for backends without a native query engine.
    pub fn matches(&self, resource: &Resource) -> bool {
        resource.active && resource.indicator_refs().any(|r| self.any_of.contains(r))
    }
}

/// Curriculum and resource catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn indicator(&self, id: RecordId) -> StoreResult<Option<Indicator>>;

    async fn indicators(&self) -> StoreResult<Vec<Indicator>>;

    async fn area(&self, id: RecordId) -> StoreResult<Option<Area>>;

    async fn areas(&self) -> StoreResult<Vec<Area>>;

    async fn competencies(&self) -> StoreResult<Vec<Competency>>;

    /// Indexed lookup; see [`ResourceQuery`].
    async fn find_resources(&self, query: &ResourceQuery) -> StoreResult<Vec<Resource>>;

    /// Every resource with `active = true`.
    async fn active_resources(&self) -> StoreResult<Vec<Resource>>;
}

/// Identity and role directory.
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn student(&self, id: RecordId) -> StoreResult<Option<Student>>;

    async fn students(&self) -> StoreResult<Vec<Student>>;

    async fn students_of_teacher(&self, teacher_id: RecordId) -> StoreResult<Vec<Student>>;

    async fn teacher(&self, id: RecordId) -> StoreResult<Option<Teacher>>;

    async fn teachers(&self) -> StoreResult<Vec<Teacher>>;
}

/// The four collaborators the engine is wired with.
#[derive(Clone)]
pub struct Stores {
    pub attempts: Arc<dyn AttemptStore>,
    pub progress: Arc<dyn ProgressStore>,
    pub catalog: Arc<dyn CatalogSource>,
    pub roster: Arc<dyn RosterSource>,
}

impl Stores {
    /// Wire every seam to the same backend.
    pub fn uniform<S>(store: Arc<S>) -> Self
    where
        S: AttemptStore + ProgressStore + CatalogSource + RosterSource + 'static,
    {
        Self {
            attempts: store.clone(),
            progress: store.clone(),
            catalog: store.clone(),
            roster: store,
        }
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually driven clock for tests and replays.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(single: Option<StoredId>, many: Vec<StoredId>, active: bool) -> Resource {
        Resource {
            id: RecordId::new(),
            indicator_id: single,
            indicator_ids: many,
            kind: "video".into(),
            title: "t".into(),
            url: "u".into(),
            provider: None,
            level: None,
            active,
        }
    }

    #[test]
    fn query_tries_both_encodings() {
        let id = RecordId::new();
        let query = ResourceQuery::for_indicators(&[id]);
        assert_eq!(query.any_of.len(), 2);

        assert!(query.matches(&resource(Some(StoredId::native(id)), vec![], true)));
        assert!(query.matches(&resource(None, vec![StoredId::text(id.to_string())], true)));
        assert!(!query.matches(&resource(Some(StoredId::native(id)), vec![], false)));
        // Exact matching does not normalize case.
        let upper = StoredId::text(id.to_string().to_uppercase());
        assert!(!query.matches(&resource(None, vec![upper], true)));
    }

    #[test]
    fn fixed_clock_advances() {
        let start = Utc::now();
        let clock = FixedClock::new(start);
        clock.advance(Duration::days(2));
        assert_eq!(clock.now(), start + Duration::days(2));
        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
