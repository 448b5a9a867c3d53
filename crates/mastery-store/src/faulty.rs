//! Fault-injecting store wrapper for testing failure paths.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use mastery_core::ids::RecordId;
use mastery_core::model::{
    Area, Attempt, AttemptFilter, Competency, Indicator, ProgressSummary, Resource, Student,
    Teacher,
};
use mastery_core::traits::{
    AttemptStore, CatalogSource, ProgressStore, ResourceQuery, RosterSource, StoreResult,
};
use mastery_core::StoreError;

use crate::memory::MemoryStore;

/// A storage operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    InsertAttempt,
    UpdateAttempt,
    GetAttempt,
    AttemptsForPair,
    ListAttempts,
    AttemptsSince,
    UpsertProgress,
    ProgressForStudent,
    ProgressForStudents,
    Indicator,
    Indicators,
    Area,
    Areas,
    Competencies,
    FindResources,
    ActiveResources,
    Student,
    Students,
    StudentsOfTeacher,
    Teacher,
    Teachers,
}

/// Wraps a [`MemoryStore`] and fails selected operations with
/// [`StoreError::Unavailable`]. Counts every call, failed or not.
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    failing: Mutex<HashSet<StoreOp>>,
    calls: Mutex<HashMap<StoreOp, u32>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &Arc<MemoryStore> {
        &self.inner
    }

    /// Make `op` fail until [`heal`](Self::heal) is called.
    pub fn fail(&self, op: StoreOp) {
        self.failing.lock().unwrap_or_else(|e| e.into_inner()).insert(op);
    }

    pub fn heal(&self, op: StoreOp) {
        self.failing.lock().unwrap_or_else(|e| e.into_inner()).remove(&op);
    }

    /// Number of times `op` was invoked.
    pub fn call_count(&self, op: StoreOp) -> u32 {
        let calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        calls.get(&op).copied().unwrap_or(0)
    }

    fn check(&self, op: StoreOp) -> StoreResult<()> {
        *self
            .calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(op)
            .or_insert(0) += 1;
        let failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        if failing.contains(&op) {
            return Err(StoreError::Unavailable(format!("injected failure in {op:?}")));
        }
        Ok(())
    }
}

#[async_trait]
impl AttemptStore for FaultyStore {
    async fn insert_attempt(&self, attempt: &Attempt) -> StoreResult<()> {
        self.check(StoreOp::InsertAttempt)?;
        self.inner.insert_attempt(attempt).await
    }

    async fn update_attempt(&self, attempt: &Attempt) -> StoreResult<bool> {
        self.check(StoreOp::UpdateAttempt)?;
        self.inner.update_attempt(attempt).await
    }

    async fn get_attempt(&self, id: RecordId) -> StoreResult<Option<Attempt>> {
        self.check(StoreOp::GetAttempt)?;
        self.inner.get_attempt(id).await
    }

    async fn attempts_for_pair(
        &self,
        student_id: RecordId,
        indicator_id: RecordId,
    ) -> StoreResult<Vec<Attempt>> {
        self.check(StoreOp::AttemptsForPair)?;
        self.inner.attempts_for_pair(student_id, indicator_id).await
    }

    async fn list_attempts(&self, filter: &AttemptFilter) -> StoreResult<Vec<Attempt>> {
        self.check(StoreOp::ListAttempts)?;
        self.inner.list_attempts(filter).await
    }

    async fn attempts_since(
        &self,
        student_ids: &[RecordId],
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<Attempt>> {
        self.check(StoreOp::AttemptsSince)?;
        self.inner.attempts_since(student_ids, since).await
    }
}

#[async_trait]
impl ProgressStore for FaultyStore {
    async fn upsert_progress(&self, summary: &ProgressSummary) -> StoreResult<()> {
        self.check(StoreOp::UpsertProgress)?;
        self.inner.upsert_progress(summary).await
    }

    async fn progress_for_student(
        &self,
        student_id: RecordId,
    ) -> StoreResult<Vec<ProgressSummary>> {
        self.check(StoreOp::ProgressForStudent)?;
        self.inner.progress_for_student(student_id).await
    }

    async fn progress_for_students(
        &self,
        student_ids: &[RecordId],
    ) -> StoreResult<Vec<ProgressSummary>> {
        self.check(StoreOp::ProgressForStudents)?;
        self.inner.progress_for_students(student_ids).await
    }
}

#[async_trait]
impl CatalogSource for FaultyStore {
    async fn indicator(&self, id: RecordId) -> StoreResult<Option<Indicator>> {
        self.check(StoreOp::Indicator)?;
        self.inner.indicator(id).await
    }

    async fn indicators(&self) -> StoreResult<Vec<Indicator>> {
        self.check(StoreOp::Indicators)?;
        self.inner.indicators().await
    }

    async fn area(&self, id: RecordId) -> StoreResult<Option<Area>> {
        self.check(StoreOp::Area)?;
        self.inner.area(id).await
    }

    async fn areas(&self) -> StoreResult<Vec<Area>> {
        self.check(StoreOp::Areas)?;
        self.inner.areas().await
    }

    async fn competencies(&self) -> StoreResult<Vec<Competency>> {
        self.check(StoreOp::Competencies)?;
        self.inner.competencies().await
    }

    async fn find_resources(&self, query: &ResourceQuery) -> StoreResult<Vec<Resource>> {
        self.check(StoreOp::FindResources)?;
        self.inner.find_resources(query).await
    }

    async fn active_resources(&self) -> StoreResult<Vec<Resource>> {
        self.check(StoreOp::ActiveResources)?;
        self.inner.active_resources().await
    }
}

#[async_trait]
impl RosterSource for FaultyStore {
    async fn student(&self, id: RecordId) -> StoreResult<Option<Student>> {
        self.check(StoreOp::Student)?;
        self.inner.student(id).await
    }

    async fn students(&self) -> StoreResult<Vec<Student>> {
        self.check(StoreOp::Students)?;
        self.inner.students().await
    }

    async fn students_of_teacher(&self, teacher_id: RecordId) -> StoreResult<Vec<Student>> {
        self.check(StoreOp::StudentsOfTeacher)?;
        self.inner.students_of_teacher(teacher_id).await
    }

    async fn teacher(&self, id: RecordId) -> StoreResult<Option<Teacher>> {
        self.check(StoreOp::Teacher)?;
        self.inner.teacher(id).await
    }

    async fn teachers(&self) -> StoreResult<Vec<Teacher>> {
        self.check(StoreOp::Teachers)?;
        self.inner.teachers().await
    }
}
