//! In-process storage over a [`Dataset`].

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use mastery_core::ids::RecordId;
use mastery_core::model::{
    Area, Attempt, AttemptFilter, Competency, Indicator, ProgressSummary, Resource, Student,
    Teacher,
};
use mastery_core::traits::{
    AttemptStore, CatalogSource, ProgressStore, ResourceQuery, RosterSource, StoreResult,
};

use crate::snapshot::Dataset;

/// A store that keeps the whole dataset in memory behind one lock.
///
/// Implements every core storage seam, so a single instance can back an
/// engine through [`Stores::uniform`](mastery_core::traits::Stores::uniform).
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<Dataset>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dataset(dataset: Dataset) -> Self {
        Self {
            data: RwLock::new(dataset),
        }
    }

    /// Open a JSON snapshot, starting empty if the file does not exist.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::from_dataset(Dataset::load_or_default(path)?))
    }

    /// A copy of the current contents.
    pub async fn snapshot(&self) -> Dataset {
        self.data.read().await.clone()
    }

    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        let dataset = self.snapshot().await;
        dataset.save_json(path)
    }

    /// Mutate the dataset directly, for seeding reference data.
    pub async fn edit<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut Dataset) -> T,
    {
        let mut guard = self.data.write().await;
        f(&mut guard)
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn insert_attempt(&self, attempt: &Attempt) -> StoreResult<()> {
        self.data.write().await.attempts.push(attempt.clone());
        Ok(())
    }

    async fn update_attempt(&self, attempt: &Attempt) -> StoreResult<bool> {
        let mut data = self.data.write().await;
        match data.attempts.iter_mut().find(|a| a.id == attempt.id) {
            Some(slot) => {
                *slot = attempt.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_attempt(&self, id: RecordId) -> StoreResult<Option<Attempt>> {
        let data = self.data.read().await;
        Ok(data.attempts.iter().find(|a| a.id == id).cloned())
    }

    async fn attempts_for_pair(
        &self,
        student_id: RecordId,
        indicator_id: RecordId,
    ) -> StoreResult<Vec<Attempt>> {
        let data = self.data.read().await;
        Ok(data
            .attempts
            .iter()
            .filter(|a| a.student_id == student_id && a.indicator_id == indicator_id)
            .cloned()
            .collect())
    }

    async fn list_attempts(&self, filter: &AttemptFilter) -> StoreResult<Vec<Attempt>> {
        let data = self.data.read().await;
        let mut attempts: Vec<Attempt> = data
            .attempts
            .iter()
            .filter(|a| filter.student_id.map_or(true, |s| a.student_id == s))
            .filter(|a| filter.indicator_id.map_or(true, |i| a.indicator_id == i))
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        if let Some(limit) = filter.limit {
            attempts.truncate(limit);
        }
        Ok(attempts)
    }

    async fn attempts_since(
        &self,
        student_ids: &[RecordId],
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<Attempt>> {
        let data = self.data.read().await;
        Ok(data
            .attempts
            .iter()
            .filter(|a| a.started_at >= since && student_ids.contains(&a.student_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn upsert_progress(&self, summary: &ProgressSummary) -> StoreResult<()> {
        let mut data = self.data.write().await;
        let existing = data.progress.iter_mut().find(|p| {
            p.student_id == summary.student_id && p.indicator_id == summary.indicator_id
        });
        match existing {
            Some(slot) => *slot = summary.clone(),
            None => data.progress.push(summary.clone()),
        }
        Ok(())
    }

    async fn progress_for_student(
        &self,
        student_id: RecordId,
    ) -> StoreResult<Vec<ProgressSummary>> {
        let data = self.data.read().await;
        Ok(data
            .progress
            .iter()
            .filter(|p| p.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn progress_for_students(
        &self,
        student_ids: &[RecordId],
    ) -> StoreResult<Vec<ProgressSummary>> {
        let data = self.data.read().await;
        Ok(data
            .progress
            .iter()
            .filter(|p| student_ids.contains(&p.student_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CatalogSource for MemoryStore {
    async fn indicator(&self, id: RecordId) -> StoreResult<Option<Indicator>> {
        let data = self.data.read().await;
        Ok(data.indicators.iter().find(|i| i.id == id).cloned())
    }

    async fn indicators(&self) -> StoreResult<Vec<Indicator>> {
        Ok(self.data.read().await.indicators.clone())
    }

    async fn area(&self, id: RecordId) -> StoreResult<Option<Area>> {
        let data = self.data.read().await;
        Ok(data.areas.iter().find(|a| a.id == id).cloned())
    }

    async fn areas(&self) -> StoreResult<Vec<Area>> {
        Ok(self.data.read().await.areas.clone())
    }

    async fn competencies(&self) -> StoreResult<Vec<Competency>> {
        Ok(self.data.read().await.competencies.clone())
    }

    async fn find_resources(&self, query: &ResourceQuery) -> StoreResult<Vec<Resource>> {
        let data = self.data.read().await;
        Ok(data
            .resources
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect())
    }

    async fn active_resources(&self) -> StoreResult<Vec<Resource>> {
        let data = self.data.read().await;
        Ok(data.resources.iter().filter(|r| r.active).cloned().collect())
    }
}

#[async_trait]
impl RosterSource for MemoryStore {
    async fn student(&self, id: RecordId) -> StoreResult<Option<Student>> {
        let data = self.data.read().await;
        Ok(data.students.iter().find(|s| s.id == id).cloned())
    }

    async fn students(&self) -> StoreResult<Vec<Student>> {
        Ok(self.data.read().await.students.clone())
    }

    async fn students_of_teacher(&self, teacher_id: RecordId) -> StoreResult<Vec<Student>> {
        let data = self.data.read().await;
        Ok(data
            .students
            .iter()
            .filter(|s| s.teacher_id == Some(teacher_id))
            .cloned()
            .collect())
    }

    async fn teacher(&self, id: RecordId) -> StoreResult<Option<Teacher>> {
        let data = self.data.read().await;
        Ok(data.teachers.iter().find(|t| t.id == id).cloned())
    }

    async fn teachers(&self) -> StoreResult<Vec<Teacher>> {
        Ok(self.data.read().await.teachers.clone())
    }
}
