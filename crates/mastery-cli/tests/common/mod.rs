//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use mastery_core::model::{
    Area, Competency, CompleteAttemptRequest, Indicator, Resource, StartAttemptRequest, Student,
    Teacher,
};
use mastery_core::traits::{FixedClock, Stores};
use mastery_core::{MasteryConfig, MasteryEngine, RecordId, StoredId};
use mastery_store::{Dataset, FaultyStore, MemoryStore};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub faulty: Arc<FaultyStore>,
    pub clock: Arc<FixedClock>,
    pub engine: MasteryEngine,
    pub area: RecordId,
    pub competency: RecordId,
    pub indicators: Vec<RecordId>,
    pub teacher: RecordId,
    pub student: RecordId,
}

impl Fixture {
    /// A catalog of `n` grade-5 indicators, one active resource each, and a
    /// single student. Every store call goes through a [`FaultyStore`].
    pub fn new(n: usize) -> Self {
        Self::with_config(n, MasteryConfig::default())
    }

    pub fn with_config(n: usize, config: MasteryConfig) -> Self {
        let area = RecordId::new();
        let competency = RecordId::new();
        let teacher = RecordId::new();
        let student = RecordId::new();
        let indicators: Vec<RecordId> = (0..n).map(|_| RecordId::new()).collect();

        let mut dataset = Dataset {
            areas: vec![Area {
                id: area,
                name: "Mathematics".into(),
            }],
            competencies: vec![Competency {
                id: competency,
                area_id: area,
                name: "Number sense".into(),
            }],
            teachers: vec![Teacher {
                id: teacher,
                name: "Ms. Rivera".into(),
            }],
            students: vec![Student {
                id: student,
                name: "Ana".into(),
                grade_code: Some("5".into()),
                teacher_id: Some(teacher),
            }],
            ..Default::default()
        };
        for (idx, id) in indicators.iter().enumerate() {
            dataset.indicators.push(indicator(*id, area, competency, &format!("M5.{idx}")));
            dataset.resources.push(resource(
                &format!("Resource for M5.{idx}"),
                Some(StoredId::native(*id)),
                vec![],
            ));
        }

        let store = Arc::new(MemoryStore::from_dataset(dataset));
        let faulty = Arc::new(FaultyStore::new(store.clone()));
        let clock = Arc::new(FixedClock::new(t0()));
        let engine =
            MasteryEngine::with_clock(Stores::uniform(faulty.clone()), config, clock.clone());
        Self {
            store,
            faulty,
            clock,
            engine,
            area,
            competency,
            indicators,
            teacher,
            student,
        }
    }

    pub fn ind(&self, n: usize) -> String {
        self.indicators[n].to_string()
    }

    pub fn sid(&self) -> String {
        self.student.to_string()
    }

    pub fn start(&self, indicator: usize) -> StartAttemptRequest {
        StartAttemptRequest {
            student_id: Some(self.sid()),
            indicator_id: Some(self.ind(indicator)),
            resource_id: None,
        }
    }

    pub fn complete(&self, indicator: usize, score: Option<f64>) -> CompleteAttemptRequest {
        CompleteAttemptRequest {
            student_id: Some(self.sid()),
            indicator_id: Some(self.ind(indicator)),
            score,
            ..Default::default()
        }
    }

    pub async fn add_resource(&self, resource: Resource) {
        self.store.edit(|d| d.resources.push(resource)).await;
    }

    pub async fn add_student(
        &self,
        name: &str,
        grade: Option<&str>,
        teacher: Option<RecordId>,
    ) -> RecordId {
        let id = RecordId::new();
        let student = Student {
            id,
            name: name.into(),
            grade_code: grade.map(str::to_string),
            teacher_id: teacher,
        };
        self.store.edit(|d| d.students.push(student)).await;
        id
    }
}

pub fn indicator(id: RecordId, area: RecordId, competency: RecordId, code: &str) -> Indicator {
    Indicator {
        id,
        area_id: area,
        competency_id: competency,
        grade_code: "5".into(),
        code: code.into(),
        description: String::new(),
    }
}

pub fn resource(title: &str, single: Option<StoredId>, many: Vec<StoredId>) -> Resource {
    Resource {
        id: RecordId::new(),
        indicator_id: single,
        indicator_ids: many,
        kind: "worksheet".into(),
        title: title.into(),
        url: format!("https://example.org/{}", title.replace(' ', "-")),
        provider: None,
        level: None,
        active: true,
    }
}
