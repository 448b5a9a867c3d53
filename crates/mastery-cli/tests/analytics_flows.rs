//! Analytics over engine-recorded activity, including degraded sources.

mod common;

use chrono::{Duration, NaiveDate, TimeZone, Utc};

use common::{t0, Fixture};
use mastery_core::model::{AbandonAttemptRequest, CompleteAttemptRequest};
use mastery_core::{MasteryConfig, MasteryError, RecordId};
use mastery_store::StoreOp;

async fn complete(fx: &Fixture, student: RecordId, indicator: usize, score: f64, seconds: u64) {
    fx.engine
        .complete_attempt(&CompleteAttemptRequest {
            student_id: Some(student.to_string()),
            indicator_id: Some(fx.ind(indicator)),
            score: Some(score),
            duration_seconds: Some(seconds),
            ..Default::default()
        })
        .await
        .unwrap();
}

async fn abandon(fx: &Fixture, student: RecordId, indicator: usize) {
    fx.engine
        .abandon_attempt(&AbandonAttemptRequest {
            student_id: Some(student.to_string()),
            indicator_id: Some(fx.ind(indicator)),
            ..Default::default()
        })
        .await
        .unwrap();
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// --- Student view ---

#[tokio::test]
async fn student_view_formulas() {
    let fx = Fixture::new(4);
    complete(&fx, fx.student, 0, 90.0, 600).await;
    complete(&fx, fx.student, 1, 45.0, 300).await;
    abandon(&fx, fx.student, 2).await;
    fx.engine.start_attempt(&fx.start(3)).await.unwrap();

    let view = fx.engine.student_analytics(&fx.sid()).await.unwrap();
    assert_eq!(view.student_name.as_deref(), Some("Ana"));
    assert_eq!(view.grade_code.as_deref(), Some("5"));
    assert_eq!(view.coverage.completed, 2);
    assert_eq!(view.coverage.plan_total, 4);
    assert_eq!(view.coverage.percent, 50.0);
    assert_eq!(view.average_score, 67.5);
    assert_eq!(view.total_attempts, 4);
    assert_eq!(view.abandoned_attempts, 1);
    assert_eq!(view.dropout_rate, 25.0);
    assert_eq!(view.states.completed, 2);
    assert_eq!(view.states.in_progress, 2);

    assert_eq!(view.by_area.len(), 1);
    assert_eq!(view.by_area[0].name.as_deref(), Some("Mathematics"));
    assert_eq!(view.by_area[0].completed, 2);
    assert_eq!(view.by_competency[0].name.as_deref(), Some("Number sense"));

    assert_eq!(view.usage.window_days, 30);
    assert_eq!(view.usage.days.len(), 30);
    assert_eq!(view.usage.total_seconds, 900);
    assert_eq!(view.usage.streak_days, 1);
    assert_eq!(view.usage.days.last().unwrap().date, date(2026, 3, 2));
}

#[tokio::test]
async fn unvalidated_day_counts_are_clamped() {
    let config = MasteryConfig {
        staleness_days: i64::MAX,
        usage_window_days: i64::MAX - 807,
        ..Default::default()
    };
    let fx = Fixture::with_config(1, config);
    complete(&fx, fx.student, 0, 90.0, 120).await;

    let view = fx.engine.student_analytics(&fx.sid()).await.unwrap();
    assert_eq!(view.usage.window_days, 3_660);
    assert_eq!(view.usage.total_seconds, 120);

    let recs = fx
        .engine
        .recommendations(&mastery_core::model::RecommendationRequest {
            student_id: Some(fx.sid()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(recs.is_empty());
}

#[tokio::test]
async fn streak_counts_consecutive_days() {
    let fx = Fixture::new(1);
    for day in 0..3 {
        complete(&fx, fx.student, 0, 80.0, 60).await;
        if day < 2 {
            fx.clock.advance(Duration::days(1));
        }
    }
    let view = fx.engine.student_analytics(&fx.sid()).await.unwrap();
    assert_eq!(view.usage.streak_days, 3);
    assert_eq!(view.usage.total_seconds, 180);

    // Skip a day: the streak restarts from the latest active day.
    fx.clock.advance(Duration::days(2));
    complete(&fx, fx.student, 0, 80.0, 60).await;
    let view = fx.engine.student_analytics(&fx.sid()).await.unwrap();
    assert_eq!(view.usage.streak_days, 1);
}

#[tokio::test]
async fn usage_buckets_follow_local_offset() {
    let config = MasteryConfig {
        utc_offset_minutes: -300,
        ..Default::default()
    };
    let fx = Fixture::with_config(1, config);
    // 21:00 on March 1st, five hours behind UTC.
    fx.clock.set(Utc.with_ymd_and_hms(2026, 3, 2, 2, 0, 0).unwrap());
    complete(&fx, fx.student, 0, 80.0, 120).await;
    fx.clock.set(t0());

    let usage = fx.engine.student_analytics(&fx.sid()).await.unwrap().usage;
    let n = usage.days.len();
    assert_eq!(usage.days[n - 1].date, date(2026, 3, 2));
    assert_eq!(usage.days[n - 1].seconds, 0);
    assert_eq!(usage.days[n - 2].date, date(2026, 3, 1));
    assert_eq!(usage.days[n - 2].seconds, 120);
    assert_eq!(usage.streak_days, 1);
}

#[tokio::test]
async fn student_without_activity_renders_zeros() {
    let fx = Fixture::new(4);
    let stranger = RecordId::new().to_string();

    let view = fx.engine.student_analytics(&stranger).await.unwrap();
    assert_eq!(view.student_name, None);
    assert_eq!(view.coverage.plan_total, 4);
    assert_eq!(view.coverage.percent, 0.0);
    assert_eq!(view.average_score, 0.0);
    assert_eq!(view.dropout_rate, 0.0);
    assert_eq!(view.usage.total_seconds, 0);
    assert_eq!(view.usage.streak_days, 0);
}

#[tokio::test]
async fn malformed_ids_still_fail_loudly() {
    let fx = Fixture::new(1);
    let err = fx.engine.student_analytics("abc").await.unwrap_err();
    assert!(matches!(err, MasteryError::Validation(_)));
    let err = fx.engine.class_analytics("").await.unwrap_err();
    assert!(matches!(err, MasteryError::Validation(_)));
}

#[tokio::test]
async fn student_view_degrades_failed_sources() {
    let fx = Fixture::new(2);
    complete(&fx, fx.student, 0, 70.0, 100).await;

    for op in [
        StoreOp::Indicators,
        StoreOp::Areas,
        StoreOp::Competencies,
        StoreOp::AttemptsSince,
        StoreOp::Student,
    ] {
        fx.faulty.fail(op);
    }
    let view = fx.engine.student_analytics(&fx.sid()).await.unwrap();
    assert_eq!(view.student_name, None);
    assert_eq!(view.coverage.plan_total, 0);
    assert_eq!(view.coverage.percent, 0.0);
    assert!(view.by_area.is_empty());
    assert_eq!(view.usage.total_seconds, 0);
    // Summaries were still readable.
    assert_eq!(view.average_score, 70.0);

    fx.faulty.fail(StoreOp::ProgressForStudent);
    let view = fx.engine.student_analytics(&fx.sid()).await.unwrap();
    assert_eq!(view.average_score, 0.0);
    assert_eq!(view.total_attempts, 0);
}

// --- Class and institution views ---

#[tokio::test]
async fn class_view_pools_students() {
    let fx = Fixture::new(4);
    let ben = fx.add_student("Ben", Some("5"), Some(fx.teacher)).await;
    let _outsider = fx.add_student("Cy", None, None).await;

    complete(&fx, fx.student, 0, 90.0, 100).await;
    complete(&fx, ben, 0, 40.0, 200).await;
    abandon(&fx, ben, 1).await;

    let view = fx.engine.class_analytics(&fx.teacher.to_string()).await.unwrap();
    assert_eq!(view.teacher_name.as_deref(), Some("Ms. Rivera"));
    assert_eq!(view.student_count, 2);
    assert_eq!(view.students.len(), 2);
    assert_eq!(view.average_score, 65.0);
    assert_eq!(view.coverage.completed, 2);
    assert_eq!(view.coverage.plan_total, 8);
    assert_eq!(view.coverage.percent, 25.0);
    assert_eq!(view.dropout_rate, 33.33);
    assert_eq!(view.total_seconds, 300);

    let ben_row = view.students.iter().find(|r| r.name == "Ben").unwrap();
    assert_eq!(ben_row.dropout_rate, 50.0);
    assert_eq!(ben_row.total_seconds, 200);

    assert_eq!(view.struggling.len(), 1);
    assert_eq!(view.struggling[0].indicator_id, fx.indicators[0]);
    assert_eq!(view.struggling[0].code.as_deref(), Some("M5.0"));
    assert_eq!(view.struggling[0].students, 1);
    assert_eq!(view.struggling[0].average_score, 40.0);
}

#[tokio::test]
async fn empty_class_renders_zeros() {
    let fx = Fixture::new(2);
    let view = fx
        .engine
        .class_analytics(&RecordId::new().to_string())
        .await
        .unwrap();
    assert_eq!(view.teacher_name, None);
    assert_eq!(view.student_count, 0);
    assert!(view.students.is_empty());
    assert!(view.struggling.is_empty());
    assert_eq!(view.coverage.percent, 0.0);
    assert_eq!(view.average_score, 0.0);
    assert_eq!(view.dropout_rate, 0.0);
}

#[tokio::test]
async fn institution_view_groups_by_grade() {
    let fx = Fixture::new(4);
    let ben = fx.add_student("Ben", Some("5"), Some(fx.teacher)).await;
    fx.add_student("Cy", None, None).await;

    complete(&fx, fx.student, 0, 90.0, 100).await;
    complete(&fx, ben, 0, 40.0, 200).await;

    let view = fx.engine.institution_analytics().await.unwrap();
    assert_eq!(view.student_count, 3);
    assert_eq!(view.teacher_count, 1);
    assert_eq!(view.active_students, 2);
    assert_eq!(view.average_score, 65.0);
    assert_eq!(view.coverage.completed, 2);
    assert_eq!(view.coverage.plan_total, 12);
    assert_eq!(view.coverage.percent, 16.67);
    assert_eq!(view.total_seconds, 300);

    let grades: Vec<&str> = view.by_grade.iter().map(|g| g.grade_code.as_str()).collect();
    assert_eq!(grades, vec!["5", "unassigned"]);
    assert_eq!(view.by_grade[0].students, 2);
    assert_eq!(view.by_grade[0].coverage_percent, 25.0);
    assert_eq!(view.by_grade[1].average_score, 0.0);
}

#[tokio::test]
async fn institution_view_survives_roster_outage() {
    let fx = Fixture::new(2);
    complete(&fx, fx.student, 0, 90.0, 100).await;

    fx.faulty.fail(StoreOp::Students);
    fx.faulty.fail(StoreOp::Teachers);
    let view = fx.engine.institution_analytics().await.unwrap();
    assert_eq!(view.student_count, 0);
    assert_eq!(view.teacher_count, 0);
    assert!(view.by_grade.is_empty());
    assert_eq!(view.average_score, 0.0);
    assert_eq!(view.coverage.percent, 0.0);
}
