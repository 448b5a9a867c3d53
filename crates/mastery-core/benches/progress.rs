use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mastery_core::model::{Attempt, AttemptStatus};
use mastery_core::progress::fold_attempts;
use mastery_core::RecordId;

fn make_attempts(student: RecordId, indicator: RecordId, n: usize) -> Vec<Attempt> {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let status = match i % 4 {
                0 => AttemptStatus::InProgress,
                1 => AttemptStatus::Abandoned,
                _ => AttemptStatus::Completed,
            };
            let at = base + Duration::minutes(i as i64);
            Attempt {
                id: RecordId::new(),
                student_id: student,
                indicator_id: indicator,
                resource_id: None,
                status,
                score: (status == AttemptStatus::Completed).then_some((i % 100) as f64),
                duration_seconds: 60,
                started_at: at,
                finished_at: Some(at),
                created_at: at,
                updated_at: None,
            }
        })
        .collect()
}

fn bench_fold(c: &mut Criterion) {
    let mut group = c.benchmark_group("fold_attempts");
    let student = RecordId::new();
    let indicator = RecordId::new();

    for n in [10usize, 100, 1000] {
        let attempts = make_attempts(student, indicator, n);
        group.bench_function(format!("{n}_attempts"), |b| {
            b.iter(|| fold_attempts(black_box(student), black_box(indicator), black_box(&attempts)))
        });
    }

    // Half the slice belongs to another pair and must be skipped.
    let mut mixed = make_attempts(student, indicator, 500);
    mixed.extend(make_attempts(student, RecordId::new(), 500));
    group.bench_function("mixed_pairs", |b| {
        b.iter(|| fold_attempts(black_box(student), black_box(indicator), black_box(&mixed)))
    });

    group.finish();
}

criterion_group!(benches, bench_fold);
criterion_main!(benches);
