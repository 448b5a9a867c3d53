//! Student, class, and institution analytics.
//!
//! Analytics always render: every data source is loaded independently and a
//! failing source degrades its metrics to `0`, `None`, or an empty list
//! instead of failing the response. Only malformed caller input errors.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{MasteryConfig, MAX_USAGE_WINDOW_DAYS};
use crate::error::Result;
use crate::ids::RecordId;
use crate::model::{Attempt, Indicator, ProgressState, ProgressSummary, Student};
use crate::traits::{AttemptStore, CatalogSource, Clock, ProgressStore, RosterSource, StoreResult};

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / whole * 100`, rounded, or `0` when `whole` is zero.
pub fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 / whole as f64 * 100.0)
    }
}

/// Mean of the non-null scores, rounded, or `0` when there are none.
pub fn mean_score<'a>(summaries: impl IntoIterator<Item = &'a ProgressSummary>) -> f64 {
    let (sum, count) = summaries
        .into_iter()
        .filter_map(|s| s.average_score)
        .fold((0.0, 0u32), |(sum, n), score| (sum + score, n + 1));
    if count == 0 {
        0.0
    } else {
        round2(sum / count as f64)
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    pub completed: u32,
    pub plan_total: u32,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateCounts {
    pub pending: u32,
    pub in_progress: u32,
    pub completed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayUsage {
    pub date: NaiveDate,
    pub seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub window_days: i64,
    pub total_seconds: u64,
    /// One bucket per local calendar day in the window, oldest first.
    pub days: Vec<DayUsage>,
    pub streak_days: u32,
}

/// Coverage and score for one area or competency of the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBreakdown {
    pub group_id: RecordId,
    pub name: Option<String>,
    pub plan_total: u32,
    pub completed: u32,
    pub coverage_percent: f64,
    pub average_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAnalytics {
    pub student_id: RecordId,
    pub student_name: Option<String>,
    pub grade_code: Option<String>,
    pub coverage: Coverage,
    pub average_score: f64,
    pub dropout_rate: f64,
    pub total_attempts: u32,
    pub abandoned_attempts: u32,
    pub states: StateCounts,
    pub by_area: Vec<GroupBreakdown>,
    pub by_competency: Vec<GroupBreakdown>,
    pub usage: Usage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRow {
    pub student_id: RecordId,
    pub name: String,
    pub grade_code: Option<String>,
    pub average_score: f64,
    pub coverage_percent: f64,
    pub dropout_rate: f64,
    pub total_seconds: u64,
    pub streak_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrugglingIndicator {
    pub indicator_id: RecordId,
    pub code: Option<String>,
    /// Students whose average on this indicator is below threshold.
    pub students: u32,
    pub average_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassAnalytics {
    pub teacher_id: RecordId,
    pub teacher_name: Option<String>,
    pub student_count: u32,
    pub average_score: f64,
    pub coverage: Coverage,
    pub dropout_rate: f64,
    pub total_seconds: u64,
    pub students: Vec<StudentRow>,
    pub struggling: Vec<StrugglingIndicator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRow {
    pub grade_code: String,
    pub students: u32,
    pub average_score: f64,
    pub coverage_percent: f64,
    pub dropout_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionAnalytics {
    pub student_count: u32,
    pub teacher_count: u32,
    /// Students with any recorded time in the usage window.
    pub active_students: u32,
    pub average_score: f64,
    pub coverage: Coverage,
    pub dropout_rate: f64,
    pub total_seconds: u64,
    pub by_grade: Vec<GradeRow>,
}

// ---------------------------------------------------------------------------
// Curriculum plan
// ---------------------------------------------------------------------------

/// Indicator catalog with display names, loaded once per analytics call.
#[derive(Debug, Default)]
pub struct CurriculumPlan {
    pub indicators: Vec<Indicator>,
    pub area_names: HashMap<RecordId, String>,
    pub competency_names: HashMap<RecordId, String>,
}

impl CurriculumPlan {
    /// Plan indicators for a grade; the whole catalog when the grade is unknown.
    pub fn for_grade(&self, grade: Option<&str>) -> Vec<&Indicator> {
        self.indicators
            .iter()
            .filter(|i| grade.map_or(true, |g| i.grade_code == g))
            .collect()
    }

    fn code_of(&self, id: RecordId) -> Option<String> {
        self.indicators
            .iter()
            .find(|i| i.id == id)
            .map(|i| i.code.clone())
    }
}

// ---------------------------------------------------------------------------
// Pure metrics
// ---------------------------------------------------------------------------

/// Totals shared by every view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressTotals {
    pub coverage: Coverage,
    pub average_score: f64,
    pub dropout_rate: f64,
    pub total_attempts: u32,
    pub abandoned_attempts: u32,
    pub states: StateCounts,
}

/// Coverage, average, and dropout for one student's summaries against a plan.
pub fn progress_totals(summaries: &[ProgressSummary], plan: &[&Indicator]) -> ProgressTotals {
    let plan_ids: HashSet<RecordId> = plan.iter().map(|i| i.id).collect();
    let completed = summaries
        .iter()
        .filter(|s| s.state == ProgressState::Completed && plan_ids.contains(&s.indicator_id))
        .count() as u32;

    let mut states = StateCounts::default();
    let mut total_attempts = 0u32;
    let mut abandoned_attempts = 0u32;
    for summary in summaries {
        match summary.state {
            ProgressState::Pending => states.pending += 1,
            ProgressState::InProgress => states.in_progress += 1,
            ProgressState::Completed => states.completed += 1,
        }
        total_attempts += summary.total_attempts;
        abandoned_attempts += summary.abandoned_attempts;
    }

    ProgressTotals {
        coverage: Coverage {
            completed,
            plan_total: plan_ids.len() as u32,
            percent: percent(completed as u64, plan_ids.len() as u64),
        },
        average_score: mean_score(summaries),
        dropout_rate: percent(abandoned_attempts as u64, total_attempts as u64),
        total_attempts,
        abandoned_attempts,
        states,
    }
}

/// Group plan indicators by `key` and report coverage and score per group.
pub fn breakdown(
    summaries: &[ProgressSummary],
    plan: &[&Indicator],
    key: impl Fn(&Indicator) -> RecordId,
    names: &HashMap<RecordId, String>,
) -> Vec<GroupBreakdown> {
    let by_indicator: HashMap<RecordId, &ProgressSummary> =
        summaries.iter().map(|s| (s.indicator_id, s)).collect();

    let mut order: Vec<RecordId> = Vec::new();
    let mut groups: HashMap<RecordId, Vec<&Indicator>> = HashMap::new();
    for indicator in plan {
        let group = key(indicator);
        groups
            .entry(group)
            .or_insert_with(|| {
                order.push(group);
                Vec::new()
            })
            .push(indicator);
    }

    order
        .into_iter()
        .map(|group_id| {
            let members = &groups[&group_id];
            let member_summaries: Vec<&ProgressSummary> = members
                .iter()
                .filter_map(|i| by_indicator.get(&i.id).copied())
                .collect();
            let completed = member_summaries
                .iter()
                .filter(|s| s.state == ProgressState::Completed)
                .count() as u32;
            GroupBreakdown {
                group_id,
                name: names.get(&group_id).cloned(),
                plan_total: members.len() as u32,
                completed,
                coverage_percent: percent(completed as u64, members.len() as u64),
                average_score: mean_score(member_summaries),
            }
        })
        .collect()
}

/// Per-day usage in the window ending at `now`, in local calendar days.
pub fn usage_from_attempts(
    attempts: &[Attempt],
    now: DateTime<Utc>,
    window_days: i64,
    offset: FixedOffset,
) -> Usage {
    let today = now.with_timezone(&offset).date_naive();
    let window_days = window_days.clamp(1, MAX_USAGE_WINDOW_DAYS);
    let first = today - Duration::days(window_days - 1);

    let mut buckets: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    let mut day = first;
    while day <= today {
        buckets.insert(day, 0);
        day += Duration::days(1);
    }
    for attempt in attempts {
        let date = attempt.started_at.with_timezone(&offset).date_naive();
        if let Some(seconds) = buckets.get_mut(&date) {
            *seconds += attempt.duration_seconds;
        }
    }

    let days: Vec<DayUsage> = buckets
        .into_iter()
        .map(|(date, seconds)| DayUsage { date, seconds })
        .collect();
    Usage {
        window_days,
        total_seconds: days.iter().map(|d| d.seconds).sum(),
        streak_days: streak(&days),
        days,
    }
}

/// Consecutive active days counted back from the most recent active day.
pub fn streak(days: &[DayUsage]) -> u32 {
    let mut active: Vec<NaiveDate> = days
        .iter()
        .filter(|d| d.seconds > 0)
        .map(|d| d.date)
        .collect();
    active.sort_unstable_by(|a, b| b.cmp(a));
    active.dedup();

    let Some(mut previous) = active.first().copied() else {
        return 0;
    };
    let mut count = 1;
    for date in active.into_iter().skip(1) {
        if previous - date > Duration::days(1) {
            break;
        }
        count += 1;
        previous = date;
    }
    count
}

/// Indicators the most students are below threshold on.
pub fn struggling_indicators(
    summaries: &[ProgressSummary],
    threshold: f64,
    plan: &CurriculumPlan,
    limit: usize,
) -> Vec<StrugglingIndicator> {
    let mut order: Vec<RecordId> = Vec::new();
    let mut scores: HashMap<RecordId, Vec<f64>> = HashMap::new();
    for summary in summaries {
        let Some(score) = summary.average_score else {
            continue;
        };
        if score < threshold {
            scores
                .entry(summary.indicator_id)
                .or_insert_with(|| {
                    order.push(summary.indicator_id);
                    Vec::new()
                })
                .push(score);
        }
    }

    let mut rows: Vec<StrugglingIndicator> = order
        .into_iter()
        .map(|indicator_id| {
            let values = &scores[&indicator_id];
            StrugglingIndicator {
                indicator_id,
                code: plan.code_of(indicator_id),
                students: values.len() as u32,
                average_score: round2(values.iter().sum::<f64>() / values.len() as f64),
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.students
            .cmp(&a.students)
            .then(a.average_score.total_cmp(&b.average_score))
    });
    rows.truncate(limit);
    rows
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Degrade a failed source to its empty value.
fn soft<T: Default>(source: &str, result: StoreResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("analytics source '{source}' unavailable, using empty value: {e}");
            T::default()
        }
    }
}

/// Pooled figures over a group of students.
struct Cohort {
    rows: Vec<StudentRow>,
    coverage: Coverage,
    average_score: f64,
    dropout_rate: f64,
    total_seconds: u64,
}

pub struct AnalyticsAggregator {
    progress: Arc<dyn ProgressStore>,
    attempts: Arc<dyn AttemptStore>,
    catalog: Arc<dyn CatalogSource>,
    roster: Arc<dyn RosterSource>,
    clock: Arc<dyn Clock>,
    threshold: f64,
    window_days: i64,
    offset: FixedOffset,
    struggling_limit: usize,
}

impl AnalyticsAggregator {
    pub fn new(
        progress: Arc<dyn ProgressStore>,
        attempts: Arc<dyn AttemptStore>,
        catalog: Arc<dyn CatalogSource>,
        roster: Arc<dyn RosterSource>,
        clock: Arc<dyn Clock>,
        config: &MasteryConfig,
    ) -> Self {
        let offset =
            FixedOffset::east_opt(config.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
        Self {
            progress,
            attempts,
            catalog,
            roster,
            clock,
            threshold: config.reinforcement_threshold,
            window_days: config.usage_window_days.clamp(1, MAX_USAGE_WINDOW_DAYS),
            offset,
            struggling_limit: config.struggling_limit,
        }
    }

    async fn load_plan(&self) -> CurriculumPlan {
        let (indicators, areas, competencies) = futures::join!(
            self.catalog.indicators(),
            self.catalog.areas(),
            self.catalog.competencies()
        );
        CurriculumPlan {
            indicators: soft("indicators", indicators),
            area_names: soft("areas", areas)
                .into_iter()
                .map(|a| (a.id, a.name))
                .collect(),
            competency_names: soft("competencies", competencies)
                .into_iter()
                .map(|c| (c.id, c.name))
                .collect(),
        }
    }

    fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        // One extra day so the oldest local day is fully covered for any offset.
        now - Duration::days(self.window_days + 1)
    }

    pub async fn student(&self, student_id: &str) -> Result<StudentAnalytics> {
        let student_id = RecordId::parse_field("student_id", Some(student_id))?;
        let now = self.clock.now();
        let ids = [student_id];

        let (student, summaries, attempts, plan) = futures::join!(
            self.roster.student(student_id),
            self.progress.progress_for_student(student_id),
            self.attempts.attempts_since(&ids, self.window_start(now)),
            self.load_plan()
        );
        let student = soft("roster", student);
        let summaries = soft("progress", summaries);
        let attempts = soft("attempts", attempts);

        let grade = student.as_ref().and_then(|s| s.grade_code.clone());
        let plan_indicators = plan.for_grade(grade.as_deref());
        let totals = progress_totals(&summaries, &plan_indicators);

        Ok(StudentAnalytics {
            student_id,
            student_name: student.map(|s| s.name),
            grade_code: grade,
            coverage: totals.coverage,
            average_score: totals.average_score,
            dropout_rate: totals.dropout_rate,
            total_attempts: totals.total_attempts,
            abandoned_attempts: totals.abandoned_attempts,
            states: totals.states,
            by_area: breakdown(&summaries, &plan_indicators, |i| i.area_id, &plan.area_names),
            by_competency: breakdown(
                &summaries,
                &plan_indicators,
                |i| i.competency_id,
                &plan.competency_names,
            ),
            usage: usage_from_attempts(&attempts, now, self.window_days, self.offset),
        })
    }

    pub async fn class(&self, teacher_id: &str) -> Result<ClassAnalytics> {
        let teacher_id = RecordId::parse_field("teacher_id", Some(teacher_id))?;
        let (teacher, students) = futures::join!(
            self.roster.teacher(teacher_id),
            self.roster.students_of_teacher(teacher_id)
        );
        let teacher = soft("roster", teacher);
        let students = soft("roster", students);

        let (cohort, summaries, plan) = self.cohort(&students).await;
        Ok(ClassAnalytics {
            teacher_id,
            teacher_name: teacher.map(|t| t.name),
            student_count: students.len() as u32,
            average_score: cohort.average_score,
            coverage: cohort.coverage,
            dropout_rate: cohort.dropout_rate,
            total_seconds: cohort.total_seconds,
            students: cohort.rows,
            struggling: struggling_indicators(
                &summaries,
                self.threshold,
                &plan,
                self.struggling_limit,
            ),
        })
    }

    pub async fn institution(&self) -> Result<InstitutionAnalytics> {
        let (students, teachers) =
            futures::join!(self.roster.students(), self.roster.teachers());
        let students = soft("roster", students);
        let teachers = soft("roster", teachers);

        let (cohort, summaries, plan) = self.cohort(&students).await;

        let mut grades: BTreeMap<String, Vec<&Student>> = BTreeMap::new();
        for student in &students {
            let grade = student
                .grade_code
                .clone()
                .unwrap_or_else(|| "unassigned".to_string());
            grades.entry(grade).or_default().push(student);
        }
        let by_grade = grades
            .into_iter()
            .map(|(grade_code, members)| {
                let ids: HashSet<RecordId> = members.iter().map(|s| s.id).collect();
                let group: Vec<ProgressSummary> = summaries
                    .iter()
                    .filter(|s| ids.contains(&s.student_id))
                    .cloned()
                    .collect();
                let (completed, plan_total) = members.iter().fold((0u64, 0u64), |acc, s| {
                    let mine: Vec<ProgressSummary> = group
                        .iter()
                        .filter(|g| g.student_id == s.id)
                        .cloned()
                        .collect();
                    let totals =
                        progress_totals(&mine, &plan.for_grade(s.grade_code.as_deref()));
                    (
                        acc.0 + totals.coverage.completed as u64,
                        acc.1 + totals.coverage.plan_total as u64,
                    )
                });
                let (abandoned, total) = group.iter().fold((0u64, 0u64), |acc, s| {
                    (
                        acc.0 + s.abandoned_attempts as u64,
                        acc.1 + s.total_attempts as u64,
                    )
                });
                GradeRow {
                    grade_code,
                    students: members.len() as u32,
                    average_score: mean_score(&group),
                    coverage_percent: percent(completed, plan_total),
                    dropout_rate: percent(abandoned, total),
                }
            })
            .collect();

        Ok(InstitutionAnalytics {
            student_count: students.len() as u32,
            teacher_count: teachers.len() as u32,
            active_students: cohort.rows.iter().filter(|r| r.total_seconds > 0).count() as u32,
            average_score: cohort.average_score,
            coverage: cohort.coverage,
            dropout_rate: cohort.dropout_rate,
            total_seconds: cohort.total_seconds,
            by_grade,
        })
    }

    /// Load and pool a group of students with one read per source.
    async fn cohort(
        &self,
        students: &[Student],
    ) -> (Cohort, Vec<ProgressSummary>, CurriculumPlan) {
        let now = self.clock.now();
        let ids: Vec<RecordId> = students.iter().map(|s| s.id).collect();
        let (summaries, attempts, plan) = futures::join!(
            self.progress.progress_for_students(&ids),
            self.attempts.attempts_since(&ids, self.window_start(now)),
            self.load_plan()
        );
        let summaries = soft("progress", summaries);
        let attempts = soft("attempts", attempts);

        let mut rows = Vec::with_capacity(students.len());
        let (mut completed, mut plan_total) = (0u64, 0u64);
        let (mut abandoned, mut total) = (0u64, 0u64);
        for student in students {
            let mine: Vec<ProgressSummary> = summaries
                .iter()
                .filter(|s| s.student_id == student.id)
                .cloned()
                .collect();
            let my_attempts: Vec<Attempt> = attempts
                .iter()
                .filter(|a| a.student_id == student.id)
                .cloned()
                .collect();
            let totals = progress_totals(&mine, &plan.for_grade(student.grade_code.as_deref()));
            let usage = usage_from_attempts(&my_attempts, now, self.window_days, self.offset);

            completed += totals.coverage.completed as u64;
            plan_total += totals.coverage.plan_total as u64;
            abandoned += totals.abandoned_attempts as u64;
            total += totals.total_attempts as u64;

            rows.push(StudentRow {
                student_id: student.id,
                name: student.name.clone(),
                grade_code: student.grade_code.clone(),
                average_score: totals.average_score,
                coverage_percent: totals.coverage.percent,
                dropout_rate: totals.dropout_rate,
                total_seconds: usage.total_seconds,
                streak_days: usage.streak_days,
            });
        }

        let cohort = Cohort {
            total_seconds: rows.iter().map(|r| r.total_seconds).sum(),
            rows,
            coverage: Coverage {
                completed: completed as u32,
                plan_total: plan_total as u32,
                percent: percent(completed, plan_total),
            },
            average_score: mean_score(&summaries),
            dropout_rate: percent(abandoned, total),
        };
        (cohort, summaries, plan)
    }
}
