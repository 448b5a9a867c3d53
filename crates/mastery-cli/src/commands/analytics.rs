//! The `mastery analytics` commands.

use anyhow::Result;
use comfy_table::{Cell, Table};

use mastery_core::analytics::{
    ClassAnalytics, GroupBreakdown, InstitutionAnalytics, StudentAnalytics,
};

use super::{duration_cell, print_json, OutputFormat, Paths, Workspace};
use crate::AnalyticsScope;

pub async fn execute(paths: &Paths, scope: AnalyticsScope) -> Result<()> {
    let workspace = Workspace::open(paths)?;

    match scope {
        AnalyticsScope::Student { student, format } => {
            let format = OutputFormat::parse(&format)?;
            let view = workspace.engine.student_analytics(&student).await?;
            match format {
                OutputFormat::Json => print_json(&view)?,
                OutputFormat::Text => print_student(&view),
            }
        }
        AnalyticsScope::Class { teacher, format } => {
            let format = OutputFormat::parse(&format)?;
            let view = workspace.engine.class_analytics(&teacher).await?;
            match format {
                OutputFormat::Json => print_json(&view)?,
                OutputFormat::Text => print_class(&view),
            }
        }
        AnalyticsScope::Institution { format } => {
            let format = OutputFormat::parse(&format)?;
            let view = workspace.engine.institution_analytics().await?;
            match format {
                OutputFormat::Json => print_json(&view)?,
                OutputFormat::Text => print_institution(&view),
            }
        }
    }
    Ok(())
}

fn print_student(view: &StudentAnalytics) {
    println!(
        "Student: {} ({})",
        view.student_name.as_deref().unwrap_or("unknown"),
        view.student_id
    );
    if let Some(grade) = &view.grade_code {
        println!("Grade: {grade}");
    }
    println!(
        "Coverage: {:.2}% ({}/{})",
        view.coverage.percent, view.coverage.completed, view.coverage.plan_total
    );
    println!("Average score: {:.2}", view.average_score);
    println!(
        "Dropout rate: {:.2}% ({} of {} attempts abandoned)",
        view.dropout_rate, view.abandoned_attempts, view.total_attempts
    );
    println!(
        "States: {} completed, {} in progress, {} pending",
        view.states.completed, view.states.in_progress, view.states.pending
    );
    println!(
        "Usage (last {} days): {}, streak {} day(s)",
        view.usage.window_days,
        duration_cell(view.usage.total_seconds),
        view.usage.streak_days
    );

    if !view.by_area.is_empty() {
        println!("\n{}", breakdown_table("Area", &view.by_area));
    }
}

fn breakdown_table(label: &str, groups: &[GroupBreakdown]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![label, "Completed", "Coverage", "Avg score"]);
    for group in groups {
        table.add_row(vec![
            Cell::new(
                group
                    .name
                    .clone()
                    .unwrap_or_else(|| group.group_id.to_string()),
            ),
            Cell::new(format!("{}/{}", group.completed, group.plan_total)),
            Cell::new(format!("{:.2}%", group.coverage_percent)),
            Cell::new(format!("{:.2}", group.average_score)),
        ]);
    }
    table
}

fn print_class(view: &ClassAnalytics) {
    println!(
        "Class of {} ({}): {} student(s)",
        view.teacher_name.as_deref().unwrap_or("unknown teacher"),
        view.teacher_id,
        view.student_count
    );
    println!(
        "Coverage: {:.2}%  Average score: {:.2}  Dropout rate: {:.2}%  Time: {}",
        view.coverage.percent,
        view.average_score,
        view.dropout_rate,
        duration_cell(view.total_seconds)
    );

    if !view.students.is_empty() {
        let mut table = Table::new();
        table.set_header(vec![
            "Student", "Grade", "Avg score", "Coverage", "Dropout", "Time", "Streak",
        ]);
        for row in &view.students {
            table.add_row(vec![
                Cell::new(&row.name),
                Cell::new(row.grade_code.as_deref().unwrap_or("-")),
                Cell::new(format!("{:.2}", row.average_score)),
                Cell::new(format!("{:.2}%", row.coverage_percent)),
                Cell::new(format!("{:.2}%", row.dropout_rate)),
                Cell::new(duration_cell(row.total_seconds)),
                Cell::new(row.streak_days),
            ]);
        }
        println!("\n{table}");
    }

    if !view.struggling.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Struggling indicator", "Students", "Avg score"]);
        for row in &view.struggling {
            table.add_row(vec![
                Cell::new(
                    row.code
                        .clone()
                        .unwrap_or_else(|| row.indicator_id.to_string()),
                ),
                Cell::new(row.students),
                Cell::new(format!("{:.2}", row.average_score)),
            ]);
        }
        println!("\n{table}");
    }
}

fn print_institution(view: &InstitutionAnalytics) {
    println!(
        "Institution: {} student(s), {} teacher(s), {} active",
        view.student_count, view.teacher_count, view.active_students
    );
    println!(
        "Coverage: {:.2}%  Average score: {:.2}  Dropout rate: {:.2}%  Time: {}",
        view.coverage.percent,
        view.average_score,
        view.dropout_rate,
        duration_cell(view.total_seconds)
    );

    if !view.by_grade.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Grade", "Students", "Avg score", "Coverage", "Dropout"]);
        for row in &view.by_grade {
            table.add_row(vec![
                Cell::new(&row.grade_code),
                Cell::new(row.students),
                Cell::new(format!("{:.2}", row.average_score)),
                Cell::new(format!("{:.2}%", row.coverage_percent)),
                Cell::new(format!("{:.2}%", row.dropout_rate)),
            ]);
        }
        println!("\n{table}");
    }
}
