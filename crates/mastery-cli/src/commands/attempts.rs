//! The `mastery attempts` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use super::{duration_cell, print_json, score_cell, OutputFormat, Paths, Workspace};

pub async fn execute(
    paths: &Paths,
    student: Option<String>,
    indicator: Option<String>,
    limit: Option<usize>,
    format: String,
) -> Result<()> {
    let format = OutputFormat::parse(&format)?;
    let workspace = Workspace::open(paths)?;
    let attempts = workspace
        .engine
        .list_attempts(student.as_deref(), indicator.as_deref(), limit)
        .await?;

    if format == OutputFormat::Json {
        return print_json(&attempts);
    }
    if attempts.is_empty() {
        println!("No attempts found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Attempt", "Student", "Indicator", "Status", "Score", "Time", "Started",
    ]);
    for attempt in &attempts {
        table.add_row(vec![
            Cell::new(attempt.id),
            Cell::new(attempt.student_id),
            Cell::new(attempt.indicator_id),
            Cell::new(attempt.status),
            Cell::new(score_cell(attempt.score)),
            Cell::new(duration_cell(attempt.duration_seconds)),
            Cell::new(attempt.started_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    println!("{table}");
    println!("{} attempt(s)", attempts.len());
    Ok(())
}
