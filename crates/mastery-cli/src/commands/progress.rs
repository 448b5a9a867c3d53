//! The `mastery progress` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use super::{print_json, score_cell, OutputFormat, Paths, Workspace};

pub async fn execute(
    paths: &Paths,
    student: String,
    area: Option<String>,
    format: String,
) -> Result<()> {
    let format = OutputFormat::parse(&format)?;
    let workspace = Workspace::open(paths)?;
    let summaries = workspace
        .engine
        .progress_summaries(&student, area.as_deref())
        .await?;

    if format == OutputFormat::Json {
        return print_json(&summaries);
    }
    if summaries.is_empty() {
        println!("No progress recorded for student {student}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Indicator",
        "State",
        "Avg score",
        "Attempts",
        "Abandoned",
        "Last attempt",
    ]);
    for summary in &summaries {
        table.add_row(vec![
            Cell::new(summary.indicator_id),
            Cell::new(summary.state),
            Cell::new(score_cell(summary.average_score)),
            Cell::new(summary.total_attempts),
            Cell::new(summary.abandoned_attempts),
            Cell::new(
                summary
                    .last_attempt_at
                    .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d").to_string()),
            ),
        ]);
    }
    println!("{table}");
    Ok(())
}
