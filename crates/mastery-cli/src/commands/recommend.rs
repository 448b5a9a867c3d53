//! The `mastery recommend` command.

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use mastery_core::model::{RankingKind, RecommendationRequest};

use super::{print_json, score_cell, OutputFormat, Paths, Workspace};

pub async fn execute(
    paths: &Paths,
    student: String,
    limit_indicators: Option<usize>,
    limit_resources: Option<usize>,
    ranking: Option<String>,
    format: String,
) -> Result<()> {
    let format = OutputFormat::parse(&format)?;
    let mut config = paths.config()?;
    if let Some(ranking) = ranking {
        config.ranking = ranking
            .parse::<RankingKind>()
            .map_err(anyhow::Error::msg)
            .context("invalid --ranking")?;
    }
    let workspace = Workspace::from_config(config)?;

    let request = RecommendationRequest {
        student_id: Some(student.clone()),
        limit_indicators,
        limit_resources,
    };
    let candidates = workspace.engine.recommendations(&request).await?;

    if format == OutputFormat::Json {
        return print_json(&candidates);
    }
    if candidates.is_empty() {
        println!("No recommendations for student {student}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Indicator", "Reason", "Avg score", "Resources"]);
    for candidate in &candidates {
        let indicator = candidate
            .indicator_code
            .clone()
            .unwrap_or_else(|| candidate.indicator_id.to_string());
        let resources = candidate
            .resources
            .iter()
            .map(|r| format!("{} ({})", r.title, r.kind))
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(vec![
            Cell::new(indicator),
            Cell::new(candidate.reason),
            Cell::new(score_cell(candidate.average_score)),
            Cell::new(resources),
        ]);
    }
    println!("{table}");
    Ok(())
}
