//! The `mastery attempt` commands.

use anyhow::Result;

use mastery_core::model::{
    AbandonAttemptRequest, Attempt, CompleteAttemptRequest, StartAttemptRequest,
};

use super::{print_json, score_cell, OutputFormat, Paths, Workspace};
use crate::AttemptAction;

pub async fn execute(paths: &Paths, action: AttemptAction) -> Result<()> {
    let workspace = Workspace::open_for_write(paths).await?;

    let (attempt, format) = match action {
        AttemptAction::Start {
            student,
            indicator,
            resource,
            format,
        } => {
            let format = OutputFormat::parse(&format)?;
            let request = StartAttemptRequest {
                student_id: Some(student),
                indicator_id: Some(indicator),
                resource_id: resource,
            };
            (workspace.engine.start_attempt(&request).await?, format)
        }
        AttemptAction::Complete {
            student,
            indicator,
            resource,
            attempt,
            score,
            duration,
            format,
        } => {
            let format = OutputFormat::parse(&format)?;
            let request = CompleteAttemptRequest {
                student_id: Some(student),
                indicator_id: Some(indicator),
                resource_id: resource,
                attempt_id: attempt,
                score,
                duration_seconds: duration,
            };
            (workspace.engine.complete_attempt(&request).await?, format)
        }
        AttemptAction::Abandon {
            student,
            indicator,
            resource,
            attempt,
            format,
        } => {
            let format = OutputFormat::parse(&format)?;
            let request = AbandonAttemptRequest {
                student_id: Some(student),
                indicator_id: Some(indicator),
                resource_id: resource,
                attempt_id: attempt,
            };
            (workspace.engine.abandon_attempt(&request).await?, format)
        }
    };

    workspace.save().await?;

    match format {
        OutputFormat::Json => print_json(&attempt)?,
        OutputFormat::Text => print_attempt(&attempt),
    }
    Ok(())
}

fn print_attempt(attempt: &Attempt) {
    println!("Attempt {} {}", attempt.id, attempt.status);
    println!("  student:   {}", attempt.student_id);
    println!("  indicator: {}", attempt.indicator_id);
    if let Some(resource) = attempt.resource_id {
        println!("  resource:  {resource}");
    }
    println!("  score:     {}", score_cell(attempt.score));
}
