//! The `mastery reconcile` command.

use anyhow::Result;

use super::{Paths, Workspace};

pub async fn execute(paths: &Paths, student: String) -> Result<()> {
    let workspace = Workspace::open_for_write(paths).await?;
    let summaries = workspace.engine.reconcile_student(&student).await?;
    workspace.save().await?;
    println!(
        "Reconciled {} progress summar{} for student {student}",
        summaries.len(),
        if summaries.len() == 1 { "y" } else { "ies" }
    );
    Ok(())
}
