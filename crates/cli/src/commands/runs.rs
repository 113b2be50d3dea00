use anyhow::{Context, Result};

use crate::commands::open_project;

/// List recorded `find-panic-paths` runs, oldest first.
pub fn list_runs_command(root: &str, json: bool) -> Result<()> {
    let ctx = open_project(root)?;
    let runs = ctx.db.list_pipeline_runs().context("Failed to list pipeline runs")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    println!("Pipeline runs:");
    if runs.is_empty() {
        println!("(none)");
        return Ok(());
    }
    for run in runs {
        println!(
            "- {} [{}] candidates: {}, records: {}, tags added: {}",
            run.started_at,
            run.status.as_str(),
            run.candidates,
            run.records,
            run.tags_added
        );
        if let Some(message) = &run.message {
            println!("    {}", message);
        }
    }

    Ok(())
}
