use anyhow::{Context, Result};
use panic_sites_core::db::{PipelineRunRecord, PipelineRunStatus, ProjectContext};
use panic_sites_core::services::panic_locations::{run, PipelineSummary};
use panic_sites_core::services::{LogEntry, PipelineLog};
use serde::Serialize;

use crate::commands::open_project;

#[derive(Serialize)]
pub struct PipelineReport<'a> {
    #[serde(flatten)]
    pub summary: &'a PipelineSummary,
    pub log: &'a [LogEntry],
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Recover panic locations in the project's binary and tag every reference to them.
///
/// The run itself is one transaction; its bookkeeping row is written afterwards so
/// failed runs are recorded as well.
pub fn find_panic_paths_command(root: &str, json: bool, no_dedup: bool) -> Result<()> {
    let ProjectContext { config, mut db, .. } = open_project(root)?;

    let mut options = config.pipeline.clone();
    if no_dedup {
        options.idempotent = false;
    }

    let started_at = timestamp();
    let mut log = PipelineLog::new();
    let outcome = run(&mut db, &options, &mut log);
    let finished_at = timestamp();

    let record = match &outcome {
        Ok(summary) => PipelineRunRecord {
            started_at,
            finished_at,
            status: PipelineRunStatus::Succeeded,
            candidates: summary.candidates,
            records: summary.records,
            tags_added: summary.tags_added,
            message: None,
        },
        Err(err) => PipelineRunRecord {
            started_at,
            finished_at,
            status: PipelineRunStatus::Failed,
            candidates: 0,
            records: 0,
            tags_added: 0,
            message: Some(err.to_string()),
        },
    };
    db.insert_pipeline_run(&record).context("Failed to record pipeline run")?;
    let summary = outcome.context("Panic location recovery failed")?;

    if json {
        let report = PipelineReport { summary: &summary, log: log.entries() };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Panic location recovery:");
    println!("  Type registered: {}", if summary.type_registered { "yes" } else { "no" });
    println!("  Candidate paths: {}", summary.candidates);
    println!("  Records: {}", summary.records);
    println!("  Tags added: {}", summary.tags_added);
    if summary.tags_existing > 0 {
        println!("  Tags already present: {}", summary.tags_existing);
    }
    if summary.records_skipped > 0 {
        println!("  Records skipped: {}", summary.records_skipped);
    }
    let errors: Vec<&LogEntry> = log.errors().collect();
    if !errors.is_empty() {
        println!("Problems:");
        for entry in errors {
            println!("- {}", entry.message);
        }
    }

    Ok(())
}
