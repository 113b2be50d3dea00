use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::analysis::{AnalysisModel, ModelError, ModelResult};
use crate::services::log::PipelineLog;
use crate::services::panic_locations::{
    annotate, ensure_type_registered, scan, synthesize, PipelineOptions, Registration,
};

/// Counts reported by a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Whether this run defined the record type (false when it already existed).
    pub type_registered: bool,
    pub candidates: usize,
    pub records: usize,
    pub tags_added: usize,
    pub tags_existing: usize,
    pub records_skipped: usize,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to open transaction: {0}")]
    Begin(#[source] ModelError),
    /// A stage failed; everything done in this run was rolled back.
    #[error("pipeline failed and was rolled back: {0}")]
    RolledBack(#[source] ModelError),
    #[error("pipeline failed ({source}) and rollback also failed: {rollback}")]
    RollbackFailed { source: ModelError, rollback: ModelError },
    /// The commit failed; the run was rolled back.
    #[error("failed to commit transaction, changes rolled back: {0}")]
    Commit(#[source] ModelError),
    /// The run was committed but re-analysis could not be started.
    #[error("changes committed but re-analysis failed: {0}")]
    Reanalysis(#[source] ModelError),
}

/// Run the whole recovery over `model` as one transaction.
///
/// Registrar, scanner, synthesizer and annotator run in that order. Per-item
/// problems are logged and skipped; a storage failure rolls back every mutation
/// made by this run.
pub fn run(
    model: &mut dyn AnalysisModel,
    options: &PipelineOptions,
    log: &mut PipelineLog,
) -> Result<PipelineSummary, PipelineError> {
    model.begin_transaction().map_err(PipelineError::Begin)?;

    let summary = match run_stages(model, options, log) {
        Ok(summary) => summary,
        Err(source) => {
            log.error(format!("Panic location recovery failed: {source}"));
            return Err(abort(model, source, PipelineError::RolledBack));
        }
    };

    if let Err(source) = model.commit_transaction() {
        log.error(format!("Failed to commit panic location recovery: {source}"));
        return Err(abort(model, source, PipelineError::Commit));
    }
    log.info(format!(
        "Recovered {} panic locations, added {} tags",
        summary.records, summary.tags_added
    ));

    if options.reanalyze {
        model.trigger_reanalysis().map_err(PipelineError::Reanalysis)?;
    }
    Ok(summary)
}

/// Roll back the open transaction after `source`, reporting it through `rolled_back`.
fn abort(
    model: &mut dyn AnalysisModel,
    source: ModelError,
    rolled_back: fn(ModelError) -> PipelineError,
) -> PipelineError {
    match model.rollback_transaction() {
        Ok(()) => rolled_back(source),
        Err(rollback) => PipelineError::RollbackFailed { source, rollback },
    }
}

fn run_stages(
    model: &mut dyn AnalysisModel,
    options: &PipelineOptions,
    log: &mut PipelineLog,
) -> ModelResult<PipelineSummary> {
    let registration = ensure_type_registered(model, options, log)?;
    let candidates = scan(model, &options.classifier(), &options.string_view_type, log)?;
    let records = synthesize(model, &candidates, options, log)?;
    let annotation = annotate(model, &records, options, log)?;

    Ok(PipelineSummary {
        type_registered: registration == Registration::Registered,
        candidates: candidates.len(),
        records: records.len(),
        tags_added: annotation.tags_added,
        tags_existing: annotation.tags_existing,
        records_skipped: annotation.records_skipped,
    })
}
