use serde::{Deserialize, Serialize};

use crate::model::{Address, DataObject};
use crate::services::analysis::{AnalysisModel, ModelResult};
use crate::services::log::PipelineLog;
use crate::services::panic_locations::{CandidatePath, PipelineOptions};

/// A record object overlaid on a candidate string view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanicLocationRecord {
    pub address: Address,
    pub object: DataObject,
}

/// Deterministic object name for the record built over `candidate`.
pub fn record_name(candidate: &CandidatePath) -> String {
    match candidate.name.as_deref() {
        Some(name) if !name.is_empty() => format!("panic_location_{name}"),
        _ => format!("panic_location_{:x}", candidate.address),
    }
}

/// Define a record at the address of every candidate.
///
/// Candidates whose address cannot take the record (conflicting object, unknown
/// type) are skipped; the rest of the batch carries on. Returns nothing when the
/// record type is not registered.
pub fn synthesize(
    model: &mut dyn AnalysisModel,
    candidates: &[CandidatePath],
    options: &PipelineOptions,
    log: &mut PipelineLog,
) -> ModelResult<Vec<PanicLocationRecord>> {
    let type_name = options.record_type_name.as_str();
    if !model.type_exists(type_name)? {
        log.error(format!("Type `{type_name}` is not defined; no records synthesized"));
        return Ok(Vec::new());
    }

    let mut records = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if options.idempotent {
            if let Some(existing) = existing_record(model, candidate.address, type_name)? {
                records.push(PanicLocationRecord { address: candidate.address, object: existing });
                continue;
            }
        }

        match model.define_data_object(candidate.address, type_name, &record_name(candidate)) {
            Ok(object) => {
                log.info(format!("Defined new `{type_name}` at {:#x}", candidate.address));
                records.push(PanicLocationRecord { address: candidate.address, object });
            }
            Err(err) if err.is_recoverable() => {
                log.error(format!(
                    "Unable to create `{type_name}` data variable at {:#x}: {err}",
                    candidate.address
                ));
            }
            Err(err) => return Err(err),
        }
    }
    Ok(records)
}

fn existing_record(
    model: &dyn AnalysisModel,
    address: Address,
    type_name: &str,
) -> ModelResult<Option<DataObject>> {
    Ok(model.data_object_at(address)?.filter(|object| object.type_name() == Some(type_name)))
}
