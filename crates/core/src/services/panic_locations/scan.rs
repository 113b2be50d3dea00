use serde::{Deserialize, Serialize};

use crate::model::Address;
use crate::services::analysis::{AnalysisModel, ModelResult};
use crate::services::log::PipelineLog;
use crate::services::panic_locations::{resolve_backing_data, PathClassifier};

/// A string view whose text looks like a source file path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePath {
    /// Address of the string view itself (where the record will be overlaid).
    pub address: Address,
    pub name: Option<String>,
    /// Decoded path text the view refers to.
    pub path: String,
}

/// Find every string view of `string_view_type` that refers to a source path.
///
/// Results come back in the model's enumeration order. Views that fail to
/// resolve at any step, or whose data is not UTF-8, are skipped.
pub fn scan(
    model: &dyn AnalysisModel,
    classifier: &PathClassifier,
    string_view_type: &str,
    log: &mut PipelineLog,
) -> ModelResult<Vec<CandidatePath>> {
    let platform = model.target()?.platform;
    let mut candidates = Vec::new();
    for address in model.data_objects_of_type(string_view_type)? {
        if let Some(candidate) = resolve_candidate(model, classifier, &platform, address)? {
            candidates.push(candidate);
        }
    }
    log.info(format!(
        "Found {} string views referring to source file paths",
        candidates.len()
    ));
    Ok(candidates)
}

fn resolve_candidate(
    model: &dyn AnalysisModel,
    classifier: &PathClassifier,
    platform: &str,
    address: Address,
) -> ModelResult<Option<CandidatePath>> {
    let Some(view) = model.data_object_at(address)? else { return Ok(None) };
    let Some(view_value) = view.value.as_ref() else { return Ok(None) };
    let Some(data) = resolve_backing_data(model, view_value)? else { return Ok(None) };

    Ok(data
        .decode_text()
        .ok()
        .filter(|text| classifier.classify_text(platform, text))
        .map(|text| CandidatePath { address, name: view.name.clone(), path: text.into_owned() }))
}
