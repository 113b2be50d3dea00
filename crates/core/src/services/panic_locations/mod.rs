//! Recovery of `core::panic::Location` records.
//!
//! Stages, in the order `pipeline::run` drives them:
//! - `register`: make sure the packed record type exists.
//! - `scan`: find string views whose text looks like a source path.
//! - `synthesize`: overlay a record at each of those string views.
//! - `annotate`: tag every instruction that references a record.
//!
//! Each stage hands a plain `Vec` to the next one. Resolution steps return
//! `Option`s; a `None` anywhere means "skip this item", never "abort".

pub mod annotate;
pub mod classify;
pub mod pipeline;
pub mod register;
pub mod scan;
pub mod synthesize;

use serde::{Deserialize, Serialize};

use crate::model::{DataValue, TypeDef};
use crate::services::analysis::{AnalysisModel, ModelResult};

pub use annotate::{annotate, tag_payload, tag_type_name, AnnotationSummary, DecodedLocation};
pub use classify::{classify, PathClassifier, PathSyntax};
pub use pipeline::{run, PipelineError, PipelineSummary};
pub use register::{ensure_type_registered, panic_location_type, Registration};
pub use scan::{scan, CandidatePath};
pub use synthesize::{record_name, synthesize, PanicLocationRecord};

/// Canonical name of the record type in the type registry.
pub const PANIC_LOCATION_TYPE_NAME: &str = "core::panic::Location";

/// Name of the string-view type produced by the string discovery pass.
pub const STRING_VIEW_TYPE_NAME: &str = "&str";

pub const DEFAULT_TAG_ICON: &str = "😱";

/// Tunables for a pipeline run. Stored in the project config under `pipeline`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Extensions (with leading dot) that mark a path as a source file.
    pub source_extensions: Vec<String>,
    pub string_view_type: String,
    pub record_type_name: String,
    pub tag_icon: String,
    /// Reuse records already present and skip tags that already exist.
    pub idempotent: bool,
    /// Trigger re-analysis after a successful commit.
    pub reanalyze: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            source_extensions: vec![".rs".to_string()],
            string_view_type: STRING_VIEW_TYPE_NAME.to_string(),
            record_type_name: PANIC_LOCATION_TYPE_NAME.to_string(),
            tag_icon: DEFAULT_TAG_ICON.to_string(),
            idempotent: true,
            reanalyze: true,
        }
    }
}

impl PipelineOptions {
    pub fn classifier(&self) -> PathClassifier {
        PathClassifier::new(&self.source_extensions)
    }

    /// The record type, referring to the configured string-view type.
    pub fn record_type(&self) -> TypeDef {
        panic_location_type(&self.string_view_type)
    }
}

/// Follow a string view (or pointer) to the string data it refers to.
///
/// The backing object may be longer than the view; when the view carries a length
/// the data is cut to it. `None` when any step fails to resolve.
pub fn resolve_backing_data(
    model: &dyn AnalysisModel,
    view: &DataValue,
) -> ModelResult<Option<DataValue>> {
    let Some(address) = view.back_reference() else { return Ok(None) };
    let data = model.data_object_at(address)?.and_then(|object| object.value);
    Ok(data
        .filter(|value| matches!(value, DataValue::Bytes(_) | DataValue::Text(_)))
        .map(|value| match view.view_length() {
            Some(length) => value.truncated(length),
            None => value,
        }))
}
