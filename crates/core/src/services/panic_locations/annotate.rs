use serde::{Deserialize, Serialize};

use crate::model::Tag;
use crate::services::analysis::{AnalysisModel, ModelResult};
use crate::services::log::PipelineLog;
use crate::services::panic_locations::{resolve_backing_data, PanicLocationRecord, PipelineOptions};

/// Fields of a record, decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedLocation {
    pub file: String,
    pub line: u32,
    pub col: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationSummary {
    pub tags_added: usize,
    /// Tags not added again because an identical one already existed.
    pub tags_existing: usize,
    /// Records whose fields could not be decoded.
    pub records_skipped: usize,
}

/// One tag type per distinct source path.
pub fn tag_type_name(path: &str) -> String {
    format!("{path} - Rust Panic Location Source File Path")
}

pub fn tag_payload(location: &DecodedLocation) -> String {
    format!("{}: line {}, col {}", location.file, location.line, location.col)
}

/// Decode a record's `file`, `line` and `col` fields.
///
/// `None` when the file text cannot be resolved or decoded, or when either
/// integer field is missing.
pub fn decode_record(
    model: &dyn AnalysisModel,
    record: &PanicLocationRecord,
) -> ModelResult<Option<DecodedLocation>> {
    let Some(value) = record.object.value.as_ref() else { return Ok(None) };
    let Some(file_view) = value.field("file") else { return Ok(None) };
    let Some(file_data) = resolve_backing_data(model, file_view)? else { return Ok(None) };

    let location = file_data.decode_text().ok().and_then(|file| {
        let line = value.field("line")?.as_u32()?;
        let col = value.field("col")?.as_u32()?;
        Some(DecodedLocation { file: file.into_owned(), line, col })
    });
    Ok(location)
}

/// Tag every code reference to each record with its decoded source location.
pub fn annotate(
    model: &mut dyn AnalysisModel,
    records: &[PanicLocationRecord],
    options: &PipelineOptions,
    log: &mut PipelineLog,
) -> ModelResult<AnnotationSummary> {
    let mut summary = AnnotationSummary::default();
    for record in records {
        let Some(location) = decode_record(model, record)? else {
            log.error(format!(
                "Could not resolve source file path for panic location at {:#x}",
                record.address
            ));
            summary.records_skipped += 1;
            continue;
        };

        let tag_type = tag_type_name(&location.file);
        model.create_tag_type(&tag_type, &options.tag_icon)?;
        let payload = tag_payload(&location);

        for code_ref in model.code_references_to(record.address)? {
            let tag = Tag::user(code_ref, tag_type.as_str(), payload.as_str());
            if options.idempotent && model.tags_at(code_ref)?.contains(&tag) {
                summary.tags_existing += 1;
                continue;
            }
            model.add_tag(&tag)?;
            summary.tags_added += 1;
            log.info(format!("Added tag {} at {code_ref:#x}", location.file));
        }
    }
    Ok(summary)
}
