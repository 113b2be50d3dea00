use crate::model::{StructType, TypeDef};
use crate::services::analysis::{AnalysisModel, ModelResult};
use crate::services::log::PipelineLog;
use crate::services::panic_locations::PipelineOptions;

/// Outcome of `ensure_type_registered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    AlreadyPresent,
    Registered,
    /// The binary has no resolvable architecture; nothing was registered.
    MissingArchitecture,
    /// The string-view type the `file` field refers to is not registered.
    MissingStringView,
}

/// Layout of `core::panic::Location` as emitted by rustc (packed):
///
/// ```text
/// struct core::panic::Location {
///     &str     file;
///     uint32_t line;
///     uint32_t col;
/// };
/// ```
pub fn panic_location_type(string_view_type: &str) -> TypeDef {
    TypeDef::Struct(
        StructType::packed()
            .with_field("file", TypeDef::named(string_view_type))
            .with_field("line", TypeDef::uint(4))
            .with_field("col", TypeDef::uint(4)),
    )
}

/// Register the record type once. Calling this again is a no-op.
pub fn ensure_type_registered(
    model: &mut dyn AnalysisModel,
    options: &PipelineOptions,
    log: &mut PipelineLog,
) -> ModelResult<Registration> {
    if model.type_exists(&options.record_type_name)? {
        return Ok(Registration::AlreadyPresent);
    }

    if !model.target()?.has_arch() {
        log.error(format!(
            "Binary has no architecture; not defining `{}`",
            options.record_type_name
        ));
        return Ok(Registration::MissingArchitecture);
    }

    if !model.type_exists(&options.string_view_type)? {
        log.error(format!(
            "String view type `{}` is not registered; not defining `{}`",
            options.string_view_type, options.record_type_name
        ));
        return Ok(Registration::MissingStringView);
    }

    model.define_type(&options.record_type_name, &options.record_type())?;
    log.info(format!(
        "Defined new type, `{}`, for Rust panic metadata",
        options.record_type_name
    ));
    Ok(Registration::Registered)
}
