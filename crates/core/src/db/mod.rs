//! Analysis database integration and project layout definitions.
//!
//! This module wraps a SQLite database storing one binary's analysis state:
//! - Target metadata and mapped bytes
//! - The type registry and typed data objects
//! - Code references and tags
//! - Pipeline run history
//!
//! Alongside it:
//! - `ProjectConfig`: serializable project metadata and pipeline options.
//! - `ProjectLayout`: computed paths for project directories/files.
//! - `ModelSnapshot`: importable analysis state from external passes.

mod analysis_db;
mod config;
mod context;
mod layout;
mod models;
mod snapshot;
mod util;

pub use analysis_db::{AnalysisDb, DbError, DbResult, CURRENT_SCHEMA_VERSION};
pub use config::{DbConfig, ProjectConfig};
pub use context::ProjectContext;
pub use layout::ProjectLayout;
pub use models::{PipelineRunRecord, PipelineRunStatus};
pub use snapshot::{
    DataObjectSpec, ImportSummary, ModelSnapshot, SegmentSpec, SnapshotError, TypeSpec,
};
pub use util::{load_project_config, open_project_db};
