pub mod analysis;
#[cfg(feature = "image-loader")]
pub mod image;
pub mod log;
pub mod panic_locations;

pub use analysis::{AnalysisModel, ModelError, ModelResult};
pub use log::{LogEntry, LogLevel, PipelineLog};
