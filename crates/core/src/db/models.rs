use serde::{Deserialize, Serialize};

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PipelineRunStatus {
    Succeeded,
    Failed,
}

impl PipelineRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineRunStatus::Succeeded => "succeeded",
            PipelineRunStatus::Failed => "failed",
        }
    }

    /// Decode the stored form; unknown values read as `Failed`.
    pub fn from_str_lossy(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "succeeded" => PipelineRunStatus::Succeeded,
            _ => PipelineRunStatus::Failed,
        }
    }
}

/// Bookkeeping for one `find-panic-paths` invocation.
///
/// Stored outside the pipeline transaction so failed runs are recorded too.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineRunRecord {
    pub started_at: String,
    pub finished_at: String,
    pub status: PipelineRunStatus,
    pub candidates: usize,
    pub records: usize,
    pub tags_added: usize,
    /// Error text for failed runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
