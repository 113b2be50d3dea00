//! Importing analysis state produced by other passes.
//!
//! A snapshot carries what an external engine already knows about a binary:
//! target metadata, mapped bytes, registered types, typed data objects (notably
//! the string views found by the string discovery pass) and code references.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{AnalysisDb, DbError};
use crate::model::{Address, CodeRef, TargetInfo, TypeDef};
use crate::services::analysis::{AnalysisModel, ModelError};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid snapshot YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("segment at {start:#x} needs exactly one of `hex` or `text`")]
    SegmentContents { start: Address },
    #[error("segment at {start:#x} has invalid hex: {source}")]
    Hex { start: Address, source: hex::FromHexError },
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Bytes mapped at an address. Exactly one of `hex` / `text` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSpec {
    pub start: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl SegmentSpec {
    pub fn bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        match (&self.hex, &self.text) {
            (Some(hex), None) => {
                let compact: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
                hex::decode(compact)
                    .map_err(|source| SnapshotError::Hex { start: self.start, source })
            }
            (None, Some(text)) => Ok(text.as_bytes().to_vec()),
            _ => Err(SnapshotError::SegmentContents { start: self.start }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub name: String,
    pub definition: TypeDef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataObjectSpec {
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeDef,
}

/// Serializable analysis state (JSON or YAML).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetInfo>,
    #[serde(default)]
    pub segments: Vec<SegmentSpec>,
    #[serde(default)]
    pub types: Vec<TypeSpec>,
    #[serde(default)]
    pub data_objects: Vec<DataObjectSpec>,
    #[serde(default)]
    pub code_refs: Vec<CodeRef>,
}

/// Counts of what an import wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub segments: usize,
    pub types: usize,
    pub data_objects: usize,
    pub code_refs: usize,
}

impl ModelSnapshot {
    /// Read a snapshot; `.yaml` / `.yml` files are YAML, everything else JSON.
    pub fn from_path(path: &Path) -> Result<Self, SnapshotError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| SnapshotError::Io { path: path.to_path_buf(), source })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Ok(serde_yaml::from_str(&text)?),
            _ => Ok(serde_json::from_str(&text)?),
        }
    }

    /// Write everything into `db` as one transaction.
    pub fn import_into(&self, db: &mut AnalysisDb) -> Result<ImportSummary, SnapshotError> {
        db.begin_transaction()?;
        match self.write(db) {
            Ok(summary) => {
                db.commit_transaction()?;
                Ok(summary)
            }
            Err(err) => {
                db.rollback_transaction()?;
                Err(err)
            }
        }
    }

    fn write(&self, db: &mut AnalysisDb) -> Result<ImportSummary, SnapshotError> {
        if let Some(target) = &self.target {
            db.set_target(target)?;
        }
        for segment in &self.segments {
            db.add_segment(segment.start, segment.name.as_deref(), &segment.bytes()?)?;
        }
        for spec in &self.types {
            db.define_type(&spec.name, &spec.definition)?;
        }
        for object in &self.data_objects {
            db.insert_data_object(object.address, object.name.as_deref(), &object.ty)?;
        }
        for code_ref in &self.code_refs {
            db.add_code_ref(code_ref.from, code_ref.to)?;
        }

        Ok(ImportSummary {
            segments: self.segments.len(),
            types: self.types.len(),
            data_objects: self.data_objects.len(),
            code_refs: self.code_refs.len(),
        })
    }
}
