use thiserror::Error;

use crate::model::{Address, DataObject, Tag, TargetInfo, TypeDef};

#[derive(Debug, Error)]
pub enum ModelError {
    /// Defining an object would overlap an incompatible object already at that location.
    #[error("cannot define `{requested}` at {address:#x}: conflicts with `{existing}`")]
    Conflict { address: Address, existing: String, requested: String },
    #[error("type `{0}` is not registered")]
    UnknownType(String),
    #[error("tag type `{0}` does not exist")]
    UnknownTagType(String),
    #[error("no transaction is open")]
    NoTransaction,
    /// The backing store failed; the current unit of work cannot be trusted.
    #[error("analysis storage error: {0}")]
    Storage(String),
}

impl ModelError {
    /// Whether the failure concerns a single item and the caller can skip it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ModelError::Conflict { .. } | ModelError::UnknownType(_) | ModelError::UnknownTagType(_)
        )
    }
}

pub type ModelResult<T> = Result<T, ModelError>;

/// The binary analysis database the pipeline reads from and mutates.
///
/// Implemented by the SQLite-backed `AnalysisDb`; host bindings for other engines
/// implement the same surface.
pub trait AnalysisModel {
    /// Target metadata (architecture, platform name, byte order).
    fn target(&self) -> ModelResult<TargetInfo>;

    fn type_by_name(&self, name: &str) -> ModelResult<Option<TypeDef>>;

    fn type_exists(&self, name: &str) -> ModelResult<bool> {
        Ok(self.type_by_name(name)?.is_some())
    }

    /// Register a user type under `name`, replacing any previous definition.
    fn define_type(&mut self, name: &str, ty: &TypeDef) -> ModelResult<()>;

    /// Addresses of all data objects whose type is the named type `type_name`.
    fn data_objects_of_type(&self, type_name: &str) -> ModelResult<Vec<Address>>;

    fn data_object_at(&self, address: Address) -> ModelResult<Option<DataObject>>;

    /// Define a user data object of the registered type `type_name` at `address`.
    fn define_data_object(
        &mut self,
        address: Address,
        type_name: &str,
        name: &str,
    ) -> ModelResult<DataObject>;

    /// Addresses of instructions that reference `address`.
    fn code_references_to(&self, address: Address) -> ModelResult<Vec<Address>>;

    fn tag_type_exists(&self, name: &str) -> ModelResult<bool>;

    /// Create a tag type; creating an existing one is a no-op.
    fn create_tag_type(&mut self, name: &str, icon: &str) -> ModelResult<()>;

    fn add_tag(&mut self, tag: &Tag) -> ModelResult<()>;

    fn tags_at(&self, address: Address) -> ModelResult<Vec<Tag>>;

    fn begin_transaction(&mut self) -> ModelResult<()>;

    fn commit_transaction(&mut self) -> ModelResult<()>;

    fn rollback_transaction(&mut self) -> ModelResult<()>;

    /// Ask the engine to re-run its analysis over the mutated database.
    fn trigger_reanalysis(&mut self) -> ModelResult<()>;
}
