use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::db::{open_project_db, AnalysisDb, ProjectConfig, ProjectLayout};

/// Convenience wrapper bundling layout, config, db path, and an open AnalysisDb.
#[derive(Debug)]
pub struct ProjectContext {
    pub layout: ProjectLayout,
    pub config: ProjectConfig,
    pub db_path: PathBuf,
    pub db: AnalysisDb,
}

impl ProjectContext {
    /// Load project config and open the database for a given root.
    pub fn from_root(root: impl AsRef<Path>) -> Result<Self> {
        Self::open(ProjectLayout::new(root))
    }

    /// Load project config and open the database described by `layout`.
    pub fn open(layout: ProjectLayout) -> Result<Self> {
        let (config, db_path, db) = open_project_db(&layout)?;
        Ok(Self { layout, config, db_path, db })
    }
}
