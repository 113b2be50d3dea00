use std::path::{Path, PathBuf};

use anyhow::Result;
use panic_sites_core::db::{ProjectContext, ProjectLayout};

use crate::canonicalize_or_current;

/// Load the project at `root`: layout, config and the open analysis database.
pub fn open_project(root: &str) -> Result<ProjectContext> {
    ProjectContext::open(project_layout(root)?)
}

/// Canonicalize `root` and compute its layout.
pub fn project_layout(root: &str) -> Result<ProjectLayout> {
    Ok(ProjectLayout::new(canonicalize_or_current(root)?))
}

/// Helper to print whether a directory exists.
pub fn print_dir_status(label: &str, path: &Path) {
    let exists = path.is_dir();
    println!("- {label}: {} ({})", if exists { "OK" } else { "MISSING" }, path.display());
}

/// Resolve a user-supplied path against the project root.
pub fn resolve_input_path(root: &Path, path: &str) -> PathBuf {
    let input = Path::new(path);
    if input.is_absolute() {
        input.to_path_buf()
    } else {
        root.join(input)
    }
}
