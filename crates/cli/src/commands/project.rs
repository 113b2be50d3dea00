use std::fs;

use anyhow::{Context, Result};
use panic_sites_core::db::{AnalysisDb, ProjectConfig, ProjectContext};
use panic_sites_core::model::TargetInfo;
use panic_sites_core::services::panic_locations::PipelineOptions;
use panic_sites_core::services::AnalysisModel;
use serde::Serialize;

use crate::commands::{open_project, print_dir_status, project_layout};
use crate::infer_project_name;

#[derive(Serialize)]
pub struct ProjectInfoSnapshot {
    pub name: String,
    pub root: String,
    pub config_file: String,
    pub config_version: String,
    pub db_path: String,
    pub binary_hash: Option<String>,
    pub target: TargetInfo,
    pub pipeline: PipelineOptions,
    pub data_objects: usize,
    pub tags: usize,
    pub pipeline_runs: usize,
}

/// Initialize a new project at `root`.
pub fn init_project_command(root: &str, name: Option<String>) -> Result<()> {
    let layout = project_layout(root)?;

    // Derive project name if not provided.
    let project_name = match name {
        Some(n) => n,
        None => infer_project_name(&layout.root),
    };

    fs::create_dir_all(&layout.meta_dir)
        .with_context(|| format!("Failed to create meta dir: {}", layout.meta_dir.display()))?;

    let config = ProjectConfig::new(&project_name, layout.db_path_relative_string());
    let json = serde_json::to_string_pretty(&config)?;
    fs::write(&layout.project_config_path, json).with_context(|| {
        format!("Failed to write project config: {}", layout.project_config_path.display())
    })?;

    // Create the database immediately so follow-on commands can rely on it.
    AnalysisDb::open(&layout.db_path).with_context(|| {
        format!("Failed to initialize analysis database at {}", layout.db_path.display())
    })?;

    println!("Initialized panic-sites project (core v{}):", panic_sites_core::version());
    println!("  Name: {}", project_name);
    println!("  Root: {}", layout.root.display());
    println!("  Config: {}", layout.project_config_path.display());
    println!("  DB path (relative): {}", config.db.path);

    Ok(())
}

/// Show basic information about an existing project.
pub fn project_info_command(root: &str, json: bool) -> Result<()> {
    let ProjectContext { layout, config, db, .. } = open_project(root)?;

    let target = db.target().context("Failed to read target metadata")?;
    let binary_hash = db.binary_hash().context("Failed to read binary hash")?;
    let data_objects = db.list_data_objects().context("Failed to list data objects")?.len();
    let tags = db.list_tags().context("Failed to list tags")?.len();
    let pipeline_runs = db.list_pipeline_runs().context("Failed to list pipeline runs")?.len();

    if json {
        let snapshot = ProjectInfoSnapshot {
            name: config.name.clone(),
            root: layout.root.display().to_string(),
            config_file: layout.project_config_path.display().to_string(),
            config_version: config.config_version.clone(),
            db_path: config.db.path.clone(),
            binary_hash,
            target,
            pipeline: config.pipeline.clone(),
            data_objects,
            tags,
            pipeline_runs,
        };
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("panic-sites Project Info");
    println!("========================");
    println!("Name: {}", config.name);
    println!("Root: {}", layout.root.display());
    println!("Config file: {}", layout.project_config_path.display());
    println!("Config version: {}", config.config_version);
    println!("DB path (config): {}", config.db.path);
    let arch = target.arch.as_deref().unwrap_or("unknown");
    println!("Target: {} (arch: {})", target.platform, arch);
    println!("Binary hash: {}", binary_hash.as_deref().unwrap_or("(none)"));
    println!("Source extensions: {}", config.pipeline.source_extensions.join(", "));
    println!();

    println!("Directories:");
    print_dir_status("Meta dir (.panic-sites)", &layout.meta_dir);
    println!();
    println!("Data objects: {}", data_objects);
    println!("Tags: {}", tags);
    println!("Pipeline runs: {}", pipeline_runs);

    Ok(())
}
