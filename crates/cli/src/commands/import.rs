use anyhow::{anyhow, Context, Result};
use panic_sites_core::db::{AnalysisDb, ModelSnapshot, ProjectContext};
use panic_sites_core::services::image::BinaryImage;
use panic_sites_core::services::AnalysisModel;

use crate::commands::{open_project, resolve_input_path};
use crate::sha256_file;

/// Load a binary's target metadata and section bytes into the project database.
///
/// String views and code references come from other analysis passes; use
/// `import-snapshot` to bring those in.
pub fn import_binary_command(root: &str, path: &str, skip_hash: bool) -> Result<()> {
    let ProjectContext { layout, db_path, mut db, .. } = open_project(root)?;

    let abs_path = resolve_input_path(&layout.root, path);
    if !abs_path.exists() {
        return Err(anyhow!("Binary file does not exist: {}", abs_path.display()));
    }

    let image = BinaryImage::load(&abs_path)
        .with_context(|| format!("Failed to load binary image {}", abs_path.display()))?;
    let hash = if skip_hash { None } else { Some(sha256_file(&abs_path)?) };

    db.begin_transaction()?;
    if let Err(err) = write_image(&db, &image, hash.as_deref()) {
        db.rollback_transaction()?;
        return Err(err);
    }
    db.commit_transaction()?;

    tracing::info!(
        segments = image.segments.len(),
        platform = %image.target.platform,
        "imported binary image"
    );
    println!("Imported binary:");
    println!("  Path: {}", abs_path.display());
    println!("  Platform: {}", image.target.platform);
    println!("  Arch: {}", image.target.arch.as_deref().unwrap_or("(unknown)"));
    println!("  Sections: {}", image.segments.len());
    println!("  Hash: {}", hash.as_deref().unwrap_or("(skipped)"));
    println!("  DB: {}", db_path.display());

    Ok(())
}

fn write_image(db: &AnalysisDb, image: &BinaryImage, hash: Option<&str>) -> Result<()> {
    db.set_target(&image.target).context("Failed to store target metadata")?;
    db.set_binary_hash(hash).context("Failed to store binary hash")?;
    for segment in &image.segments {
        db.add_segment(segment.start, Some(&segment.name), &segment.bytes)
            .with_context(|| format!("Failed to store section {}", segment.name))?;
    }
    Ok(())
}

/// Import analysis state (types, data objects, code references) from a JSON or YAML snapshot.
pub fn import_snapshot_command(root: &str, path: &str, json: bool) -> Result<()> {
    let ProjectContext { layout, mut db, .. } = open_project(root)?;

    let snapshot_path = resolve_input_path(&layout.root, path);
    let snapshot = ModelSnapshot::from_path(&snapshot_path)?;
    let summary = snapshot
        .import_into(&mut db)
        .with_context(|| format!("Failed to import snapshot {}", snapshot_path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Imported snapshot {}:", snapshot_path.display());
    println!("  Segments: {}", summary.segments);
    println!("  Types: {}", summary.types);
    println!("  Data objects: {}", summary.data_objects);
    println!("  Code references: {}", summary.code_refs);

    Ok(())
}
