use std::collections::HashMap;

use anyhow::{Context, Result};
use panic_sites_core::db::ProjectContext;
use panic_sites_core::model::Tag;
use serde::Serialize;

use crate::commands::open_project;

#[derive(Serialize)]
pub struct TagInfo {
    pub address: String,
    pub tag_type: String,
    pub icon: String,
    pub data: String,
    pub user: bool,
}

impl TagInfo {
    fn new(tag: Tag, icons: &HashMap<String, String>) -> Self {
        let icon = icons.get(&tag.tag_type).cloned().unwrap_or_default();
        Self {
            address: format!("{:#x}", tag.address),
            tag_type: tag.tag_type,
            icon,
            data: tag.data,
            user: tag.user,
        }
    }
}

/// List tags, optionally only those of tag types whose name contains `filter`.
pub fn list_tags_command(root: &str, filter: Option<&str>, json: bool) -> Result<()> {
    let ProjectContext { db, .. } = open_project(root)?;

    let icons: HashMap<String, String> = db
        .list_tag_types()
        .context("Failed to list tag types")?
        .into_iter()
        .map(|t| (t.name, t.icon))
        .collect();
    let tags: Vec<TagInfo> = db
        .list_tags()
        .context("Failed to list tags")?
        .into_iter()
        .filter(|tag| filter.map_or(true, |needle| tag.tag_type.contains(needle)))
        .map(|tag| TagInfo::new(tag, &icons))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&tags)?);
        return Ok(());
    }

    println!("Tags:");
    if tags.is_empty() {
        println!("(none)");
        return Ok(());
    }
    for tag in tags {
        println!("- {} {} {}", tag.address, tag.icon, tag.data);
    }

    Ok(())
}
