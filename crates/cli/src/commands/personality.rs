//! `memir personality load`: Store the personality core.

use super::{CommandResult, load_config, open_store};
use memir_agent::skills::PERSONALITY_CORE_TYPE;
use memir_core::memory::MemoryMetadata;
use std::path::Path;

pub const PERSONALITY_TITLE: &str = "M.E.M.I.R. Personality Core";

pub fn personality_metadata() -> MemoryMetadata {
    MemoryMetadata::new(PERSONALITY_CORE_TYPE)
        .with_format("markdown")
        .with_title(PERSONALITY_TITLE)
        .with_tags(["personality", "core", "system_prompt"])
        .with_source("template_script")
}

pub async fn load(config_path: Option<&Path>, file: &Path) -> CommandResult {
    let document = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    if document.trim().is_empty() {
        return Err(format!("{} is empty", file.display()).into());
    }

    let config = load_config(config_path)?;
    let store = open_store(&config).await?;
    let record = store.add(&document, personality_metadata()).await?;

    println!("Stored personality core ({} chars)", document.chars().count());
    println!("   id: {}", record.id);
    Ok(())
}
