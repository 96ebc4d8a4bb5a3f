pub mod chat;
pub mod memory;
pub mod personality;
pub mod serve;
pub mod status;

use memir_config::AppConfig;
use memir_memory::MemoryStore;
use std::path::Path;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load_with(path).map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Open the configured memory store without starting the agent.
pub async fn open_store(config: &AppConfig) -> Result<MemoryStore, Box<dyn std::error::Error>> {
    let providers = memir_providers::build_from_config(config);
    let store = memir_gateway::build_store(config, &providers)
        .await
        .map_err(|e| format!("Failed to open memory store: {e}"))?;
    Ok(store)
}

/// The first line of `text`, cut to `max` characters.
pub fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > max {
        let cut: String = line.chars().take(max).collect();
        format!("{cut}…")
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_takes_first_line_and_truncates() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("first\nsecond", 10), "first");
        assert_eq!(preview("abcdefghij", 4), "abcd…");
        assert_eq!(preview("", 4), "");
    }
}
