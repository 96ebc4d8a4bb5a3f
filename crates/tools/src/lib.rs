//! Built-in tool implementations for MEMIR.
//!
//! Tools give the agent access to the user's memory store, the language
//! model, and the weather. The structured tools take JSON objects; the
//! legacy ones take a single positional argument.

pub mod echo;
pub mod legacy_memory;
pub mod llm_chat;
pub mod memory_add;
pub mod memory_get;
pub mod memory_search;
pub mod weather_client;
pub mod weather_lookup;

use memir_config::AppConfig;
use memir_core::error::ToolError;
use memir_core::provider::Provider;
use memir_core::tool::ToolRegistry;
use memir_memory::MemoryStore;
use std::sync::Arc;

pub use echo::echo_reply;
pub use weather_client::{CurrentWeatherQuery, Location, OneCallQuery, WeatherClient, WeatherError};

pub(crate) fn execution_failed(tool_name: &str, reason: impl std::fmt::Display) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: tool_name.to_string(),
        reason: reason.to_string(),
    }
}

/// Create the default tool registry.
pub fn default_registry(
    store: MemoryStore,
    provider: Arc<dyn Provider>,
    weather: Arc<WeatherClient>,
    config: &AppConfig,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Box::new(memory_search::MemorySearchTool::new(store.clone())));
    registry.register(Box::new(memory_add::MemoryAddTool::new(store.clone())));
    registry.register(Box::new(memory_get::MemoryGetTool::new(store.clone())));
    registry.register(Box::new(echo::EchoTool));
    registry.register(Box::new(
        llm_chat::LlmChatTool::new(provider, &config.default_model)
            .with_limits(config.temperature, config.max_tokens),
    ));

    registry.register(Box::new(legacy_memory::SaveMemoryTool::new(store.clone())));
    registry.register(Box::new(legacy_memory::SearchMemoryTool::new(store.clone())));
    registry.register(Box::new(legacy_memory::ListMemoriesTool::new(store.clone())));
    registry.register(Box::new(legacy_memory::RemoveMemoryTool::new(store)));

    registry.register(Box::new(weather_lookup::WeatherLookupTool::new(weather.clone())));
    registry.register(Box::new(weather_lookup::WeatherForecastTool::new(weather)));

    registry
}
