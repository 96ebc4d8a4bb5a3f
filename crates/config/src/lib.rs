//! Configuration loading and validation for MEMIR.
//!
//! Loads configuration from `~/.memir/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.memir/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the default provider (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model used for direct completions (`/llm/complete`, `llm_chat`)
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub weather: WeatherConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "openai/gpt-4.1-nano".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("memory", &self.memory)
            .field("gateway", &self.gateway)
            .field("weather", &self.weather)
            .field("providers", &self.providers)
            .finish()
    }
}

/// Agent loop limits and the model that drives tool calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_model")]
    pub model: String,

    /// Oracle consultations allowed per exchange
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Identical consecutive calls dispatched before further repeats are suppressed
    #[serde(default = "default_max_consecutive_repeats")]
    pub max_consecutive_repeats: usize,

    /// Distinct search queries allowed per exchange
    #[serde(default = "default_max_distinct_queries")]
    pub max_distinct_queries: usize,
}

fn default_agent_model() -> String {
    "google/gemini-2.0-flash-001".into()
}
fn default_max_steps() -> usize {
    5
}
fn default_max_consecutive_repeats() -> usize {
    2
}
fn default_max_distinct_queries() -> usize {
    3
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_agent_model(),
            max_steps: default_max_steps(),
            max_consecutive_repeats: default_max_consecutive_repeats(),
            max_distinct_queries: default_max_distinct_queries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// `sqlite` or `memory`
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// SQLite database file. Defaults to `~/.memir/memory.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Past conversation turns recalled per chat message
    #[serde(default = "default_recall_limit")]
    pub recall_limit: usize,

    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

fn default_memory_backend() -> String {
    "sqlite".into()
}
fn default_recall_limit() -> usize {
    2
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            path: None,
            recall_limit: default_recall_limit(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl MemoryConfig {
    pub const BACKENDS: [&'static str; 2] = ["sqlite", "memory"];

    /// The database path, falling back to the config directory.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("memory.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// `hashing` (local, offline) or the name of an OpenAI-compatible provider
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

fn default_embedding_provider() -> String {
    "hashing".into()
}
fn default_embedding_model() -> String {
    "all-MiniLM-L6-v2".into()
}
fn default_dimensions() -> usize {
    384
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allow any origin
    #[serde(default = "default_true")]
    pub cors: bool,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors: true,
        }
    }
}

/// OpenWeatherMap settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_weather_url")]
    pub base_url: String,

    #[serde(default = "default_home_lat")]
    pub home_lat: f64,

    #[serde(default = "default_home_lon")]
    pub home_lon: f64,

    #[serde(default = "default_home_city_id")]
    pub home_city_id: u64,

    #[serde(default = "default_units")]
    pub units: String,
}

fn default_weather_url() -> String {
    "https://api.openweathermap.org".into()
}
fn default_home_lat() -> f64 {
    42.968004
}
fn default_home_lon() -> f64 {
    -81.227165
}
fn default_home_city_id() -> u64 {
    6058560
}
fn default_units() -> String {
    "metric".into()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_weather_url(),
            home_lat: default_home_lat(),
            home_lon: default_home_lon(),
            home_city_id: default_home_city_id(),
            units: default_units(),
        }
    }
}

impl std::fmt::Debug for WeatherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("home_lat", &self.home_lat)
            .field("home_lon", &self.home_lon)
            .field("home_city_id", &self.home_city_id)
            .field("units", &self.units)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl AppConfig {
    /// Read `path` (or `~/.memir/config.toml`), apply environment overrides
    /// and validate.
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path(),
        };
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// API keys from the environment only fill gaps; provider, model and
    /// memory path always win over the file.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("MEMIR_API_KEY")
                .or_else(|| lookup("OPENROUTER_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("MEMIR_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("MEMIR_MODEL") {
            self.default_model = model;
        }

        if self.weather.api_key.is_none() {
            self.weather.api_key = lookup("OPENWEATHERMAP_API_KEY");
        }

        if let Some(path) = lookup("MEMIR_MEMORY_PATH") {
            self.memory.path = Some(PathBuf::from(path));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".memir")
    }

    /// The default config file, `~/.memir/config.toml`.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be at least 1".into(),
            ));
        }

        if self.agent.max_consecutive_repeats == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_consecutive_repeats must be at least 1".into(),
            ));
        }

        if self.agent.max_distinct_queries == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_distinct_queries must be at least 1".into(),
            ));
        }

        if self.memory.embedding.dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "memory.embedding.dimensions must be > 0".into(),
            ));
        }

        if !MemoryConfig::BACKENDS.contains(&self.memory.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown memory backend '{}' (expected one of: {})",
                self.memory.backend,
                MemoryConfig::BACKENDS.join(", ")
            )));
        }

        Ok(())
    }

    /// The API key for `provider`: per-provider first, then the global key.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key_for(&self.default_provider).is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            memory: MemoryConfig::default(),
            gateway: GatewayConfig::default(),
            weather: WeatherConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_provider, "openrouter");
        assert_eq!(config.default_model, "openai/gpt-4.1-nano");
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.agent.max_steps, 5);
        assert_eq!(config.agent.max_distinct_queries, 3);
        assert_eq!(config.memory.recall_limit, 2);
        assert_eq!(config.weather.home_city_id, 6058560);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.agent.model, config.agent.model);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_step_budget_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_steps = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.agent.max_distinct_queries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_backend_rejected() {
        let mut config = AppConfig::default();
        config.memory.backend = "chroma".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chroma"));
    }

    #[test]
    fn zero_repeats_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_consecutive_repeats = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_consecutive_repeats"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "openrouter");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_model = "openai/gpt-4o-mini"

[agent]
max_steps = 8

[memory]
backend = "memory"

[providers.ollama]
api_url = "http://localhost:11434/v1"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_model, "openai/gpt-4o-mini");
        assert_eq!(config.agent.max_steps, 8);
        assert_eq!(config.agent.max_consecutive_repeats, 2);
        assert_eq!(config.memory.backend, "memory");
        assert_eq!(config.memory.embedding.dimensions, 384);
        assert_eq!(
            config.providers["ollama"].api_url.as_deref(),
            Some("http://localhost:11434/v1")
        );
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "temperature = \"hot\"").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(env(&[
            ("OPENROUTER_API_KEY", "sk-or"),
            ("MEMIR_MODEL", "anthropic/claude-3-haiku"),
            ("OPENWEATHERMAP_API_KEY", "owm"),
            ("MEMIR_MEMORY_PATH", "/tmp/memir-test.db"),
        ]));
        assert_eq!(config.api_key.as_deref(), Some("sk-or"));
        assert_eq!(config.default_model, "anthropic/claude-3-haiku");
        assert_eq!(config.weather.api_key.as_deref(), Some("owm"));
        assert_eq!(
            config.memory.resolved_path(),
            PathBuf::from("/tmp/memir-test.db")
        );
    }

    #[test]
    fn file_api_key_beats_env() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env_overrides(env(&[("MEMIR_API_KEY", "from-env")]));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn provider_key_takes_precedence() {
        let mut config = AppConfig {
            api_key: Some("global".into()),
            ..AppConfig::default()
        };
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("openai-key".into()),
                api_url: None,
            },
        );
        assert_eq!(config.api_key_for("openai").as_deref(), Some("openai-key"));
        assert_eq!(config.api_key_for("openrouter").as_deref(), Some("global"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config.weather.api_key = Some("owm-secret".into());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(!rendered.contains("owm-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
