//! HTTP gateway for M.E.M.I.R.
//!
//! Exposes chat, memory management, direct completion and weather
//! endpoints over axum. All subsystems are built once in
//! [`AppState::from_config`] and shared by every request.

pub mod api;
pub mod chat;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use memir_agent::{AgentLoop, LlmSkill, SkillRouter};
use memir_config::AppConfig;
use memir_core::Provider;
use memir_core::error::MemoryError;
use memir_core::event::EventBus;
use memir_core::memory::{Embedder, VectorIndex};
use memir_memory::{
    HashingEmbedder, InMemoryIndex, LazyEmbedder, MemoryStore, ProviderEmbedder, SqliteIndex,
};
use memir_providers::ProviderRouter;
use memir_tools::WeatherClient;

pub use chat::{ChatReply, ChatService};

/// Shared application state for the gateway.
pub struct AppState {
    pub config: AppConfig,
    pub store: MemoryStore,
    pub provider: Arc<dyn Provider>,
    pub chat: ChatService,
    pub weather: Arc<WeatherClient>,
    pub events: Arc<EventBus>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire the tool registry, agent loop and skill router around `store`.
    pub fn new(
        config: AppConfig,
        store: MemoryStore,
        provider: Arc<dyn Provider>,
        events: Arc<EventBus>,
    ) -> Self {
        let weather = Arc::new(WeatherClient::new(config.weather.clone()));
        let tools = Arc::new(memir_tools::default_registry(
            store.clone(),
            provider.clone(),
            weather.clone(),
            &config,
        ));

        let agent = AgentLoop::new(provider.clone(), &config.agent.model, tools)
            .with_config(&config.agent)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_event_bus(events.clone());
        let router = SkillRouter::with_defaults(LlmSkill::new(agent).with_store(store.clone()));
        let chat = ChatService::new(router, store.clone(), config.memory.recall_limit);

        Self {
            config,
            store,
            provider,
            chat,
            weather,
            events,
        }
    }

    /// Tag logged conversations with `channel` instead of `api`.
    pub fn with_chat_channel(mut self, channel: &str) -> Self {
        self.chat = self.chat.with_channel(channel);
        self
    }

    /// Build every subsystem from configuration.
    pub async fn from_config(config: AppConfig) -> Result<Self, memir_core::Error> {
        let providers = memir_providers::build_from_config(&config);
        let provider = providers.default_provider()?;
        let events = Arc::new(EventBus::default());
        let store = build_store(&config, &providers)
            .await?
            .with_event_bus(events.clone());
        Ok(Self::new(config, store, provider, events))
    }
}

/// Open the configured memory store.
pub async fn build_store(
    config: &AppConfig,
    providers: &ProviderRouter,
) -> Result<MemoryStore, MemoryError> {
    let embedding = &config.memory.embedding;
    let embedder: Arc<dyn Embedder> = match embedding.provider.as_str() {
        "hashing" => Arc::new(HashingEmbedder::new(embedding.dimensions)),
        name => {
            let provider = providers.get(name).ok_or_else(|| {
                MemoryError::Embedding(format!("Embedding provider '{name}' is not configured"))
            })?;
            let model = embedding.model.clone();
            Arc::new(LazyEmbedder::new(move || {
                Ok(Arc::new(ProviderEmbedder::new(provider.clone(), model.clone())) as Arc<dyn Embedder>)
            }))
        }
    };

    let index: Arc<dyn VectorIndex> = match config.memory.backend.as_str() {
        "memory" => Arc::new(InMemoryIndex::new()),
        "sqlite" => {
            let path = config.memory.resolved_path();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| MemoryError::backend("open", e))?;
            }
            Arc::new(SqliteIndex::new(&format!("sqlite://{}", path.display())).await?)
        }
        other => {
            return Err(MemoryError::InvalidRequest(format!(
                "Unknown memory backend '{other}'"
            )));
        }
    };

    info!(
        backend = %config.memory.backend,
        embedder = embedder.name(),
        "Memory store ready"
    );
    Ok(MemoryStore::new(embedder, index))
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = state.config.gateway.cors;
    let router = Router::new()
        .route("/", get(api::root_handler))
        .route("/health", get(api::health_handler))
        .route("/chat", post(api::chat_handler))
        .route("/memory/add", post(api::add_memory_handler))
        .route("/memory/search", post(api::search_memory_handler))
        .route("/memory/list", get(api::list_memories_handler))
        .route("/memory/{id}", get(api::get_memory_handler))
        .route("/memory/remove/{id}", delete(api::remove_memory_handler))
        .route("/llm/complete", post(api::llm_complete_handler))
        .route("/weather", get(api::weather_handler))
        .route("/onecall", get(api::onecall_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(state);

    let router = if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };
    router.layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Log domain events until the bus closes.
fn spawn_event_logger(events: &EventBus) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => debug!(event = ?event, "Domain event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let state = Arc::new(AppState::from_config(config).await?);
    spawn_event_logger(&state.events);
    if !state.weather.is_configured() {
        tracing::warn!("OPENWEATHERMAP_API_KEY not set; weather endpoints will return 503");
    }

    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
