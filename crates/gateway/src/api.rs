//! Route handlers.
//!
//! - `GET    /`                     Welcome message
//! - `GET    /health`               Status, version and memory count
//! - `POST   /chat`                 One chat exchange
//! - `POST   /memory/add`           Store a memory
//! - `POST   /memory/search`        Nearest memories to a query
//! - `GET    /memory/list`          Every memory
//! - `GET    /memory/{id}`          One memory
//! - `DELETE /memory/remove/{id}`   Remove a memory
//! - `POST   /llm/complete`         Direct completion, no tools
//! - `GET    /weather`              Current weather (raw OpenWeatherMap JSON)
//! - `GET    /onecall`              One Call forecast (raw OpenWeatherMap JSON)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use memir_core::error::{MemoryError, ProviderError};
use memir_core::memory::{MemoryMetadata, MemoryRecord, MetadataFilter};
use memir_core::message::{ConversationTurn, Message};
use memir_core::provider::{ProviderRequest, Usage};
use memir_tools::{CurrentWeatherQuery, OneCallQuery, WeatherError};

use crate::SharedState;
use crate::chat::ChatReply;

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A failed request: status plus `{error}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<MemoryError> for ApiError {
    fn from(e: MemoryError) -> Self {
        match e {
            MemoryError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, e.to_string()),
            MemoryError::InvalidRequest(_) | MemoryError::InvalidRecord(_) => {
                Self::new(StatusCode::BAD_REQUEST, e.to_string())
            }
            _ => {
                error!(error = %e, "Memory store failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(e: ProviderError) -> Self {
        error!(error = %e, "Oracle call failed");
        Self::new(StatusCode::BAD_GATEWAY, e.to_string())
    }
}

impl From<memir_core::Error> for ApiError {
    fn from(e: memir_core::Error) -> Self {
        match e {
            memir_core::Error::Provider(p) => p.into(),
            memir_core::Error::Memory(m) => m.into(),
        }
    }
}

impl From<WeatherError> for ApiError {
    fn from(e: WeatherError) -> Self {
        let status = match &e {
            WeatherError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            WeatherError::Upstream { status: 404, .. } => StatusCode::NOT_FOUND,
            WeatherError::Upstream { .. } | WeatherError::Request(_) => StatusCode::BAD_GATEWAY,
        };
        warn!(error = %e, "Weather request failed");
        Self::new(status, e.to_string())
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ── General ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
}

pub async fn root_handler() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to M.E.M.I.R. API!".into(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub memories: Option<usize>,
}

/// Reports `degraded` rather than failing when the store cannot be counted.
pub async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let memories = match state.store.count().await {
        Ok(n) => Some(n),
        Err(e) => {
            warn!(error = %e, "Health check could not count memories");
            None
        }
    };
    Json(HealthResponse {
        status: if memories.is_some() { "ok" } else { "degraded" }.into(),
        version: env!("CARGO_PKG_VERSION").into(),
        memories,
    })
}

// ── Chat ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

pub async fn chat_handler(
    State(state): State<SharedState>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<ChatReply>> {
    info!(
        message_len = req.message.len(),
        history_len = req.history.len(),
        "Chat request"
    );
    let reply = state.chat.chat(&req.message, &req.history).await?;
    Ok(Json(reply))
}

// ── Memory ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AddMemoryRequest {
    pub document: String,
    pub metadata: MemoryMetadata,
}

pub async fn add_memory_handler(
    State(state): State<SharedState>,
    Json(req): Json<AddMemoryRequest>,
) -> ApiResult<(StatusCode, Json<MemoryRecord>)> {
    let record = state.store.add(&req.document, req.metadata).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Debug, Deserialize)]
pub struct SearchMemoryRequest {
    pub query: String,
    #[serde(default = "default_n_results")]
    pub n_results: usize,
    #[serde(default)]
    pub filter: Option<MetadataFilter>,
}

fn default_n_results() -> usize {
    3
}

pub async fn search_memory_handler(
    State(state): State<SharedState>,
    Json(req): Json<SearchMemoryRequest>,
) -> ApiResult<Json<Vec<MemoryRecord>>> {
    let records = state
        .store
        .search(&req.query, req.n_results, req.filter.as_ref())
        .await?;
    Ok(Json(records))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemoryListResponse {
    pub memories: Vec<MemoryRecord>,
}

pub async fn list_memories_handler(
    State(state): State<SharedState>,
) -> ApiResult<Json<MemoryListResponse>> {
    let memories = state.store.list().await?;
    Ok(Json(MemoryListResponse { memories }))
}

pub async fn get_memory_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MemoryRecord>> {
    Ok(Json(state.store.get(&id).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveResponse {
    pub status: String,
}

pub async fn remove_memory_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RemoveResponse>> {
    if state.store.remove(&id).await? {
        Ok(Json(RemoveResponse {
            status: "deleted".into(),
        }))
    } else {
        Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("Memory '{id}' not found"),
        ))
    }
}

// ── Direct completion ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub prompt: String,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<Usage>,
}

pub async fn llm_complete_handler(
    State(state): State<SharedState>,
    Json(req): Json<CompleteRequest>,
) -> ApiResult<Json<CompleteResponse>> {
    let config = &state.config;
    let model = req.model.unwrap_or_else(|| config.default_model.clone());
    let request = ProviderRequest::new(model, vec![Message::user(req.prompt)])
        .with_temperature(req.temperature.unwrap_or(config.temperature))
        .with_max_tokens(req.max_tokens.unwrap_or(config.max_tokens));

    let response = state.provider.complete(request).await?;
    Ok(Json(CompleteResponse {
        content: response.message.content,
        model: response.model,
        usage: response.usage,
    }))
}

// ── Weather ───────────────────────────────────────────────────────────────

pub async fn weather_handler(
    State(state): State<SharedState>,
    Query(query): Query<CurrentWeatherQuery>,
) -> ApiResult<Json<Value>> {
    let location = query.location(state.weather.config().home_city_id);
    let data = state
        .weather
        .current(&location, query.units.as_deref())
        .await?;
    Ok(Json(data))
}

pub async fn onecall_handler(
    State(state): State<SharedState>,
    Query(query): Query<OneCallQuery>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.weather.onecall(&query).await?))
}
