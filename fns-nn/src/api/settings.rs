//! Settings API handlers
//!
//! GET/PUT /settings/generation-key. The key itself is never echoed back;
//! the GET reports only whether one is configured.

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::config::is_valid_key;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /settings/generation-key response
#[derive(Debug, Serialize)]
pub struct GenerationKeyStatus {
    /// Whether a key is stored in the database
    pub configured: bool,
}

/// PUT /settings/generation-key request
#[derive(Debug, Deserialize)]
pub struct SetGenerationKeyRequest {
    pub api_key: String,
}

/// GET /settings/generation-key
pub async fn get_generation_key(
    State(state): State<AppState>,
) -> ApiResult<Json<GenerationKeyStatus>> {
    let key = crate::db::settings::get_generation_api_key(&state.db).await?;
    Ok(Json(GenerationKeyStatus {
        configured: key.as_deref().is_some_and(is_valid_key),
    }))
}

/// PUT /settings/generation-key
pub async fn set_generation_key(
    State(state): State<AppState>,
    Json(request): Json<SetGenerationKeyRequest>,
) -> ApiResult<Json<GenerationKeyStatus>> {
    if !is_valid_key(&request.api_key) {
        return Err(ApiError::BadRequest(
            "api_key must not be empty".to_string(),
        ));
    }

    crate::db::settings::set_generation_api_key(&state.db, request.api_key.trim()).await?;
    tracing::info!("Generation API key updated via settings API");

    Ok(Json(GenerationKeyStatus { configured: true }))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new().route(
        "/settings/generation-key",
        get(get_generation_key).put(set_generation_key),
    )
}
