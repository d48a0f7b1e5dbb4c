//! Naturalization run API handlers
//!
//! POST /naturalize/run, GET /naturalize/run/{run_id},
//! POST /naturalize/run/{run_id}/cancel

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{NaturalizeParameters, NaturalizeRun, RunError, RunState, RunStats};
use crate::pipeline::{GenerationClient, HttpGenerationClient, PipelineRunner};
use crate::AppState;

/// POST /naturalize/run request
#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    /// Maximum pending records to fetch
    pub limit: u32,
    /// Optional record category filter
    pub category: Option<String>,
    /// Tuning parameter overrides
    #[serde(default)]
    pub parameters: NaturalizeParameters,
}

/// POST /naturalize/run response
#[derive(Debug, Serialize)]
pub struct StartRunResponse {
    pub run_id: Uuid,
    pub state: RunState,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// GET /naturalize/run/{run_id} response
#[derive(Debug, Serialize)]
pub struct RunStatusResponse {
    pub run_id: Uuid,
    pub state: RunState,
    pub stats: RunStats,
    pub errors: Vec<RunError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// POST /naturalize/run/{run_id}/cancel response
#[derive(Debug, Serialize)]
pub struct CancelRunResponse {
    pub run_id: Uuid,
    pub state: RunState,
    pub cancel_requested: bool,
}

/// POST /naturalize/run
///
/// Accepts a run and spawns the pipeline in a background task. Returns 202
/// with the run id; progress is available via the status endpoint and the
/// event stream.
pub async fn start_run(
    State(state): State<AppState>,
    Json(request): Json<StartRunRequest>,
) -> ApiResult<(axum::http::StatusCode, Json<StartRunResponse>)> {
    if request.limit == 0 {
        return Err(ApiError::BadRequest("limit must be at least 1".to_string()));
    }
    if request.parameters.batch_size == 0 {
        return Err(ApiError::BadRequest(
            "parameters.batch_size must be at least 1".to_string(),
        ));
    }

    // One run at a time at the HTTP surface
    if crate::db::runs::has_running_run(&state.db).await? {
        return Err(ApiError::Conflict(
            "Naturalization run already in progress".to_string(),
        ));
    }

    // Resolve the generation client up front so a missing API key fails the
    // request instead of the background task.
    let generation: Arc<dyn GenerationClient> = match &state.generation_client {
        Some(client) => client.clone(),
        None => Arc::new(HttpGenerationClient::from_config(&state.db, &state.toml_config).await?),
    };

    let run = NaturalizeRun::new(request.limit, request.category, request.parameters);
    let response = StartRunResponse {
        run_id: run.run_id,
        state: run.state,
        started_at: run.started_at,
    };

    crate::db::runs::save_run(&state.db, &run).await?;

    let cancel_token = CancellationToken::new();
    state
        .run_tokens
        .write()
        .await
        .insert(run.run_id, cancel_token.clone());

    tracing::info!(
        run_id = %run.run_id,
        limit = run.limit,
        "Naturalization run accepted"
    );

    let runner = PipelineRunner::new(state.db.clone(), state.event_bus.clone(), generation);
    let run_id = run.run_id;
    let state_clone = state.clone();
    tokio::spawn(async move {
        match runner.execute(run, cancel_token).await {
            Ok(finished) => {
                tracing::info!(
                    run_id = %run_id,
                    state = finished.state.as_str(),
                    "Run background task finished"
                );
            }
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "Run background task failed");
                *state_clone.last_error.write().await = Some(e.to_string());
            }
        }
        state_clone.run_tokens.write().await.remove(&run_id);
    });

    Ok((axum::http::StatusCode::ACCEPTED, Json(response)))
}

/// GET /naturalize/run/{run_id}
pub async fn get_run_status(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<RunStatusResponse>> {
    let run = crate::db::runs::load_run(&state.db, run_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Run not found: {}", run_id)))?;

    Ok(Json(RunStatusResponse {
        run_id: run.run_id,
        state: run.state,
        stats: run.stats,
        errors: run.errors,
        fatal_error: run.fatal_error,
        started_at: run.started_at,
        ended_at: run.ended_at,
    }))
}

/// POST /naturalize/run/{run_id}/cancel
///
/// Cooperative: the pipeline observes the token between phases and before
/// each batch; in-flight work drains before the run reports CANCELLED.
pub async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<CancelRunResponse>> {
    let run = crate::db::runs::load_run(&state.db, run_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Run not found: {}", run_id)))?;

    let cancel_requested = match state.run_tokens.read().await.get(&run_id) {
        Some(token) => {
            token.cancel();
            true
        }
        None => false,
    };

    if !cancel_requested {
        return Err(ApiError::Conflict(format!(
            "Run is not active: {}",
            run.state.as_str()
        )));
    }

    tracing::info!(run_id = %run_id, "Run cancellation requested");

    Ok(Json(CancelRunResponse {
        run_id,
        state: run.state,
        cancel_requested,
    }))
}

/// Build naturalization run routes
pub fn run_routes() -> Router<AppState> {
    Router::new()
        .route("/naturalize/run", post(start_run))
        .route("/naturalize/run/:run_id", get(get_run_status))
        .route("/naturalize/run/:run_id/cancel", post(cancel_run))
}
