//! fns-nn library interface
//!
//! Exposes the naturalization pipeline and HTTP surface for the binary and
//! for integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pipeline;

pub use crate::error::{ApiError, ApiResult};
pub use crate::pipeline::PipelineRunner;

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use fns_common::config::TomlConfig;
use fns_common::events::EventBus;

use crate::pipeline::GenerationClient;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// TOML configuration (generation key fallback, model override)
    pub toml_config: Arc<TomlConfig>,
    /// Injected generation client; None means resolve from configuration
    /// at run start (production path)
    pub generation_client: Option<Arc<dyn GenerationClient>>,
    /// Cancellation tokens for active runs
    pub run_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, toml_config: TomlConfig) -> Self {
        Self {
            db,
            event_bus,
            toml_config: Arc::new(toml_config),
            generation_client: None,
            run_tokens: Arc::new(RwLock::new(HashMap::new())),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Use a fixed generation client instead of configuration resolution
    /// (tests, preconfigured deployments)
    pub fn with_generation_client(mut self, client: Arc<dyn GenerationClient>) -> Self {
        self.generation_client = Some(client);
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::run_routes())
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .with_state(state)
}
