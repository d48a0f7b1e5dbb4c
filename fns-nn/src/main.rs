//! fns-nn - Name Naturalizer Microservice
//!
//! **Module Identity:**
//! - Name: fns-nn (Name Naturalizer)
//! - Port: 5741
//!
//! Converts raw business names into conversational short names via an
//! external text-generation API, caching every resolution so each unique
//! name is computed at most once.

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use fns_common::events::EventBus;
use fns_nn::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load TOML configuration first; it drives the log level
    let toml_config = fns_common::config::TomlConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    let level = toml_config
        .logging
        .level
        .parse::<Level>()
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting fns-nn (Name Naturalizer) microservice");
    info!("Port: 5741");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Resolve and prepare the root folder
    let root_folder = fns_common::config::resolve_root_folder(None, &toml_config);
    fns_common::config::ensure_root_folder(&root_folder)
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    let db_path = fns_common::config::database_path(&root_folder);
    info!("Database: {}", db_path.display());

    let db_pool = fns_nn::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Close out runs left open by a previous crash
    let orphaned = fns_nn::db::runs::fail_orphaned_runs(&db_pool).await?;
    if orphaned > 0 {
        info!("Marked {} orphaned run(s) as failed", orphaned);
    }

    let event_bus = EventBus::new(100);
    info!("Event bus initialized");

    let state = AppState::new(db_pool, event_bus, toml_config);
    let app = fns_nn::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:5741").await?;
    info!("Listening on http://127.0.0.1:5741");
    info!("Health check: http://127.0.0.1:5741/health");

    axum::serve(listener, app).await?;

    Ok(())
}
