//! Configuration resolution for fns-nn
//!
//! Multi-tier resolution with Database → ENV → TOML priority. The database
//! is authoritative so the key can be rotated through the settings API
//! without restarting the service.

use sqlx::SqlitePool;
use tracing::{info, warn};

use fns_common::config::TomlConfig;
use fns_common::{Error, Result};

/// Resolve the generation API key from 3-tier configuration
///
/// Priority: Database → `FNS_GENERATION_API_KEY` → TOML.
pub async fn resolve_generation_api_key(
    db: &SqlitePool,
    toml_config: &TomlConfig,
) -> Result<String> {
    let db_key = crate::db::settings::get_generation_api_key(db).await?;
    let env_key = std::env::var("FNS_GENERATION_API_KEY").ok();
    let toml_key = toml_config.generation_api_key.clone();

    let mut sources = Vec::new();
    if db_key.as_deref().is_some_and(is_valid_key) {
        sources.push("database");
    }
    if env_key.as_deref().is_some_and(is_valid_key) {
        sources.push("environment");
    }
    if toml_key.as_deref().is_some_and(is_valid_key) {
        sources.push("TOML");
    }

    if sources.len() > 1 {
        warn!(
            "Generation API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    for (key, source) in [
        (db_key, "database"),
        (env_key, "environment variable"),
        (toml_key, "TOML config"),
    ] {
        if let Some(key) = key {
            if is_valid_key(&key) {
                info!("Generation API key loaded from {}", source);
                return Ok(key);
            }
        }
    }

    Err(Error::Config(
        "Generation API key not configured. Please configure using one of:\n\
         1. Settings API: PUT http://localhost:5741/settings/generation-key\n\
         2. Environment: FNS_GENERATION_API_KEY=your-key-here\n\
         3. TOML config: ~/.config/fns/fns-nn.toml (generation_api_key = \"your-key\")"
            .to_string(),
    ))
}

/// Validate an API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
