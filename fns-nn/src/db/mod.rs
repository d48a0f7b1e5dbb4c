//! Database access for fns-nn
//!
//! Shared SQLite database in the service root folder. Tables are
//! bootstrapped on startup; the record and cache tables are the only
//! shared mutable state between concurrent runs.

pub mod cache;
pub mod records;
pub mod runs;
pub mod settings;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to fns.db in the root folder, creating the file and tables on
/// first use.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Initialize fns-nn tables
///
/// Creates records, name_cache, nat_runs and settings tables if they do not
/// exist. Public so tests can bootstrap in-memory pools.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    // Source records: pending = natural_name IS NULL AND display_name IS NOT NULL
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            guid TEXT PRIMARY KEY,
            display_name TEXT,
            natural_name TEXT,
            category TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Persistent name cache; original_name uniqueness is the correctness anchor
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS name_cache (
            original_name TEXT PRIMARY KEY,
            natural_name TEXT NOT NULL,
            usage_count INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            last_used_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Naturalization run persistence for status polling
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS nat_runs (
            run_id TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            record_limit INTEGER NOT NULL,
            category TEXT,
            parameters TEXT NOT NULL,
            stats TEXT NOT NULL,
            errors TEXT NOT NULL DEFAULT '[]',
            fatal_error TEXT,
            started_at TEXT NOT NULL,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Key-value settings (generation API key, operational toggles)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (records, name_cache, nat_runs, settings)");

    Ok(())
}
