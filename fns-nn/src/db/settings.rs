//! Settings database operations
//!
//! Get/set accessors for the key-value settings table. The database is the
//! highest-priority configuration source (see crate::config).

use sqlx::SqlitePool;

use fns_common::Result;

const GENERATION_API_KEY: &str = "generation_api_key";

/// Get a setting value by key
pub async fn get_setting(db: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    Ok(value)
}

/// Set a setting value by key (upsert)
pub async fn set_setting(db: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(db)
    .await?;

    Ok(())
}

/// Get the generation API key from the database
///
/// Returns Some(key) if set, None otherwise.
pub async fn get_generation_api_key(db: &SqlitePool) -> Result<Option<String>> {
    get_setting(db, GENERATION_API_KEY).await
}

/// Store the generation API key in the database
pub async fn set_generation_api_key(db: &SqlitePool, key: &str) -> Result<()> {
    set_setting(db, GENERATION_API_KEY, key).await
}
