//! Source record database operations
//!
//! The record store contract consumed by the pipeline: fetch pending
//! records, apply natural names idempotently.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use fns_common::{Error, Result};

use crate::models::SourceRecord;

/// Fetch records still awaiting a natural name
///
/// Pending = `natural_name IS NULL AND display_name IS NOT NULL`, oldest
/// first. An optional category filter narrows the batch.
pub async fn fetch_pending(
    pool: &SqlitePool,
    limit: u32,
    category: Option<&str>,
) -> Result<Vec<SourceRecord>> {
    let rows = if let Some(category) = category {
        sqlx::query(
            r#"
            SELECT guid, display_name, natural_name, category, created_at, updated_at
            FROM records
            WHERE natural_name IS NULL AND display_name IS NOT NULL AND category = ?
            ORDER BY created_at
            LIMIT ?
            "#,
        )
        .bind(category)
        .bind(limit as i64)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query(
            r#"
            SELECT guid, display_name, natural_name, category, created_at, updated_at
            FROM records
            WHERE natural_name IS NULL AND display_name IS NOT NULL
            ORDER BY created_at
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(pool)
        .await?
    };

    rows.into_iter().map(record_from_row).collect()
}

/// Apply a natural name to one record
///
/// Safe to call redundantly; re-applying the same value is a no-op from the
/// record's point of view. Zero affected rows means the record disappeared
/// between fetch and update and is reported as NotFound.
pub async fn update_natural_name(pool: &SqlitePool, guid: Uuid, natural_name: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE records
        SET natural_name = ?, updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(natural_name)
    .bind(Utc::now().to_rfc3339())
    .bind(guid.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Record not found: {}", guid)));
    }

    Ok(())
}

/// Insert or replace a record
pub async fn save_record(pool: &SqlitePool, record: &SourceRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO records (guid, display_name, natural_name, category, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(guid) DO UPDATE SET
            display_name = excluded.display_name,
            natural_name = excluded.natural_name,
            category = excluded.category,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(record.guid.to_string())
    .bind(&record.display_name)
    .bind(&record.natural_name)
    .bind(&record.category)
    .bind(record.created_at.to_rfc3339())
    .bind(record.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Count records still awaiting a natural name
pub async fn count_pending(pool: &SqlitePool, category: Option<&str>) -> Result<u64> {
    let count: i64 = if let Some(category) = category {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM records
             WHERE natural_name IS NULL AND display_name IS NOT NULL AND category = ?",
        )
        .bind(category)
        .fetch_one(pool)
        .await?
    } else {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM records
             WHERE natural_name IS NULL AND display_name IS NOT NULL",
        )
        .fetch_one(pool)
        .await?
    };

    Ok(count.max(0) as u64)
}

/// Load one record by guid
pub async fn load_record(pool: &SqlitePool, guid: Uuid) -> Result<Option<SourceRecord>> {
    let row = sqlx::query(
        r#"
        SELECT guid, display_name, natural_name, category, created_at, updated_at
        FROM records
        WHERE guid = ?
        "#,
    )
    .bind(guid.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(record_from_row).transpose()
}

fn record_from_row(row: sqlx::sqlite::SqliteRow) -> Result<SourceRecord> {
    let guid: String = row.get("guid");
    let guid = Uuid::parse_str(&guid)
        .map_err(|e| Error::Internal(format!("Invalid record guid: {}", e)))?;

    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    let updated_at: String = row.get("updated_at");
    let updated_at = chrono::DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| Error::Internal(format!("Failed to parse updated_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    Ok(SourceRecord {
        guid,
        display_name: row.get("display_name"),
        natural_name: row.get("natural_name"),
        category: row.get("category"),
        created_at,
        updated_at,
    })
}
