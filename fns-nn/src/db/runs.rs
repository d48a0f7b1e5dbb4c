//! Naturalization run persistence
//!
//! The run row is upserted after every state transition so the status
//! endpoint reflects progress across restarts.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use fns_common::{Error, Result};

use crate::models::{NaturalizeParameters, NaturalizeRun, RunError, RunState, RunStats};

/// Save (upsert) a run
pub async fn save_run(pool: &SqlitePool, run: &NaturalizeRun) -> Result<()> {
    let parameters = serde_json::to_string(&run.parameters)
        .map_err(|e| Error::Internal(format!("Failed to serialize parameters: {}", e)))?;
    let stats = serde_json::to_string(&run.stats)
        .map_err(|e| Error::Internal(format!("Failed to serialize stats: {}", e)))?;
    let errors = serde_json::to_string(&run.errors)
        .map_err(|e| Error::Internal(format!("Failed to serialize errors: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO nat_runs (
            run_id, state, record_limit, category, parameters,
            stats, errors, fatal_error, started_at, ended_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(run_id) DO UPDATE SET
            state = excluded.state,
            stats = excluded.stats,
            errors = excluded.errors,
            fatal_error = excluded.fatal_error,
            ended_at = excluded.ended_at
        "#,
    )
    .bind(run.run_id.to_string())
    .bind(run.state.as_str())
    .bind(run.limit as i64)
    .bind(&run.category)
    .bind(&parameters)
    .bind(&stats)
    .bind(&errors)
    .bind(&run.fatal_error)
    .bind(run.started_at.to_rfc3339())
    .bind(run.ended_at.map(|dt| dt.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a run by id
pub async fn load_run(pool: &SqlitePool, run_id: Uuid) -> Result<Option<NaturalizeRun>> {
    let row = sqlx::query(
        r#"
        SELECT run_id, state, record_limit, category, parameters,
               stats, errors, fatal_error, started_at, ended_at
        FROM nat_runs
        WHERE run_id = ?
        "#,
    )
    .bind(run_id.to_string())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let state: String = row.get("state");
    let state: RunState = serde_json::from_str(&format!("\"{}\"", state))
        .map_err(|e| Error::Internal(format!("Failed to deserialize state: {}", e)))?;

    let parameters: String = row.get("parameters");
    let parameters: NaturalizeParameters = serde_json::from_str(&parameters)
        .map_err(|e| Error::Internal(format!("Failed to deserialize parameters: {}", e)))?;

    let stats: String = row.get("stats");
    let stats: RunStats = serde_json::from_str(&stats)
        .map_err(|e| Error::Internal(format!("Failed to deserialize stats: {}", e)))?;

    let errors: String = row.get("errors");
    let errors: Vec<RunError> = serde_json::from_str(&errors)
        .map_err(|e| Error::Internal(format!("Failed to deserialize errors: {}", e)))?;

    let started_at: String = row.get("started_at");
    let started_at = chrono::DateTime::parse_from_rfc3339(&started_at)
        .map_err(|e| Error::Internal(format!("Failed to parse started_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    let ended_at: Option<String> = row.get("ended_at");
    let ended_at = ended_at
        .map(|s| {
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .map_err(|e| Error::Internal(format!("Failed to parse ended_at: {}", e)))
        })
        .transpose()?;

    Ok(Some(NaturalizeRun {
        run_id,
        state,
        limit: row.get::<i64, _>("record_limit").max(0) as u32,
        category: row.get("category"),
        parameters,
        stats,
        errors,
        fatal_error: row.get("fatal_error"),
        started_at,
        ended_at,
    }))
}

/// Whether any run is still in a non-terminal state
///
/// Terminal runs always carry `ended_at`, so an open run is one without it.
pub async fn has_running_run(pool: &SqlitePool) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nat_runs WHERE ended_at IS NULL")
        .fetch_one(pool)
        .await?;

    Ok(count > 0)
}

/// Mark runs left open by a crashed service as failed
///
/// Called once at startup. Cache writes and record updates from such runs
/// are already durable; pending records simply wait for the next run.
pub async fn fail_orphaned_runs(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE nat_runs
        SET state = ?, fatal_error = ?, ended_at = ?
        WHERE ended_at IS NULL
        "#,
    )
    .bind(RunState::Failed.as_str())
    .bind("service restarted while run was in progress")
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
