//! Result propagation back onto source records
//!
//! Maps each resolved display name onto every record sharing it and applies
//! the updates in bounded parallel chunks. Individual update failures are
//! isolated and counted; they never abort the chunk or the run, and
//! re-running the same propagation is a no-op.

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::models::RunError;

/// Per-run propagation counters
#[derive(Debug, Default)]
pub struct PropagationOutcome {
    /// Records successfully updated
    pub updated: u64,
    /// Records whose update failed (isolated, non-fatal)
    pub failures: Vec<RunError>,
}

/// Chunked, parallel record updater
pub struct ResultPropagator {
    db: SqlitePool,
    chunk_size: usize,
    parallelism: usize,
}

impl ResultPropagator {
    pub fn new(db: SqlitePool, chunk_size: usize, parallelism: usize) -> Self {
        Self {
            db,
            chunk_size: chunk_size.max(1),
            parallelism: parallelism.max(1),
        }
    }

    /// Apply resolutions to every record in the reverse index
    ///
    /// Records whose display name has no entry in `resolutions` (a fatal
    /// condition cut the run short) are left untouched and picked up by a
    /// later run.
    pub async fn propagate(
        &self,
        resolutions: &HashMap<String, String>,
        index: &HashMap<String, Vec<Uuid>>,
    ) -> PropagationOutcome {
        // Deterministic update order keeps logs and tests stable
        let mut updates: Vec<(Uuid, String, String)> = Vec::new();
        let mut names: Vec<&String> = index.keys().collect();
        names.sort();
        for name in names {
            if let Some(natural) = resolutions.get(name) {
                for guid in &index[name] {
                    updates.push((*guid, name.clone(), natural.clone()));
                }
            }
        }

        let mut outcome = PropagationOutcome::default();

        for chunk in updates.chunks(self.chunk_size) {
            let results: Vec<Result<(), RunError>> = stream::iter(chunk.iter().cloned())
                .map(|(guid, name, natural)| {
                    let db = self.db.clone();
                    async move {
                        db::records::update_natural_name(&db, guid, &natural)
                            .await
                            .map_err(|e| {
                                tracing::warn!(
                                    record_id = %guid,
                                    error = %e,
                                    "Record update failed, continuing"
                                );
                                RunError::new(
                                    format!("record update failed: {}", e),
                                    Some(name),
                                )
                            })
                    }
                })
                .buffer_unordered(self.parallelism)
                .collect()
                .await;

            for result in results {
                match result {
                    Ok(()) => outcome.updated += 1,
                    Err(error) => outcome.failures.push(error),
                }
            }
        }

        tracing::info!(
            updated = outcome.updated,
            failed = outcome.failures.len(),
            "Propagation completed"
        );

        outcome
    }
}
