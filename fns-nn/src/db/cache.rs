//! Persistent name cache gateway
//!
//! Cache-aside layer in front of the generation API. The original name is
//! the primary key; two records sharing a display name always resolve to
//! the one cached natural name. Writes are last-write-wins upserts, safe
//! under concurrent runs without locking.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqlitePool;

use fns_common::Result;

/// Default keys per lookup chunk, sized below SQLite's bound-variable limit
const DEFAULT_CHUNK_SIZE: usize = 500;

/// Result of a batched cache lookup
#[derive(Debug, Default)]
pub struct CacheLookup {
    /// original name → natural name, for the subset found
    pub hits: HashMap<String, String>,
    /// Chunks that failed and were degraded to all-miss
    pub failed_chunks: u64,
}

/// Batched read/write gateway for the name cache
pub struct CacheGateway {
    db: SqlitePool,
    chunk_size: usize,
}

impl CacheGateway {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Override the lookup chunk size (tests and tuned runs)
    pub fn with_chunk_size(db: SqlitePool, chunk_size: usize) -> Self {
        Self {
            db,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Look up known resolutions for any subset of `names`
    ///
    /// Unknown names are simply absent from the result. The input is
    /// chunked; a failed chunk is logged and treated as all-miss without
    /// discarding hits already gathered from other chunks. Hit rows get
    /// their usage accounting refreshed.
    pub async fn lookup(&self, names: &[String]) -> CacheLookup {
        let mut lookup = CacheLookup::default();

        for chunk in names.chunks(self.chunk_size) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT original_name, natural_name FROM name_cache WHERE original_name IN ({})",
                placeholders
            );

            let mut query = sqlx::query_as::<_, (String, String)>(&sql);
            for name in chunk {
                query = query.bind(name);
            }

            match query.fetch_all(&self.db).await {
                Ok(rows) => {
                    if !rows.is_empty() {
                        self.touch_usage(rows.iter().map(|(original, _)| original.as_str()))
                            .await;
                    }
                    lookup.hits.extend(rows);
                }
                Err(e) => {
                    tracing::warn!(
                        chunk_len = chunk.len(),
                        error = %e,
                        "Cache lookup chunk failed, treating as all-miss"
                    );
                    lookup.failed_chunks += 1;
                }
            }
        }

        tracing::debug!(
            requested = names.len(),
            hits = lookup.hits.len(),
            failed_chunks = lookup.failed_chunks,
            "Cache lookup completed"
        );

        lookup
    }

    /// Write or replace cache entries keyed by original name
    ///
    /// On conflict the value is replaced, usage_count incremented and
    /// last_used_at refreshed; created_at is kept from the first insert.
    pub async fn upsert(&self, entries: &[(String, String)]) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        for (original, natural) in entries {
            sqlx::query(
                r#"
                INSERT INTO name_cache (original_name, natural_name, usage_count, created_at, last_used_at)
                VALUES (?, ?, 1, ?, ?)
                ON CONFLICT(original_name) DO UPDATE SET
                    natural_name = excluded.natural_name,
                    usage_count = usage_count + 1,
                    last_used_at = excluded.last_used_at
                "#,
            )
            .bind(original)
            .bind(natural)
            .bind(&now)
            .bind(&now)
            .execute(&self.db)
            .await?;
        }

        tracing::debug!(entries = entries.len(), "Cache upsert completed");

        Ok(())
    }

    /// Refresh usage accounting for cache hits
    ///
    /// Best-effort: a failure here never degrades the lookup result.
    async fn touch_usage<'a>(&self, originals: impl Iterator<Item = &'a str>) {
        let originals: Vec<&str> = originals.collect();
        if originals.is_empty() {
            return;
        }

        let placeholders = vec!["?"; originals.len()].join(", ");
        let sql = format!(
            "UPDATE name_cache SET usage_count = usage_count + 1, last_used_at = ? \
             WHERE original_name IN ({})",
            placeholders
        );

        let mut query = sqlx::query(&sql).bind(Utc::now().to_rfc3339());
        for original in &originals {
            query = query.bind(*original);
        }

        if let Err(e) = query.execute(&self.db).await {
            tracing::debug!(error = %e, "Cache usage touch failed");
        }
    }
}
