//! Naturalization pipeline
//!
//! Single orchestrating task driving the run state machine:
//! fetch pending records → dedupe display names → cache lookup → bounded
//! generation batches for the misses → cache write-through → parallel
//! propagation back onto records. Only quota exhaustion fails a run;
//! everything else is absorbed into stats.

pub mod dedup;
pub mod dispatch;
pub mod generation;
pub mod naturalizer;
pub mod propagator;

pub use generation::{GenerationClient, GenerationError, HttpGenerationClient};
pub use naturalizer::{BatchOutcome, Naturalizer};

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use fns_common::events::{EventBus, FnsEvent};
use fns_common::Result;

use crate::db;
use crate::db::cache::CacheGateway;
use crate::models::{NaturalizeRun, RunError, RunState};
use dispatch::BatchDispatcher;
use propagator::ResultPropagator;

/// Orchestrates one naturalization run end to end
pub struct PipelineRunner {
    db: SqlitePool,
    event_bus: EventBus,
    generation: Arc<dyn GenerationClient>,
}

impl PipelineRunner {
    pub fn new(db: SqlitePool, event_bus: EventBus, generation: Arc<dyn GenerationClient>) -> Self {
        Self {
            db,
            event_bus,
            generation,
        }
    }

    /// Execute a prepared run to a terminal state
    ///
    /// Returns the run in COMPLETED, EMPTY, CANCELLED or FAILED state; Err
    /// is reserved for infrastructure failures (run persistence).
    pub async fn execute(
        &self,
        mut run: NaturalizeRun,
        cancel: CancellationToken,
    ) -> Result<NaturalizeRun> {
        tracing::info!(
            run_id = %run.run_id,
            limit = run.limit,
            category = ?run.category,
            "Starting naturalization run"
        );

        db::runs::save_run(&self.db, &run).await?;
        self.event_bus.emit_or_log(FnsEvent::RunStarted {
            run_id: run.run_id,
            limit: run.limit,
            category: run.category.clone(),
            timestamp: chrono::Utc::now(),
        });

        // Phase 1: fetch pending records
        let records =
            db::records::fetch_pending(&self.db, run.limit, run.category.as_deref()).await?;
        run.stats.records_fetched = records.len() as u64;
        self.advance(&mut run, RunState::Fetched).await?;

        if records.is_empty() {
            tracing::info!(run_id = %run.run_id, "No pending records");
            return self.finish_success(run, RunState::Empty).await;
        }

        if cancel.is_cancelled() {
            return self.finish_cancelled(run).await;
        }

        // Phase 2: dedupe display names
        let deduped = dedup::dedupe(&records);
        run.stats.unique_names = deduped.names.len() as u64;
        self.advance(&mut run, RunState::Deduped).await?;

        tracing::info!(
            run_id = %run.run_id,
            records = records.len(),
            unique_names = deduped.names.len(),
            "Deduplication completed"
        );

        // Phase 3: cache lookup, always before any generation call
        let cache = CacheGateway::with_chunk_size(self.db.clone(), run.parameters.cache_chunk_size);
        let lookup = cache.lookup(&deduped.names).await;
        run.stats.cache_hits = lookup.hits.len() as u64;
        for _ in 0..lookup.failed_chunks {
            run.add_error(RunError::new("cache lookup chunk failed", None));
        }
        self.advance(&mut run, RunState::CacheChecked).await?;

        let misses: Vec<String> = deduped
            .names
            .iter()
            .filter(|name| !lookup.hits.contains_key(*name))
            .cloned()
            .collect();

        tracing::info!(
            run_id = %run.run_id,
            cache_hits = lookup.hits.len(),
            cache_misses = misses.len(),
            "Cache lookup completed"
        );

        let mut resolutions: HashMap<String, String> = lookup.hits;

        // Phase 4: resolve misses under the concurrency gate. Skipped
        // entirely when every name was a cache hit.
        if !misses.is_empty() {
            if cancel.is_cancelled() {
                return self.finish_cancelled(run).await;
            }
            self.advance(&mut run, RunState::Resolving).await?;

            let naturalizer = Naturalizer::new(self.generation.clone(), &run.parameters);
            let dispatcher = BatchDispatcher::new(&run.parameters);
            let batches: Vec<Vec<String>> = misses
                .chunks(run.parameters.batch_size.max(1))
                .map(|chunk| chunk.to_vec())
                .collect();

            let dispatched = dispatcher.dispatch(batches, &naturalizer, &cancel).await;

            let mut fresh: Vec<(String, String)> = Vec::new();
            for batch in &dispatched.batches {
                run.stats.api_calls += batch.api_calls;
                if batch.identity_fallback {
                    run.stats.identity_fallbacks += batch.names.len() as u64;
                } else {
                    run.stats.resolved += batch.names.len() as u64;
                }
                self.event_bus.emit_or_log(FnsEvent::BatchResolved {
                    run_id: run.run_id,
                    names: batch.names.len(),
                    api_calls: batch.api_calls,
                    identity_fallback: batch.identity_fallback,
                    timestamp: chrono::Utc::now(),
                });
                for (original, natural) in batch.pairs() {
                    fresh.push((original.clone(), natural.clone()));
                }
            }

            // Phase 5: write-through for everything that resolved, fatal or not
            if !fresh.is_empty() {
                if let Err(e) = cache.upsert(&fresh).await {
                    run.add_error(RunError::new(format!("cache write failed: {}", e), None));
                }
            }
            resolutions.extend(fresh);

            if let Some(fatal) = dispatched.fatal {
                return self.finish_failed(run, &deduped.index, resolutions, fatal).await;
            }

            self.advance(&mut run, RunState::CacheWritten).await?;
        } else {
            self.advance(&mut run, RunState::CacheWritten).await?;
        }

        if cancel.is_cancelled() {
            return self.finish_cancelled(run).await;
        }

        // Phase 6: propagate onto every record sharing a resolved name
        let propagator = ResultPropagator::new(
            self.db.clone(),
            run.parameters.update_chunk_size,
            run.parameters.update_parallelism,
        );
        let propagated = propagator.propagate(&resolutions, &deduped.index).await;
        run.stats.records_updated = propagated.updated;
        for failure in propagated.failures {
            run.add_error(failure);
        }
        self.advance(&mut run, RunState::Propagated).await?;

        self.finish_success(run, RunState::Completed).await
    }

    /// Transition, persist, and broadcast a phase change
    async fn advance(&self, run: &mut NaturalizeRun, state: RunState) -> Result<()> {
        let transition = run.transition_to(state);
        self.event_bus.emit_or_log(FnsEvent::RunPhaseChanged {
            run_id: run.run_id,
            old_phase: transition.old_state.as_str().to_string(),
            new_phase: transition.new_state.as_str().to_string(),
            timestamp: transition.transitioned_at,
        });
        db::runs::save_run(&self.db, run).await
    }

    async fn finish_success(
        &self,
        mut run: NaturalizeRun,
        state: RunState,
    ) -> Result<NaturalizeRun> {
        self.advance(&mut run, state).await?;
        tracing::info!(
            run_id = %run.run_id,
            state = run.state.as_str(),
            records_updated = run.stats.records_updated,
            cache_hits = run.stats.cache_hits,
            api_calls = run.stats.api_calls,
            errors = run.stats.errors,
            duration_ms = run.stats.duration_ms,
            "Naturalization run finished"
        );
        self.event_bus.emit_or_log(FnsEvent::RunCompleted {
            run_id: run.run_id,
            state: run.state.as_str().to_string(),
            records_updated: run.stats.records_updated,
            cache_hits: run.stats.cache_hits,
            api_calls: run.stats.api_calls,
            errors: run.stats.errors,
            duration_ms: run.stats.duration_ms,
            timestamp: chrono::Utc::now(),
        });
        Ok(run)
    }

    /// Fail the run, keeping partial progress
    ///
    /// Cache entries for completed batches were already written; records
    /// whose names resolved before the fatal condition are still updated so
    /// the work is not lost. Unresolved records stay pending for the next
    /// run.
    async fn finish_failed(
        &self,
        mut run: NaturalizeRun,
        index: &HashMap<String, Vec<uuid::Uuid>>,
        resolutions: HashMap<String, String>,
        fatal: String,
    ) -> Result<NaturalizeRun> {
        let propagator = ResultPropagator::new(
            self.db.clone(),
            run.parameters.update_chunk_size,
            run.parameters.update_parallelism,
        );
        let propagated = propagator.propagate(&resolutions, index).await;
        run.stats.records_updated = propagated.updated;
        for failure in propagated.failures {
            run.add_error(failure);
        }

        run.fatal_error = Some(fatal.clone());
        run.transition_to(RunState::Failed);
        db::runs::save_run(&self.db, &run).await?;

        tracing::error!(
            run_id = %run.run_id,
            records_updated = run.stats.records_updated,
            "Naturalization run failed: {}",
            fatal
        );
        self.event_bus.emit_or_log(FnsEvent::RunFailed {
            run_id: run.run_id,
            error: fatal,
            timestamp: chrono::Utc::now(),
        });
        Ok(run)
    }

    async fn finish_cancelled(&self, mut run: NaturalizeRun) -> Result<NaturalizeRun> {
        run.transition_to(RunState::Cancelled);
        db::runs::save_run(&self.db, &run).await?;
        tracing::info!(run_id = %run.run_id, "Naturalization run cancelled");
        self.event_bus.emit_or_log(FnsEvent::RunCancelled {
            run_id: run.run_id,
            timestamp: chrono::Utc::now(),
        });
        Ok(run)
    }
}
