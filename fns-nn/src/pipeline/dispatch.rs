//! Bounded-concurrency batch dispatch
//!
//! Every generation batch goes through this gate: a bounded worker pool
//! caps in-flight API calls, a rate limiter paces dispatches, and a fatal
//! outcome latches a cancellation token so no new batch starts while
//! in-flight batches drain.

use futures::stream::{self, StreamExt};
use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::models::NaturalizeParameters;
use crate::pipeline::naturalizer::{BatchOutcome, Naturalizer};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Result of dispatching all batches of one run
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Outcomes of batches that completed (in completion order)
    pub batches: Vec<BatchOutcome>,
    /// Fatal error that stopped admission, if any
    pub fatal: Option<String>,
    /// Batches never started because the fatal latch (or caller
    /// cancellation) fired first
    pub batches_skipped: u64,
}

/// Concurrency and pacing gate for generation batches
pub struct BatchDispatcher {
    max_in_flight: usize,
    pacer: Option<DirectRateLimiter>,
}

impl BatchDispatcher {
    pub fn new(params: &NaturalizeParameters) -> Self {
        let pacer = (params.batch_pacing_ms > 0)
            .then(|| Quota::with_period(Duration::from_millis(params.batch_pacing_ms)))
            .flatten()
            .map(RateLimiter::direct);

        Self {
            max_in_flight: params.max_in_flight.max(1),
            pacer,
        }
    }

    /// Dispatch all batches through the bounded pool
    ///
    /// A quota-exhausted batch sets the fatal latch: workers not yet
    /// started observe it at entry and skip, in-flight workers finish
    /// normally, and the fatal error is surfaced with the partial results.
    /// The caller's `cancel` token short-circuits the same way.
    pub async fn dispatch(
        &self,
        batches: Vec<Vec<String>>,
        naturalizer: &Naturalizer,
        cancel: &CancellationToken,
    ) -> DispatchOutcome {
        let fatal_latch = CancellationToken::new();
        let pacer = self.pacer.as_ref();

        let results: Vec<Option<Result<BatchOutcome, String>>> =
            stream::iter(batches.into_iter().enumerate())
                .map(|(index, batch)| {
                    let fatal_latch = fatal_latch.clone();
                    let cancel = cancel.clone();
                    async move {
                        if fatal_latch.is_cancelled() || cancel.is_cancelled() {
                            tracing::debug!(batch_index = index, "Skipping batch after stop");
                            return None;
                        }

                        if let Some(pacer) = pacer {
                            pacer.until_ready().await;
                        }

                        tracing::debug!(
                            batch_index = index,
                            names = batch.len(),
                            "Dispatching generation batch"
                        );

                        match naturalizer.resolve_batch(&batch).await {
                            Ok(outcome) => Some(Ok(outcome)),
                            Err(e) => {
                                fatal_latch.cancel();
                                Some(Err(e.to_string()))
                            }
                        }
                    }
                })
                .buffer_unordered(self.max_in_flight)
                .collect()
                .await;

        let mut outcome = DispatchOutcome::default();
        for result in results {
            match result {
                Some(Ok(batch)) => outcome.batches.push(batch),
                Some(Err(fatal)) => {
                    // Keep the first fatal message; later ones are echoes
                    outcome.fatal.get_or_insert(fatal);
                }
                None => outcome.batches_skipped += 1,
            }
        }

        if let Some(fatal) = &outcome.fatal {
            tracing::error!(
                completed = outcome.batches.len(),
                skipped = outcome.batches_skipped,
                "Batch dispatch stopped on fatal condition: {}",
                fatal
            );
        }

        outcome
    }
}
