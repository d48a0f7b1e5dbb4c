//! Event types for the FNS event system
//!
//! Provides shared event definitions and EventBus for FNS services.
//! Events are broadcast via EventBus and can be serialized for SSE
//! transmission.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// FNS event types
///
/// All naturalization run lifecycle events use this central enum for type
/// safety and exhaustive matching. Phase names are carried as strings so
/// consumers do not need the service's internal state types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FnsEvent {
    /// Naturalization run accepted and started
    RunStarted {
        run_id: Uuid,
        /// Maximum number of pending records this run will fetch
        limit: u32,
        /// Optional record category filter
        category: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run moved from one pipeline phase to another
    RunPhaseChanged {
        run_id: Uuid,
        old_phase: String,
        new_phase: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One generation batch finished resolving
    BatchResolved {
        run_id: Uuid,
        /// Number of names in the batch
        names: usize,
        /// API calls spent on the batch (includes retries)
        api_calls: u64,
        /// True when the batch fell back to identity mapping
        identity_fallback: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run reached a successful terminal state (COMPLETED or EMPTY)
    RunCompleted {
        run_id: Uuid,
        state: String,
        records_updated: u64,
        cache_hits: u64,
        api_calls: u64,
        errors: u64,
        duration_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run aborted on a fatal upstream condition
    RunFailed {
        run_id: Uuid,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run cancelled by operator request
    RunCancelled {
        run_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl FnsEvent {
    /// Event type name for SSE event framing
    pub fn event_type(&self) -> &'static str {
        match self {
            FnsEvent::RunStarted { .. } => "RunStarted",
            FnsEvent::RunPhaseChanged { .. } => "RunPhaseChanged",
            FnsEvent::BatchResolved { .. } => "BatchResolved",
            FnsEvent::RunCompleted { .. } => "RunCompleted",
            FnsEvent::RunFailed { .. } => "RunFailed",
            FnsEvent::RunCancelled { .. } => "RunCancelled",
        }
    }
}

/// Broadcast bus for FNS events
///
/// Thin wrapper around `tokio::sync::broadcast`. Subscribers receive all
/// events emitted after subscription; slow subscribers lag and drop the
/// oldest buffered events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FnsEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<FnsEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: FnsEvent) -> Result<usize, broadcast::error::SendError<FnsEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    ///
    /// Run lifecycle events are informational; a run proceeds identically
    /// whether or not anything is watching the stream.
    pub fn emit_or_log(&self, event: FnsEvent) {
        let event_type = event.event_type();
        if self.tx.send(event).is_err() {
            tracing::debug!(event = event_type, "No subscribers for event");
        }
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
