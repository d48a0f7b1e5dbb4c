//! Naturalization run state machine
//!
//! A run progresses through:
//! STARTED → FETCHED → DEDUPED → CACHE_CHECKED → RESOLVING → CACHE_WRITTEN
//! → PROPAGATED → COMPLETED
//!
//! with three additional terminal states: EMPTY (nothing pending, reached
//! from FETCHED), FAILED (fatal upstream condition during RESOLVING) and
//! CANCELLED (operator abort). RESOLVING is skipped when every name is a
//! cache hit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::NaturalizeParameters;

/// Naturalization run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// Run accepted, nothing fetched yet
    Started,
    /// Pending records loaded from the record store
    Fetched,
    /// Distinct display names and reverse index computed
    Deduped,
    /// Persistent cache consulted for all distinct names
    CacheChecked,
    /// Generation API batches in flight
    Resolving,
    /// Fresh resolutions written through to the cache
    CacheWritten,
    /// Resolutions applied back onto source records
    Propagated,
    /// Run finished successfully
    Completed,
    /// No pending records existed
    Empty,
    /// Run cancelled by operator
    Cancelled,
    /// Fatal upstream condition aborted the run
    Failed,
}

impl RunState {
    /// Phase name as persisted/broadcast (SCREAMING_SNAKE_CASE)
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Started => "STARTED",
            RunState::Fetched => "FETCHED",
            RunState::Deduped => "DEDUPED",
            RunState::CacheChecked => "CACHE_CHECKED",
            RunState::Resolving => "RESOLVING",
            RunState::CacheWritten => "CACHE_WRITTEN",
            RunState::Propagated => "PROPAGATED",
            RunState::Completed => "COMPLETED",
            RunState::Empty => "EMPTY",
            RunState::Cancelled => "CANCELLED",
            RunState::Failed => "FAILED",
        }
    }

    /// Whether this state ends the run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Empty | RunState::Cancelled | RunState::Failed
        )
    }
}

/// State transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub run_id: Uuid,
    pub old_state: RunState,
    pub new_state: RunState,
    pub transitioned_at: DateTime<Utc>,
}

/// Per-run counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Pending records fetched from the record store
    pub records_fetched: u64,
    /// Distinct non-empty display names among them
    pub unique_names: u64,
    /// Names answered from the persistent cache
    pub cache_hits: u64,
    /// Generation API calls issued (including retries)
    pub api_calls: u64,
    /// Names freshly resolved by the generation API
    pub resolved: u64,
    /// Names that fell back to identity mapping
    pub identity_fallbacks: u64,
    /// Source records updated with a natural name
    pub records_updated: u64,
    /// Absorbed, non-fatal errors (cache chunks, record updates)
    pub errors: u64,
    /// Wall-clock duration of the run
    pub duration_ms: u64,
}

/// A single absorbed error, kept with the run for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub message: String,
    /// Display name involved, when the error is name-scoped
    pub name: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl RunError {
    pub fn new(message: impl Into<String>, name: Option<String>) -> Self {
        Self {
            message: message.into(),
            name,
            occurred_at: Utc::now(),
        }
    }
}

/// Naturalization run (in-memory state, persisted after every transition)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NaturalizeRun {
    /// Unique run identifier
    pub run_id: Uuid,

    /// Current pipeline state
    pub state: RunState,

    /// Maximum number of pending records to fetch
    pub limit: u32,

    /// Optional record category filter
    pub category: Option<String>,

    /// Tuning parameters for this run
    pub parameters: NaturalizeParameters,

    /// Accumulated counters
    pub stats: RunStats,

    /// Absorbed errors
    pub errors: Vec<RunError>,

    /// Fatal condition that aborted the run (FAILED only)
    pub fatal_error: Option<String>,

    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl NaturalizeRun {
    /// Create a new run in STARTED state
    pub fn new(limit: u32, category: Option<String>, parameters: NaturalizeParameters) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: RunState::Started,
            limit,
            category,
            parameters,
            stats: RunStats::default(),
            errors: Vec::new(),
            fatal_error: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a new state
    ///
    /// Terminal states also stamp `ended_at` and freeze `duration_ms`.
    pub fn transition_to(&mut self, new_state: RunState) -> StateTransition {
        let transition = StateTransition {
            run_id: self.run_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if new_state.is_terminal() {
            let ended = Utc::now();
            self.ended_at = Some(ended);
            self.stats.duration_ms =
                (ended - self.started_at).num_milliseconds().max(0) as u64;
        }

        transition
    }

    /// Record an absorbed error and bump the error counter
    pub fn add_error(&mut self, error: RunError) {
        self.stats.errors += 1;
        self.errors.push(error);
    }

    /// Whether the run has finished
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_run_starts_in_started_state() {
        let run = NaturalizeRun::new(100, None, NaturalizeParameters::default());
        assert_eq!(run.state, RunState::Started);
        assert!(!run.is_terminal());
        assert!(run.ended_at.is_none());
    }

    #[test]
    fn terminal_transition_stamps_ended_at_and_duration() {
        let mut run = NaturalizeRun::new(10, None, NaturalizeParameters::default());
        run.transition_to(RunState::Fetched);
        assert!(run.ended_at.is_none());

        let transition = run.transition_to(RunState::Empty);
        assert_eq!(transition.old_state, RunState::Fetched);
        assert_eq!(transition.new_state, RunState::Empty);
        assert!(run.is_terminal());
        assert!(run.ended_at.is_some());
    }

    #[test]
    fn add_error_increments_stats() {
        let mut run = NaturalizeRun::new(10, None, NaturalizeParameters::default());
        run.add_error(RunError::new("record update failed", Some("Acme LLC".into())));
        run.add_error(RunError::new("cache chunk failed", None));
        assert_eq!(run.stats.errors, 2);
        assert_eq!(run.errors.len(), 2);
    }

    #[test]
    fn state_serializes_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&RunState::CacheChecked).unwrap(),
            "\"CACHE_CHECKED\""
        );
        assert_eq!(RunState::CacheChecked.as_str(), "CACHE_CHECKED");

        let back: RunState = serde_json::from_str("\"FAILED\"").unwrap();
        assert_eq!(back, RunState::Failed);
    }
}
