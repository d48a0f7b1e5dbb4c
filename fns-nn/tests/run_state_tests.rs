//! Run State Machine Tests

use fns_nn::models::{NaturalizeParameters, NaturalizeRun, RunError, RunState};

fn test_run() -> NaturalizeRun {
    NaturalizeRun::new(100, None, NaturalizeParameters::default())
}

#[test]
fn started_to_fetched_transition() {
    // Given: a freshly accepted run
    let mut run = test_run();
    assert_eq!(run.state, RunState::Started);

    // When: pending records are loaded
    run.stats.records_fetched = 12;
    let transition = run.transition_to(RunState::Fetched);

    // Then: the run is in FETCHED, not terminal
    assert_eq!(run.state, RunState::Fetched);
    assert_eq!(transition.old_state, RunState::Started);
    assert_eq!(transition.new_state, RunState::Fetched);
    assert!(!run.is_terminal());
    assert!(run.ended_at.is_none());
}

#[test]
fn fetched_to_empty_is_terminal() {
    // Given: a run that found no pending records
    let mut run = test_run();
    run.transition_to(RunState::Fetched);

    // When: the run short-circuits to EMPTY
    run.transition_to(RunState::Empty);

    // Then: terminal, with end timestamp and frozen duration
    assert!(run.is_terminal());
    assert!(run.ended_at.is_some());
    assert_eq!(run.stats.records_fetched, 0);
}

#[test]
fn happy_path_walks_every_phase() {
    let mut run = test_run();
    let phases = [
        RunState::Fetched,
        RunState::Deduped,
        RunState::CacheChecked,
        RunState::Resolving,
        RunState::CacheWritten,
        RunState::Propagated,
        RunState::Completed,
    ];

    for phase in phases {
        assert!(!run.is_terminal(), "terminal before {:?}", phase);
        run.transition_to(phase);
    }

    assert_eq!(run.state, RunState::Completed);
    assert!(run.is_terminal());
    assert!(run.ended_at.is_some());
}

#[test]
fn resolving_to_failed_carries_fatal_error() {
    // Given: a run mid-resolve
    let mut run = test_run();
    run.transition_to(RunState::Fetched);
    run.transition_to(RunState::Deduped);
    run.transition_to(RunState::CacheChecked);
    run.transition_to(RunState::Resolving);

    // When: the upstream reports quota exhaustion
    run.fatal_error = Some("Generation API quota exhausted: credit balance too low".to_string());
    let transition = run.transition_to(RunState::Failed);

    // Then: FAILED is terminal and distinguishable from partial-error success
    assert_eq!(transition.old_state, RunState::Resolving);
    assert!(run.is_terminal());
    assert!(run.fatal_error.as_deref().unwrap().contains("quota"));
}

#[test]
fn absorbed_errors_count_without_failing_the_run() {
    let mut run = test_run();
    run.transition_to(RunState::Fetched);

    run.add_error(RunError::new("record update failed", Some("Acme LLC".to_string())));
    run.add_error(RunError::new("cache lookup chunk failed", None));

    assert_eq!(run.stats.errors, 2);
    assert_eq!(run.errors.len(), 2);
    assert!(run.fatal_error.is_none());
    assert!(!run.is_terminal());
}

#[test]
fn cancelled_is_terminal_without_fatal_error() {
    let mut run = test_run();
    run.transition_to(RunState::Fetched);
    run.transition_to(RunState::Cancelled);

    assert!(run.is_terminal());
    assert!(run.fatal_error.is_none());
}
