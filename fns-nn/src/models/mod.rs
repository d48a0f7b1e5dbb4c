//! Data models for fns-nn

pub mod parameters;
pub mod record;
pub mod run;

pub use parameters::NaturalizeParameters;
pub use record::SourceRecord;
pub use run::{NaturalizeRun, RunError, RunState, RunStats, StateTransition};
