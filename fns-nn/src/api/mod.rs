//! HTTP API handlers for fns-nn
//!
//! Thin trigger surface over the naturalization pipeline: start/status/
//! cancel a run, stream run events, manage the generation API key.

pub mod health;
pub mod runs;
pub mod settings;
pub mod sse;

pub use health::health_routes;
pub use runs::run_routes;
pub use settings::settings_routes;
pub use sse::event_stream;
