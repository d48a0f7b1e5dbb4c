//! # FNS Common Library
//!
//! Shared code for FNS services including:
//! - Error types
//! - Event types (FnsEvent enum) and EventBus
//! - Configuration loading and root folder resolution

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
