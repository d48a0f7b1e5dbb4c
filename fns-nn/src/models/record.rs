//! Source record model
//!
//! A source record is externally owned; the pipeline only reads the guid and
//! display name and writes the natural name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A business record awaiting (or carrying) a naturalized display name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Stable record identifier
    pub guid: Uuid,

    /// Raw human-entered business name (may be empty or absent)
    pub display_name: Option<String>,

    /// Conversational short form, null until resolved
    pub natural_name: Option<String>,

    /// Optional business category used for filtered runs
    pub category: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SourceRecord {
    /// Create a new unresolved record
    pub fn new(display_name: impl Into<String>, category: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            guid: Uuid::new_v4(),
            display_name: Some(display_name.into()),
            natural_name: None,
            category,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this record still needs resolution
    pub fn is_pending(&self) -> bool {
        self.natural_name.is_none() && self.display_name.is_some()
    }
}
