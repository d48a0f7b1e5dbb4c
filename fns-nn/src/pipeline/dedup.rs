//! Display name deduplication
//!
//! Reduces a fetched batch of records to the distinct display names that
//! need resolution, plus a reverse index mapping each name back to every
//! record sharing it. Pure in-memory step, no I/O.

use std::collections::HashMap;

use uuid::Uuid;

use crate::models::SourceRecord;

/// Deduplication result
#[derive(Debug, Default)]
pub struct DedupResult {
    /// Distinct trimmed display names in first-seen order
    pub names: Vec<String>,
    /// display name → guids of every record sharing it
    pub index: HashMap<String, Vec<Uuid>>,
}

impl DedupResult {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Deduplicate display names across a batch of records
///
/// Empty or whitespace-only names are skipped; their records are left
/// untouched and are not counted as errors. First-seen order is preserved
/// so batch composition is deterministic for a given fetch.
pub fn dedupe(records: &[SourceRecord]) -> DedupResult {
    let mut result = DedupResult::default();

    for record in records {
        let Some(display_name) = &record.display_name else {
            continue;
        };
        let trimmed = display_name.trim();
        if trimmed.is_empty() {
            continue;
        }

        match result.index.get_mut(trimmed) {
            Some(guids) => guids.push(record.guid),
            None => {
                result.names.push(trimmed.to_string());
                result.index.insert(trimmed.to_string(), vec![record.guid]);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> SourceRecord {
        SourceRecord::new(name, None)
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let result = dedupe(&[]);
        assert!(result.is_empty());
        assert!(result.index.is_empty());
    }

    #[test]
    fn duplicate_names_collapse_to_one_entry() {
        let a = record("Acme Holdings LLC");
        let b = record("Acme Holdings LLC");
        let c = record("Bravo Partners Inc");

        let result = dedupe(&[a.clone(), b.clone(), c.clone()]);

        assert_eq!(result.names, vec!["Acme Holdings LLC", "Bravo Partners Inc"]);
        assert_eq!(result.index["Acme Holdings LLC"], vec![a.guid, b.guid]);
        assert_eq!(result.index["Bravo Partners Inc"], vec![c.guid]);
    }

    #[test]
    fn blank_and_missing_names_are_skipped() {
        let mut missing = record("placeholder");
        missing.display_name = None;
        let blank = record("   ");
        let empty = record("");
        let real = record("Candle Works");

        let result = dedupe(&[missing, blank, empty, real.clone()]);

        assert_eq!(result.names, vec!["Candle Works"]);
        assert_eq!(result.index.len(), 1);
        assert_eq!(result.index["Candle Works"], vec![real.guid]);
    }

    #[test]
    fn names_are_trimmed_before_comparison() {
        let a = record("  Delta Diner ");
        let b = record("Delta Diner");

        let result = dedupe(&[a.clone(), b.clone()]);

        assert_eq!(result.names, vec!["Delta Diner"]);
        assert_eq!(result.index["Delta Diner"], vec![a.guid, b.guid]);
    }

    #[test]
    fn first_seen_order_is_preserved() {
        let names = ["Zed Cafe", "Alpha Cafe", "Mid Cafe", "Zed Cafe"];
        let records: Vec<SourceRecord> = names.iter().map(|n| record(n)).collect();

        let result = dedupe(&records);

        assert_eq!(result.names, vec!["Zed Cafe", "Alpha Cafe", "Mid Cafe"]);
    }
}
