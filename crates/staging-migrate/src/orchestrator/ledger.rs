//! Run-scoped record of one result per migration.

use serde::{Deserialize, Serialize};

use crate::executor::MigrationResult;

/// A ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub migration_id: String,

    #[serde(flatten)]
    pub result: MigrationResult,
}

/// Results in the order migrations were executed. Each id is recorded at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunLedger {
    entries: Vec<LedgerEntry>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result. Returns `false` and keeps the first result if the id is already present.
    pub fn record(&mut self, migration_id: &str, result: MigrationResult) -> bool {
        if self.get(migration_id).is_some() {
            return false;
        }
        self.entries.push(LedgerEntry {
            migration_id: migration_id.to_string(),
            result,
        });
        true
    }

    pub fn get(&self, migration_id: &str) -> Option<&MigrationResult> {
        self.entries
            .iter()
            .find(|e| e.migration_id == migration_id)
            .map(|e| &e.result)
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of failed migrations, in execution order.
    pub fn failed(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| !e.result.is_success())
            .map(|e| e.migration_id.as_str())
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.entries.iter().all(|e| e.result.is_success())
    }

    /// One human-readable line per migration.
    pub fn summary_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.result.summary_line(&e.migration_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ok(rows: usize) -> MigrationResult {
        MigrationResult::Success {
            source_row_count: rows,
            per_target_row_counts: BTreeMap::new(),
        }
    }

    #[test]
    fn test_record_is_write_once() {
        let mut ledger = RunLedger::new();
        assert!(ledger.record("m1", ok(3)));
        assert!(!ledger.record(
            "m1",
            MigrationResult::Failed {
                error: "late".to_string()
            }
        ));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get("m1"), Some(&ok(3)));
    }

    #[test]
    fn test_order_and_failures() {
        let mut ledger = RunLedger::new();
        ledger.record("b", ok(1));
        ledger.record(
            "a",
            MigrationResult::Failed {
                error: "boom".to_string(),
            },
        );

        let ids: Vec<_> = ledger.entries().iter().map(|e| e.migration_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(ledger.failed(), vec!["a"]);
        assert!(!ledger.all_succeeded());
        assert_eq!(ledger.summary_lines()[1], "a: FAILED - boom");
    }

    #[test]
    fn test_serializes_as_flat_list() {
        let mut ledger = RunLedger::new();
        ledger.record("m1", ok(0));
        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(json[0]["migration_id"], "m1");
        assert_eq!(json[0]["status"], "success");
    }
}
