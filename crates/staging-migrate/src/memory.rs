//! In-memory [`DatasetStore`].
//!
//! Holds tables in a map keyed by `(service, table)` and records every call
//! made against it. Clones share state, so a caller can hand one clone to an
//! orchestrator and inspect the other once the run is over.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{error, info};

use crate::core::{Dataset, DatasetStore};
use crate::error::{MigrateError, Result};

/// One `write` call as the store received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCall {
    pub service: String,
    pub table: String,
    pub rows: usize,
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<(String, String), Dataset>,
    unreachable: BTreeSet<String>,
    failing_loads: BTreeSet<(String, String)>,
    failing_writes: BTreeSet<(String, String)>,
    pings: Vec<String>,
    loads: Vec<(String, String)>,
    writes: Vec<WriteCall>,
    closes: usize,
}

/// Dataset store backed by process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

fn key(service: &str, table: &str) -> (String, String) {
    (service.to_string(), table.to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed (or replace) a table.
    pub fn insert_table(&self, service: &str, table: &str, dataset: Dataset) {
        self.state().tables.insert(key(service, table), dataset);
    }

    /// Builder form of [`insert_table`](Self::insert_table).
    #[must_use]
    pub fn with_table(self, service: &str, table: &str, dataset: Dataset) -> Self {
        self.insert_table(service, table, dataset);
        self
    }

    /// Make every operation against `service` fail as if it could not be reached.
    pub fn set_unreachable(&self, service: &str) {
        self.state().unreachable.insert(service.to_string());
    }

    /// Make `load(service, table)` fail with a data access error.
    pub fn fail_load(&self, service: &str, table: &str) {
        self.state().failing_loads.insert(key(service, table));
    }

    /// Make a non-empty `write(service, table, ..)` report failure.
    pub fn fail_write(&self, service: &str, table: &str) {
        self.state().failing_writes.insert(key(service, table));
    }

    /// Current contents of a table.
    pub fn table(&self, service: &str, table: &str) -> Option<Dataset> {
        self.state().tables.get(&key(service, table)).cloned()
    }

    /// Services pinged, in call order.
    pub fn pings(&self) -> Vec<String> {
        self.state().pings.clone()
    }

    /// `(service, table)` loads, in call order.
    pub fn loads(&self) -> Vec<(String, String)> {
        self.state().loads.clone()
    }

    /// Every write call, in call order, including empty ones.
    pub fn writes(&self) -> Vec<WriteCall> {
        self.state().writes.clone()
    }

    /// Write calls that carried rows.
    pub fn non_empty_writes(&self) -> Vec<WriteCall> {
        self.state()
            .writes
            .iter()
            .filter(|w| w.rows > 0)
            .cloned()
            .collect()
    }

    /// How many times `close` was called.
    pub fn close_count(&self) -> usize {
        self.state().closes
    }
}

#[async_trait]
impl DatasetStore for MemoryStore {
    async fn ping(&mut self, service: &str) -> Result<()> {
        let mut state = self.state();
        state.pings.push(service.to_string());
        if state.unreachable.contains(service) {
            return Err(MigrateError::connectivity(service, "service unreachable"));
        }
        Ok(())
    }

    async fn load(&mut self, service: &str, table: &str) -> Result<Dataset> {
        let mut state = self.state();
        let k = key(service, table);
        state.loads.push(k.clone());

        if state.unreachable.contains(service) {
            return Err(MigrateError::connectivity(service, "service unreachable"));
        }
        if state.failing_loads.contains(&k) {
            return Err(MigrateError::data_access(
                format!("{}.{}", service, table),
                "injected load failure",
            ));
        }

        let dataset = state.tables.get(&k).cloned().ok_or_else(|| {
            MigrateError::data_access(format!("{}.{}", service, table), "table does not exist")
        })?;
        info!("Loaded {} rows from {}.{}", dataset.len(), service, table);
        Ok(dataset)
    }

    async fn write(&mut self, service: &str, table: &str, dataset: &Dataset) -> bool {
        let mut state = self.state();
        state.writes.push(WriteCall {
            service: service.to_string(),
            table: table.to_string(),
            rows: dataset.len(),
        });

        if dataset.is_empty() {
            info!("No data to write for {}", table);
            return true;
        }

        let k = key(service, table);
        if state.unreachable.contains(service) || state.failing_writes.contains(&k) {
            error!("Failed to write data to {}.{}", service, table);
            return false;
        }

        // Append, creating the table on first write.
        let existing = state
            .tables
            .remove(&k)
            .unwrap_or_else(|| Dataset::new(dataset.columns().to_vec()));
        state.tables.insert(k, existing.vstack(dataset.clone()));
        info!("Wrote {} rows to {}.{}", dataset.len(), service, table);
        true
    }

    async fn close(&mut self) {
        self.state().closes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SqlValue;

    fn rows(n: i64) -> Dataset {
        Dataset::from_parts(["id"], (0..n).map(|i| vec![SqlValue::I64(i)]).collect())
    }

    #[tokio::test]
    async fn test_write_appends_to_existing_table() {
        let store = MemoryStore::new().with_table("svc", "t", rows(2));
        let mut handle = store.clone();

        assert!(handle.write("svc", "t", &rows(3)).await);
        assert_eq!(store.table("svc", "t").unwrap().len(), 5);
        assert_eq!(store.non_empty_writes().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_write_is_trivial_success() {
        let store = MemoryStore::new();
        store.fail_write("svc", "t");
        let mut handle = store.clone();

        assert!(handle.write("svc", "t", &Dataset::new(vec!["id".into()])).await);
        assert!(store.table("svc", "t").is_none());
        assert_eq!(store.writes().len(), 1);
        assert!(store.non_empty_writes().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryStore::new().with_table("svc", "t", rows(1));
        store.fail_load("svc", "t");
        store.fail_write("svc", "out");
        store.set_unreachable("down");
        let mut handle = store.clone();

        assert!(matches!(
            handle.load("svc", "t").await.unwrap_err(),
            MigrateError::DataAccess { .. }
        ));
        assert!(!handle.write("svc", "out", &rows(1)).await);
        assert!(matches!(
            handle.ping("down").await.unwrap_err(),
            MigrateError::Connectivity { .. }
        ));
        assert!(handle.ping("svc").await.is_ok());
        assert_eq!(store.pings(), vec!["down", "svc"]);
    }

    #[tokio::test]
    async fn test_missing_table_is_data_access_error() {
        let mut store = MemoryStore::new();
        let err = store.load("staging", "nope").await.unwrap_err();
        assert!(err.to_string().contains("staging.nope"));
    }
}
