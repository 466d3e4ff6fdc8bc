//! Migration executor: load, transform, validate, write for one definition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{MigrationDefinition, STAGING};
use crate::core::{Dataset, DatasetStore};
use crate::error::{MigrateError, Result};
use crate::transform::TransformRegistry;
use crate::validate::GateRegistry;

/// Outcome of one migration definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MigrationResult {
    Success {
        /// Rows in the concatenated source.
        source_row_count: usize,

        /// Rows handed to each written target table.
        per_target_row_counts: BTreeMap<String, usize>,
    },
    Failed {
        error: String,
    },
}

impl MigrationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, MigrationResult::Success { .. })
    }

    /// One summary line for this result.
    pub fn summary_line(&self, migration_id: &str) -> String {
        match self {
            MigrationResult::Success {
                source_row_count,
                per_target_row_counts,
            } => {
                let targets = per_target_row_counts
                    .iter()
                    .map(|(table, rows)| format!("{}={}", table, rows))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "{}: SUCCESS - {} source rows -> {{{}}}",
                    migration_id, source_row_count, targets
                )
            }
            MigrationResult::Failed { error } => {
                format!("{}: FAILED - {}", migration_id, error)
            }
        }
    }
}

/// Runs definitions against a store, one at a time.
pub struct MigrationExecutor<'a, S: DatasetStore> {
    store: &'a mut S,
    transforms: &'a TransformRegistry,
    gates: &'a GateRegistry,
}

impl<'a, S: DatasetStore> MigrationExecutor<'a, S> {
    pub fn new(
        store: &'a mut S,
        transforms: &'a TransformRegistry,
        gates: &'a GateRegistry,
    ) -> Self {
        Self {
            store,
            transforms,
            gates,
        }
    }

    /// Execute one migration. Every failure becomes [`MigrationResult::Failed`].
    pub async fn execute(&mut self, definition: &MigrationDefinition) -> MigrationResult {
        info!("Starting migration: {}", definition.migration_id);

        match self.try_execute(definition).await {
            Ok(result) => {
                info!("Migration {} completed successfully", definition.migration_id);
                result
            }
            Err(e) => {
                error!("Migration {} failed: {}", definition.migration_id, e);
                MigrationResult::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn try_execute(&mut self, definition: &MigrationDefinition) -> Result<MigrationResult> {
        let mut sources = Vec::with_capacity(definition.source.tables.len());
        for table in definition.source_tables() {
            sources.push(self.store.load(STAGING, table).await?);
        }
        let source = Dataset::concat(sources);

        let outputs = self.transforms.apply(definition, &source)?;

        if !self.gates.gate_for(definition).validate(&outputs, &source) {
            return Err(MigrateError::ValidationRejected(format!(
                "output of {} failed validation",
                definition.migration_id
            )));
        }

        let mut per_target_row_counts = BTreeMap::new();
        for target in &definition.targets {
            let Some(dataset) = outputs.get(&target.table) else {
                warn!(
                    "Target table {} not found in transformation output of {}",
                    target.table, definition.migration_id
                );
                continue;
            };

            if !self
                .store
                .write(&target.service, &target.table, dataset)
                .await
            {
                return Err(MigrateError::data_access(
                    format!("{}.{}", target.service, target.table),
                    "write failed",
                ));
            }
            per_target_row_counts.insert(target.table.clone(), dataset.len());
        }

        Ok(MigrationResult::Success {
            source_row_count: source.len(),
            per_target_row_counts,
        })
    }
}
