//! Validation gate: accept or reject a transformation's output before any write.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{MigrationDefinition, ValidationRules};
use crate::core::{Dataset, TransformationOutput};

/// Decides whether transformation output may be written.
pub trait ValidationGate: Send + Sync {
    /// `true` to let the writes proceed.
    fn validate(&self, outputs: &TransformationOutput, source: &Dataset) -> bool;
}

/// Gate driven by a migration's `validation` rules.
#[derive(Debug, Clone)]
pub struct RuleGate {
    migration_id: String,
    rules: ValidationRules,
}

impl RuleGate {
    pub fn new(migration_id: impl Into<String>, rules: ValidationRules) -> Self {
        Self {
            migration_id: migration_id.into(),
            rules,
        }
    }

    /// First rule the output breaks, if any.
    pub fn violation(&self, outputs: &TransformationOutput, source: &Dataset) -> Option<String> {
        for (table, dataset) in outputs {
            if !dataset.is_well_formed() {
                return Some(format!(
                    "output {} has rows that do not match its {} columns",
                    table,
                    dataset.columns().len()
                ));
            }
        }

        for (table, required) in &self.rules.required_columns {
            let Some(dataset) = outputs.get(table) else {
                continue;
            };
            if let Some(missing) = required.iter().find(|c| !dataset.has_column(c)) {
                return Some(format!("output {} is missing column {}", table, missing));
            }
        }

        let output_rows: usize = outputs.values().map(Dataset::len).sum();

        if !self.rules.allow_empty_output && output_rows == 0 && !source.is_empty() {
            return Some(format!(
                "no output rows from {} source rows",
                source.len()
            ));
        }

        if let Some(ratio) = self.rules.max_output_ratio {
            let limit = ratio * source.len() as f64;
            if output_rows as f64 > limit {
                return Some(format!(
                    "{} output rows exceed {} x {} source rows",
                    output_rows,
                    ratio,
                    source.len()
                ));
            }
        }

        None
    }
}

impl ValidationGate for RuleGate {
    fn validate(&self, outputs: &TransformationOutput, source: &Dataset) -> bool {
        match self.violation(outputs, source) {
            Some(reason) => {
                warn!("Validation rejected {}: {}", self.migration_id, reason);
                false
            }
            None => {
                debug!("Validation passed for {}", self.migration_id);
                true
            }
        }
    }
}

/// Gates registered per migration id. Unregistered migrations get a [`RuleGate`].
#[derive(Default)]
pub struct GateRegistry {
    gates: HashMap<String, Arc<dyn ValidationGate>>,
}

impl GateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gate for one migration, replacing its rule gate.
    pub fn register<G: ValidationGate + 'static>(&mut self, migration_id: &str, gate: G) {
        self.gates.insert(migration_id.to_string(), Arc::new(gate));
    }

    /// The gate that judges `definition`.
    pub fn gate_for(&self, definition: &MigrationDefinition) -> Arc<dyn ValidationGate> {
        match self.gates.get(&definition.migration_id) {
            Some(gate) => Arc::clone(gate),
            None => Arc::new(RuleGate::new(
                definition.migration_id.clone(),
                definition.validation.clone(),
            )),
        }
    }
}
