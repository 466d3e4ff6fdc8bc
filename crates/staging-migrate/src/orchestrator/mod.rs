//! Migration orchestrator - main workflow coordinator.
//!
//! A run moves through `Preparing -> Executing -> Validating -> Done`, or
//! stops in `Failed` at the first phase that cannot complete. Connections are
//! released on every exit path.

mod ledger;

pub use ledger::{LedgerEntry, RunLedger};

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{Config, EnvResolution, FailurePolicy, STAGING};
use crate::core::DatasetStore;
use crate::drivers::MysqlStore;
use crate::error::{MigrateError, Result};
use crate::executor::MigrationExecutor;
use crate::restore::{DumpRestorer, MysqlClientRestore};
use crate::transform::TransformRegistry;
use crate::validate::GateRegistry;

/// Orchestrator phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Preparing,
    Executing,
    Validating,
    Done,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Failed)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Preparing => "preparing",
            RunPhase::Executing => "executing",
            RunPhase::Validating => "validating",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a full run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Unique run identifier.
    pub run_id: String,

    /// SHA-256 of the configuration that drove the run.
    pub config_hash: String,

    /// Terminal phase: `done` or `failed`.
    pub phase: RunPhase,

    /// Phase that failed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_phase: Option<RunPhase>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// One entry per executed migration.
    pub ledger: RunLedger,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.phase == RunPhase::Done
    }

    /// Process exit status: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.succeeded() {
            0
        } else {
            1
        }
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Connectivity of one service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub service: String,
    pub connected: bool,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,

    /// Staging first, then microservices by name.
    pub services: Vec<ServiceHealth>,
}

/// A phase that could not complete.
struct PhaseFailure {
    phase: RunPhase,
    message: String,
}

impl PhaseFailure {
    fn new(phase: RunPhase, message: impl ToString) -> Self {
        Self {
            phase,
            message: message.to_string(),
        }
    }
}

/// Migration orchestrator.
pub struct Orchestrator<S: DatasetStore, R: DumpRestorer> {
    config: Config,
    resolution: EnvResolution,
    store: S,
    restorer: R,
    transforms: TransformRegistry,
    gates: GateRegistry,
    phase: RunPhase,
}

impl Orchestrator<MysqlStore, MysqlClientRestore> {
    /// Wire the production MySQL stack from configuration and the process environment.
    pub fn from_config(config: Config) -> Result<Self> {
        let resolution = EnvResolution::from_process(&config)?;
        let staging = resolution
            .connections
            .get(STAGING)
            .cloned()
            .ok_or_else(|| MigrateError::Config("staging connection is not configured".into()))?;

        let store = MysqlStore::new(resolution.connections.clone());
        let restorer = MysqlClientRestore::new(&config.restore, staging);
        Ok(Self::with_resolution(config, resolution, store, restorer))
    }
}

impl<S: DatasetStore, R: DumpRestorer> Orchestrator<S, R> {
    /// Create an orchestrator over any store and restorer, resolving
    /// credentials from the process environment.
    pub fn new(config: Config, store: S, restorer: R) -> Result<Self> {
        let resolution = EnvResolution::from_process(&config)?;
        Ok(Self::with_resolution(config, resolution, store, restorer))
    }

    /// Create an orchestrator from an already-resolved environment.
    pub fn with_resolution(
        config: Config,
        resolution: EnvResolution,
        store: S,
        restorer: R,
    ) -> Self {
        Self {
            config,
            resolution,
            store,
            restorer,
            transforms: TransformRegistry::with_builtins(),
            gates: GateRegistry::new(),
            phase: RunPhase::Preparing,
        }
    }

    /// Replace the transformation registry.
    #[must_use]
    pub fn with_transforms(mut self, transforms: TransformRegistry) -> Self {
        self.transforms = transforms;
        self
    }

    /// Replace the validation gate registry.
    #[must_use]
    pub fn with_gates(mut self, gates: GateRegistry) -> Self {
        self.gates = gates;
        self
    }

    /// Phase of the most recent (or current) run.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every phase. Never returns early without releasing connections.
    pub async fn run(&mut self) -> RunOutcome {
        let started_at = Utc::now();
        let timer = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!("Starting migration run: {}", run_id);

        let mut ledger = RunLedger::new();
        let result = self.drive(&mut ledger).await;

        self.store.close().await;

        let (failed_phase, error) = match result {
            Ok(()) => {
                self.phase = RunPhase::Done;
                info!(
                    "Migration completed successfully in {:.2} seconds",
                    timer.elapsed().as_secs_f64()
                );
                (None, None)
            }
            Err(failure) => {
                self.phase = RunPhase::Failed;
                error!("Run failed during {}: {}", failure.phase, failure.message);
                (Some(failure.phase), Some(failure.message))
            }
        };

        RunOutcome {
            run_id,
            config_hash: self.config.hash(),
            phase: self.phase,
            failed_phase,
            error,
            started_at,
            completed_at: Utc::now(),
            duration_seconds: timer.elapsed().as_secs_f64(),
            ledger,
        }
    }

    async fn drive(&mut self, ledger: &mut RunLedger) -> std::result::Result<(), PhaseFailure> {
        self.enter(RunPhase::Preparing);
        self.prepare()
            .await
            .map_err(|e| PhaseFailure::new(RunPhase::Preparing, e))?;

        self.enter(RunPhase::Executing);
        self.execute_migrations(ledger).await?;

        self.enter(RunPhase::Validating);
        self.report(ledger);

        Ok(())
    }

    fn enter(&mut self, phase: RunPhase) {
        info!("Phase: {}", phase);
        self.phase = phase;
    }

    /// Preparing: connectivity of every service, then the staging restore.
    ///
    /// Safe to repeat; it touches no ledger.
    pub async fn prepare(&mut self) -> Result<()> {
        for var in &self.resolution.defaulted {
            info!("Set {} to default value", var);
        }

        self.check_connections().await?;

        let dump_file = &self.config.connections.staging.dump_file;
        if !dump_file.is_file() {
            return Err(MigrateError::ExternalProcess(format!(
                "Dump file not found: {}",
                dump_file.display()
            )));
        }
        self.restorer.restore(dump_file).await?;

        info!("Preparation completed successfully");
        Ok(())
    }

    async fn check_connections(&mut self) -> Result<()> {
        info!("Testing database connections...");
        for service in self.resolution.connections.names() {
            self.store.ping(&service).await?;
            info!("Connection to {} successful", service);
        }
        Ok(())
    }

    async fn execute_migrations(
        &mut self,
        ledger: &mut RunLedger,
    ) -> std::result::Result<(), PhaseFailure> {
        let policy = self.config.execution.failure_policy;
        let Self {
            config,
            store,
            transforms,
            gates,
            ..
        } = self;
        let mut executor = MigrationExecutor::new(store, transforms, gates);

        for definition in &config.migrations {
            info!("Executing migration: {}", definition.migration_id);
            let result = executor.execute(definition).await;
            let failed = !result.is_success();

            if !ledger.record(&definition.migration_id, result) {
                warn!(
                    "Migration {} already has a result; keeping the first",
                    definition.migration_id
                );
            }

            if failed && policy == FailurePolicy::FailFast {
                return Err(PhaseFailure::new(
                    RunPhase::Executing,
                    format!("Migration {} failed", definition.migration_id),
                ));
            }
        }

        let failed = ledger.failed();
        if !failed.is_empty() {
            return Err(PhaseFailure::new(
                RunPhase::Executing,
                format!("{} migration(s) failed: {}", failed.len(), failed.join(", ")),
            ));
        }

        info!("All {} migrations completed", ledger.len());
        Ok(())
    }

    /// Validating: report only.
    fn report(&self, ledger: &RunLedger) {
        info!("Migration Summary:");
        for entry in ledger.entries() {
            let line = entry.result.summary_line(&entry.migration_id);
            if entry.result.is_success() {
                info!("{}", line);
            } else {
                warn!("{}", line);
            }
        }
        info!(
            "{} succeeded, {} failed",
            ledger.len() - ledger.failed().len(),
            ledger.failed().len()
        );
    }

    /// Check every configured service without restoring or migrating anything.
    pub async fn health_check(&mut self) -> HealthReport {
        let mut services = Vec::new();
        for service in self.resolution.connections.names() {
            let timer = Instant::now();
            let result = self.store.ping(&service).await;
            let latency_ms = timer.elapsed().as_millis() as u64;
            services.push(ServiceHealth {
                service,
                connected: result.is_ok(),
                latency_ms,
                error: result.err().map(|e| e.to_string()),
            });
        }
        self.store.close().await;

        HealthReport {
            healthy: services.iter().all(|s| s.connected),
            services,
        }
    }
}
