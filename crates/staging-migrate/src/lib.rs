//! # staging-migrate
//!
//! Batch migration engine that restores a staging MySQL database from a
//! dump and moves its data into per-service databases.
//!
//! A run is driven by a YAML configuration and goes through three phases:
//!
//! - **Preparing**: resolve credentials, check every connection, restore the dump
//! - **Executing**: for each migration, load staging tables, transform,
//!   validate, and append the outputs to their target services
//! - **Validating**: report a per-migration summary
//!
//! ## Example
//!
//! ```rust,no_run
//! use staging_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> staging_migrate::Result<()> {
//!     let config = Config::load("migration_config.yaml")?;
//!     let mut orchestrator = Orchestrator::from_config(config)?;
//!     let outcome = orchestrator.run().await;
//!     for line in outcome.ledger.summary_lines() {
//!         println!("{}", line);
//!     }
//!     std::process::exit(i32::from(outcome.exit_code()));
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod executor;
pub mod memory;
pub mod orchestrator;
pub mod registry;
pub mod restore;
pub mod transform;
pub mod validate;

// Re-exports for convenient access
pub use config::{
    Config, ConnectionParams, ConnectionSet, EnvResolution, FailurePolicy, MigrationDefinition,
};
pub use crate::core::{Dataset, DatasetStore, SqlValue, TransformationOutput};
pub use drivers::{MysqlConnector, MysqlStore};
pub use error::{MigrateError, Result};
pub use executor::{MigrationExecutor, MigrationResult};
pub use memory::MemoryStore;
pub use orchestrator::{HealthReport, Orchestrator, RunLedger, RunOutcome, RunPhase};
pub use registry::ConnectionRegistry;
pub use restore::{DumpRestorer, MysqlClientRestore};
pub use transform::{CustomTransform, Transform, TransformRegistry};
pub use validate::{GateRegistry, RuleGate, ValidationGate};
