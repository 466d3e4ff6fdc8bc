//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Connection parameters for the staging database and every microservice.
    pub connections: ConnectionsConfig,

    /// Ordered migration definitions. Executed in declaration order.
    pub migrations: Vec<MigrationDefinition>,

    /// Fallback values for `${VAR}` placeholders in connection parameters.
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// External dump restore settings.
    #[serde(default)]
    pub restore: RestoreConfig,

    /// Run-level execution behavior.
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// The `connections` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionsConfig {
    /// Staging (source) database.
    pub staging: StagingConfig,

    /// Target databases keyed by logical service name.
    #[serde(default)]
    pub microservices: BTreeMap<String, ServiceConfig>,
}

/// Staging database: connection parameters plus the dump to restore into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    #[serde(flatten)]
    pub connection: ServiceConfig,

    /// Text-format SQL dump restored during preparation.
    pub dump_file: PathBuf,
}

/// Connection parameters for one logical service.
///
/// String fields may contain `${VAR}` placeholders, resolved by
/// [`EnvResolution`](super::EnvResolution) before any connection is made.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub username: String,

    /// Password.
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// One declarative source-to-target data movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationDefinition {
    /// Unique within a run.
    pub migration_id: String,

    pub source: SourceSpec,

    pub transformation: TransformationSpec,

    /// Ordered target bindings.
    #[serde(default)]
    pub targets: Vec<TargetBinding>,

    /// Rules for the default validation gate.
    #[serde(default)]
    pub validation: ValidationRules,
}

impl MigrationDefinition {
    /// Source table names in declaration order.
    pub fn source_tables(&self) -> impl Iterator<Item = &str> {
        self.source.tables.iter().map(|t| t.name.as_str())
    }
}

/// Source side of a migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Staging tables, concatenated row-wise when more than one.
    pub tables: Vec<SourceTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceTable {
    pub name: String,
}

/// Transformation descriptor: a kind plus free-form parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationSpec {
    /// Transformation kind (e.g. "custom").
    #[serde(rename = "type")]
    pub kind: String,

    /// Named handler within the kind. Defaults to the migration id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,

    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

/// Where one transformation output lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetBinding {
    /// Logical service name (a key of `connections.microservices`).
    #[serde(alias = "database")]
    pub service: String,

    /// Output table name, also the key looked up in the transformation output.
    pub table: String,
}

/// Rules applied by the default validation gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRules {
    /// Columns that must exist in the named output table (when that table is present).
    #[serde(default)]
    pub required_columns: BTreeMap<String, Vec<String>>,

    /// Accept an empty output for a non-empty source (default: true).
    #[serde(default = "default_true")]
    pub allow_empty_output: bool,

    /// Upper bound on total output rows as a multiple of source rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_ratio: Option<f64>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            required_columns: BTreeMap::new(),
            allow_empty_output: true,
            max_output_ratio: None,
        }
    }
}

/// The `environment` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// `VAR -> default` used when the process environment has no value.
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

/// The `restore` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreConfig {
    /// Database client executable fed the dump on stdin (default: "mysql").
    #[serde(default = "default_client")]
    pub client: String,

    /// Wall-clock budget for the restore (default: 300).
    #[serde(default = "default_restore_timeout")]
    pub timeout_secs: u64,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            client: default_client(),
            timeout_secs: default_restore_timeout(),
        }
    }
}

/// The `execution` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

/// What the executing phase does after a migration fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failed migration.
    #[default]
    FailFast,

    /// Run every migration, then fail the run if any failed.
    Continue,
}

// Default value functions for serde
fn default_mysql_port() -> u16 {
    3306
}

fn default_client() -> String {
    "mysql".to_string()
}

fn default_restore_timeout() -> u64 {
    300
}

fn default_true() -> bool {
    true
}
