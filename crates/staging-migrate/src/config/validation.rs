//! Configuration validation.

use super::{Config, ServiceConfig, STAGING};
use crate::error::{MigrateError, Result};
use std::collections::HashSet;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_service("connections.staging", &config.connections.staging.connection)?;
    if config.connections.staging.dump_file.as_os_str().is_empty() {
        return Err(MigrateError::Config(
            "connections.staging.dump_file is required".into(),
        ));
    }

    for (name, service) in &config.connections.microservices {
        if name == STAGING {
            return Err(MigrateError::Config(
                "'staging' is reserved and cannot be a microservice name".into(),
            ));
        }
        validate_service(&format!("connections.microservices.{}", name), service)?;
    }

    let mut seen = HashSet::new();
    for migration in &config.migrations {
        let id = &migration.migration_id;
        if id.is_empty() {
            return Err(MigrateError::Config("migration_id is required".into()));
        }
        if !seen.insert(id.as_str()) {
            return Err(MigrateError::Config(format!(
                "duplicate migration_id '{}'",
                id
            )));
        }
        if migration.source.tables.is_empty() {
            return Err(MigrateError::Config(format!(
                "migration '{}' has no source tables",
                id
            )));
        }
        if migration.transformation.kind.is_empty() {
            return Err(MigrateError::Config(format!(
                "migration '{}' has no transformation type",
                id
            )));
        }
        for target in &migration.targets {
            if !config.connections.microservices.contains_key(&target.service) {
                return Err(MigrateError::Config(format!(
                    "migration '{}' targets unknown service '{}'",
                    id, target.service
                )));
            }
            if target.table.is_empty() {
                return Err(MigrateError::Config(format!(
                    "migration '{}' has a target without a table",
                    id
                )));
            }
        }
        if let Some(ratio) = migration.validation.max_output_ratio {
            if ratio.is_nan() || ratio < 0.0 {
                return Err(MigrateError::Config(format!(
                    "migration '{}': validation.max_output_ratio must be non-negative",
                    id
                )));
            }
        }
    }

    if config.restore.client.is_empty() {
        return Err(MigrateError::Config("restore.client is required".into()));
    }
    if config.restore.timeout_secs == 0 {
        return Err(MigrateError::Config(
            "restore.timeout_secs must be at least 1".into(),
        ));
    }

    Ok(())
}

fn validate_service(path: &str, service: &ServiceConfig) -> Result<()> {
    if service.host.is_empty() {
        return Err(MigrateError::Config(format!("{}.host is required", path)));
    }
    if service.port == 0 {
        return Err(MigrateError::Config(format!("{}.port must be non-zero", path)));
    }
    if service.database.is_empty() {
        return Err(MigrateError::Config(format!("{}.database is required", path)));
    }
    if service.username.is_empty() {
        return Err(MigrateError::Config(format!("{}.username is required", path)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ConnectionsConfig, MigrationDefinition, SourceSpec, SourceTable, StagingConfig,
        TargetBinding, TransformationSpec,
    };
    use std::collections::BTreeMap;

    fn service(database: &str) -> ServiceConfig {
        ServiceConfig {
            host: "localhost".to_string(),
            port: 3306,
            database: database.to_string(),
            username: "root".to_string(),
            password: "password".to_string(),
        }
    }

    fn migration(id: &str) -> MigrationDefinition {
        MigrationDefinition {
            migration_id: id.to_string(),
            source: SourceSpec {
                tables: vec![SourceTable {
                    name: "products".to_string(),
                }],
            },
            transformation: TransformationSpec {
                kind: "custom".to_string(),
                handler: None,
                parameters: BTreeMap::new(),
            },
            targets: vec![TargetBinding {
                service: "product_service".to_string(),
                table: "products".to_string(),
            }],
            validation: Default::default(),
        }
    }

    fn valid_config() -> Config {
        let mut microservices = BTreeMap::new();
        microservices.insert("product_service".to_string(), service("products"));
        Config {
            connections: ConnectionsConfig {
                staging: StagingConfig {
                    connection: service("staging"),
                    dump_file: "dump.sql".into(),
                },
                microservices,
            },
            migrations: vec![migration("products")],
            environment: Default::default(),
            restore: Default::default(),
            execution: Default::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_staging_host() {
        let mut config = valid_config();
        config.connections.staging.connection.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut config = valid_config();
        config
            .connections
            .microservices
            .get_mut("product_service")
            .unwrap()
            .port = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_staging_is_reserved() {
        let mut config = valid_config();
        config
            .connections
            .microservices
            .insert("staging".to_string(), service("other"));
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_duplicate_migration_id() {
        let mut config = valid_config();
        config.migrations.push(migration("products"));
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate migration_id"));
    }

    #[test]
    fn test_unknown_target_service() {
        let mut config = valid_config();
        config.migrations[0].targets[0].service = "order_service".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("order_service"));
    }

    #[test]
    fn test_migration_without_sources() {
        let mut config = valid_config();
        config.migrations[0].source.tables.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_restore_timeout() {
        let mut config = valid_config();
        config.restore.timeout_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_no_migrations_is_valid() {
        let mut config = valid_config();
        config.migrations.clear();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_service_config_debug_redacts_password() {
        let mut config = valid_config();
        config.connections.staging.connection.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.connections.staging);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }
}
