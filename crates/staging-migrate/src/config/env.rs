//! Explicit credential resolution.
//!
//! Connection fields may reference `${VAR}`. Each reference is filled from the
//! process environment when set and non-empty, otherwise from
//! `environment.defaults`. The process environment is only ever read.

use super::{Config, ServiceConfig};
use crate::error::{MigrateError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Name under which the staging database is registered.
pub const STAGING: &str = "staging";

/// Fully resolved connection parameters for one service.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Resolved parameters for every configured service, staging included.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSet {
    services: BTreeMap<String, ConnectionParams>,
}

impl ConnectionSet {
    /// Build a set from already-resolved parameters.
    pub fn from_services(services: impl IntoIterator<Item = (String, ConnectionParams)>) -> Self {
        Self {
            services: services.into_iter().collect(),
        }
    }

    pub fn get(&self, service: &str) -> Option<&ConnectionParams> {
        self.services.get(service)
    }

    /// Service names, staging first, then the rest in name order.
    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.services.len());
        if self.services.contains_key(STAGING) {
            names.push(STAGING.to_string());
        }
        names.extend(self.services.keys().filter(|n| *n != STAGING).cloned());
        names
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Outcome of resolving placeholders against the environment.
#[derive(Debug, Clone)]
pub struct EnvResolution {
    pub connections: ConnectionSet,

    /// Variables that had no environment value and took their configured default.
    pub defaulted: Vec<String>,
}

impl EnvResolution {
    /// Resolve against the current process environment.
    pub fn from_process(config: &Config) -> Result<Self> {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    /// Resolve with an explicit variable lookup.
    pub fn resolve<F>(config: &Config, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut resolver = Resolver {
            defaults: &config.environment.defaults,
            lookup: &lookup,
            defaulted: BTreeSet::new(),
        };

        let mut services = BTreeMap::new();
        services.insert(
            STAGING.to_string(),
            resolver.service(STAGING, &config.connections.staging.connection)?,
        );
        for (name, service) in &config.connections.microservices {
            services.insert(name.clone(), resolver.service(name, service)?);
        }

        Ok(Self {
            connections: ConnectionSet { services },
            defaulted: resolver.defaulted.into_iter().collect(),
        })
    }
}

struct Resolver<'a, F> {
    defaults: &'a BTreeMap<String, String>,
    lookup: &'a F,
    defaulted: BTreeSet<String>,
}

impl<F> Resolver<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn service(&mut self, name: &str, service: &ServiceConfig) -> Result<ConnectionParams> {
        Ok(ConnectionParams {
            host: self.interpolate(name, "host", &service.host)?,
            port: service.port,
            database: self.interpolate(name, "database", &service.database)?,
            username: self.interpolate(name, "username", &service.username)?,
            password: self.interpolate(name, "password", &service.password)?,
        })
    }

    fn interpolate(&mut self, service: &str, field: &str, raw: &str) -> Result<String> {
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| {
                MigrateError::Config(format!(
                    "{}.{}: unterminated placeholder in '{}'",
                    service, field, raw
                ))
            })?;
            let var = &after[..end];
            if var.is_empty() {
                return Err(MigrateError::Config(format!(
                    "{}.{}: empty placeholder name",
                    service, field
                )));
            }
            out.push_str(&self.value_of(service, field, var)?);
            rest = &after[end + 1..];
        }
        out.push_str(rest);

        Ok(out)
    }

    fn value_of(&mut self, service: &str, field: &str, var: &str) -> Result<String> {
        if let Some(value) = (self.lookup)(var).filter(|v| !v.is_empty()) {
            return Ok(value);
        }
        match self.defaults.get(var) {
            Some(default) => {
                self.defaulted.insert(var.to_string());
                Ok(default.clone())
            }
            None => Err(MigrateError::Config(format!(
                "{}.{}: variable {} is not set and has no default",
                service, field, var
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
connections:
  staging:
    host: localhost
    database: staging
    username: ${STAGING_DB_USER}
    password: ${STAGING_DB_PASSWORD}
    dump_file: dump.sql
  microservices:
    product_service:
      host: db.${ZONE}.internal
      port: 3307
      database: products
      username: ${PRODUCT_DB_USER}
      password: ${PRODUCT_DB_PASSWORD}
migrations: []
environment:
  defaults:
    STAGING_DB_USER: root
    STAGING_DB_PASSWORD: password
    PRODUCT_DB_USER: root
    PRODUCT_DB_PASSWORD: password
    ZONE: eu
"#;

    fn config() -> Config {
        Config::from_yaml(YAML).unwrap()
    }

    #[test]
    fn test_defaults_fill_unset_variables() {
        let resolved = EnvResolution::resolve(&config(), |_| None).unwrap();

        let staging = resolved.connections.get(STAGING).unwrap();
        assert_eq!(staging.username, "root");
        assert_eq!(staging.password, "password");
        assert_eq!(staging.port, 3306);

        let product = resolved.connections.get("product_service").unwrap();
        assert_eq!(product.host, "db.eu.internal");
        assert_eq!(product.port, 3307);
        assert_eq!(resolved.defaulted.len(), 5);
    }

    #[test]
    fn test_environment_wins_over_default() {
        let resolved = EnvResolution::resolve(&config(), |name| match name {
            "STAGING_DB_USER" => Some("migrator".to_string()),
            "PRODUCT_DB_USER" => Some(String::new()),
            _ => None,
        })
        .unwrap();

        assert_eq!(resolved.connections.get(STAGING).unwrap().username, "migrator");
        // Empty values count as unset.
        assert_eq!(
            resolved.connections.get("product_service").unwrap().username,
            "root"
        );
        assert!(!resolved.defaulted.contains(&"STAGING_DB_USER".to_string()));
        assert!(resolved.defaulted.contains(&"PRODUCT_DB_USER".to_string()));
    }

    #[test]
    fn test_missing_variable_without_default_is_config_error() {
        let mut config = config();
        config.environment.defaults.remove("ZONE");
        let err = EnvResolution::resolve(&config, |_| None).unwrap_err();
        assert!(matches!(err, MigrateError::Config(ref m) if m.contains("ZONE")));
    }

    #[test]
    fn test_unterminated_placeholder_is_config_error() {
        let mut config = config();
        config.connections.staging.connection.host = "${HOST".to_string();
        assert!(matches!(
            EnvResolution::resolve(&config, |_| None),
            Err(MigrateError::Config(_))
        ));
    }

    #[test]
    fn test_names_list_staging_first() {
        let resolved = EnvResolution::resolve(&config(), |_| None).unwrap();
        assert_eq!(
            resolved.connections.names(),
            vec!["staging".to_string(), "product_service".to_string()]
        );
    }

    #[test]
    fn test_params_debug_redacts_password() {
        let resolved = EnvResolution::resolve(&config(), |name| {
            (name == "STAGING_DB_PASSWORD").then(|| "hunter2-secret".to_string())
        })
        .unwrap();
        let debug = format!("{:?}", resolved.connections);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2-secret"));
    }
}
