//! Offline setup check: nothing here opens a connection.

use serde::Serialize;
use staging_migrate::{Config, EnvResolution, Result, TransformRegistry};
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct SetupReport {
    pub migrations: Vec<MigrationCheck>,
    pub services: Vec<String>,
    pub dump_file: PathBuf,
    pub dump_file_present: bool,

    /// Placeholder variables that will fall back to configured defaults.
    pub defaulted: Vec<String>,
}

/// Whether one migration's transformation can be found before anything runs.
#[derive(Debug, Serialize)]
pub struct MigrationCheck {
    pub migration_id: String,
    pub kind: String,
    pub handler: String,
    pub resolved: bool,
}

impl SetupReport {
    /// Every migration's transformation resolves.
    pub fn is_ready(&self) -> bool {
        self.migrations.iter().all(|m| m.resolved)
    }

    pub fn print(&self) {
        println!("Setup Check:");
        println!("  Configuration: OK");
        println!("  Services: {}", self.services.join(", "));
        println!("  Migrations: {}", self.migrations.len());
        for m in &self.migrations {
            let status = if m.resolved { "" } else { " (UNRESOLVED)" };
            println!("    - {} [{}: {}]{}", m.migration_id, m.kind, m.handler, status);
        }

        if self.dump_file_present {
            println!("  Dump file: {} (found)", self.dump_file.display());
        } else {
            println!(
                "  Warning: dump file not found: {}",
                self.dump_file.display()
            );
        }

        if self.defaulted.is_empty() {
            println!("  Environment: all referenced variables set");
        } else {
            println!("  Environment variables using defaults:");
            for var in &self.defaulted {
                println!("    - {}", var);
            }
        }
    }
}

/// Configuration is already parsed and validated; this adds placeholder
/// resolution, transformation lookup and the dump file lookup.
pub fn check_setup(config: &Config, transforms: &TransformRegistry) -> Result<SetupReport> {
    let resolution = EnvResolution::from_process(config)?;

    let dump_file = config.connections.staging.dump_file.clone();
    let dump_file_present = dump_file.is_file();
    if !dump_file_present {
        warn!("Dump file not found: {}", dump_file.display());
    }

    let migrations = config
        .migrations
        .iter()
        .map(|m| {
            let resolved = transforms.resolves(m);
            if !resolved {
                warn!(
                    "No {} transformation found for migration {}",
                    m.transformation.kind, m.migration_id
                );
            }
            MigrationCheck {
                migration_id: m.migration_id.clone(),
                kind: m.transformation.kind.clone(),
                handler: m
                    .transformation
                    .handler
                    .clone()
                    .unwrap_or_else(|| m.migration_id.clone()),
                resolved,
            }
        })
        .collect();

    Ok(SetupReport {
        migrations,
        services: resolution.connections.names(),
        dump_file,
        dump_file_present,
        defaulted: resolution.defaulted,
    })
}
