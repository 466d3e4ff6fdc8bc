//! staging-migrate CLI - restore staging and run configured migrations.

mod check;

use clap::{Parser, Subcommand};
use staging_migrate::{Config, MigrateError, Orchestrator, TransformRegistry};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{info, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "staging-migrate")]
#[command(about = "Batch migration from a staging MySQL database into microservice databases")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "migration_config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Also append plain-text logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare, execute every migration, and report
    Run,

    /// Check configuration, dump file, and credential defaults without connecting
    Check,

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format, cli.log_file.as_deref())?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run => {
            let mut orchestrator = Orchestrator::from_config(config)?;
            let outcome = orchestrator.run().await;

            if cli.output_json {
                println!("{}", outcome.to_json()?);
            } else {
                println!("\nMigration Summary:");
                for line in outcome.ledger.summary_lines() {
                    println!("  {}", line);
                }
                println!("  Run ID: {}", outcome.run_id);
                println!("  Duration: {:.2}s", outcome.duration_seconds);
                match (&outcome.failed_phase, &outcome.error) {
                    (Some(phase), Some(error)) => {
                        println!("\nMigration failed during {}: {}", phase, error);
                    }
                    _ => println!("\nMigration completed successfully!"),
                }
            }

            Ok(ExitCode::from(outcome.exit_code()))
        }

        Commands::Check => {
            let report = check::check_setup(&config, &TransformRegistry::with_builtins())?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report.print();
            }

            if report.is_ready() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }

        Commands::HealthCheck => {
            let mut orchestrator = Orchestrator::from_config(config)?;
            let result = orchestrator.health_check().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                for service in &result.services {
                    println!(
                        "  {}: {} ({}ms)",
                        service.service,
                        if service.connected { "OK" } else { "FAILED" },
                        service.latency_ms
                    );
                    if let Some(ref err) = service.error {
                        println!("    Error: {}", err);
                    }
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if result.healthy {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn setup_logging(
    verbosity: &str,
    format: &str,
    log_file: Option<&Path>,
) -> Result<(), MigrateError> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json stays parseable.
    let console = if format == "json" {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(LevelFilter::from_level(level))
        .init();

    Ok(())
}
