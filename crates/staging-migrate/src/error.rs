//! Error types for the migration engine.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing sections, unresolved placeholders).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A service could not be reached or its parameters are malformed.
    #[error("Connection to service '{service}' failed: {message}")]
    Connectivity { service: String, message: String },

    /// A load or write query failed.
    #[error("Data access failed for {target}: {message}")]
    DataAccess { target: String, message: String },

    /// Unsupported transformation kind or a fault inside a transformation.
    #[error("Transformation failed for migration {migration}: {message}")]
    Transformation { migration: String, message: String },

    /// Transformation output does not agree with its source.
    #[error("Validation rejected: {0}")]
    ValidationRejected(String),

    /// Dump restore exited non-zero, could not start, or timed out.
    #[error("External process failed: {0}")]
    ExternalProcess(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Connectivity error for a service.
    pub fn connectivity(service: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Connectivity {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// Create a DataAccess error for a `service.table` target.
    pub fn data_access(target: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::DataAccess {
            target: target.into(),
            message: message.to_string(),
        }
    }

    /// Create a Transformation error.
    pub fn transformation(migration: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transformation {
            migration: migration.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error. Every fatal failure maps to 1.
    pub fn exit_code(&self) -> u8 {
        1
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
