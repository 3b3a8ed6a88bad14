// Run-level error types and exit codes.

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the checker
/// - 0: Success
/// - 1: General error (I/O, configuration, prompts)
/// - 2: Authentication failed
/// - 3: Session lost mid-run
/// - 4: Invalid input
/// - 130: Interrupted by the operator
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Input file {0} not found. An empty one was created; fill it with phone numbers, one per line.")]
    InputMissing(PathBuf),

    #[error("Nothing to process: {0} contains no phone numbers.")]
    EmptyInput(PathBuf),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Session lost: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Interrupted")]
    Interrupted,
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn table(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        AppError::Table {
            path: path.into(),
            source,
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) | AppError::Io { .. } | AppError::Table { .. } => 1,
            AppError::Authentication(_) => 2,
            AppError::Session(_) => 3,
            AppError::InputMissing(_) | AppError::EmptyInput(_) => 4,
            AppError::Interrupted => 130,
        }
    }
}
