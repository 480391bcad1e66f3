//! Engine error taxonomy.
//!
//! Per-file parse failures are recoverable: the file is dropped and the run
//! continues. Only a run that ends with zero usable input files is fatal.

use std::path::PathBuf;

/// Errors produced by the report engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Parse error in {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No usable input files (all {0} inputs failed or were missing)")]
    NoUsableInput(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl EngineError {
    /// Build a parse error for one input file.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Check whether this error is recoverable at the batch level.
    ///
    /// Recoverable errors drop one file; the remaining inputs still run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::InputNotFound(_))
    }

    /// Check if this error represents a missing input path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::InputNotFound(_))
    }
}
