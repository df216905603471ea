//! Error kinds surfaced by the backup and restore lifecycle

use crate::managers::hooks::HookStage;
use crate::storage::BackendKind;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A failed push or pull against one target
#[derive(Debug, Clone, Error)]
#[error("{kind} transfer for target '{target}' failed: {message}")]
pub struct TransferError {
    pub target: String,
    pub kind: BackendKind,
    pub message: String,
}

/// Aggregated per-target failures of one dispatch cycle, with the targets that succeeded
#[derive(Debug, Clone)]
pub struct TargetErrors {
    pub failures: Vec<TransferError>,
    pub succeeded: Vec<String>,
}

impl fmt::Display for TargetErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.failures.len() + self.succeeded.len();
        write!(f, "{} of {} target(s) failed", self.failures.len(), total)?;
        for failure in &self.failures {
            write!(f, "; {}", failure)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("{0}")]
    Targets(TargetErrors),

    #[error("Database error during {operation}: {message}")]
    Database { operation: String, message: String },

    #[error("{stage} hook {} failed: {reason}", script.display())]
    Hook {
        stage: HookStage,
        script: PathBuf,
        reason: String,
    },

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl BackupError {
    pub fn config(message: impl Into<String>) -> Self {
        BackupError::Config(message.into())
    }

    pub fn database(operation: impl Into<String>, err: impl fmt::Display) -> Self {
        BackupError::Database {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        BackupError::Io {
            context: context.into(),
            source,
        }
    }

    /// True for errors that must stop a run before any I/O is attempted
    pub fn is_config(&self) -> bool {
        matches!(self, BackupError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
