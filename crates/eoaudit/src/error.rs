//! Error types for the audit core.

use eoaudit_db::DbError;
use eoaudit_store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Audit operation result type.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Audit errors.
///
/// Discrepancies are never errors; they are reported as findings.
#[derive(Error, Debug)]
pub enum AuditError {
    /// No snapshot has been built yet
    #[error("Inventory not found at {}", path.display())]
    InventoryMissing { path: PathBuf },

    /// Snapshot exists but cannot be parsed
    #[error("Inventory at {} is unreadable: {source}", path.display())]
    InventoryCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    Store(#[from] StoreError),

    #[error("Datacube index error: {0}")]
    Database(#[from] DbError),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A check needs a collaborator that was not provided
    #[error("{0} is not available for this run")]
    Unavailable(&'static str),

    /// A check needs a collaborator whose client could not be opened
    #[error("{what} could not be opened: {error}")]
    CollaboratorFailed { what: &'static str, error: String },

    #[error("Audit cancelled")]
    Cancelled,
}

impl AuditError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Store cancellation is reported as an audit cancellation.
    pub fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::Cancelled => Self::Cancelled,
            other => Self::Store(other),
        }
    }
}
