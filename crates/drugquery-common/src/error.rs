use std::path::PathBuf;
use thiserror::Error;

use crate::entities::DockingId;

/// Request-boundary error. Every fatal condition gets its own variant so
/// callers can pick user messaging without matching on message text.
#[derive(Debug, Error)]
pub enum DrugQueryError {
    #[error("Invalid query structure: {0}")]
    InvalidQueryStructure(String),

    #[error("Corrupt score file {path:?} at line {line}: {reason}")]
    CorruptScoreFile {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Broken ancestry chain for docking {docking_id}: missing {missing}")]
    BrokenAncestry {
        docking_id: DockingId,
        missing: String,
    },

    #[error("Export conflict: {0:?} already exists")]
    ExportConflict(PathBuf),

    #[error("Target name is not usable as a directory name: {0:?}")]
    InvalidTargetName(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DrugQueryError>;
