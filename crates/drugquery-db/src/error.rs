//! Database error types.

use drugquery_common::DrugQueryError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl DbError {
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        DbError::NotFound(format!("{kind} {id}"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound(_))
    }
}

impl From<DbError> for DrugQueryError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => DrugQueryError::NotFound(what),
            DbError::Duplicate(what) => DrugQueryError::Duplicate(what),
            DbError::Io(e) => DrugQueryError::Io(e),
            other => DrugQueryError::Repository(other.to_string()),
        }
    }
}
