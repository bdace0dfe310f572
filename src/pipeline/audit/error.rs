//! Error types for the audit pipeline.
//!
//! Lookup failures never surface here: scorers turn them into verdicts.
//! These errors cover the stores around the run.

use thiserror::Error;

use crate::db::DatabaseError;
use crate::scoring::ScoringError;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Scorer setup failed: {0}")]
    Scoring(#[from] ScoringError),

    #[error("Cache persistence failed for {path}: {reason}")]
    CachePersist { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for AuditError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(err))
    }
}
