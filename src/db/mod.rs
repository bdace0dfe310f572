pub mod sqlite;
pub mod repository;

pub use sqlite::*;
pub use repository::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed for {schema} at version {version}: {reason}")]
    MigrationFailed {
        schema: &'static str,
        version: i64,
        reason: String,
    },

    #[error("Stored JSON is invalid in {column}: {reason}")]
    InvalidJson { column: String, reason: String },
}
