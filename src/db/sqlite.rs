use std::path::Path;

use rusqlite::Connection;

use super::DatabaseError;

/// The four databases the auditor touches. Each has its own migration list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Source patients and prescriptions.
    Patients,
    /// Per-department audit rows.
    Audit,
    /// Embedded pair cache.
    PairCache,
    /// High-risk export.
    HighRisk,
}

impl Schema {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patients => "patients",
            Self::Audit => "audit",
            Self::PairCache => "pair_cache",
            Self::HighRisk => "high_risk",
        }
    }

    fn migrations(&self) -> Vec<(i64, &'static str)> {
        match self {
            Self::Patients => vec![
                (1, include_str!("../../resources/migrations/patients/001_initial.sql")),
            ],
            Self::Audit => vec![
                (1, include_str!("../../resources/migrations/audit/001_initial.sql")),
            ],
            Self::PairCache => vec![
                (1, include_str!("../../resources/migrations/pair_cache/001_initial.sql")),
            ],
            Self::HighRisk => vec![
                (1, include_str!("../../resources/migrations/high_risk/001_initial.sql")),
            ],
        }
    }
}

/// Open a SQLite connection to the given path and run migrations
pub fn open_database(path: &Path, schema: Schema) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    run_migrations(&conn, schema)?;
    Ok(conn)
}

/// Open an in-memory database (for testing)
pub fn open_memory_database(schema: Schema) -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    run_migrations(&conn, schema)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "PRAGMA journal_mode=DELETE;
         PRAGMA foreign_keys=ON;"
    )?;
    Ok(())
}

/// Run all pending migrations for `schema`
pub fn run_migrations(conn: &Connection, schema: Schema) -> Result<(), DatabaseError> {
    let current_version = get_current_version(conn);

    for (version, sql) in schema.migrations() {
        if version > current_version {
            tracing::info!(schema = schema.as_str(), "Running migration v{version}");
            conn.execute_batch(sql).map_err(|e| DatabaseError::MigrationFailed {
                schema: schema.as_str(),
                version,
                reason: e.to_string(),
            })?;
        }
    }

    Ok(())
}

/// Get the current schema version (0 if no schema exists yet)
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row(
        "SELECT MAX(version) FROM schema_version",
        [],
        |row| row.get::<_, i64>(0),
    )
    .unwrap_or(0)
}

/// Count tables in the database (for verification)
pub fn count_tables(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}
