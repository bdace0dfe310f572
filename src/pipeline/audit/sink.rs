//! Department-bucketed result sink over the audit database.

use std::path::Path;

use chrono::Utc;
use rusqlite::Connection;

use super::error::AuditError;
use super::traits::ResultSink;
use crate::db::repository;
use crate::db::sqlite::{open_database, Schema};
use crate::models::AuditRow;

/// Bucket name for a department: spaces and hyphens become underscores.
pub fn bucket_name(department: &str) -> String {
    department.replace([' ', '-'], "_")
}

/// Writes rows for one run inside a single transaction, committed by
/// `finish`. A run that fails before `finish` leaves the previous results
/// in place.
pub struct SqliteResultSink {
    conn: Connection,
    run_id: String,
    audited_at: String,
    in_tx: bool,
}

impl SqliteResultSink {
    pub fn open(path: &Path, run_id: &str) -> Result<Self, AuditError> {
        let conn = open_database(path, Schema::Audit)?;
        Ok(Self::new(conn, run_id))
    }

    pub fn new(conn: Connection, run_id: &str) -> Self {
        Self {
            conn,
            run_id: run_id.to_string(),
            audited_at: Utc::now().to_rfc3339(),
            in_tx: false,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn begin(&mut self) -> Result<(), AuditError> {
        if !self.in_tx {
            self.conn.execute_batch("BEGIN IMMEDIATE")?;
            self.in_tx = true;
        }
        Ok(())
    }
}

impl ResultSink for SqliteResultSink {
    fn ensure_bucket(&mut self, bucket: &str, department: &str) -> Result<(), AuditError> {
        self.begin()?;
        repository::reset_bucket(&self.conn, bucket, department, &self.run_id, &self.audited_at)?;
        tracing::debug!(bucket, "Audit bucket reset");
        Ok(())
    }

    fn append_row(&mut self, bucket: &str, row: &AuditRow) -> Result<(), AuditError> {
        self.begin()?;
        repository::insert_audit_row(&self.conn, bucket, &self.run_id, &self.audited_at, row)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), AuditError> {
        if self.in_tx {
            self.conn.execute_batch("COMMIT")?;
            self.in_tx = false;
        }
        Ok(())
    }
}

impl Drop for SqliteResultSink {
    fn drop(&mut self) {
        if self.in_tx {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "Rollback of unfinished audit write failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{ChemistryVerdict, LiteratureVerdict};

    fn row() -> AuditRow {
        AuditRow {
            patient_id: 7,
            patient_name: "Meera Nair".into(),
            age: Some(8),
            department: "Pediatrics".into(),
            diagnosis: Some("Asthma".into()),
            medication_list: "Salbutamol, Montelukast, Prednisolone".into(),
            drug_1: "Salbutamol".into(),
            drug_2: "Montelukast".into(),
            pair_key: "Montelukast|Salbutamol".into(),
            literature: LiteratureVerdict::NoFlag,
            chemistry: ChemistryVerdict::LowSimilarity { score: 0.08 },
        }
    }

    #[test]
    fn bucket_names_replace_separators() {
        assert_eq!(bucket_name("General Medicine"), "General_Medicine");
        assert_eq!(bucket_name("Ear-Nose Throat"), "Ear_Nose_Throat");
        assert_eq!(bucket_name("Cardiology"), "Cardiology");
    }

    #[test]
    fn rows_visible_after_finish() {
        let conn = open_memory_database(Schema::Audit).unwrap();
        let mut sink = SqliteResultSink::new(conn, "run-1");
        sink.ensure_bucket("Pediatrics", "Pediatrics").unwrap();
        sink.append_row("Pediatrics", &row()).unwrap();
        sink.finish().unwrap();

        let rows = repository::list_bucket_rows(sink.connection(), "Pediatrics").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].run_id, "run-1");
    }

    #[test]
    fn unfinished_run_leaves_previous_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");
        {
            let mut sink = SqliteResultSink::open(&path, "run-1").unwrap();
            sink.ensure_bucket("Pediatrics", "Pediatrics").unwrap();
            sink.append_row("Pediatrics", &row()).unwrap();
            sink.finish().unwrap();
        }
        {
            let mut sink = SqliteResultSink::open(&path, "run-2").unwrap();
            sink.ensure_bucket("Pediatrics", "Pediatrics").unwrap();
            // dropped without finish
        }
        let conn = open_database(&path, Schema::Audit).unwrap();
        let rows = repository::list_bucket_rows(&conn, "Pediatrics").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].run_id, "run-1");
    }
}
