//! Patient source over the prescriptions database.

use std::path::Path;

use rusqlite::Connection;

use super::error::AuditError;
use super::traits::PatientSource;
use crate::db::repository;
use crate::db::sqlite::{open_database, Schema};
use crate::models::Patient;

pub struct SqlitePatientSource {
    conn: Connection,
    min_prescriptions: u32,
}

impl SqlitePatientSource {
    pub fn open(path: &Path, min_prescriptions: u32) -> Result<Self, AuditError> {
        let conn = open_database(path, Schema::Patients)?;
        Ok(Self::new(conn, min_prescriptions))
    }

    pub fn new(conn: Connection, min_prescriptions: u32) -> Self {
        Self {
            conn,
            min_prescriptions,
        }
    }
}

impl PatientSource for SqlitePatientSource {
    fn list_at_risk_patients(&self) -> Result<Vec<Patient>, AuditError> {
        let patients = repository::list_at_risk_patients(&self.conn, self.min_prescriptions)?;
        tracing::info!(
            count = patients.len(),
            min_prescriptions = self.min_prescriptions,
            "Loaded polypharmacy patients"
        );
        Ok(patients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{insert_patient, insert_prescription, NewPatient};
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn respects_configured_threshold() {
        let conn = open_memory_database(Schema::Patients).unwrap();
        let id = insert_patient(
            &conn,
            &NewPatient {
                name: "Rohan Gupta".into(),
                age: Some(45),
                department: "Neurology".into(),
                diagnosis: Some("Epilepsy".into()),
            },
        )
        .unwrap();
        insert_prescription(&conn, id, "Valproate").unwrap();
        insert_prescription(&conn, id, "Carbamazepine").unwrap();

        let strict = SqlitePatientSource::new(conn, 3);
        assert!(strict.list_at_risk_patients().unwrap().is_empty());

        let relaxed = SqlitePatientSource::new(strict.conn, 2);
        assert_eq!(relaxed.list_at_risk_patients().unwrap().len(), 1);
    }
}
