use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::Patient;

/// A patient record before it has been assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPatient {
    pub name: String,
    pub age: Option<i64>,
    pub department: String,
    pub diagnosis: Option<String>,
}

pub fn insert_patient(conn: &Connection, patient: &NewPatient) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO patients (name, age, department, diagnosis) VALUES (?1, ?2, ?3, ?4)",
        params![patient.name, patient.age, patient.department, patient.diagnosis],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_prescription(
    conn: &Connection,
    patient_id: i64,
    drug_name: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO prescriptions (patient_id, drug_name) VALUES (?1, ?2)",
        params![patient_id, drug_name],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Remove every patient and prescription.
pub fn clear_patients(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "DELETE FROM prescriptions;
         DELETE FROM patients;
         DELETE FROM sqlite_sequence WHERE name IN ('patients', 'prescriptions');",
    )?;
    Ok(())
}

pub fn count_patients(conn: &Connection) -> Result<usize, DatabaseError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;
    Ok(count as usize)
}

/// Patients with at least `min_prescriptions` prescriptions, ordered by
/// department then id. Medications keep prescription order, duplicates
/// included.
pub fn list_at_risk_patients(
    conn: &Connection,
    min_prescriptions: u32,
) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.name, p.age, p.department, p.diagnosis
         FROM patients p
         JOIN prescriptions rx ON rx.patient_id = p.id
         GROUP BY p.id
         HAVING COUNT(rx.id) >= ?1
         ORDER BY p.department, p.id",
    )?;

    let rows = stmt.query_map(params![min_prescriptions], |row| {
        Ok(Patient {
            id: row.get(0)?,
            name: row.get(1)?,
            age: row.get(2)?,
            department: row.get(3)?,
            diagnosis: row.get(4)?,
            medications: Vec::new(),
        })
    })?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(row?);
    }

    let mut meds_stmt =
        conn.prepare("SELECT drug_name FROM prescriptions WHERE patient_id = ?1 ORDER BY id")?;
    for patient in &mut patients {
        let meds = meds_stmt.query_map(params![patient.id], |row| row.get::<_, String>(0))?;
        for med in meds {
            patient.medications.push(med?);
        }
    }

    Ok(patients)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::{open_memory_database, Schema};

    fn add(conn: &Connection, name: &str, department: &str, meds: &[&str]) -> i64 {
        let id = insert_patient(
            conn,
            &NewPatient {
                name: name.into(),
                age: Some(50),
                department: department.into(),
                diagnosis: None,
            },
        )
        .unwrap();
        for med in meds {
            insert_prescription(conn, id, med).unwrap();
        }
        id
    }

    #[test]
    fn filters_by_prescription_count() {
        let conn = open_memory_database(Schema::Patients).unwrap();
        add(&conn, "Few", "Cardiology", &["Aspirin", "Ibuprofen"]);
        add(&conn, "Many", "Cardiology", &["Aspirin", "Ibuprofen", "Warfarin"]);

        let patients = list_at_risk_patients(&conn, 3).unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].name, "Many");
        assert_eq!(patients[0].medications, vec!["Aspirin", "Ibuprofen", "Warfarin"]);
    }

    #[test]
    fn duplicate_prescriptions_count_and_are_kept() {
        let conn = open_memory_database(Schema::Patients).unwrap();
        add(&conn, "Dup", "Oncology", &["Aspirin", "Aspirin", "Ibuprofen"]);

        let patients = list_at_risk_patients(&conn, 3).unwrap();
        assert_eq!(patients[0].medications, vec!["Aspirin", "Aspirin", "Ibuprofen"]);
    }

    #[test]
    fn ordered_by_department_then_id() {
        let conn = open_memory_database(Schema::Patients).unwrap();
        let meds = ["A", "B", "C"];
        add(&conn, "Second", "Psychiatry", &meds);
        add(&conn, "First", "Cardiology", &meds);
        add(&conn, "Third", "Psychiatry", &meds);

        let names: Vec<String> = list_at_risk_patients(&conn, 3)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn clear_removes_everything() {
        let conn = open_memory_database(Schema::Patients).unwrap();
        add(&conn, "Gone", "Cardiology", &["A", "B", "C"]);
        clear_patients(&conn).unwrap();
        assert_eq!(count_patients(&conn).unwrap(), 0);
        assert!(list_at_risk_patients(&conn, 1).unwrap().is_empty());
    }
}
