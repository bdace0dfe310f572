use std::str::FromStr;

use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::enums::{ChemistryKind, LiteratureKind};
use crate::models::AuditRow;

/// An audit row as read back for reporting and export.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAuditRow {
    pub bucket: String,
    pub run_id: String,
    pub patient_id: i64,
    pub patient_name: String,
    pub age: Option<i64>,
    pub department: String,
    pub diagnosis: Option<String>,
    pub drug_1: String,
    pub drug_2: String,
    pub pair_key: String,
    pub literature_kind: LiteratureKind,
    pub literature_risk: String,
    pub chemistry_kind: ChemistryKind,
    pub biochem_risk: String,
    pub audited_at: String,
}

impl StoredAuditRow {
    pub fn is_high_risk(&self) -> bool {
        self.literature_kind == LiteratureKind::KnownRisk
            || self.chemistry_kind == ChemistryKind::HighSimilarity
    }
}

/// Per-bucket totals for the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketTally {
    pub bucket: String,
    pub department: String,
    pub patients: usize,
    pub rows: usize,
    pub high_risk_rows: usize,
    pub patients_at_risk: usize,
}

const HIGH_RISK_PREDICATE: &str =
    "(literature_kind = 'known_risk' OR chemistry_kind = 'high_similarity')";

/// Create the bucket, or delete its rows if it already exists.
pub fn reset_bucket(
    conn: &Connection,
    bucket: &str,
    department: &str,
    run_id: &str,
    reset_at: &str,
) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM audit_rows WHERE bucket = ?1", params![bucket])?;
    conn.execute(
        "INSERT INTO audit_buckets (bucket, department, run_id, reset_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(bucket) DO UPDATE SET
            department = excluded.department,
            run_id = excluded.run_id,
            reset_at = excluded.reset_at",
        params![bucket, department, run_id, reset_at],
    )?;
    Ok(())
}

pub fn insert_audit_row(
    conn: &Connection,
    bucket: &str,
    run_id: &str,
    audited_at: &str,
    row: &AuditRow,
) -> Result<(), DatabaseError> {
    let literature_json = serde_json::to_string(&row.literature).map_err(|e| {
        DatabaseError::InvalidJson {
            column: "literature_json".into(),
            reason: e.to_string(),
        }
    })?;
    let chemistry_json = serde_json::to_string(&row.chemistry).map_err(|e| {
        DatabaseError::InvalidJson {
            column: "chemistry_json".into(),
            reason: e.to_string(),
        }
    })?;

    conn.execute(
        "INSERT INTO audit_rows (bucket, run_id, patient_id, patient_name, age, department,
         diagnosis, medication_list, drug_1, drug_2, pair_key, literature_kind,
         literature_citations, literature_json, literature_risk, chemistry_kind,
         chemistry_similarity, chemistry_json, biochem_risk, audited_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
        params![
            bucket,
            run_id,
            row.patient_id,
            row.patient_name,
            row.age,
            row.department,
            row.diagnosis,
            row.medication_list,
            row.drug_1,
            row.drug_2,
            row.pair_key,
            row.literature.kind().as_str(),
            row.literature.citations(),
            literature_json,
            row.literature.render(),
            row.chemistry.kind().as_str(),
            row.chemistry.similarity(),
            chemistry_json,
            row.chemistry.render(),
            audited_at,
        ],
    )?;
    Ok(())
}

/// Bucket names with their department, in name order.
pub fn list_buckets(conn: &Connection) -> Result<Vec<(String, String)>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT bucket, department FROM audit_buckets ORDER BY bucket")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    let mut buckets = Vec::new();
    for row in rows {
        buckets.push(row?);
    }
    Ok(buckets)
}

pub fn count_bucket_rows(conn: &Connection, bucket: &str) -> Result<usize, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM audit_rows WHERE bucket = ?1",
        params![bucket],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

pub fn list_bucket_rows(
    conn: &Connection,
    bucket: &str,
) -> Result<Vec<StoredAuditRow>, DatabaseError> {
    query_rows(
        conn,
        &format!("{SELECT_ROWS} WHERE bucket = ?1 ORDER BY id"),
        bucket,
    )
}

/// Rows with a known literature risk or high structural similarity.
pub fn list_high_risk_rows(
    conn: &Connection,
    bucket: &str,
) -> Result<Vec<StoredAuditRow>, DatabaseError> {
    query_rows(
        conn,
        &format!("{SELECT_ROWS} WHERE bucket = ?1 AND {HIGH_RISK_PREDICATE} ORDER BY id"),
        bucket,
    )
}

pub fn tally_buckets(conn: &Connection) -> Result<Vec<BucketTally>, DatabaseError> {
    let sql = format!(
        "SELECT b.bucket, b.department,
            COUNT(DISTINCT r.patient_id),
            COUNT(r.id),
            COALESCE(SUM(CASE WHEN {HIGH_RISK_PREDICATE} THEN 1 ELSE 0 END), 0),
            COUNT(DISTINCT CASE WHEN {HIGH_RISK_PREDICATE} THEN r.patient_id END)
         FROM audit_buckets b
         LEFT JOIN audit_rows r ON r.bucket = b.bucket
         GROUP BY b.bucket, b.department
         ORDER BY b.bucket"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(BucketTally {
            bucket: row.get(0)?,
            department: row.get(1)?,
            patients: row.get::<_, i64>(2)? as usize,
            rows: row.get::<_, i64>(3)? as usize,
            high_risk_rows: row.get::<_, i64>(4)? as usize,
            patients_at_risk: row.get::<_, i64>(5)? as usize,
        })
    })?;
    let mut tallies = Vec::new();
    for row in rows {
        tallies.push(row?);
    }
    Ok(tallies)
}

const SELECT_ROWS: &str = "SELECT bucket, run_id, patient_id, patient_name, age, department,
    diagnosis, drug_1, drug_2, pair_key, literature_kind, literature_risk, chemistry_kind,
    biochem_risk, audited_at FROM audit_rows";

/// Intermediate struct for rusqlite row mapping
struct AuditRowRaw {
    bucket: String,
    run_id: String,
    patient_id: i64,
    patient_name: String,
    age: Option<i64>,
    department: String,
    diagnosis: Option<String>,
    drug_1: String,
    drug_2: String,
    pair_key: String,
    literature_kind: String,
    literature_risk: String,
    chemistry_kind: String,
    biochem_risk: String,
    audited_at: String,
}

fn query_rows(
    conn: &Connection,
    sql: &str,
    bucket: &str,
) -> Result<Vec<StoredAuditRow>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![bucket], |row| {
        Ok(AuditRowRaw {
            bucket: row.get(0)?,
            run_id: row.get(1)?,
            patient_id: row.get(2)?,
            patient_name: row.get(3)?,
            age: row.get(4)?,
            department: row.get(5)?,
            diagnosis: row.get(6)?,
            drug_1: row.get(7)?,
            drug_2: row.get(8)?,
            pair_key: row.get(9)?,
            literature_kind: row.get(10)?,
            literature_risk: row.get(11)?,
            chemistry_kind: row.get(12)?,
            biochem_risk: row.get(13)?,
            audited_at: row.get(14)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(stored_row_from_raw(row?)?);
    }
    Ok(out)
}

fn stored_row_from_raw(raw: AuditRowRaw) -> Result<StoredAuditRow, DatabaseError> {
    Ok(StoredAuditRow {
        literature_kind: LiteratureKind::from_str(&raw.literature_kind)?,
        chemistry_kind: ChemistryKind::from_str(&raw.chemistry_kind)?,
        bucket: raw.bucket,
        run_id: raw.run_id,
        patient_id: raw.patient_id,
        patient_name: raw.patient_name,
        age: raw.age,
        department: raw.department,
        diagnosis: raw.diagnosis,
        drug_1: raw.drug_1,
        drug_2: raw.drug_2,
        pair_key: raw.pair_key,
        literature_risk: raw.literature_risk,
        biochem_risk: raw.biochem_risk,
        audited_at: raw.audited_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::{open_memory_database, Schema};
    use crate::models::{ChemistryVerdict, LiteratureVerdict};

    fn row(patient_id: i64, a: &str, b: &str, literature: LiteratureVerdict) -> AuditRow {
        AuditRow {
            patient_id,
            patient_name: format!("Patient {patient_id}"),
            age: Some(60),
            department: "Cardiology".into(),
            diagnosis: Some("Angina".into()),
            medication_list: format!("{a}, {b}"),
            drug_1: a.into(),
            drug_2: b.into(),
            pair_key: format!("{a}|{b}"),
            literature,
            chemistry: ChemistryVerdict::LowSimilarity { score: 0.1 },
        }
    }

    #[test]
    fn reset_bucket_empties_previous_rows() {
        let conn = open_memory_database(Schema::Audit).unwrap();
        reset_bucket(&conn, "Cardiology", "Cardiology", "run-1", "t0").unwrap();
        insert_audit_row(&conn, "Cardiology", "run-1", "t0", &row(1, "A", "B", LiteratureVerdict::NoFlag)).unwrap();
        assert_eq!(count_bucket_rows(&conn, "Cardiology").unwrap(), 1);

        reset_bucket(&conn, "Cardiology", "Cardiology", "run-2", "t1").unwrap();
        assert_eq!(count_bucket_rows(&conn, "Cardiology").unwrap(), 0);
        assert_eq!(list_buckets(&conn).unwrap().len(), 1);
    }

    #[test]
    fn stored_row_keeps_rendered_text_and_kinds() {
        let conn = open_memory_database(Schema::Audit).unwrap();
        reset_bucket(&conn, "Cardiology", "Cardiology", "run-1", "t0").unwrap();
        insert_audit_row(
            &conn,
            "Cardiology",
            "run-1",
            "t0",
            &row(1, "Aspirin", "Clopidogrel", LiteratureVerdict::PotentialRisk { citations: 3 }),
        )
        .unwrap();

        let rows = list_bucket_rows(&conn, "Cardiology").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].literature_kind, LiteratureKind::PotentialRisk);
        assert!(rows[0].literature_risk.contains("POTENTIAL RISK (3 citations)"));
        assert_eq!(rows[0].chemistry_kind, ChemistryKind::LowSimilarity);
        assert!(!rows[0].is_high_risk());
    }

    #[test]
    fn high_risk_rows_and_tallies() {
        let conn = open_memory_database(Schema::Audit).unwrap();
        reset_bucket(&conn, "Cardiology", "Cardiology", "run-1", "t0").unwrap();
        let known = LiteratureVerdict::KnownRisk {
            citations: 9,
            summary: "Bleeding.".into(),
        };
        insert_audit_row(&conn, "Cardiology", "run-1", "t0", &row(1, "A", "B", known.clone())).unwrap();
        insert_audit_row(&conn, "Cardiology", "run-1", "t0", &row(1, "A", "C", known)).unwrap();
        insert_audit_row(&conn, "Cardiology", "run-1", "t0", &row(2, "A", "B", LiteratureVerdict::NoFlag)).unwrap();
        reset_bucket(&conn, "Oncology", "Oncology", "run-1", "t0").unwrap();

        assert_eq!(list_high_risk_rows(&conn, "Cardiology").unwrap().len(), 2);

        let tallies = tally_buckets(&conn).unwrap();
        assert_eq!(tallies.len(), 2);
        let cardio = &tallies[0];
        assert_eq!(cardio.patients, 2);
        assert_eq!(cardio.rows, 3);
        assert_eq!(cardio.high_risk_rows, 2);
        assert_eq!(cardio.patients_at_risk, 1);
        assert_eq!(tallies[1].rows, 0);
    }
}
