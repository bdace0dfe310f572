use rusqlite::{params, Connection};

use crate::db::DatabaseError;

use super::audit_row::StoredAuditRow;

/// Delete the exported rows of one bucket.
pub fn reset_high_risk_bucket(conn: &Connection, bucket: &str) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM high_risk WHERE bucket = ?1", params![bucket])?;
    Ok(())
}

pub fn insert_high_risk_row(
    conn: &Connection,
    row: &StoredAuditRow,
    detected_at: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO high_risk (bucket, patient_name, age, diagnosis, drug_1, drug_2,
         literature_risk, biochem_risk, detected_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            row.bucket,
            row.patient_name,
            row.age,
            row.diagnosis,
            row.drug_1,
            row.drug_2,
            row.literature_risk,
            row.biochem_risk,
            detected_at,
        ],
    )?;
    Ok(())
}

pub fn count_high_risk_rows(conn: &Connection, bucket: &str) -> Result<usize, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM high_risk WHERE bucket = ?1",
        params![bucket],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}
