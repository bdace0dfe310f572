use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;

/// One stored pair cache row. Verdicts are kept as JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairCacheRow {
    pub pair_key: String,
    pub drug_low: String,
    pub drug_high: String,
    pub literature_json: Option<String>,
    pub lit_status: Option<String>,
    pub literature_cached_at: Option<String>,
    pub chemistry_json: Option<String>,
    pub chem_status: Option<String>,
    pub updated_at: String,
}

pub fn get_pair_cache_row(
    conn: &Connection,
    pair_key: &str,
) -> Result<Option<PairCacheRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT pair_key, drug_low, drug_high, literature_json, lit_status,
             literature_cached_at, chemistry_json, chem_status, updated_at
             FROM pair_cache WHERE pair_key = ?1",
            params![pair_key],
            |row| {
                Ok(PairCacheRow {
                    pair_key: row.get(0)?,
                    drug_low: row.get(1)?,
                    drug_high: row.get(2)?,
                    literature_json: row.get(3)?,
                    lit_status: row.get(4)?,
                    literature_cached_at: row.get(5)?,
                    chemistry_json: row.get(6)?,
                    chem_status: row.get(7)?,
                    updated_at: row.get(8)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Insert or replace the row for `row.pair_key`.
pub fn upsert_pair_cache_row(conn: &Connection, row: &PairCacheRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO pair_cache (pair_key, drug_low, drug_high, literature_json, lit_status,
         literature_cached_at, chemistry_json, chem_status, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(pair_key) DO UPDATE SET
            literature_json = excluded.literature_json,
            lit_status = excluded.lit_status,
            literature_cached_at = excluded.literature_cached_at,
            chemistry_json = excluded.chemistry_json,
            chem_status = excluded.chem_status,
            updated_at = excluded.updated_at",
        params![
            row.pair_key,
            row.drug_low,
            row.drug_high,
            row.literature_json,
            row.lit_status,
            row.literature_cached_at,
            row.chemistry_json,
            row.chem_status,
            row.updated_at,
        ],
    )?;
    Ok(())
}

pub fn count_pair_cache_rows(conn: &Connection) -> Result<usize, DatabaseError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM pair_cache", [], |row| row.get(0))?;
    Ok(count as usize)
}

pub fn clear_pair_cache(conn: &Connection) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM pair_cache", [])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::{open_memory_database, Schema};

    fn sample(lit: Option<&str>) -> PairCacheRow {
        PairCacheRow {
            pair_key: "Aspirin|Ibuprofen".into(),
            drug_low: "Aspirin".into(),
            drug_high: "Ibuprofen".into(),
            literature_json: lit.map(String::from),
            lit_status: None,
            literature_cached_at: None,
            chemistry_json: None,
            chem_status: None,
            updated_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn missing_row_is_none() {
        let conn = open_memory_database(Schema::PairCache).unwrap();
        assert!(get_pair_cache_row(&conn, "A|B").unwrap().is_none());
    }

    #[test]
    fn upsert_replaces_existing_row() {
        let conn = open_memory_database(Schema::PairCache).unwrap();
        upsert_pair_cache_row(&conn, &sample(None)).unwrap();
        upsert_pair_cache_row(&conn, &sample(Some(r#"{"verdict":"no_flag"}"#))).unwrap();

        assert_eq!(count_pair_cache_rows(&conn).unwrap(), 1);
        let row = get_pair_cache_row(&conn, "Aspirin|Ibuprofen").unwrap().unwrap();
        assert_eq!(row.literature_json.as_deref(), Some(r#"{"verdict":"no_flag"}"#));
    }

    #[test]
    fn clear_reports_deleted_rows() {
        let conn = open_memory_database(Schema::PairCache).unwrap();
        upsert_pair_cache_row(&conn, &sample(None)).unwrap();
        assert_eq!(clear_pair_cache(&conn).unwrap(), 1);
        assert_eq!(count_pair_cache_rows(&conn).unwrap(), 0);
    }
}
