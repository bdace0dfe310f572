//! Pair cache backed by an embedded SQLite table.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use super::cache::CacheEntry;
use super::error::AuditError;
use super::pair::DrugPair;
use super::traits::PairCache;
use crate::db::repository::{self, PairCacheRow};
use crate::db::sqlite::{open_database, open_memory_database, Schema};
use crate::db::DatabaseError;

/// Every `put` is its own committed statement, so `flush` has nothing to do.
pub struct SqlitePairCache {
    conn: Connection,
}

impl SqlitePairCache {
    pub fn open(path: &Path) -> Result<Self, AuditError> {
        let conn = open_database(path, Schema::PairCache)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, AuditError> {
        let conn = open_memory_database(Schema::PairCache)?;
        Ok(Self { conn })
    }

    fn read(&self, pair: &DrugPair) -> Result<Option<CacheEntry>, DatabaseError> {
        let Some(row) = repository::get_pair_cache_row(&self.conn, &pair.key())? else {
            return Ok(None);
        };
        Ok(Some(entry_from_row(row)))
    }
}

impl PairCache for SqlitePairCache {
    fn get(&self, pair: &DrugPair) -> Option<CacheEntry> {
        match self.read(pair) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(pair = %pair, error = %e, "Pair cache read failed, treating as miss");
                None
            }
        }
    }

    fn put(&mut self, pair: &DrugPair, entry: CacheEntry) -> Result<(), AuditError> {
        let row = row_from_entry(pair, &entry)?;
        repository::upsert_pair_cache_row(&self.conn, &row)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), AuditError> {
        Ok(())
    }

    fn len(&self) -> usize {
        repository::count_pair_cache_rows(&self.conn).unwrap_or(0)
    }
}

fn row_from_entry(pair: &DrugPair, entry: &CacheEntry) -> Result<PairCacheRow, AuditError> {
    let literature_json = entry.literature.as_ref().map(serde_json::to_string).transpose()?;
    let chemistry_json = entry.chemistry.as_ref().map(serde_json::to_string).transpose()?;
    Ok(PairCacheRow {
        pair_key: pair.key(),
        drug_low: pair.low().to_string(),
        drug_high: pair.high().to_string(),
        literature_json,
        lit_status: entry.lit_status.clone(),
        literature_cached_at: entry.literature_cached_at.map(|t| t.to_rfc3339()),
        chemistry_json,
        chem_status: entry.chem_status.clone(),
        updated_at: Utc::now().to_rfc3339(),
    })
}

/// Unreadable halves are dropped so the pair is re-evaluated.
fn entry_from_row(row: PairCacheRow) -> CacheEntry {
    let literature = row.literature_json.as_deref().and_then(|json| {
        serde_json::from_str(json)
            .map_err(|e| tracing::warn!(key = %row.pair_key, error = %e, "Dropping unreadable literature verdict"))
            .ok()
    });
    let chemistry = row.chemistry_json.as_deref().and_then(|json| {
        serde_json::from_str(json)
            .map_err(|e| tracing::warn!(key = %row.pair_key, error = %e, "Dropping unreadable chemistry verdict"))
            .ok()
    });
    let literature_cached_at = row
        .literature_cached_at
        .as_deref()
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc));

    CacheEntry {
        literature,
        literature_cached_at,
        chemistry,
        lit_status: row.lit_status,
        chem_status: row.chem_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChemistryVerdict, DataGap, LiteratureVerdict};

    #[test]
    fn miss_then_hit() {
        let mut cache = SqlitePairCache::open_in_memory().unwrap();
        let pair = DrugPair::new("Warfarin", "Aspirin").unwrap();
        assert!(cache.get(&pair).is_none());

        let mut entry = CacheEntry::default();
        entry.set_literature(LiteratureVerdict::NoFlag, Utc::now());
        entry.set_chemistry(ChemistryVerdict::DataUnavailable { gap: DataGap::NoStructure });
        cache.put(&pair, entry.clone()).unwrap();

        let hit = cache.get(&DrugPair::new("Aspirin", "Warfarin").unwrap()).unwrap();
        assert_eq!(hit.literature, entry.literature);
        assert_eq!(hit.chemistry, entry.chemistry);
        assert!(hit.literature_cached_at.is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit_cache.db");
        let pair = DrugPair::new("Metformin", "Glipizide").unwrap();
        {
            let mut cache = SqlitePairCache::open(&path).unwrap();
            let mut entry = CacheEntry::default();
            entry.set_chemistry(ChemistryVerdict::LowSimilarity { score: 0.12 });
            cache.put(&pair, entry).unwrap();
        }
        let cache = SqlitePairCache::open(&path).unwrap();
        let hit = cache.get(&pair).unwrap();
        assert!(hit.literature.is_none());
        assert_eq!(hit.chemistry, Some(ChemistryVerdict::LowSimilarity { score: 0.12 }));
    }

    #[test]
    fn corrupt_verdict_json_reads_as_missing_half() {
        let cache = SqlitePairCache::open_in_memory().unwrap();
        cache
            .conn
            .execute(
                "INSERT INTO pair_cache (pair_key, drug_low, drug_high, literature_json, updated_at)
                 VALUES ('A|B', 'A', 'B', 'not json', 'now')",
                [],
            )
            .unwrap();
        let entry = cache.get(&DrugPair::new("A", "B").unwrap()).unwrap();
        assert!(entry.is_empty());
    }
}
