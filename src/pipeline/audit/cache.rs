//! Pair cache entries and the file-backed and in-memory caches.
//!
//! The JSON file is a human-readable mapping from `"{low}|{high}"` to an
//! entry holding the structured verdicts plus their rendered text. The
//! text fields are informational only; entries written by older tools that
//! carry only text are treated as misses and re-evaluated.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuditError;
use super::pair::DrugPair;
use super::traits::PairCache;
use crate::models::{ChemistryVerdict, LiteratureVerdict};

// ═══════════════════════════════════════════
// CacheEntry
// ═══════════════════════════════════════════

/// Durable verdicts for one pair. Either half may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literature: Option<LiteratureVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literature_cached_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chemistry: Option<ChemistryVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lit_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chem_status: Option<String>,
}

impl CacheEntry {
    pub fn set_literature(&mut self, verdict: LiteratureVerdict, at: DateTime<Utc>) {
        self.lit_status = Some(verdict.render());
        self.literature = Some(verdict);
        self.literature_cached_at = Some(at);
    }

    pub fn set_chemistry(&mut self, verdict: ChemistryVerdict) {
        self.chem_status = Some(verdict.render());
        self.chemistry = Some(verdict);
    }

    /// The cached literature verdict if it is younger than `ttl`.
    ///
    /// A verdict without a timestamp counts as expired when a TTL is set.
    pub fn fresh_literature(
        &self,
        now: DateTime<Utc>,
        ttl: Option<chrono::Duration>,
    ) -> Option<&LiteratureVerdict> {
        let verdict = self.literature.as_ref()?;
        match ttl {
            None => Some(verdict),
            Some(ttl) => {
                let cached_at = self.literature_cached_at?;
                (now - cached_at < ttl).then_some(verdict)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.literature.is_none() && self.chemistry.is_none()
    }
}

// ═══════════════════════════════════════════
// JsonFileCache
// ═══════════════════════════════════════════

/// Pair cache persisted as one pretty-printed JSON object.
///
/// Loaded once on open. `put` updates memory and, every `autosave_every`
/// writes, persists with a load-merge-store of the whole file so entries
/// added by other tools since open are kept. The merge works on raw JSON:
/// only the keys written here are replaced, and entries this crate cannot
/// read (hand-edited keys, unknown verdict tags) stay on disk untouched.
/// Writes go through a temp file in the same directory and an atomic rename.
pub struct JsonFileCache {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
    pending: BTreeSet<String>,
    autosave_every: usize,
}

impl JsonFileCache {
    /// Open the cache at `path`. Never fails: a missing file starts empty
    /// and a corrupt or unreadable one is logged and treated as empty.
    ///
    /// `autosave_every = 1` persists on every put; `0` only on `flush`.
    pub fn open(path: impl Into<PathBuf>, autosave_every: usize) -> Self {
        let path = path.into();
        let raw = read_raw(&path);
        let entries = usable_entries(&raw);
        let skipped = raw.len() - entries.len();
        if skipped > 0 {
            tracing::warn!(path = %path.display(), skipped, "Cache entries not usable, treating them as misses");
        }
        tracing::debug!(path = %path.display(), entries = entries.len(), "Pair cache loaded");
        Self {
            path,
            entries,
            pending: BTreeSet::new(),
            autosave_every,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, merged: &BTreeMap<String, serde_json::Value>) -> Result<(), AuditError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, merged)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| AuditError::CachePersist {
            path: self.path.display().to_string(),
            reason: e.error.to_string(),
        })?;
        Ok(())
    }
}

impl PairCache for JsonFileCache {
    fn get(&self, pair: &DrugPair) -> Option<CacheEntry> {
        self.entries.get(&pair.key()).cloned()
    }

    fn put(&mut self, pair: &DrugPair, entry: CacheEntry) -> Result<(), AuditError> {
        let key = pair.key();
        self.entries.insert(key.clone(), entry);
        self.pending.insert(key);

        if self.autosave_every > 0 && self.pending.len() >= self.autosave_every {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), AuditError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut merged = read_raw(&self.path);
        for key in &self.pending {
            if let Some(entry) = self.entries.get(key) {
                merged.insert(key.clone(), serde_json::to_value(entry)?);
            }
        }

        self.persist(&merged)?;
        tracing::debug!(
            path = %self.path.display(),
            written = self.pending.len(),
            total = merged.len(),
            "Pair cache saved"
        );
        self.entries = usable_entries(&merged);
        self.pending.clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Read the cache file as raw JSON. A missing, unreadable or malformed
/// file reads as empty.
fn read_raw(path: &Path) -> BTreeMap<String, serde_json::Value> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Pair cache unreadable, starting empty");
            return BTreeMap::new();
        }
    };

    if data.trim().is_empty() {
        return BTreeMap::new();
    }

    match serde_json::from_str(&data) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Pair cache is malformed, starting empty");
            BTreeMap::new()
        }
    }
}

/// Entries with a canonical key and a readable body.
fn usable_entries(raw: &BTreeMap<String, serde_json::Value>) -> BTreeMap<String, CacheEntry> {
    let mut entries = BTreeMap::new();
    for (key, value) in raw {
        if DrugPair::from_key(key).is_none() {
            tracing::debug!(key = %key, "Ignoring cache entry with non-canonical key");
            continue;
        }
        match CacheEntry::deserialize(value) {
            Ok(entry) => {
                entries.insert(key.clone(), entry);
            }
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Ignoring unreadable cache entry");
            }
        }
    }
    entries
}

// ═══════════════════════════════════════════
// MemoryPairCache
// ═══════════════════════════════════════════

/// Process-local cache. Used when no durable store can be opened.
#[derive(Debug, Default)]
pub struct MemoryPairCache {
    entries: HashMap<String, CacheEntry>,
}

impl MemoryPairCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PairCache for MemoryPairCache {
    fn get(&self, pair: &DrugPair) -> Option<CacheEntry> {
        self.entries.get(&pair.key()).cloned()
    }

    fn put(&mut self, pair: &DrugPair, entry: CacheEntry) -> Result<(), AuditError> {
        self.entries.insert(pair.key(), entry);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), AuditError> {
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DataGap;

    fn pair(a: &str, b: &str) -> DrugPair {
        DrugPair::new(a, b).unwrap()
    }

    fn full_entry() -> CacheEntry {
        let mut entry = CacheEntry::default();
        entry.set_literature(LiteratureVerdict::PotentialRisk { citations: 2 }, Utc::now());
        entry.set_chemistry(ChemistryVerdict::LowSimilarity { score: 0.2 });
        entry
    }

    #[test]
    fn missing_file_is_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::open(dir.path().join("audit_cache.json"), 1);
        assert!(cache.is_empty());
        assert!(cache.get(&pair("Aspirin", "Ibuprofen")).is_none());
    }

    #[test]
    fn corrupt_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit_cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut cache = JsonFileCache::open(&path, 1);
        assert!(cache.is_empty());

        // Writing recovers the file.
        cache.put(&pair("Aspirin", "Ibuprofen"), full_entry()).unwrap();
        let reopened = JsonFileCache::open(&path, 1);
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn put_survives_reopen_in_either_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit_cache.json");

        let mut cache = JsonFileCache::open(&path, 1);
        cache.put(&pair("Ibuprofen", "Aspirin"), full_entry()).unwrap();

        let reopened = JsonFileCache::open(&path, 1);
        let entry = reopened.get(&pair("Aspirin", "Ibuprofen")).unwrap();
        assert_eq!(entry.literature, Some(LiteratureVerdict::PotentialRisk { citations: 2 }));
        assert_eq!(entry.chemistry, Some(ChemistryVerdict::LowSimilarity { score: 0.2 }));
    }

    #[test]
    fn file_is_keyed_by_canonical_pair_and_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit_cache.json");

        let mut cache = JsonFileCache::open(&path, 1);
        cache.put(&pair("Clopidogrel", "Aspirin"), full_entry()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let entry = &raw["Aspirin|Clopidogrel"];
        assert_eq!(entry["literature"]["verdict"], "potential_risk");
        assert!(entry["lit_status"].as_str().unwrap().contains("POTENTIAL RISK"));
        assert!(entry["chem_status"].as_str().unwrap().contains("Low similarity"));
    }

    #[test]
    fn deferred_cache_writes_only_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit_cache.json");

        let mut cache = JsonFileCache::open(&path, 0);
        cache.put(&pair("Aspirin", "Ibuprofen"), full_entry()).unwrap();
        assert!(!path.exists());

        cache.flush().unwrap();
        assert!(path.exists());
        assert_eq!(JsonFileCache::open(&path, 0).len(), 1);
    }

    #[test]
    fn flush_merges_entries_written_by_another_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit_cache.json");

        let mut first = JsonFileCache::open(&path, 0);
        let mut second = JsonFileCache::open(&path, 0);
        first.put(&pair("Aspirin", "Ibuprofen"), full_entry()).unwrap();
        second.put(&pair("Metformin", "Glipizide"), full_entry()).unwrap();
        first.flush().unwrap();
        second.flush().unwrap();

        assert_eq!(JsonFileCache::open(&path, 0).len(), 2);
    }

    #[test]
    fn legacy_text_only_entries_are_misses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit_cache.json");
        std::fs::write(
            &path,
            r#"{"Aspirin|Ibuprofen": {"lit_status": "⚠️ KNOWN RISK (9 citations)", "chem_status": null}}"#,
        )
        .unwrap();

        let cache = JsonFileCache::open(&path, 1);
        let entry = cache.get(&pair("Aspirin", "Ibuprofen")).unwrap();
        assert!(entry.is_empty());
    }

    #[test]
    fn unreadable_entries_and_bad_keys_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit_cache.json");
        std::fs::write(
            &path,
            r#"{
                "Aspirin|Ibuprofen": {"chemistry": {"verdict": "data_unavailable", "gap": "unknown_drug"}},
                "Ibuprofen|Aspirin": {},
                "Metformin|Warfarin": {"literature": {"verdict": "no_such_kind"}}
            }"#,
        )
        .unwrap();

        let cache = JsonFileCache::open(&path, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get(&pair("Aspirin", "Ibuprofen")).unwrap().chemistry,
            Some(ChemistryVerdict::DataUnavailable { gap: DataGap::UnknownDrug })
        );
    }

    #[test]
    fn saving_keeps_entries_it_cannot_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit_cache.json");
        std::fs::write(
            &path,
            r#"{
                "Ibuprofen|Aspirin": {"note": "hand edited"},
                "Metformin|Warfarin": {"literature": {"verdict": "known_rsk", "citations": 7}}
            }"#,
        )
        .unwrap();

        let mut cache = JsonFileCache::open(&path, 1);
        assert!(cache.is_empty());
        assert!(cache.get(&pair("Metformin", "Warfarin")).is_none());
        cache.put(&pair("A", "B"), full_entry()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["Ibuprofen|Aspirin"]["note"], "hand edited");
        assert_eq!(raw["Metformin|Warfarin"]["literature"]["verdict"], "known_rsk");
        assert_eq!(raw["A|B"]["literature"]["verdict"], "potential_risk");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn literature_expires_after_ttl() {
        let now = Utc::now();
        let mut entry = CacheEntry::default();
        entry.set_literature(LiteratureVerdict::NoFlag, now - chrono::Duration::days(40));

        assert!(entry.fresh_literature(now, Some(chrono::Duration::days(30))).is_none());
        assert!(entry.fresh_literature(now, Some(chrono::Duration::days(60))).is_some());
        assert!(entry.fresh_literature(now, None).is_some());
    }

    #[test]
    fn memory_cache_round_trip() {
        let mut cache = MemoryPairCache::new();
        cache.put(&pair("B", "A"), full_entry()).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&pair("A", "B")).is_some());
    }
}
