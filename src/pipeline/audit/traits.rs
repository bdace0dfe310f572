//! Trait definitions for the audit pipeline.
//!
//! Five traits define the module boundaries:
//! - PatientSource: polypharmacy patients to audit
//! - LiteratureScorer / ChemistryScorer: per-pair risk lookups
//! - PairCache: durable verdicts keyed by canonical pair
//! - ResultSink: department-bucketed audit rows

use super::cache::CacheEntry;
use super::error::AuditError;
use super::pair::DrugPair;
use crate::models::{AuditRow, ChemistryVerdict, LiteratureVerdict, Patient};

/// Supplies patients with at least the configured number of prescriptions.
pub trait PatientSource {
    fn list_at_risk_patients(&self) -> Result<Vec<Patient>, AuditError>;
}

/// Literature co-mention lookup. Never fails: connectivity problems come
/// back as non-durable verdicts.
pub trait LiteratureScorer {
    fn score(&self, drug_a: &str, drug_b: &str) -> LiteratureVerdict;
}

/// Structural similarity lookup. Never called for biological agents.
pub trait ChemistryScorer {
    fn score(&self, drug_a: &str, drug_b: &str) -> ChemistryVerdict;
}

/// Durable pair verdicts.
///
/// `get` never fails: an unreadable store behaves as a miss. Single
/// writer only.
pub trait PairCache {
    fn get(&self, pair: &DrugPair) -> Option<CacheEntry>;

    /// Insert or replace the entry for the pair's canonical key.
    fn put(&mut self, pair: &DrugPair, entry: CacheEntry) -> Result<(), AuditError>;

    /// Persist everything written so far.
    fn flush(&mut self) -> Result<(), AuditError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Destination for audit rows grouped by department bucket.
pub trait ResultSink {
    /// Create the bucket, or empty it if it already exists.
    fn ensure_bucket(&mut self, bucket: &str, department: &str) -> Result<(), AuditError>;

    fn append_row(&mut self, bucket: &str, row: &AuditRow) -> Result<(), AuditError>;

    /// Make all appended rows durable.
    fn finish(&mut self) -> Result<(), AuditError>;
}
