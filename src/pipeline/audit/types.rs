//! Core types for the audit pipeline: configuration, progress events and
//! run reports.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use super::biologics::{BiologicClassifier, DEFAULT_BIOLOGIC_KEYWORDS};
use super::pair::DrugPair;
use crate::models::PairVerdicts;

// ═══════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════

/// Tunables for one audit run.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Minimum spacing between literature calls (external rate limit).
    pub politeness_delay: Duration,
    /// Age after which a cached literature verdict is fetched again.
    /// `None` keeps literature verdicts forever.
    pub literature_ttl: Option<chrono::Duration>,
    /// Prescriptions needed for a patient to count as polypharmacy.
    pub min_prescriptions: u32,
    pub biologic_keywords: Vec<String>,
    pub case_sensitive_biologics: bool,
}

impl AuditConfig {
    pub fn classifier(&self) -> BiologicClassifier {
        BiologicClassifier::new(self.biologic_keywords.iter().cloned(), self.case_sensitive_biologics)
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            politeness_delay: Duration::from_millis(500),
            literature_ttl: Some(chrono::Duration::days(30)),
            min_prescriptions: 3,
            biologic_keywords: DEFAULT_BIOLOGIC_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            case_sensitive_biologics: true,
        }
    }
}

// ═══════════════════════════════════════════
// Progress events
// ═══════════════════════════════════════════

/// Progress notifications delivered during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditStatusEvent {
    Started {
        patient_count: usize,
        pair_count: usize,
    },
    PairEvaluated {
        completed: usize,
        total: usize,
        pair_key: String,
        cache_hit: bool,
    },
    Completed {
        rows_written: usize,
        duration_ms: u64,
    },
}

// ═══════════════════════════════════════════
// Phase 1 results
// ═══════════════════════════════════════════

/// Counters for the fill phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    pub pairs_total: usize,
    /// Pairs answered entirely from the cache.
    pub cache_hits: usize,
    pub literature_calls: usize,
    pub chemistry_calls: usize,
    /// Pairs whose chemistry was skipped for a biological agent.
    pub biological_pairs: usize,
    /// Lookups that failed and were left out of the cache.
    pub transient_failures: usize,
    /// Expired literature verdicts used because the refresh failed.
    pub stale_fallbacks: usize,
    pub cache_write_failures: usize,
}

/// Verdicts resolved for every distinct pair, plus counters.
#[derive(Debug, Clone, Default)]
pub struct FillOutcome {
    pub resolved: HashMap<DrugPair, PairVerdicts>,
    pub report: FillReport,
}

// ═══════════════════════════════════════════
// Run summary
// ═══════════════════════════════════════════

/// Result of a full audit run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditSummary {
    pub run_id: String,
    pub patients: usize,
    pub distinct_pairs: usize,
    pub rows_written: usize,
    pub buckets: Vec<String>,
    pub self_pairs_skipped: usize,
    pub blank_pairs_skipped: usize,
    pub repeats_collapsed: usize,
    pub fill: FillReport,
    pub duration_ms: u64,
}

impl AuditSummary {
    pub fn empty(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = AuditConfig::default();
        assert_eq!(config.politeness_delay, Duration::from_millis(500));
        assert_eq!(config.min_prescriptions, 3);
        assert_eq!(config.literature_ttl, Some(chrono::Duration::days(30)));
        assert!(config.case_sensitive_biologics);
    }

    #[test]
    fn config_builds_matching_classifier() {
        let mut config = AuditConfig::default();
        config.case_sensitive_biologics = false;
        let classifier = config.classifier();
        assert!(classifier.is_biological("insulin"));
    }

    #[test]
    fn status_event_serializes_tagged() {
        let json = serde_json::to_value(AuditStatusEvent::Started {
            patient_count: 2,
            pair_count: 5,
        })
        .unwrap();
        assert_eq!(json["event"], "started");
        assert_eq!(json["pair_count"], 5);
    }
}
