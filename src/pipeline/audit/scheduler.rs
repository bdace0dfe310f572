//! Two-phase evaluation: fill the pair cache, then fan verdicts out to
//! patient rows.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;

use super::biologics::BiologicClassifier;
use super::cache::CacheEntry;
use super::dedup::PairPlan;
use super::error::AuditError;
use super::pacing::Pacer;
use super::pair::DrugPair;
use super::traits::{ChemistryScorer, LiteratureScorer, PairCache};
use super::types::{AuditConfig, AuditStatusEvent, FillOutcome, FillReport};
use crate::models::{AuditRow, ChemistryVerdict, DataGap, LiteratureVerdict, PairVerdicts, Patient};

/// Owns the cache and scorers for one run.
pub struct AuditScheduler {
    cache: Box<dyn PairCache>,
    literature: Box<dyn LiteratureScorer>,
    chemistry: Box<dyn ChemistryScorer>,
    classifier: BiologicClassifier,
    pacer: Pacer,
    config: AuditConfig,
}

impl AuditScheduler {
    pub fn new(
        cache: Box<dyn PairCache>,
        literature: Box<dyn LiteratureScorer>,
        chemistry: Box<dyn ChemistryScorer>,
        config: AuditConfig,
    ) -> Self {
        Self {
            cache,
            literature,
            chemistry,
            classifier: config.classifier(),
            pacer: Pacer::new(config.politeness_delay),
            config,
        }
    }

    pub fn cache(&self) -> &dyn PairCache {
        self.cache.as_ref()
    }

    pub fn classifier(&self) -> &BiologicClassifier {
        &self.classifier
    }

    /// Phase 1: resolve every distinct pair once.
    ///
    /// Cached durable halves are reused. Missing halves are looked up, with
    /// literature calls paced. Only durable results are written back;
    /// lookup failures are returned for this run and retried next time.
    pub fn fill(
        &mut self,
        pairs: &BTreeSet<DrugPair>,
        progress_fn: Option<&dyn Fn(AuditStatusEvent)>,
    ) -> FillOutcome {
        let total = pairs.len();
        let mut report = FillReport {
            pairs_total: total,
            ..FillReport::default()
        };
        let mut resolved = HashMap::with_capacity(total);

        for (i, pair) in pairs.iter().enumerate() {
            let (verdicts, calls_made) = self.resolve_pair(pair, &mut report);
            if !calls_made {
                report.cache_hits += 1;
            }

            tracing::debug!(
                pair = %pair,
                literature = verdicts.literature.kind().as_str(),
                chemistry = verdicts.chemistry.as_ref().map(|c| c.kind().as_str()).unwrap_or("skipped"),
                cache_hit = !calls_made,
                "Pair evaluated"
            );

            if let Some(progress) = progress_fn {
                progress(AuditStatusEvent::PairEvaluated {
                    completed: i + 1,
                    total,
                    pair_key: pair.key(),
                    cache_hit: !calls_made,
                });
            }

            resolved.insert(pair.clone(), verdicts);
        }

        tracing::info!(
            pairs = report.pairs_total,
            cache_hits = report.cache_hits,
            literature_calls = report.literature_calls,
            chemistry_calls = report.chemistry_calls,
            transient_failures = report.transient_failures,
            "Pair fill complete"
        );

        FillOutcome { resolved, report }
    }

    fn resolve_pair(&mut self, pair: &DrugPair, report: &mut FillReport) -> (PairVerdicts, bool) {
        let mut entry = self.cache.get(pair).unwrap_or_default();
        let mut changed = false;
        let mut calls_made = false;
        let now = Utc::now();

        // ── Literature ──────────────────────────────
        let fresh = entry.fresh_literature(now, self.config.literature_ttl).cloned();
        let literature = match fresh {
            Some(cached) => cached,
            None => {
                calls_made = true;
                report.literature_calls += 1;
                let literature = &self.literature;
                let verdict = self.pacer.pace(|| literature.score(pair.low(), pair.high()));
                if verdict.is_durable() {
                    entry.set_literature(verdict.clone(), now);
                    changed = true;
                    verdict
                } else {
                    report.transient_failures += 1;
                    match &entry.literature {
                        Some(stale) => {
                            tracing::warn!(pair = %pair, "Literature refresh failed, using expired verdict");
                            report.stale_fallbacks += 1;
                            stale.clone()
                        }
                        None => verdict,
                    }
                }
            }
        };

        // ── Chemistry ───────────────────────────────
        let chemistry = if self.classifier.pair_is_biological(pair) {
            report.biological_pairs += 1;
            None
        } else if let Some(cached) = &entry.chemistry {
            Some(cached.clone())
        } else {
            calls_made = true;
            report.chemistry_calls += 1;
            let verdict = self.chemistry.score(pair.low(), pair.high());
            if verdict.is_durable() {
                entry.set_chemistry(verdict.clone());
                changed = true;
            } else {
                report.transient_failures += 1;
            }
            Some(verdict)
        };

        if changed {
            self.store(pair, entry, report);
        }

        (
            PairVerdicts {
                literature,
                chemistry,
            },
            calls_made,
        )
    }

    fn store(&mut self, pair: &DrugPair, entry: CacheEntry, report: &mut FillReport) {
        if let Err(e) = self.cache.put(pair, entry) {
            report.cache_write_failures += 1;
            tracing::warn!(pair = %pair, error = %e, "Pair cache write failed");
        }
    }

    pub fn flush_cache(&mut self) -> Result<(), AuditError> {
        self.cache.flush()
    }

    /// Phase 2: one row per patient pair occurrence, carrying the pair's
    /// verdicts. Biological skips are derived from the names here, so a
    /// cached similarity can never leak onto a biological pair.
    pub fn fan_out(
        &self,
        patients: &[Patient],
        plan: &PairPlan,
        resolved: &HashMap<DrugPair, PairVerdicts>,
    ) -> Vec<AuditRow> {
        let mut rows = Vec::with_capacity(plan.occurrence_count());

        for (patient, occurrences) in patients.iter().zip(&plan.per_patient) {
            let medication_list = patient.medication_list();
            for occurrence in occurrences {
                let verdicts = resolved.get(&occurrence.pair);

                // A pair missing from `resolved` was never looked up.
                let literature = verdicts
                    .map(|v| v.literature.clone())
                    .unwrap_or(LiteratureVerdict::NoFlag);

                let chemistry = if self.classifier.pair_is_biological(&occurrence.pair) {
                    ChemistryVerdict::BiologicalSkipped
                } else {
                    verdicts
                        .and_then(|v| v.chemistry.clone())
                        .unwrap_or(ChemistryVerdict::DataUnavailable {
                            gap: DataGap::NoStructure,
                        })
                };

                rows.push(AuditRow {
                    patient_id: patient.id,
                    patient_name: patient.name.clone(),
                    age: patient.age,
                    department: patient.department.clone(),
                    diagnosis: patient.diagnosis.clone(),
                    medication_list: medication_list.clone(),
                    drug_1: occurrence.drug_1.clone(),
                    drug_2: occurrence.drug_2.clone(),
                    pair_key: occurrence.pair.key(),
                    literature,
                    chemistry,
                });
            }
        }

        rows
    }
}
