//! Pair planning: per-patient pair occurrences and the population-wide
//! set of distinct pairs that need evaluation.

use std::collections::{BTreeSet, HashSet};

use super::pair::DrugPair;
use crate::models::Patient;

/// One drug-pair combination in a patient's list.
///
/// `drug_1` precedes `drug_2` in the patient's medication list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairOccurrence {
    pub drug_1: String,
    pub drug_2: String,
    pub pair: DrugPair,
}

/// Pairs for a single medication list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientPairs {
    pub occurrences: Vec<PairOccurrence>,
    /// Combinations of a name with a verbatim copy of itself.
    pub self_pairs_skipped: usize,
    /// Combinations involving a blank medication name.
    pub blank_pairs_skipped: usize,
    /// Combinations already produced earlier in the same list.
    pub repeats_collapsed: usize,
}

/// All 2-combinations of `medications`, in list order.
///
/// A name listed twice never pairs with itself, blank names never pair,
/// and each unordered pair appears once per patient (first orientation
/// wins).
pub fn patient_pairs(medications: &[String]) -> PatientPairs {
    let mut result = PatientPairs::default();
    let mut seen: HashSet<DrugPair> = HashSet::new();

    for (i, first) in medications.iter().enumerate() {
        for second in &medications[i + 1..] {
            let Some(pair) = DrugPair::new(first, second) else {
                if first.trim().is_empty() || second.trim().is_empty() {
                    result.blank_pairs_skipped += 1;
                } else {
                    result.self_pairs_skipped += 1;
                }
                continue;
            };
            if !seen.insert(pair.clone()) {
                result.repeats_collapsed += 1;
                continue;
            }
            result.occurrences.push(PairOccurrence {
                drug_1: first.clone(),
                drug_2: second.clone(),
                pair,
            });
        }
    }

    result
}

/// Pair plan for a whole patient population.
#[derive(Debug, Clone, Default)]
pub struct PairPlan {
    /// Distinct canonical pairs, ordered by (low, high) drug names.
    pub pairs: BTreeSet<DrugPair>,
    /// Occurrences per patient, parallel to the input slice.
    pub per_patient: Vec<Vec<PairOccurrence>>,
    pub self_pairs_skipped: usize,
    pub blank_pairs_skipped: usize,
    pub repeats_collapsed: usize,
}

impl PairPlan {
    /// Number of (patient, pair) rows the plan will produce.
    pub fn occurrence_count(&self) -> usize {
        self.per_patient.iter().map(Vec::len).sum()
    }
}

/// Build the pair plan for every patient.
pub fn plan_pairs(patients: &[Patient]) -> PairPlan {
    let mut plan = PairPlan::default();

    for patient in patients {
        let pairs = patient_pairs(&patient.medications);
        if pairs.self_pairs_skipped > 0 || pairs.repeats_collapsed > 0 {
            tracing::debug!(
                patient_id = patient.id,
                self_pairs = pairs.self_pairs_skipped,
                repeats = pairs.repeats_collapsed,
                "Medication list contains repeated names"
            );
        }
        if pairs.blank_pairs_skipped > 0 {
            tracing::warn!(patient_id = patient.id, "Medication list contains a blank name");
        }
        plan.self_pairs_skipped += pairs.self_pairs_skipped;
        plan.blank_pairs_skipped += pairs.blank_pairs_skipped;
        plan.repeats_collapsed += pairs.repeats_collapsed;
        plan.pairs
            .extend(pairs.occurrences.iter().map(|o| o.pair.clone()));
        plan.per_patient.push(pairs.occurrences);
    }

    plan
}
