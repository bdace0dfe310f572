//! Structural similarity scorer.

use std::panic::{catch_unwind, AssertUnwindSafe};

use super::fingerprint::{morgan_fingerprint, parse_smiles, FINGERPRINT_BITS, MORGAN_RADIUS};
use super::structures::{StructureLookup, StructureTable};
use crate::models::{ChemistryVerdict, DataGap};
use crate::pipeline::audit::ChemistryScorer;

/// Tanimoto similarity above which two drugs may compete for the same
/// metabolic pathway.
pub const HIGH_SIMILARITY_THRESHOLD: f64 = 0.4;

pub struct StructureSimilarityScorer {
    table: StructureTable,
    threshold: f64,
}

impl StructureSimilarityScorer {
    pub fn new(table: StructureTable) -> Self {
        Self {
            table,
            threshold: HIGH_SIMILARITY_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    fn similarity(&self, smiles_a: &str, smiles_b: &str) -> f64 {
        let (Ok(a), Ok(b)) = (parse_smiles(smiles_a), parse_smiles(smiles_b)) else {
            return f64::NAN;
        };
        morgan_fingerprint(&a, MORGAN_RADIUS, FINGERPRINT_BITS)
            .tanimoto(&morgan_fingerprint(&b, MORGAN_RADIUS, FINGERPRINT_BITS))
    }
}

impl ChemistryScorer for StructureSimilarityScorer {
    fn score(&self, drug_a: &str, drug_b: &str) -> ChemistryVerdict {
        let (smiles_a, smiles_b) = match (self.table.lookup(drug_a), self.table.lookup(drug_b)) {
            (StructureLookup::Found(a), StructureLookup::Found(b)) => (a, b),
            (StructureLookup::Unknown, _) | (_, StructureLookup::Unknown) => {
                return ChemistryVerdict::DataUnavailable {
                    gap: DataGap::UnknownDrug,
                }
            }
            _ => {
                return ChemistryVerdict::DataUnavailable {
                    gap: DataGap::NoStructure,
                }
            }
        };

        for (drug, smiles) in [(drug_a, smiles_a), (drug_b, smiles_b)] {
            if let Err(e) = parse_smiles(smiles) {
                tracing::debug!(drug, error = %e, "Structure does not parse");
                return ChemistryVerdict::InvalidStructure {
                    drug: drug.to_string(),
                };
            }
        }

        let score = match catch_unwind(AssertUnwindSafe(|| self.similarity(smiles_a, smiles_b))) {
            Ok(score) if score.is_finite() => score,
            Ok(score) => {
                return ChemistryVerdict::AnalysisError {
                    message: format!("similarity is not a number: {score}"),
                }
            }
            Err(_) => {
                return ChemistryVerdict::AnalysisError {
                    message: "fingerprinting panicked".to_string(),
                }
            }
        };

        if score > self.threshold {
            ChemistryVerdict::HighSimilarity { score }
        } else {
            ChemistryVerdict::LowSimilarity { score }
        }
    }
}
