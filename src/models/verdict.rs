//! Structured risk verdicts for one drug pair.
//!
//! Verdicts keep their raw data (citation counts, similarity scores) and are
//! rendered to display text only when written for people to read.

use serde::{Deserialize, Serialize};

use super::enums::{ChemistryKind, LiteratureKind};

// ═══════════════════════════════════════════
// Literature
// ═══════════════════════════════════════════

/// Outcome of a literature co-mention search for a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum LiteratureVerdict {
    /// Many citations: the interaction is documented.
    KnownRisk { citations: u32, summary: String },
    /// A few citations: rare or emerging.
    PotentialRisk { citations: u32 },
    NoFlag,
    /// The search service answered with a non-success status or an
    /// unreadable body.
    ApiError { status: Option<u16>, message: String },
    /// The search service could not be reached.
    Unavailable { message: String },
}

impl LiteratureVerdict {
    pub fn kind(&self) -> LiteratureKind {
        match self {
            Self::KnownRisk { .. } => LiteratureKind::KnownRisk,
            Self::PotentialRisk { .. } => LiteratureKind::PotentialRisk,
            Self::NoFlag => LiteratureKind::NoFlag,
            Self::ApiError { .. } => LiteratureKind::ApiError,
            Self::Unavailable { .. } => LiteratureKind::Unavailable,
        }
    }

    /// Durable verdicts may be cached. Lookup failures must be retried on
    /// the next run instead.
    pub fn is_durable(&self) -> bool {
        !matches!(self, Self::ApiError { .. } | Self::Unavailable { .. })
    }

    pub fn citations(&self) -> Option<u32> {
        match self {
            Self::KnownRisk { citations, .. } | Self::PotentialRisk { citations } => Some(*citations),
            Self::NoFlag => Some(0),
            _ => None,
        }
    }

    pub fn is_high_risk(&self) -> bool {
        matches!(self, Self::KnownRisk { .. })
    }

    pub fn render(&self) -> String {
        match self {
            Self::KnownRisk { citations, summary } => {
                format!("⚠️ KNOWN RISK ({citations} citations) - Summary: {summary}")
            }
            Self::PotentialRisk { citations } => {
                format!("⚠️ POTENTIAL RISK ({citations} citations) - Needs review.")
            }
            Self::NoFlag => "✅ No obvious flag in literature.".to_string(),
            Self::ApiError { status: Some(status), .. } => format!("❌ API Error (HTTP {status})"),
            Self::ApiError { status: None, message } => format!("❌ API Error: {message}"),
            Self::Unavailable { message } => format!("❌ Literature search unavailable: {message}"),
        }
    }
}

impl std::fmt::Display for LiteratureVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

// ═══════════════════════════════════════════
// Chemistry
// ═══════════════════════════════════════════

/// Why no structure comparison could be made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataGap {
    /// Known drug without a small-molecule structure (protein, mixture).
    NoStructure,
    /// Drug absent from the structure table.
    UnknownDrug,
}

/// Outcome of a structural similarity comparison for a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ChemistryVerdict {
    HighSimilarity { score: f64 },
    LowSimilarity { score: f64 },
    DataUnavailable { gap: DataGap },
    InvalidStructure { drug: String },
    /// At least one drug is a biological agent; never stored, always
    /// derived from the drug names.
    BiologicalSkipped,
    AnalysisError { message: String },
}

impl ChemistryVerdict {
    pub fn kind(&self) -> ChemistryKind {
        match self {
            Self::HighSimilarity { .. } => ChemistryKind::HighSimilarity,
            Self::LowSimilarity { .. } => ChemistryKind::LowSimilarity,
            Self::DataUnavailable { .. } => ChemistryKind::DataUnavailable,
            Self::InvalidStructure { .. } => ChemistryKind::InvalidStructure,
            Self::BiologicalSkipped => ChemistryKind::BiologicalSkipped,
            Self::AnalysisError { .. } => ChemistryKind::AnalysisError,
        }
    }

    pub fn is_durable(&self) -> bool {
        !matches!(self, Self::AnalysisError { .. } | Self::BiologicalSkipped)
    }

    pub fn similarity(&self) -> Option<f64> {
        match self {
            Self::HighSimilarity { score } | Self::LowSimilarity { score } => Some(*score),
            _ => None,
        }
    }

    pub fn is_high_risk(&self) -> bool {
        matches!(self, Self::HighSimilarity { .. })
    }

    pub fn render(&self) -> String {
        match self {
            Self::HighSimilarity { score } => format!(
                "⚠️ HIGH STRUCTURAL SIMILARITY ({score:.2}). Possible metabolic competition."
            ),
            Self::LowSimilarity { score } => format!("✅ Low similarity ({score:.2})."),
            Self::DataUnavailable { .. } => {
                "⚪ Data Unavailable (Complex/Missing structure)".to_string()
            }
            Self::InvalidStructure { .. } => "⚪ Invalid chemical structure data".to_string(),
            Self::BiologicalSkipped => "🧬 Biological Agent (Structure Skipped)".to_string(),
            Self::AnalysisError { message } => format!("❌ Error in chemical analysis: {message}"),
        }
    }
}

impl std::fmt::Display for ChemistryVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

// ═══════════════════════════════════════════
// Pair verdicts
// ═══════════════════════════════════════════

/// Both verdicts resolved for one pair during a run.
///
/// `chemistry` is `None` when the comparison was skipped for a biological
/// agent; the fan-out step derives the skip verdict from the names.
#[derive(Debug, Clone, PartialEq)]
pub struct PairVerdicts {
    pub literature: LiteratureVerdict,
    pub chemistry: Option<ChemistryVerdict>,
}
