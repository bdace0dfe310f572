//! Drug name to SMILES reference table.

use std::collections::HashMap;
use std::path::Path;

use super::ScoringError;

const BUNDLED_STRUCTURES: &str = include_str!("../../resources/drug_structures.json");

/// Result of looking a drug up in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureLookup<'a> {
    Found(&'a str),
    /// Listed, but without a small-molecule structure.
    NoStructure,
    Unknown,
}

/// Exact-name structure table. A `null` value marks a known drug with no
/// usable structure (proteins, mixtures).
#[derive(Debug, Clone, Default)]
pub struct StructureTable {
    entries: HashMap<String, Option<String>>,
}

impl StructureTable {
    /// The table shipped with the binary.
    pub fn bundled() -> Result<Self, ScoringError> {
        Self::from_json(BUNDLED_STRUCTURES)
    }

    pub fn from_json(json: &str) -> Result<Self, ScoringError> {
        let entries: HashMap<String, Option<String>> =
            serde_json::from_str(json).map_err(|e| ScoringError::ReferenceData(e.to_string()))?;
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, ScoringError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ScoringError::ReferenceData(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn lookup(&self, drug: &str) -> StructureLookup<'_> {
        match self.entries.get(drug) {
            Some(Some(smiles)) if !smiles.trim().is_empty() => StructureLookup::Found(smiles),
            Some(_) => StructureLookup::NoStructure,
            None => StructureLookup::Unknown,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
