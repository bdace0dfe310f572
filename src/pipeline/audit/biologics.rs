//! Biological agent classification.
//!
//! Biologics are not small molecules, so structure comparison is skipped
//! for any pair containing one. The classification depends only on the
//! drug names and is evaluated identically in the fill and fan-out phases.

use std::collections::BTreeSet;

use super::pair::DrugPair;

/// Name fragments that mark a drug as a biological agent.
pub const DEFAULT_BIOLOGIC_KEYWORDS: &[&str] = &["Insulin", "Monoclonal", "Vaccine"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiologicClassifier {
    keywords: Vec<String>,
    case_sensitive: bool,
}

impl BiologicClassifier {
    pub fn new<I, S>(keywords: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keywords = keywords
            .into_iter()
            .map(Into::into)
            .filter(|k: &String| !k.is_empty())
            .map(|k| if case_sensitive { k } else { k.to_lowercase() })
            .collect();
        Self {
            keywords,
            case_sensitive,
        }
    }

    pub fn is_biological(&self, drug: &str) -> bool {
        if self.case_sensitive {
            self.keywords.iter().any(|k| drug.contains(k.as_str()))
        } else {
            let lowered = drug.to_lowercase();
            self.keywords.iter().any(|k| lowered.contains(k.as_str()))
        }
    }

    pub fn pair_is_biological(&self, pair: &DrugPair) -> bool {
        self.is_biological(pair.low()) || self.is_biological(pair.high())
    }

    /// The biological agents in a full medication list.
    pub fn biologicals_in<'a>(&self, drugs: &'a [String]) -> BTreeSet<&'a str> {
        drugs
            .iter()
            .filter(|d| self.is_biological(d))
            .map(String::as_str)
            .collect()
    }
}

impl Default for BiologicClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_BIOLOGIC_KEYWORDS.iter().copied(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_keywords_match_substrings() {
        let c = BiologicClassifier::default();
        assert!(c.is_biological("Insulin"));
        assert!(c.is_biological("Insulin Glargine"));
        assert!(c.is_biological("Monoclonal Antibody X"));
        assert!(c.is_biological("Flu Vaccine"));
        assert!(!c.is_biological("Metformin"));
    }

    #[test]
    fn default_is_case_sensitive() {
        let c = BiologicClassifier::default();
        assert!(!c.is_biological("insulin"));
    }

    #[test]
    fn case_insensitive_mode_folds_case() {
        let c = BiologicClassifier::new(["Insulin"], false);
        assert!(c.is_biological("insulin lispro"));
        assert!(c.is_biological("INSULIN"));
    }

    #[test]
    fn pair_is_biological_if_either_side_is() {
        let c = BiologicClassifier::default();
        let pair = DrugPair::new("Metformin", "Insulin").unwrap();
        assert!(c.pair_is_biological(&pair));
        let pair = DrugPair::new("Metformin", "Glipizide").unwrap();
        assert!(!c.pair_is_biological(&pair));
    }

    #[test]
    fn classifies_whole_list() {
        let c = BiologicClassifier::default();
        let drugs: Vec<String> = ["Metformin", "Insulin", "Flu Vaccine"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let found: Vec<&str> = c.biologicals_in(&drugs).into_iter().collect();
        assert_eq!(found, vec!["Flu Vaccine", "Insulin"]);
    }

    #[test]
    fn empty_keywords_are_ignored() {
        let c = BiologicClassifier::new(["", "Vaccine"], true);
        assert!(!c.is_biological("Aspirin"));
    }
}
